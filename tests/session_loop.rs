//! 用模拟设备桥接驱动完整会话流程的集成测试

use adb_recorder::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn fast_config(dir: &Path) -> RecorderConfig {
    RecorderConfig {
        records_dir: dir.to_path_buf(),
        segment_ms: 10,
        pause_ms: 10,
        launch_settle_ms: 0,
        trigger_settle_ms: 0,
        stop_settle_ms: 0,
        close_settle_ms: 0,
        session_limit_ms: 60_000,
        ..RecorderConfig::default()
    }
}

fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// 只允许第一个分段成功的桥接：之后的分段在启动相机时失败
#[derive(Default)]
struct SingleShotBridge {
    completed: AtomicU64,
    removes: AtomicU64,
}

impl CameraBridge for SingleShotBridge {
    fn tool_version(&self) -> RecorderResult<String> {
        Ok("mock".to_string())
    }

    fn ensure_wifi(&self, ip: &str) -> RecorderResult<String> {
        Ok(format!("{}:5555", ip))
    }

    fn is_connected(&self, _ip: &str) -> RecorderResult<bool> {
        Ok(true)
    }

    fn launch_camera(&self, _serial: &str) -> RecorderResult<()> {
        if self.completed.load(Ordering::SeqCst) > 0 {
            return Err(RecorderError::DeviceError("相机不再可用".to_string()));
        }
        Ok(())
    }

    fn trigger_shutter(&self, _serial: &str) -> RecorderResult<()> {
        Ok(())
    }

    fn press_back(&self, _serial: &str) -> RecorderResult<()> {
        Ok(())
    }

    fn newest_media(&self, _serial: &str) -> RecorderResult<Option<String>> {
        Ok(Some("/sdcard/DCIM/Camera/20250101_120000.mp4".to_string()))
    }

    fn pull_media(&self, _serial: &str, _remote: &str, local: &Path) -> RecorderResult<()> {
        std::fs::write(local, b"fake video data")?;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove_media(&self, _serial: &str, _remote: &str) -> RecorderResult<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn force_stop_camera(&self, _serial: &str) -> RecorderResult<()> {
        Ok(())
    }
}

/// 拉取永远失败的桥接，用于验证远程文件保留策略
#[derive(Default)]
struct FailingPullBridge {
    removes: AtomicU64,
}

impl CameraBridge for FailingPullBridge {
    fn tool_version(&self) -> RecorderResult<String> {
        Ok("mock".to_string())
    }

    fn ensure_wifi(&self, ip: &str) -> RecorderResult<String> {
        Ok(format!("{}:5555", ip))
    }

    fn is_connected(&self, _ip: &str) -> RecorderResult<bool> {
        Ok(true)
    }

    fn launch_camera(&self, _serial: &str) -> RecorderResult<()> {
        Ok(())
    }

    fn trigger_shutter(&self, _serial: &str) -> RecorderResult<()> {
        Ok(())
    }

    fn press_back(&self, _serial: &str) -> RecorderResult<()> {
        Ok(())
    }

    fn newest_media(&self, _serial: &str) -> RecorderResult<Option<String>> {
        Ok(Some("/sdcard/DCIM/Camera/20250101_120000.mp4".to_string()))
    }

    fn pull_media(&self, _serial: &str, _remote: &str, _local: &Path) -> RecorderResult<()> {
        Err(RecorderError::CommandError("模拟传输失败".to_string()))
    }

    fn remove_media(&self, _serial: &str, _remote: &str) -> RecorderResult<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn force_stop_camera(&self, _serial: &str) -> RecorderResult<()> {
        Ok(())
    }
}

#[test]
fn one_successful_segment_produces_one_recording() {
    let tmp = tempfile::tempdir().expect("无法创建临时目录");
    let records = RecordsDir::open(tmp.path()).expect("open 失败");
    assert_eq!(records.count(), 0, "新目录应当没有录像");

    let bridge = Arc::new(SingleShotBridge::default());
    let controller =
        SessionController::new(bridge.clone(), fast_config(tmp.path())).expect("new 失败");

    controller.start("192.168.1.77").expect("启动失败");
    assert!(wait_until(Duration::from_secs(5), || {
        bridge.completed.load(Ordering::SeqCst) >= 1
    }));

    controller.stop();
    controller.join();

    let entries = records.list().expect("list 失败");
    assert_eq!(entries.len(), 1);
    assert!(entries[0].size_bytes > 0);
    assert!(entries[0].name.starts_with("record_"));

    // 成功拉取后远程文件被清理
    assert_eq!(bridge.removes.load(Ordering::SeqCst), 1);

    let stats = controller.stats();
    assert_eq!(stats.successes(), 1);
    assert!(stats.successes() <= stats.segments());
}

#[test]
fn failed_transfer_leaves_remote_file_in_place() {
    let tmp = tempfile::tempdir().expect("无法创建临时目录");
    let bridge = Arc::new(FailingPullBridge::default());

    let mut config = fast_config(tmp.path());
    config.session_limit_ms = 200;
    let controller = SessionController::new(bridge.clone(), config).expect("new 失败");

    controller.start("192.168.1.77").expect("启动失败");
    assert!(wait_until(Duration::from_secs(5), || !controller.is_active()));
    controller.join();

    // 每个分段都因传输失败计为失败，且从不删除远程文件
    assert!(controller.stats().segments() > 0);
    assert_eq!(controller.stats().successes(), 0);
    assert_eq!(bridge.removes.load(Ordering::SeqCst), 0);

    let records = RecordsDir::open(tmp.path()).expect("open 失败");
    assert_eq!(records.count(), 0);
}
