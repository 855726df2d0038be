use crate::bridge::CameraBridge;
use crate::config::RecorderConfig;
use crate::error::{RecorderError, RecorderResult};
use crate::records::RecordsDir;
use crate::utils::{format_duration, CancelToken};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// 会话计数器
///
/// 后台线程递增，前台命令处理器只读取；`successes <= segments`
/// 恒成立。
#[derive(Debug, Default)]
pub struct SessionStats {
    segments: AtomicU64,
    successes: AtomicU64,
}

impl SessionStats {
    /// 已尝试的分段数
    pub fn segments(&self) -> u64 {
        self.segments.load(Ordering::SeqCst)
    }

    /// 成功完成的分段数
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.segments.store(0, Ordering::SeqCst);
        self.successes.store(0, Ordering::SeqCst);
    }
}

/// 录像会话生命周期控制器
///
/// 持有 `active` 标志并管理唯一的后台分段循环线程。
/// `active` 只能经由 `start` 原子地变为 true；经由显式 `stop`、
/// 到达时长上限或设备连接失败变回 false。
pub struct SessionController {
    bridge: Arc<dyn CameraBridge>,
    config: RecorderConfig,
    records: RecordsDir,
    active: Arc<AtomicBool>,
    cancel: Arc<CancelToken>,
    stats: Arc<SessionStats>,
    connected: Mutex<Option<String>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    /// 创建控制器，准备好本地录像目录
    pub fn new(bridge: Arc<dyn CameraBridge>, config: RecorderConfig) -> RecorderResult<Self> {
        let records = RecordsDir::open(&config.records_dir)?;

        Ok(SessionController {
            bridge,
            config,
            records,
            active: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(CancelToken::new()),
            stats: Arc::new(SessionStats::default()),
            connected: Mutex::new(None),
            handle: Mutex::new(None),
        })
    }

    /// 本地录像目录
    pub fn records(&self) -> &RecordsDir {
        &self.records
    }

    /// 会话是否正在运行
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// 当前会话计数
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// 当前连接的设备序列号
    pub fn connected_address(&self) -> Option<String> {
        self.connected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 检查到给定 IP 的无线连接是否在线
    pub fn check_connection(&self, ip: &str) -> bool {
        self.bridge.is_connected(ip).unwrap_or(false)
    }

    /// 启动录像会话
    ///
    /// 原子地占住会话槽位后建立设备连接，成功才启动后台线程；
    /// 连接失败会释放槽位，已有会话运行时拒绝。
    pub fn start(&self, ip: &str) -> RecorderResult<()> {
        // 原子地占住会话槽位，并发的 start 只有一个能成功
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RecorderError::SessionError(
                "录像会话已在运行".to_string(),
            ));
        }

        info!("开始录像准备...");
        let serial = match self.bridge.ensure_wifi(ip) {
            Ok(serial) => serial,
            Err(e) => {
                // 连接未确认，会话不算开始
                self.active.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        *self.connected.lock().unwrap_or_else(|e| e.into_inner()) = Some(serial.clone());

        // 回收上一个已结束的后台线程
        if let Some(handle) = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = handle.join();
        }

        self.stats.reset();
        self.cancel.reset();

        let worker = SessionWorker {
            bridge: Arc::clone(&self.bridge),
            config: self.config.clone(),
            records: self.records.clone(),
            active: Arc::clone(&self.active),
            cancel: Arc::clone(&self.cancel),
            stats: Arc::clone(&self.stats),
            serial,
        };

        let handle = thread::spawn(move || worker.run_loop());
        *self.handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        Ok(())
    }

    /// 停止录像会话（幂等）
    ///
    /// 协作式取消：清掉 `active` 并唤醒等待中的后台线程，
    /// 随后尽力而为地停掉设备上的相机应用。
    pub fn stop(&self) {
        let was_active = self.active.swap(false, Ordering::SeqCst);
        self.cancel.cancel();

        if was_active {
            info!("正在停止录像...");
        }

        if let Some(serial) = self.connected_address() {
            if let Err(e) = self.bridge.force_stop_camera(&serial) {
                debug!("停止相机应用失败(忽略): {}", e);
            }
        }
    }

    /// 等待后台线程结束
    pub fn join(&self) {
        if let Some(handle) = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = handle.join();
        }
    }
}

/// 后台分段循环的所有权载体
struct SessionWorker {
    bridge: Arc<dyn CameraBridge>,
    config: RecorderConfig,
    records: RecordsDir,
    active: Arc<AtomicBool>,
    cancel: Arc<CancelToken>,
    stats: Arc<SessionStats>,
    serial: String,
}

impl SessionWorker {
    /// 分段循环：`active` 且未到时长上限时重复录制
    ///
    /// 任何分段失败都不中断会话，计数后继续下一段。
    fn run_loop(&self) {
        let started = Instant::now();
        let limit = self.config.session_limit();

        info!(
            "开始连续录像，时长上限 {}",
            format_duration(limit.as_secs())
        );

        while self.active.load(Ordering::SeqCst) && started.elapsed() < limit {
            let segment = self.stats.segments.fetch_add(1, Ordering::SeqCst) + 1;

            let elapsed_h = started.elapsed().as_secs_f64() / 3600.0;
            let remaining_h = (limit.as_secs_f64() / 3600.0 - elapsed_h).max(0.0);
            info!(
                "分段 {} (已录 {:.1}h，剩余 {:.1}h)",
                segment, elapsed_h, remaining_h
            );

            // 最后一段不越过会话时长上限
            let capture = self
                .config
                .segment_duration()
                .min(limit.saturating_sub(started.elapsed()));

            match self.record_segment(capture) {
                Ok(path) => {
                    self.stats.successes.fetch_add(1, Ordering::SeqCst);
                    info!("分段 {} 完成: {}", segment, path.display());
                }
                Err(e) => warn!("分段 {} 失败: {}", segment, e),
            }

            if self.active.load(Ordering::SeqCst) && started.elapsed() < limit {
                debug!("准备下一个分段...");
                self.cancel.wait(self.config.pause());
            }
        }

        self.active.store(false, Ordering::SeqCst);
        info!(
            "录像结束，成功 {}/{} 段",
            self.stats.successes(),
            self.stats.segments()
        );
    }

    /// 录制一个分段：启动相机、触发录像、等待、停止、传输
    fn record_segment(&self, capture: Duration) -> RecorderResult<PathBuf> {
        let local_path = self.records.next_segment_path();

        debug!("启动相机...");
        self.bridge.launch_camera(&self.serial)?;
        self.settle(self.config.launch_settle_ms);

        debug!("触发录像...");
        self.bridge.trigger_shutter(&self.serial)?;
        self.settle(self.config.trigger_settle_ms);

        // 主等待可被停止请求打断；打断后仍执行停止与传输步骤，
        // 保留已录下的内容
        info!("录像 {} ...", format_duration(capture.as_secs()));
        if self.cancel.wait(capture) {
            debug!("录像等待被停止请求打断");
        }

        debug!("停止录像...");
        self.bridge.trigger_shutter(&self.serial)?;
        self.settle(self.config.stop_settle_ms);

        // 退出相机界面
        self.bridge.press_back(&self.serial)?;
        self.bridge.press_back(&self.serial)?;
        self.settle(self.config.close_settle_ms);

        debug!("查找最新录像文件...");
        let remote = self
            .bridge
            .newest_media(&self.serial)?
            .ok_or_else(|| RecorderError::DeviceError("设备上未找到录像文件".to_string()))?;

        info!("传输 {} -> {}", remote, local_path.display());
        self.bridge.pull_media(&self.serial, &remote, &local_path)?;

        // 拉取成功后才删除远程文件；删除失败只告警，素材已在本地
        if let Err(e) = self.bridge.remove_media(&self.serial, &remote) {
            warn!("删除远程文件 {} 失败: {}", remote, e);
        }

        Ok(local_path)
    }

    fn settle(&self, ms: u64) {
        if ms > 0 {
            thread::sleep(Duration::from_millis(ms));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// 模拟的设备桥接，可配置各环节是否失败
    #[derive(Default)]
    struct MockBridge {
        fail_setup: bool,
        fail_capture: bool,
        setup_delay_ms: u64,
        setup_calls: AtomicU64,
        force_stops: AtomicU64,
    }

    impl CameraBridge for MockBridge {
        fn tool_version(&self) -> RecorderResult<String> {
            Ok("mock version 1.0".to_string())
        }

        fn ensure_wifi(&self, ip: &str) -> RecorderResult<String> {
            self.setup_calls.fetch_add(1, Ordering::SeqCst);
            if self.setup_delay_ms > 0 {
                thread::sleep(Duration::from_millis(self.setup_delay_ms));
            }
            if self.fail_setup {
                return Err(RecorderError::ConnectionError("模拟连接失败".to_string()));
            }
            Ok(format!("{}:5555", ip))
        }

        fn is_connected(&self, _ip: &str) -> RecorderResult<bool> {
            Ok(!self.fail_setup)
        }

        fn launch_camera(&self, _serial: &str) -> RecorderResult<()> {
            if self.fail_capture {
                return Err(RecorderError::DeviceError("模拟相机启动失败".to_string()));
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
            Ok(())
        }

        fn remove_media(&self, _serial: &str, _remote: &str) -> RecorderResult<()> {
            Ok(())
        }

        fn force_stop_camera(&self, _serial: &str) -> RecorderResult<()> {
            self.force_stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_config(dir: &Path, session_limit_ms: u64) -> RecorderConfig {
        RecorderConfig {
            records_dir: dir.to_path_buf(),
            segment_ms: 10,
            pause_ms: 10,
            launch_settle_ms: 0,
            trigger_settle_ms: 0,
            stop_settle_ms: 0,
            close_settle_ms: 0,
            session_limit_ms,
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

    #[test]
    fn failing_setup_never_starts_a_session() {
        let tmp = tempfile::tempdir().expect("无法创建临时目录");
        let mock = Arc::new(MockBridge {
            fail_setup: true,
            ..MockBridge::default()
        });
        let controller =
            SessionController::new(mock.clone(), fast_config(tmp.path(), 60_000)).expect("new 失败");

        assert!(controller.start("192.168.1.50").is_err());
        assert!(!controller.is_active());
        assert_eq!(controller.stats().segments(), 0);
        assert_eq!(mock.setup_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn at_most_one_session_at_a_time() {
        let tmp = tempfile::tempdir().expect("无法创建临时目录");
        let mock = Arc::new(MockBridge::default());
        let controller =
            SessionController::new(mock, fast_config(tmp.path(), 60_000)).expect("new 失败");

        controller.start("192.168.1.50").expect("首次启动应当成功");
        let second = controller.start("192.168.1.50");
        assert!(matches!(second, Err(RecorderError::SessionError(_))));

        controller.stop();
        controller.join();
        assert!(!controller.is_active());
    }

    #[test]
    fn concurrent_starts_admit_exactly_one_session() {
        let tmp = tempfile::tempdir().expect("无法创建临时目录");
        // 连接建立期间留出窗口，让两个 start 真正同时竞争
        let mock = Arc::new(MockBridge {
            setup_delay_ms: 100,
            ..MockBridge::default()
        });
        let controller = Arc::new(
            SessionController::new(mock, fast_config(tmp.path(), 60_000)).expect("new 失败"),
        );

        let mut handles = Vec::new();
        for _ in 0..2 {
            let controller = Arc::clone(&controller);
            handles.push(thread::spawn(move || {
                controller.start("192.168.1.50").is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|handle| handle.join().expect("启动线程崩溃"))
            .filter(|started| *started)
            .count();
        assert_eq!(successes, 1);

        controller.stop();
        controller.join();
    }

    #[test]
    fn stop_is_observed_promptly_and_idempotent() {
        let tmp = tempfile::tempdir().expect("无法创建临时目录");
        let mock = Arc::new(MockBridge::default());
        let mut config = fast_config(tmp.path(), 600_000);
        config.segment_ms = 60_000; // 正在长等待中停止
        let controller = SessionController::new(mock.clone(), config).expect("new 失败");

        controller.start("192.168.1.50").expect("启动失败");
        thread::sleep(Duration::from_millis(50));

        controller.stop();
        assert!(!controller.is_active());

        // 取消令牌应当立即唤醒长等待，线程很快收尾
        let joined_at = Instant::now();
        controller.join();
        assert!(joined_at.elapsed() < Duration::from_secs(5));

        // 重复停止无副作用
        controller.stop();
        assert!(mock.force_stops.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn failing_segments_run_to_the_ceiling() {
        let tmp = tempfile::tempdir().expect("无法创建临时目录");
        let mock = Arc::new(MockBridge {
            fail_capture: true,
            ..MockBridge::default()
        });
        let controller =
            SessionController::new(mock, fast_config(tmp.path(), 300)).expect("new 失败");

        controller.start("192.168.1.50").expect("启动失败");

        // 时长上限到达后循环自行结束
        assert!(wait_until(Duration::from_secs(5), || !controller.is_active()));
        controller.join();

        assert!(controller.stats().segments() > 0);
        assert_eq!(controller.stats().successes(), 0);
    }

    #[test]
    fn success_count_never_exceeds_segment_count() {
        let tmp = tempfile::tempdir().expect("无法创建临时目录");
        let mock = Arc::new(MockBridge::default());
        let controller =
            SessionController::new(mock, fast_config(tmp.path(), 200)).expect("new 失败");

        controller.start("192.168.1.50").expect("启动失败");
        assert!(wait_until(Duration::from_secs(5), || !controller.is_active()));
        controller.join();

        let stats = controller.stats();
        assert!(stats.segments() > 0);
        assert!(stats.successes() <= stats.segments());
    }
}
