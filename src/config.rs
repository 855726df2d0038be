use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 各类 ADB 操作的超时时间（毫秒）
///
/// 每次外部调用都带有自己的超时；超时的子进程会被终止并按失败分段处理。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Timeouts {
    /// 列出设备 (`adb devices -l`)
    pub devices: u64,
    /// 切换网络调试模式 (`adb tcpip`)
    pub network_mode: u64,
    /// 连接远程设备 (`adb connect`)
    pub connect: u64,
    /// 启动相机活动 (`am start`)
    pub launch: u64,
    /// 发送按键事件 (`input keyevent`)
    pub keyevent: u64,
    /// 列出远程文件 (`ls`)
    pub list_files: u64,
    /// 拉取文件 (`adb pull`)
    pub pull: u64,
    /// 删除远程文件 (`rm`)
    pub remove: u64,
    /// 强制停止应用 (`am force-stop`)
    pub force_stop: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            devices: 10_000,
            network_mode: 30_000,
            connect: 30_000,
            launch: 15_000,
            keyevent: 10_000,
            list_files: 60_000,
            pull: 120_000,
            remove: 30_000,
            force_stop: 10_000,
        }
    }
}

/// 录像工具配置结构体
///
/// 分段时长、段间停顿、远程媒体目录等均为可配置参数，
/// 默认值对应三星自带相机应用的无人值守录像场景。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderConfig {
    /// ADB 可执行文件路径
    pub adb_path: PathBuf,
    /// 无线调试端口
    pub port: u16,
    /// 本地录像目录
    pub records_dir: PathBuf,
    /// 单段录像时长（毫秒）
    pub segment_ms: u64,
    /// 段与段之间的停顿（毫秒）
    pub pause_ms: u64,
    /// 相机启动后的等待时间（毫秒）
    pub launch_settle_ms: u64,
    /// 触发快门后的等待时间（毫秒）
    pub trigger_settle_ms: u64,
    /// 停止录像后的等待时间（毫秒）
    pub stop_settle_ms: u64,
    /// 退出相机后的等待时间（毫秒）
    pub close_settle_ms: u64,
    /// 整个会话的时长上限（毫秒）
    pub session_limit_ms: u64,
    /// 相机应用包名
    pub camera_package: String,
    /// 设备上的媒体目录
    pub remote_media_dir: String,
    /// 媒体文件匹配模式
    pub remote_media_pattern: String,
    /// 各操作的超时时间
    pub timeouts: Timeouts,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        RecorderConfig {
            adb_path: PathBuf::from("adb"),
            port: 5555,
            records_dir: default_records_dir(),
            segment_ms: 29 * 60 * 1000,     // 29 分钟
            pause_ms: 5_000,
            launch_settle_ms: 5_000,
            trigger_settle_ms: 3_000,
            stop_settle_ms: 5_000,
            close_settle_ms: 3_000,
            session_limit_ms: 10 * 3600 * 1000, // 10 小时
            camera_package: "com.sec.android.app.camera".to_string(),
            remote_media_dir: "/sdcard/DCIM/Camera".to_string(),
            remote_media_pattern: "*.mp4".to_string(),
            timeouts: Timeouts::default(),
        }
    }
}

impl RecorderConfig {
    /// 单段录像时长
    pub fn segment_duration(&self) -> Duration {
        Duration::from_millis(self.segment_ms)
    }

    /// 段间停顿时长
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    /// 会话时长上限
    pub fn session_limit(&self) -> Duration {
        Duration::from_millis(self.session_limit_ms)
    }
}

/// 默认录像目录（用户主目录下的 records）
fn default_records_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("records"))
        .unwrap_or_else(|| PathBuf::from("records"))
}

/// 录像工具配置构建器
#[derive(Default)]
pub struct RecorderConfigBuilder {
    adb_path: Option<PathBuf>,
    port: Option<u16>,
    records_dir: Option<PathBuf>,
    segment_ms: Option<u64>,
    pause_ms: Option<u64>,
    launch_settle_ms: Option<u64>,
    trigger_settle_ms: Option<u64>,
    stop_settle_ms: Option<u64>,
    close_settle_ms: Option<u64>,
    session_limit_ms: Option<u64>,
    camera_package: Option<String>,
    remote_media_dir: Option<String>,
    remote_media_pattern: Option<String>,
    timeouts: Option<Timeouts>,
}

impl RecorderConfigBuilder {
    /// 设置 ADB 可执行文件路径
    pub fn adb_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.adb_path = Some(path.into());
        self
    }

    /// 设置无线调试端口
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// 设置本地录像目录
    pub fn records_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.records_dir = Some(dir.into());
        self
    }

    /// 设置单段录像时长（毫秒）
    pub fn segment_ms(mut self, ms: u64) -> Self {
        self.segment_ms = Some(ms);
        self
    }

    /// 设置段间停顿（毫秒）
    pub fn pause_ms(mut self, ms: u64) -> Self {
        self.pause_ms = Some(ms);
        self
    }

    /// 设置相机启动后的等待时间（毫秒）
    pub fn launch_settle_ms(mut self, ms: u64) -> Self {
        self.launch_settle_ms = Some(ms);
        self
    }

    /// 设置触发快门后的等待时间（毫秒）
    pub fn trigger_settle_ms(mut self, ms: u64) -> Self {
        self.trigger_settle_ms = Some(ms);
        self
    }

    /// 设置停止录像后的等待时间（毫秒）
    pub fn stop_settle_ms(mut self, ms: u64) -> Self {
        self.stop_settle_ms = Some(ms);
        self
    }

    /// 设置退出相机后的等待时间（毫秒）
    pub fn close_settle_ms(mut self, ms: u64) -> Self {
        self.close_settle_ms = Some(ms);
        self
    }

    /// 设置会话时长上限（毫秒）
    pub fn session_limit_ms(mut self, ms: u64) -> Self {
        self.session_limit_ms = Some(ms);
        self
    }

    /// 设置相机应用包名
    pub fn camera_package(mut self, package: &str) -> Self {
        self.camera_package = Some(package.to_string());
        self
    }

    /// 设置设备上的媒体目录
    pub fn remote_media_dir(mut self, dir: &str) -> Self {
        self.remote_media_dir = Some(dir.to_string());
        self
    }

    /// 设置媒体文件匹配模式
    pub fn remote_media_pattern(mut self, pattern: &str) -> Self {
        self.remote_media_pattern = Some(pattern.to_string());
        self
    }

    /// 设置各操作的超时时间
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// 构建录像工具配置
    pub fn build(self) -> RecorderConfig {
        let default = RecorderConfig::default();

        RecorderConfig {
            adb_path: self.adb_path.unwrap_or(default.adb_path),
            port: self.port.unwrap_or(default.port),
            records_dir: self.records_dir.unwrap_or(default.records_dir),
            segment_ms: self.segment_ms.unwrap_or(default.segment_ms),
            pause_ms: self.pause_ms.unwrap_or(default.pause_ms),
            launch_settle_ms: self.launch_settle_ms.unwrap_or(default.launch_settle_ms),
            trigger_settle_ms: self
                .trigger_settle_ms
                .unwrap_or(default.trigger_settle_ms),
            stop_settle_ms: self.stop_settle_ms.unwrap_or(default.stop_settle_ms),
            close_settle_ms: self.close_settle_ms.unwrap_or(default.close_settle_ms),
            session_limit_ms: self.session_limit_ms.unwrap_or(default.session_limit_ms),
            camera_package: self.camera_package.unwrap_or(default.camera_package),
            remote_media_dir: self.remote_media_dir.unwrap_or(default.remote_media_dir),
            remote_media_pattern: self
                .remote_media_pattern
                .unwrap_or(default.remote_media_pattern),
            timeouts: self.timeouts.unwrap_or(default.timeouts),
        }
    }
}
