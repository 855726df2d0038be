use crate::cmd::Adb;
use crate::config::RecorderConfig;
use crate::device::DeviceEntry;
use crate::error::{RecorderError, RecorderResult};
use log::{debug, info};
use std::path::Path;
use std::thread;
use std::time::Duration;

// 相机快门与返回键的按键事件
const KEY_CAMERA: &str = "KEYCODE_CAMERA";
const KEY_BACK: &str = "KEYCODE_BACK";

// 启动系统相机录像界面的 intent action
const VIDEO_CAMERA_ACTION: &str = "android.media.action.VIDEO_CAMERA";

/// 设备桥接接口
///
/// 会话控制器与外部设备工具之间的唯一缝隙，测试中可以用
/// 模拟实现替换真实的 ADB 调用。
pub trait CameraBridge: Send + Sync {
    /// 探测外部工具版本（确认 ADB 可用）
    fn tool_version(&self) -> RecorderResult<String>;

    /// 建立到给定 IP 的无线调试连接，返回设备序列号
    fn ensure_wifi(&self, ip: &str) -> RecorderResult<String>;

    /// 检查给定 IP 的无线连接是否仍然在线
    fn is_connected(&self, ip: &str) -> RecorderResult<bool>;

    /// 启动相机录像界面
    fn launch_camera(&self, serial: &str) -> RecorderResult<()>;

    /// 触发快门（开始/停止录像共用同一个按键）
    fn trigger_shutter(&self, serial: &str) -> RecorderResult<()>;

    /// 发送返回键
    fn press_back(&self, serial: &str) -> RecorderResult<()>;

    /// 返回设备媒体目录中最新的录像文件路径
    fn newest_media(&self, serial: &str) -> RecorderResult<Option<String>>;

    /// 将远程文件拉取到本地路径
    fn pull_media(&self, serial: &str, remote: &str, local: &Path) -> RecorderResult<()>;

    /// 删除远程文件
    fn remove_media(&self, serial: &str, remote: &str) -> RecorderResult<()>;

    /// 强制停止相机应用
    fn force_stop_camera(&self, serial: &str) -> RecorderResult<()>;
}

/// 基于 ADB 子进程的桥接实现
pub struct AdbCameraBridge {
    adb: Adb,
    config: RecorderConfig,
}

impl AdbCameraBridge {
    /// 创建新的桥接实例
    pub fn new(config: RecorderConfig) -> Self {
        AdbCameraBridge {
            adb: Adb::new(&config.adb_path),
            config,
        }
    }

    fn wifi_address(&self, ip: &str) -> String {
        format!("{}:{}", ip, self.config.port)
    }
}

impl CameraBridge for AdbCameraBridge {
    fn tool_version(&self) -> RecorderResult<String> {
        self.adb
            .version(Duration::from_millis(self.config.timeouts.devices))
    }

    /// 建立无线调试连接
    ///
    /// 已有无线连接时直接复用；否则要求设备先通过 USB 连接，
    /// 切换 TCP 模式后再经 WiFi 连接。
    fn ensure_wifi(&self, ip: &str) -> RecorderResult<String> {
        let address = self.wifi_address(ip);
        let devices_timeout = Duration::from_millis(self.config.timeouts.devices);

        debug!("检查当前连接...");
        let devices = self.adb.devices(devices_timeout)?;

        if devices
            .iter()
            .any(|d| d.is_wifi_entry(&address) && d.is_online())
        {
            info!("已通过 WiFi 连接到 {}", address);
            return Ok(address);
        }

        // 需要一台经 USB 连接的在线设备来切换 TCP 模式
        let Some(usb_device) = find_usb_device(&devices, ip) else {
            return Err(RecorderError::ConnectionError(
                "未发现设备，请先通过 USB 连接".to_string(),
            ));
        };

        debug!("发现 USB 设备 {}，切换 TCP 模式...", usb_device.serial);
        self.adb.tcpip(
            &usb_device.serial,
            self.config.port,
            Duration::from_millis(self.config.timeouts.network_mode),
        )?;

        // 设备重启 adbd 需要一点时间
        thread::sleep(Duration::from_secs(3));

        debug!("通过 WiFi 连接 {}...", address);
        self.adb.connect(
            &address,
            Duration::from_millis(self.config.timeouts.connect),
        )?;

        info!("WiFi ADB 已连接: {}", address);
        Ok(address)
    }

    fn is_connected(&self, ip: &str) -> RecorderResult<bool> {
        let address = self.wifi_address(ip);
        let devices = self
            .adb
            .devices(Duration::from_millis(self.config.timeouts.devices))?;

        Ok(devices
            .iter()
            .any(|d| d.is_wifi_entry(&address) && d.is_online()))
    }

    fn launch_camera(&self, serial: &str) -> RecorderResult<()> {
        self.adb.launch_action(
            serial,
            VIDEO_CAMERA_ACTION,
            Duration::from_millis(self.config.timeouts.launch),
        )
    }

    fn trigger_shutter(&self, serial: &str) -> RecorderResult<()> {
        self.adb.keyevent(
            serial,
            KEY_CAMERA,
            Duration::from_millis(self.config.timeouts.keyevent),
        )
    }

    fn press_back(&self, serial: &str) -> RecorderResult<()> {
        self.adb.keyevent(
            serial,
            KEY_BACK,
            Duration::from_millis(self.config.timeouts.keyevent),
        )
    }

    fn newest_media(&self, serial: &str) -> RecorderResult<Option<String>> {
        let pattern = format!(
            "{}/{}",
            self.config.remote_media_dir, self.config.remote_media_pattern
        );

        let files = self.adb.list_files(
            serial,
            &pattern,
            Duration::from_millis(self.config.timeouts.list_files),
        )?;

        // `ls` 输出按名称排序，时间戳命名的文件最后一个即最新
        Ok(files.into_iter().last())
    }

    fn pull_media(&self, serial: &str, remote: &str, local: &Path) -> RecorderResult<()> {
        self.adb.pull(
            serial,
            remote,
            local,
            Duration::from_millis(self.config.timeouts.pull),
        )
    }

    fn remove_media(&self, serial: &str, remote: &str) -> RecorderResult<()> {
        self.adb.remove(
            serial,
            remote,
            Duration::from_millis(self.config.timeouts.remove),
        )
    }

    fn force_stop_camera(&self, serial: &str) -> RecorderResult<()> {
        self.adb.force_stop(
            serial,
            &self.config.camera_package,
            Duration::from_millis(self.config.timeouts.force_stop),
        )
    }
}

/// 在设备列表中挑选可用于切换 TCP 模式的 USB 设备
///
/// 跳过目标地址自身的无线记录，掉线会话的残留记录也在其列。
fn find_usb_device<'a>(devices: &'a [DeviceEntry], ip: &str) -> Option<&'a DeviceEntry> {
    devices
        .iter()
        .find(|d| d.is_online() && !d.serial.contains(ip))
}
