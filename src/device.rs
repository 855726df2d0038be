use serde::{Deserialize, Serialize};
use std::fmt;

/// ADB 设备状态枚举
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Online,
    Offline,
    Unauthorized,
    Other(String),
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Online => write!(f, "online"),
            DeviceStatus::Offline => write!(f, "offline"),
            DeviceStatus::Unauthorized => write!(f, "unauthorized"),
            DeviceStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for DeviceStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "device" | "online" => DeviceStatus::Online,
            "offline" => DeviceStatus::Offline,
            "unauthorized" => DeviceStatus::Unauthorized,
            _ => DeviceStatus::Other(s.to_string()),
        }
    }
}

/// `adb devices -l` 输出中的一条设备记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// 设备序列号，WiFi 设备为 `ip:port` 形式
    pub serial: String,
    pub status: DeviceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl DeviceEntry {
    /// 检查设备是否在线
    pub fn is_online(&self) -> bool {
        self.status == DeviceStatus::Online
    }

    /// 检查记录是否为给定地址的无线连接
    pub fn is_wifi_entry(&self, address: &str) -> bool {
        self.serial == address
    }
}

/// 解析 `adb devices -l` 的输出
pub fn parse_devices(output: &str) -> Vec<DeviceEntry> {
    let mut devices = Vec::new();

    // 跳过第一行(标题)
    for line in output.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let serial = parts[0].to_string();
        let status = DeviceStatus::from(parts[1]);

        // 长格式输出中提取设备型号
        let model = parts
            .iter()
            .find(|p| p.starts_with("model:"))
            .map(|p| p.trim_start_matches("model:").to_string());

        devices.push(DeviceEntry {
            serial,
            status,
            model,
        });
    }

    devices
}
