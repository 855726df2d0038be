mod cmd;
mod config;
mod device;
mod error;

// 功能模块
pub mod bridge;
pub mod records;
pub mod session;
pub mod utils;

// 导出主要类型
pub use bridge::{AdbCameraBridge, CameraBridge};
pub use config::{RecorderConfig, RecorderConfigBuilder, Timeouts};
pub use device::{DeviceEntry, DeviceStatus};
pub use error::{RecorderError, RecorderResult};
pub use records::{RecordingEntry, RecordsDir};
pub use session::{SessionController, SessionStats};

// 便利的预导出模块
pub mod prelude {
    pub use super::{
        AdbCameraBridge, CameraBridge, RecorderConfig, RecorderConfigBuilder, RecorderError,
        RecorderResult, RecordsDir, SessionController,
    };
}
