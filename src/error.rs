use std::time::Duration;
use thiserror::Error;

/// 录像工具相关的错误类型
#[derive(Debug, Error)]
pub enum RecorderError {
    /// 找不到外部工具（ADB 未安装或不在 PATH 中）
    #[error("找不到外部工具: {0}")]
    ToolNotFound(String),

    /// 子进程无法启动或执行失败
    #[error("命令执行错误: {0}")]
    CommandError(String),

    /// 子进程返回非零退出码
    #[error("命令 `{command}` 失败 (退出码 {code:?}): {stderr}")]
    ExitFailure {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// 操作超时（子进程已被终止）
    #[error("操作超时 ({duration:?}): {message}")]
    TimeoutError {
        message: String,
        duration: Duration,
    },

    /// 设备通信错误
    #[error("设备通信错误: {0}")]
    DeviceError(String),

    /// 连接错误
    #[error("连接错误: {0}")]
    ConnectionError(String),

    /// 文件操作错误
    #[error("文件操作错误: {0}")]
    FileError(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 会话状态错误（如重复启动）
    #[error("会话错误: {0}")]
    SessionError(String),
}

impl RecorderError {
    /// 判断错误是否为超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, RecorderError::TimeoutError { .. })
    }

    /// 判断错误是否因外部工具缺失导致
    pub fn is_tool_not_found(&self) -> bool {
        matches!(self, RecorderError::ToolNotFound(_))
    }
}

// 为标准错误类型实现 From trait，简化错误处理
impl From<std::io::Error> for RecorderError {
    fn from(error: std::io::Error) -> Self {
        RecorderError::FileError(error.to_string())
    }
}

impl From<std::num::ParseIntError> for RecorderError {
    fn from(error: std::num::ParseIntError) -> Self {
        RecorderError::ParseError(format!("数字解析错误: {}", error))
    }
}

impl From<regex::Error> for RecorderError {
    fn from(error: regex::Error) -> Self {
        RecorderError::ParseError(format!("正则表达式错误: {}", error))
    }
}

// 添加结果类型别名简化使用
pub type RecorderResult<T> = Result<T, RecorderError>;
