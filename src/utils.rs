use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// 可取消的等待令牌
///
/// 后台录像线程用它来代替按秒轮询：长时间等待在条件变量上挂起，
/// `cancel()` 会立即唤醒所有等待者，使停止请求被及时观察到。
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

impl CancelToken {
    /// 创建新的令牌
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// 发出取消信号并唤醒所有等待者
    pub fn cancel(&self) {
        let mut cancelled = self.cancelled.lock().unwrap_or_else(|e| e.into_inner());
        *cancelled = true;
        self.cond.notify_all();
    }

    /// 重置令牌以供下一次会话使用
    pub fn reset(&self) {
        let mut cancelled = self.cancelled.lock().unwrap_or_else(|e| e.into_inner());
        *cancelled = false;
    }

    /// 检查是否已取消
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 等待给定时长，若期间被取消则提前返回
    ///
    /// 返回 `true` 表示等待被取消打断（或令牌此前已取消）。
    pub fn wait(&self, duration: Duration) -> bool {
        let guard = self.cancelled.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _timeout) = self
            .cond
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

// IPv4 地址的粗匹配，精确范围在 is_valid_ip 中校验
static IP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$").expect("IP 正则表达式无效")
});

/// 检查字符串是否为合法的 IPv4 地址
pub fn is_valid_ip(s: &str) -> bool {
    if !IP_RE.is_match(s) {
        return false;
    }

    s.split('.')
        .all(|part| part.parse::<u32>().map(|n| n <= 255).unwrap_or(false))
}

/// 检查字符串是否包含任何给定的关键字
pub fn contains_any(s: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| s.contains(keyword))
}

/// 格式化大小 (字节转换为 KB/MB/GB)
pub fn format_size(size_bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size_bytes >= GB {
        format!("{:.2} GB", size_bytes as f64 / GB as f64)
    } else if size_bytes >= MB {
        format!("{:.2} MB", size_bytes as f64 / MB as f64)
    } else if size_bytes >= KB {
        format!("{:.2} KB", size_bytes as f64 / KB as f64)
    } else {
        format!("{} B", size_bytes)
    }
}

/// 将秒数转换为人类可读的时间格式 (HH:MM:SS)
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}
