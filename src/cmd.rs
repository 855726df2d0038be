use crate::device::DeviceEntry;
use crate::error::{RecorderError, RecorderResult};
use log::{trace, warn};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

// 等待子进程退出时的轮询间隔
const WAIT_POLL: Duration = Duration::from_millis(50);

/// ADB 子进程执行器
///
/// 每次调用都带有显式超时：超时的子进程会被终止并返回
/// `TimeoutError`；非零退出码返回 `ExitFailure`；可执行文件
/// 缺失返回 `ToolNotFound`。调用方由此可以区分可恢复与
/// 不可恢复的失败，而不必从输出文本猜测。
#[derive(Debug, Clone)]
pub struct Adb {
    path: PathBuf,
}

impl Adb {
    /// 创建新的执行器
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Adb { path: path.into() }
    }

    /// 执行一条 ADB 命令并收集标准输出
    pub fn run(&self, args: &[&str], timeout: Duration) -> RecorderResult<String> {
        let command_line = format!("adb {}", args.join(" "));

        let mut child = Command::new(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    RecorderError::ToolNotFound(self.path.display().to_string())
                }
                _ => RecorderError::CommandError(format!("无法启动 {}: {}", command_line, e)),
            })?;

        // 在独立线程中排空管道，避免子进程因输出缓冲区写满而阻塞
        let stdout_reader = spawn_pipe_reader(child.stdout.take());
        let stderr_reader = spawn_pipe_reader(child.stderr.take());

        let status = match wait_with_deadline(&mut child, timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                // 超时：终止子进程，不让它在后台继续占用设备
                let _ = child.kill();
                let _ = child.wait();
                return Err(RecorderError::TimeoutError {
                    message: command_line,
                    duration: timeout,
                });
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RecorderError::CommandError(format!(
                    "等待 {} 退出失败: {}",
                    command_line, e
                )));
            }
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        trace!("{} 输出: {}", command_line, stdout);

        if !status.success() {
            return Err(RecorderError::ExitFailure {
                command: command_line,
                code: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        if !stderr.trim().is_empty() {
            warn!("{} 产生了 stderr 输出: {}", command_line, stderr.trim());
        }

        Ok(stdout)
    }

    /// 检查 ADB 是否可用并获取版本行
    pub fn version(&self, timeout: Duration) -> RecorderResult<String> {
        let output = self.run(&["version"], timeout)?;
        let version_line = output
            .lines()
            .next()
            .ok_or_else(|| RecorderError::ParseError("无法解析 ADB 版本".to_string()))?;
        Ok(version_line.to_string())
    }

    /// 列出可用设备（长格式）
    pub fn devices(&self, timeout: Duration) -> RecorderResult<Vec<DeviceEntry>> {
        let output = self.run(&["devices", "-l"], timeout)?;
        Ok(crate::device::parse_devices(&output))
    }

    /// 将指定设备切换到 TCP 调试模式
    ///
    /// 必须带 `-s`：掉线的无线记录残留在设备列表时，
    /// 不指定序列号的 `tcpip` 会因设备不唯一而失败。
    pub fn tcpip(&self, serial: &str, port: u16, timeout: Duration) -> RecorderResult<()> {
        self.run(&["-s", serial, "tcpip", &port.to_string()], timeout)?;
        Ok(())
    }

    /// 连接远程设备
    ///
    /// `adb connect` 失败时退出码仍可能为 0，必须检查输出文本。
    pub fn connect(&self, address: &str, timeout: Duration) -> RecorderResult<()> {
        let output = self.run(&["connect", address], timeout)?;

        if !output.contains("connected")
            || crate::utils::contains_any(&output, &["failed", "unable", "cannot"])
        {
            return Err(RecorderError::ConnectionError(format!(
                "连接 {} 失败: {}",
                address,
                output.trim()
            )));
        }

        Ok(())
    }

    /// 在指定设备上执行 shell 命令
    pub fn shell(&self, serial: &str, args: &[&str], timeout: Duration) -> RecorderResult<String> {
        let mut full_args = vec!["-s", serial, "shell"];
        full_args.extend_from_slice(args);
        self.run(&full_args, timeout)
    }

    /// 发送按键事件
    pub fn keyevent(&self, serial: &str, key: &str, timeout: Duration) -> RecorderResult<()> {
        self.shell(serial, &["input", "keyevent", key], timeout)?;
        Ok(())
    }

    /// 通过 intent action 启动活动
    pub fn launch_action(&self, serial: &str, action: &str, timeout: Duration) -> RecorderResult<()> {
        self.shell(serial, &["am", "start", "-a", action], timeout)?;
        Ok(())
    }

    /// 强制停止应用
    pub fn force_stop(&self, serial: &str, package: &str, timeout: Duration) -> RecorderResult<()> {
        self.shell(serial, &["am", "force-stop", package], timeout)?;
        Ok(())
    }

    /// 列出设备上匹配模式的文件
    ///
    /// 没有匹配文件时 `ls` 以非零退出码结束，按空列表处理。
    pub fn list_files(
        &self,
        serial: &str,
        pattern: &str,
        timeout: Duration,
    ) -> RecorderResult<Vec<String>> {
        match self.shell(serial, &["ls", pattern], timeout) {
            Ok(output) => Ok(output
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.contains("No such file"))
                .map(str::to_string)
                .collect()),
            Err(RecorderError::ExitFailure { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// 从设备拉取文件到本地路径
    pub fn pull(
        &self,
        serial: &str,
        remote: &str,
        local: &Path,
        timeout: Duration,
    ) -> RecorderResult<()> {
        let local = local.to_string_lossy();
        self.run(&["-s", serial, "pull", remote, &local], timeout)?;
        Ok(())
    }

    /// 删除设备上的文件
    pub fn remove(&self, serial: &str, remote: &str, timeout: Duration) -> RecorderResult<()> {
        self.shell(serial, &["rm", remote], timeout)?;
        Ok(())
    }
}

/// 在独立线程中读完一个子进程管道
fn spawn_pipe_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// 轮询等待子进程退出，超过期限返回 `Ok(None)`
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }

        if Instant::now() >= deadline {
            return Ok(None);
        }

        thread::sleep(WAIT_POLL);
    }
}
