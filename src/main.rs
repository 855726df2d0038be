use adb_recorder::prelude::*;
use adb_recorder::utils;
use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle};
use log::{error, info, warn};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

fn main() {
    // 进程始终以 0 退出，错误只报告给操作者
    if let Err(e) = run() {
        eprintln!("{}", e);
    }
}

fn run() -> RecorderResult<()> {
    let config = RecorderConfig::default();
    let records = RecordsDir::open(&config.records_dir)?;
    let _logger = init_logging(&records)?;

    banner();

    let bridge = Arc::new(AdbCameraBridge::new(config.clone()));

    // 先确认 ADB 可用，缺失时没有继续的意义
    match bridge.tool_version() {
        Ok(version) => info!("{}", version),
        Err(e) if e.is_tool_not_found() => {
            println!("未找到 ADB，请先安装: sudo apt install adb");
            return Ok(());
        }
        Err(e) => {
            warn!("ADB 版本检查失败: {}", e);
            return Ok(());
        }
    }

    let controller = Arc::new(SessionController::new(bridge, config)?);

    // 中断/终止信号：停止会话后退出
    {
        let controller = Arc::clone(&controller);
        ctrlc::set_handler(move || {
            println!("\n正在关闭...");
            controller.stop();
            std::process::exit(0);
        })
        .map_err(|e| RecorderError::ConfigError(format!("无法注册信号处理器: {}", e)))?;
    }

    repl(&controller);
    Ok(())
}

fn init_logging(records: &RecordsDir) -> RecorderResult<LoggerHandle> {
    Logger::try_with_str("info")
        .map_err(|e| RecorderError::ConfigError(format!("日志配置无效: {}", e)))?
        .log_to_file(
            FileSpec::default()
                .directory(records.logs_dir())
                .basename("recorder")
                .suppress_timestamp(),
        )
        .append()
        .duplicate_to_stderr(Duplicate::Info)
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|e| RecorderError::ConfigError(format!("无法初始化日志: {}", e)))
}

fn banner() {
    let line = "=".repeat(50);
    println!("{}", line);
    println!("📱 WiFi 录像机");
    println!("{}", line);
    println!("请输入手机的 IP 地址以开始");
    println!("{}", line);
}

/// 标准输入上的交互命令循环
fn repl(controller: &Arc<SessionController>) {
    let mut phone_ip: Option<String> = None;

    loop {
        println!("\n命令: start, stop, status, list, ip, exit");
        print!("recorder> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                error!("读取命令失败: {}", e);
                break;
            }
        }

        match line.trim().to_lowercase().as_str() {
            "start" => cmd_start(controller, &mut phone_ip),
            "stop" => {
                controller.stop();
                println!("录像已停止");
            }
            "status" => cmd_status(controller, phone_ip.as_deref()),
            "list" => cmd_list(controller),
            "ip" => cmd_change_ip(&mut phone_ip),
            "exit" | "quit" => {
                controller.stop();
                controller.join();
                println!("再见!");
                break;
            }
            "" => {}
            other => println!("未知命令: {}", other),
        }
    }
}

fn cmd_start(controller: &SessionController, phone_ip: &mut Option<String>) {
    if controller.is_active() {
        println!("录像已在运行");
        return;
    }

    let ip = match phone_ip.clone().or_else(read_ip) {
        Some(ip) => ip,
        None => return,
    };
    *phone_ip = Some(ip.clone());

    match controller.start(&ip) {
        Ok(()) => {
            println!("录像启动成功!");
            println!("相机将自动开始录制");
        }
        Err(e) => println!("启动录像失败: {}", e),
    }
}

fn cmd_status(controller: &SessionController, phone_ip: Option<&str>) {
    println!("已录视频: {}", controller.records().count());
    println!("存储位置: {}", controller.records().root().display());
    println!(
        "会话运行中: {}",
        if controller.is_active() { "是" } else { "否" }
    );

    let stats = controller.stats();
    if stats.segments() > 0 {
        println!(
            "本次会话分段: 成功 {}/{}",
            stats.successes(),
            stats.segments()
        );
    }

    match phone_ip {
        Some(ip) => {
            println!(
                "WiFi 连接: {}",
                if controller.check_connection(ip) {
                    "在线"
                } else {
                    "离线"
                }
            );
            println!("当前 IP: {}", ip);
        }
        None => println!("当前 IP: 未设置"),
    }
}

fn cmd_list(controller: &SessionController) {
    match controller.records().list() {
        Ok(entries) if entries.is_empty() => println!("未找到录像"),
        Ok(entries) => {
            println!("共 {} 个录像:", entries.len());
            for (i, entry) in entries.iter().enumerate() {
                println!("  {}. {} ({})", i + 1, entry.name, entry.display_size());
            }
        }
        Err(e) => println!("无法列出录像: {}", e),
    }
}

fn cmd_change_ip(phone_ip: &mut Option<String>) {
    let old = phone_ip.clone();

    if let Some(ip) = read_ip() {
        if old.is_some() && old.as_deref() != Some(ip.as_str()) {
            println!("IP 地址已更改，可能需要重新连接。");
        }
        *phone_ip = Some(ip);
    }
}

/// 循环提示直到读到合法的 IPv4 地址；EOF 时返回 None
fn read_ip() -> Option<String> {
    loop {
        print!("请输入手机的 IP 地址: ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }

        let ip = line.trim().to_string();
        if utils::is_valid_ip(&ip) {
            println!("IP 地址已设置为: {}", ip);
            return Some(ip);
        }

        println!("IP 地址格式无效，请重试。");
    }
}
