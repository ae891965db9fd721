use anyhow::Result;
use console::style;
use std::path::Path;

use crate::core::terminal::{print_error, print_info, print_status, print_success, print_warn};

const LOG_FILE_NAME: &str = "nexa.log";

pub async fn gateway_start(
    run_dir: &Path,
    pid_file: &Path,
    api_host: &str,
    api_port: u16,
) -> Result<()> {
    std::fs::create_dir_all(run_dir)?;
    if pid_file.exists() && std::fs::read_to_string(pid_file).is_ok() {
        print_warn("Gateway is already running. Use 'nexa gateway stop' first.");
        return Ok(());
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(run_dir.join(LOG_FILE_NAME))?;

    let exe = std::env::current_exe()?;
    let child = std::process::Command::new(exe)
        .arg("serve")
        .arg("--api-host")
        .arg(api_host)
        .arg("--api-port")
        .arg(api_port.to_string())
        .stdin(std::process::Stdio::null())
        .stdout(log_file.try_clone()?)
        .stderr(log_file)
        .spawn()?;

    std::fs::write(pid_file, child.id().to_string())?;

    print_success(&format!("Gateway started (PID {})", child.id()));
    print_status("API Endpoint", &format!("http://{}:{}", api_host, api_port));
    print_info(&format!(
        "Run {} to follow its logs.",
        style("nexa logs").cyan().bold()
    ));
    println!();
    Ok(())
}

pub async fn gateway_stop(pid_file: &Path) -> Result<()> {
    let mut stopped = false;
    if pid_file.exists() {
        if let Ok(pid_str) = std::fs::read_to_string(pid_file) {
            let pid = pid_str.trim();
            if !pid.is_empty() {
                let _ = std::process::Command::new("kill").arg(pid).status();
                print_success(&format!("Gateway stopped (was PID {})", pid));
                stopped = true;
            }
        }
        std::fs::remove_file(pid_file).ok();
    }

    if !stopped {
        print_info("Gateway is not currently running.");
    }
    println!();
    Ok(())
}

pub async fn gateway_status(pid_file: &Path) -> Result<()> {
    if pid_file.exists() {
        let pid_str = std::fs::read_to_string(pid_file)?;
        print_status(
            "Gateway",
            &format!(
                "{} (PID {})",
                style("RUNNING").green().bold(),
                style(pid_str.trim()).dim()
            ),
        );
    } else {
        print_status("Gateway", &style("STOPPED").red().bold().to_string());
        print_info(&format!(
            "Run {} to start it.",
            style("nexa gateway start").cyan().bold()
        ));
    }
    println!();
    Ok(())
}

pub async fn follow_logs(run_dir: &Path, pid_file: &Path) -> Result<()> {
    if !pid_file.exists() {
        print_warn("Gateway is not running.");
        print_info(&format!(
            "Run {} to start it.",
            style("nexa gateway start").cyan().bold()
        ));
        println!();
        return Ok(());
    }

    let log_file = run_dir.join(LOG_FILE_NAME);
    if log_file.exists() {
        print_info(&format!(
            "Following {} - press {} to stop.",
            style(LOG_FILE_NAME).cyan(),
            style("Ctrl+C").bold().yellow()
        ));
        println!();
        let mut child = std::process::Command::new("tail")
            .arg("-f")
            .arg(&log_file)
            .spawn()?;
        let _ = child.wait()?;
    } else {
        print_error(&format!(
            "Log file not found at {}",
            style(log_file.display()).dim()
        ));
    }
    Ok(())
}
