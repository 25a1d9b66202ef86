//! 通知分发
//!
//! 以注入的观察者接口取代全局单例：桌面通知 / 仅日志 / 静默三种实现，
//! 在 Supervisor 构造时选定。通知是 fire-and-forget 的，失败只记日志。

use std::process::Command;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 通知事件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// 检测到滑块验证码
    CaptchaDetected,
    /// 验证码自动破解成功
    CaptchaSolved,
    /// 验证码破解尝试耗尽，需要人工介入
    CaptchaExhausted,
    /// 运行成功
    RunSuccess,
    /// 运行出错
    RunError,
}

impl Event {
    fn title(&self) -> &'static str {
        match self {
            Event::CaptchaDetected => "Alibaba Scraper - CAPTCHA 检测",
            Event::CaptchaSolved | Event::RunSuccess => "Alibaba Scraper - 成功",
            Event::CaptchaExhausted | Event::RunError => "Alibaba Scraper - 错误",
        }
    }

    fn is_error(&self) -> bool {
        matches!(self, Event::CaptchaExhausted | Event::RunError)
    }
}

/// 通知观察者接口
pub trait Notifier: Send + Sync {
    fn notify(&self, event: Event, message: &str);
}

/// 桌面通知（按操作系统选择命令，失败降级为日志）
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, event: Event, message: &str) {
        info!("🔔 通知: {} - {}", event.title(), message);

        let result = send_desktop_notification(event.title(), message, event.is_error());
        if let Err(e) = result {
            warn!("桌面通知发送失败，仅记录日志: {}", e);
        }
    }
}

#[cfg(target_os = "linux")]
fn send_desktop_notification(title: &str, message: &str, urgent: bool) -> std::io::Result<()> {
    let mut cmd = Command::new("notify-send");
    cmd.arg(title).arg(message);
    if urgent {
        cmd.arg("--urgency=critical");
    }
    cmd.spawn().map(|_| ())
}

#[cfg(target_os = "macos")]
fn send_desktop_notification(title: &str, message: &str, _urgent: bool) -> std::io::Result<()> {
    let script = format!(
        r#"display notification "{}" with title "{}" sound name "Glass""#,
        message.replace('"', "'"),
        title
    );
    Command::new("osascript").arg("-e").arg(script).spawn().map(|_| ())
}

#[cfg(target_os = "windows")]
fn send_desktop_notification(title: &str, message: &str, _urgent: bool) -> std::io::Result<()> {
    let script = format!(
        "[System.Reflection.Assembly]::LoadWithPartialName('System.Windows.Forms') | Out-Null; \
         [System.Windows.Forms.MessageBox]::Show('{}', '{}')",
        message.replace('\'', " "),
        title.replace('\'', " ")
    );
    Command::new("powershell")
        .args(["-NoProfile", "-Command", &script])
        .spawn()
        .map(|_| ())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn send_desktop_notification(_title: &str, _message: &str, _urgent: bool) -> std::io::Result<()> {
    // 其他平台没有可靠的命令行通知工具，交给日志兜底
    Ok(())
}

/// 仅写日志的通知实现
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: Event, message: &str) {
        if event.is_error() {
            error!("🚨 {}: {}", event.title(), message);
        } else {
            info!("🔔 {}: {}", event.title(), message);
        }
    }
}

/// 静默通知实现（测试和无人值守环境用）
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: Event, _message: &str) {}
}

/// 按配置名选择通知实现
pub fn from_kind(kind: &str) -> Arc<dyn Notifier> {
    match kind {
        "log" => Arc::new(LogNotifier),
        "none" => Arc::new(NoopNotifier),
        _ => Arc::new(DesktopNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_kind_selects_variant() {
        // 只验证不同配置都能构造出实现并安全调用
        for kind in ["desktop", "log", "none", "unknown"] {
            let notifier = from_kind(kind);
            notifier.notify(Event::RunSuccess, "测试消息");
        }
    }

    #[test]
    fn test_event_titles() {
        assert!(Event::CaptchaExhausted.is_error());
        assert!(!Event::CaptchaSolved.is_error());
        assert!(Event::CaptchaDetected.title().contains("CAPTCHA"));
    }
}
