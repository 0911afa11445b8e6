// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Desktop notifications after a move

use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::config::NotificationConfig;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort desktop notifier. Failures are logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct Notifier {
    enabled: bool,
}

impl Notifier {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            enabled: config.enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn send(&self, title: &str, message: &str) {
        if !self.enabled {
            return;
        }

        let mut command = notification_command(title, message);
        command.kill_on_drop(true);

        match tokio::time::timeout(NOTIFY_TIMEOUT, command.status()).await {
            Ok(Ok(status)) if status.success() => {}
            Ok(Ok(status)) => debug!("Notification command exited with {}", status),
            Ok(Err(e)) => debug!("Notification command failed: {}", e),
            Err(_) => debug!("Notification command timed out"),
        }
    }
}

#[cfg(target_os = "macos")]
fn notification_command(title: &str, message: &str) -> Command {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape_applescript(message),
        escape_applescript(title)
    );
    let mut command = Command::new("osascript");
    command.arg("-e").arg(script);
    command
}

#[cfg(not(target_os = "macos"))]
fn notification_command(title: &str, message: &str) -> Command {
    let mut command = Command::new("notify-send");
    command.arg("--app-name=aifiles").arg(title).arg(message);
    command
}

/// Quote a string for an AppleScript string literal
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_applescript() {
        assert_eq!(escape_applescript(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
    }

    #[tokio::test]
    async fn test_disabled_is_silent() {
        let notifier = Notifier::new(&NotificationConfig { enabled: false });
        assert!(!notifier.is_enabled());
        notifier.send("Filed", "notes.txt").await;
    }
}
