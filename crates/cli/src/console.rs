//! Terminal implementations of the runtime's user-facing collaborators.

use std::io::{BufRead, Write};

use {
    async_trait::async_trait,
    secrecy::Secret,
    tgsync_common::{ConnectionStatus, SessionKind},
    tgsync_config::StatusIndicatorMode,
    tgsync_runtime::{PinPrompt, StatusIndicator},
    tracing::warn,
};

const PIN_ENV: &str = "TGSYNC_PIN";

/// Whether a status transition is shown in `mode`.
#[must_use]
pub fn should_show(mode: StatusIndicatorMode, error: Option<&str>) -> bool {
    match mode {
        StatusIndicatorMode::Never => false,
        StatusIndicatorMode::OnlyWhenErrors => error.is_some(),
        StatusIndicatorMode::Constant => true,
    }
}

/// Prints connection status transitions to stderr.
pub struct ConsoleIndicator {
    mode: StatusIndicatorMode,
}

impl ConsoleIndicator {
    pub fn new(mode: StatusIndicatorMode) -> Self {
        Self { mode }
    }
}

impl StatusIndicator for ConsoleIndicator {
    fn update(&self, kind: SessionKind, status: ConnectionStatus, error: Option<&str>) {
        if !should_show(self.mode, error) {
            return;
        }
        match error {
            Some(err) => eprintln!("[{kind}] {status}: {err}"),
            None => eprintln!("[{kind}] {status}"),
        }
    }
}

/// Reads the PIN from `TGSYNC_PIN`, or asks on the terminal.
/// An empty answer cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPinPrompt;

#[async_trait]
impl PinPrompt for TerminalPinPrompt {
    async fn prompt_pin(&self) -> Option<Secret<String>> {
        if let Ok(pin) = std::env::var(PIN_ENV) {
            return non_empty(pin);
        }
        let answer = tokio::task::spawn_blocking(|| read_line("Bot token pin code: ")).await;
        match answer {
            Ok(Ok(line)) => non_empty(line),
            Ok(Err(e)) => {
                warn!(error = %e, "failed to read pin code");
                None
            },
            Err(e) => {
                warn!(error = %e, "pin prompt task failed");
                None
            },
        }
    }
}

/// Print `prompt` to stderr and read one line from stdin.
pub fn read_line(prompt: &str) -> std::io::Result<String> {
    let mut stderr = std::io::stderr();
    stderr.write_all(prompt.as_bytes())?;
    stderr.flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

fn non_empty(value: String) -> Option<Secret<String>> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| Secret::new(trimmed.to_string()))
}
