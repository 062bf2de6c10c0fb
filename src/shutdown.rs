use std::fmt;
use std::io;

use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tracing::info;

/// 受信した終了シグナル。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        })
    }
}

/// SIGINT または SIGTERM を受け取るまで待つ。
///
/// # Errors
/// シグナルハンドラの登録に失敗した場合は I/O エラーを返す。
#[cfg(unix)]
pub async fn wait_for_signal() -> io::Result<ShutdownSignal> {
    let mut sigterm = unix_signal(SignalKind::terminate())?;

    let received = tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            ShutdownSignal::Interrupt
        }
        _ = sigterm.recv() => ShutdownSignal::Terminate,
    };

    info!(signal = %received, "shutdown signal received");
    Ok(received)
}

/// Ctrl+C を受け取るまで待つ。
///
/// # Errors
/// シグナルハンドラの登録に失敗した場合は I/O エラーを返す。
#[cfg(not(unix))]
pub async fn wait_for_signal() -> io::Result<ShutdownSignal> {
    signal::ctrl_c().await?;
    info!(signal = %ShutdownSignal::Interrupt, "shutdown signal received");
    Ok(ShutdownSignal::Interrupt)
}
