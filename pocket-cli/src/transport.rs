//! Terminal chat transport
//!
//! Replies are printed to stdout. Images (exported charts) are written to the
//! exports directory and announced with their caption.

use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use colored::Colorize;

use pocket_core::ports::{ChartArtifact, ChatTransport, TransportError};
use pocket_core::UserId;

pub struct TerminalTransport {
    exports_dir: PathBuf,
}

impl TerminalTransport {
    pub fn new(exports_dir: PathBuf) -> Self {
        Self { exports_dir }
    }
}

/// Interrupted writes are worth retrying; anything else is not
fn io_error(err: std::io::Error) -> TransportError {
    match err.kind() {
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            TransportError::Transient(err.to_string())
        }
        _ => TransportError::Fatal(err.to_string()),
    }
}

fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "text/csv" => "csv",
        "image/png" => "png",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}

#[async_trait]
impl ChatTransport for TerminalTransport {
    async fn send_text(&self, _user: UserId, text: &str) -> Result<(), TransportError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{} {}", "pocket>".cyan().bold(), text).map_err(io_error)?;
        stdout.flush().map_err(io_error)
    }

    async fn send_image(
        &self,
        user: UserId,
        artifact: &ChartArtifact,
        caption: &str,
    ) -> Result<(), TransportError> {
        std::fs::create_dir_all(&self.exports_dir).map_err(io_error)?;
        let path = self.exports_dir.join(format!(
            "{}-{}.{}",
            user,
            Utc::now().format("%Y%m%d-%H%M%S"),
            extension_for(&artifact.media_type)
        ));
        std::fs::write(&path, &artifact.bytes).map_err(io_error)?;

        self.send_text(user, &format!("{} ({})", caption, path.display()))
            .await
    }
}
