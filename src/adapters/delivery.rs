use crate::domain::ports::DeliveryChannel;
use crate::utils::error::{CheckError, Result};
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Telegram's message length limit.
pub const TELEGRAM_MAX_MESSAGE: usize = 4096;

/// Writes each chunk followed by a blank line. Used by the CLI in place of a
/// chat transport.
pub struct WriterChannel<W> {
    writer: Mutex<W>,
    max_chunk_size: usize,
}

impl WriterChannel<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout(), TELEGRAM_MAX_MESSAGE)
    }
}

impl<W> WriterChannel<W> {
    pub fn new(writer: W, max_chunk_size: usize) -> Self {
        Self {
            writer: Mutex::new(writer),
            max_chunk_size,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> DeliveryChannel for WriterChannel<W> {
    fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    async fn send(&self, chunk: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let framed = format!("{}\n\n", chunk);
        writer
            .write_all(framed.as_bytes())
            .await
            .map_err(|e| CheckError::DeliveryError {
                message: e.to_string(),
            })?;
        writer.flush().await.map_err(|e| CheckError::DeliveryError {
            message: e.to_string(),
        })
    }
}
