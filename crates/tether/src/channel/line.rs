//! Newline-delimited JSON framing over tokio byte streams.
//!
//! Each message is one JSON array on its own line:
//! ```text
//! [4,3,"0_1",0,"checked","true",true]\n
//! ```
//! Blank lines are skipped and a trailing `\r` is tolerated.

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use super::{CHANNEL_TARGET, Channel, ChannelError, MessageSource};

pub use tether_config::defaults::DEFAULT_MAX_FRAME_BYTES;

/// Writes line-framed messages to an [`AsyncWrite`].
///
/// The writer sits behind an async mutex held for the whole frame, so
/// concurrent senders never interleave bytes.
pub struct LineChannel<W> {
    writer: Mutex<BufWriter<W>>,
}

impl<W> LineChannel<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps a writer.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
        }
    }
}

#[async_trait]
impl<W> Channel for LineChannel<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send_message(&self, values: Vec<Value>) -> Result<(), ChannelError> {
        let mut frame = serde_json::to_vec(&values)?;
        frame.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        trace!(target: CHANNEL_TARGET, bytes = frame.len(), "line frame written");
        Ok(())
    }
}

/// Reads line-framed messages from an [`AsyncRead`].
pub struct LineSource<R> {
    reader: BufReader<R>,
    max_frame_bytes: usize,
    buffer: Vec<u8>,
}

impl<R> LineSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Wraps a reader using [`DEFAULT_MAX_FRAME_BYTES`].
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self::with_max_frame_bytes(reader, DEFAULT_MAX_FRAME_BYTES)
    }

    /// Wraps a reader with a custom frame size limit.
    #[must_use]
    pub fn with_max_frame_bytes(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_frame_bytes,
            buffer: Vec::new(),
        }
    }

    /// Reads one raw line into the buffer, without its terminator.
    ///
    /// Returns `false` at end of stream.
    async fn read_line(&mut self) -> Result<bool, ChannelError> {
        self.buffer.clear();
        let limit = u64::try_from(self.max_frame_bytes)
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        let bytes_read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buffer)
            .await?;
        if bytes_read == 0 {
            return Ok(false);
        }

        let terminated = self.buffer.last() == Some(&b'\n');
        if terminated {
            self.buffer.pop();
            if self.buffer.last() == Some(&b'\r') {
                self.buffer.pop();
            }
        }
        if self.buffer.len() > self.max_frame_bytes {
            return Err(ChannelError::FrameTooLarge {
                limit: self.max_frame_bytes,
            });
        }
        Ok(true)
    }
}

#[async_trait]
impl<R> MessageSource for LineSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn next_message(&mut self) -> Result<Option<String>, ChannelError> {
        loop {
            if !self.read_line().await? {
                debug!(target: CHANNEL_TARGET, "line source reached end of stream");
                return Ok(None);
            }
            if self.buffer.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match String::from_utf8(std::mem::take(&mut self.buffer)) {
                Ok(line) => return Ok(Some(line)),
                // Framing is intact, so only this line is lost.
                Err(err) => warn!(
                    target: CHANNEL_TARGET,
                    bytes = err.as_bytes().len(),
                    "skipping inbound line that is not valid UTF-8"
                ),
            }
        }
    }
}
