use anyhow::Result;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::daemon::events::{Reply, TrackerEvent};

use super::protocol::{decode_line, encode_reply};

/// Reads browser messages line by line and forwards them to the processing module. The end of
/// input means the browser went away, which shuts the whole host down.
pub struct HostEventSource<R> {
    reader: R,
    next: mpsc::Sender<TrackerEvent>,
    shutdown: CancellationToken,
}

impl<R: AsyncBufRead + Unpin> HostEventSource<R> {
    pub fn new(reader: R, next: mpsc::Sender<TrackerEvent>, shutdown: CancellationToken) -> Self {
        Self {
            reader,
            next,
            shutdown,
        }
    }

    /// Executes the reading loop.
    pub async fn run(self) -> Result<()> {
        let mut lines = LinesStream::new(self.reader.lines());
        loop {
            let line = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                line = lines.next() => line,
            };

            let line = match line {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    error!("Failed to read from the browser {e:?}");
                    self.shutdown.cancel();
                    return Err(e.into());
                }
                None => {
                    info!("Browser closed the connection");
                    self.shutdown.cancel();
                    return Ok(());
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            match decode_line(&line) {
                Ok(Some(event)) => {
                    debug!("Sending event {:?}", event);
                    if self.next.send(event).await.is_err() {
                        // Processing is gone, nothing left to feed.
                        self.shutdown.cancel();
                        return Ok(());
                    }
                }
                Ok(None) => debug!("Ignoring message {line}"),
                Err(e) => warn!("Skipping malformed message {line}: {e}"),
            }
        }
    }
}

/// Writes replies back to the browser, one line each.
pub struct ReplyWriter<W> {
    receiver: mpsc::Receiver<Reply>,
    writer: W,
}

impl<W: AsyncWrite + Unpin> ReplyWriter<W> {
    pub fn new(receiver: mpsc::Receiver<Reply>, writer: W) -> Self {
        Self { receiver, writer }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(reply) = self.receiver.recv().await {
            let bytes = encode_reply(&reply)?;
            self.writer
                .write_all(&bytes)
                .await
                .inspect_err(|e| error!("Failed to write reply {}: {e:?}", reply.id))?;
            self.writer.flush().await?;
        }
        Ok(())
    }
}
