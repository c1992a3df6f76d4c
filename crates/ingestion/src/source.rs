//! Message sources feeding the pipeline

use std::path::Path;

use async_channel::{bounded, Receiver, Sender};
use contracts::{ContractError, MessageSource};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tracing::debug;

use crate::error::IngestionError;

/// Newline-delimited payloads from any async reader
///
/// Blank lines are skipped. A line that is not valid UTF-8 is reported as an
/// unreadable payload and reading continues with the next line.
pub struct LineSource<R> {
    name: String,
    reader: R,
    buf: Vec<u8>,
    line_no: u64,
}

impl<R> LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
            buf: Vec::new(),
            line_no: 0,
        }
    }
}

impl LineSource<BufReader<Stdin>> {
    /// Payloads from standard input
    pub fn stdin() -> Self {
        Self::new("stdin", BufReader::new(tokio::io::stdin()))
    }
}

impl LineSource<BufReader<File>> {
    /// Payloads from a file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let path = path.as_ref();
        let file = File::open(path)
            .await
            .map_err(|e| ContractError::source_read(path.display().to_string(), e.to_string()))?;
        debug!(path = %path.display(), "line source opened");
        Ok(Self::new(path.display().to_string(), BufReader::new(file)))
    }
}

impl<R> MessageSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_payload(&mut self) -> Result<Option<String>, ContractError> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .await
                .map_err(|e| ContractError::source_read(&self.name, e.to_string()))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line.trim_end_matches(['\n', '\r']),
                Err(e) => {
                    return Err(ContractError::unreadable_payload(
                        &self.name,
                        format!("line {}: {e}", self.line_no),
                    ))
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(line.to_string()));
        }
    }
}

/// Producer half of a `ChannelSource`
#[derive(Debug, Clone)]
pub struct PayloadSender {
    tx: Sender<String>,
}

impl PayloadSender {
    /// Push one payload, waiting while the channel is full
    pub async fn send(&self, payload: impl Into<String>) -> Result<(), IngestionError> {
        self.tx
            .send(payload.into())
            .await
            .map_err(|_| IngestionError::ChannelClosed)
    }

    /// Close the channel; the source ends once drained
    pub fn close(&self) -> bool {
        self.tx.close()
    }
}

/// In-process source fed through a bounded channel
pub struct ChannelSource {
    name: String,
    rx: Receiver<String>,
}

impl ChannelSource {
    pub fn bounded(capacity: usize) -> (PayloadSender, Self) {
        let (tx, rx) = bounded(capacity.max(1));
        (
            PayloadSender { tx },
            Self {
                name: "channel".to_string(),
                rx,
            },
        )
    }
}

impl MessageSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_payload(&mut self) -> Result<Option<String>, ContractError> {
        // Err only once every sender is gone and the buffer is empty.
        Ok(self.rx.recv().await.ok())
    }
}
