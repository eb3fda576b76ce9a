//! File-backed broker
//!
//! Every topic is a `<data_dir>/<topic>.jsonl` file holding one message per
//! line; offsets are line numbers. Lines written by [`FileWriter`] are
//! `{"key":"<base64>","value":"<base64>"}` envelopes so both byte strings
//! survive verbatim. Any other line is read as a bare value with an empty key,
//! which lets producers append plain JSON log events. Committed offsets live
//! in `<data_dir>/.offsets/<group_id>/<topic>`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use contracts::{QueueError, QueueReader, QueueWriter, RawRecord, SourceConfig, StartOffset};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::client::{QueueClient, Result};

/// On-disk form of one message
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    key: String,
    value: String,
}

impl Envelope {
    fn encode(key: &[u8], value: &[u8]) -> Self {
        Self {
            key: STANDARD.encode(key),
            value: STANDARD.encode(value),
        }
    }

    /// Split a stored line into key and value
    fn decode_line(line: Vec<u8>) -> (Bytes, Bytes) {
        let decoded = serde_json::from_slice::<Envelope>(&line).ok().and_then(|env| {
            let key = STANDARD.decode(env.key).ok()?;
            let value = STANDARD.decode(env.value).ok()?;
            Some((Bytes::from(key), Bytes::from(value)))
        });
        decoded.unwrap_or_else(|| (Bytes::new(), Bytes::from(line)))
    }
}

/// File broker configuration
#[derive(Debug, Clone)]
pub struct FileBroker {
    data_dir: PathBuf,
    /// Keep waiting for new lines at end of file
    follow: bool,
    poll_interval: Duration,
}

impl FileBroker {
    pub fn new(data_dir: impl Into<PathBuf>, follow: bool, poll_interval: Duration) -> Self {
        Self {
            data_dir: data_dir.into(),
            follow,
            poll_interval,
        }
    }

    pub fn topic_path(&self, topic: &str) -> PathBuf {
        self.data_dir.join(format!("{topic}.jsonl"))
    }

    fn offset_path(&self, group_id: &str, topic: &str) -> PathBuf {
        self.data_dir.join(".offsets").join(group_id).join(topic)
    }

    async fn touch(path: &Path) -> Result<()> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(())
    }

    async fn load_committed(path: &Path) -> Result<Option<u64>> {
        match fs::read_to_string(path).await {
            Ok(content) => content
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| QueueError::connection(format!("corrupt offset file {}: {e}", path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl QueueClient for FileBroker {
    type Reader = FileReader;
    type Writer = FileWriter;

    #[instrument(name = "file_broker_connect", skip(self), fields(data_dir = %self.data_dir.display()))]
    async fn connect(&mut self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).await.map_err(|e| {
            QueueError::connection(format!(
                "cannot open data dir {}: {e}",
                self.data_dir.display()
            ))
        })?;
        Ok(())
    }

    #[instrument(
        name = "file_broker_reader",
        skip(self, source),
        fields(topic = %source.topic, group_id = %source.group_id)
    )]
    async fn reader(&self, source: &SourceConfig) -> Result<FileReader> {
        let path = self.topic_path(&source.topic);
        Self::touch(&path).await?;

        let offset_path = self.offset_path(&source.group_id, &source.topic);
        let committed = Self::load_committed(&offset_path).await?;

        let mut reader = FileReader {
            topic: source.topic.clone(),
            reader: BufReader::new(File::open(&path).await?),
            offset_path,
            next_offset: 0,
            pending: Vec::new(),
            follow: self.follow,
            poll_interval: self.poll_interval,
            closed: false,
        };

        match (committed, source.start_offset) {
            (Some(committed), _) => reader.skip_lines(committed + 1).await?,
            (None, StartOffset::Earliest) => {}
            (None, StartOffset::Latest) => reader.skip_to_end().await?,
        }
        info!(position = reader.next_offset, "file reader positioned");

        Ok(reader)
    }

    #[instrument(name = "file_broker_writer", skip(self), fields(topic = %topic))]
    async fn writer(&self, topic: &str) -> Result<FileWriter> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.topic_path(topic))
            .await?;
        Ok(FileWriter {
            topic: topic.to_string(),
            file: Mutex::new(file),
            closed: AtomicBool::new(false),
        })
    }
}

/// Line reader over one topic file
pub struct FileReader {
    topic: String,
    reader: BufReader<File>,
    offset_path: PathBuf,
    next_offset: u64,
    /// Bytes of a line whose newline has not been read yet
    pending: Vec<u8>,
    follow: bool,
    poll_interval: Duration,
    closed: bool,
}

impl FileReader {
    /// Next offset to be read
    pub fn position(&self) -> u64 {
        self.next_offset
    }

    /// Next line, `None` at end of file
    ///
    /// When following, an unterminated last line is held back until its
    /// newline arrives. Otherwise it is the final line of the topic.
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.reader.read_until(b'\n', &mut self.pending).await?;
        match self.pending.last().copied() {
            Some(b'\n') => {
                let mut line = std::mem::take(&mut self.pending);
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                Ok(Some(line))
            }
            Some(_) if !self.follow => Ok(Some(std::mem::take(&mut self.pending))),
            _ => Ok(None),
        }
    }

    async fn skip_lines(&mut self, count: u64) -> Result<()> {
        while self.next_offset < count {
            if self.next_line().await?.is_none() {
                break;
            }
            self.next_offset += 1;
        }
        Ok(())
    }

    async fn skip_to_end(&mut self) -> Result<()> {
        while self.next_line().await?.is_some() {
            self.next_offset += 1;
        }
        Ok(())
    }
}

impl QueueReader for FileReader {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn read(&mut self) -> Result<Option<RawRecord>> {
        loop {
            if self.closed {
                return Err(QueueError::closed(&self.topic));
            }

            match self.next_line().await? {
                // Blank lines still occupy an offset
                Some(line) => {
                    let offset = self.next_offset;
                    self.next_offset += 1;
                    let (key, value) = Envelope::decode_line(line);
                    return Ok(Some(RawRecord::new(&self.topic, offset, key, value)));
                }
                None if self.follow => tokio::time::sleep(self.poll_interval).await,
                None => {
                    debug!(topic = %self.topic, "end of topic file");
                    return Ok(None);
                }
            }
        }
    }

    async fn commit(&mut self, offset: u64) -> Result<()> {
        if let Some(parent) = self.offset_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.offset_path, offset.to_string())
            .await
            .map_err(|e| QueueError::Commit {
                topic: self.topic.clone(),
                message: e.to_string(),
            })
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Appending writer for one topic file
///
/// Envelopes are written under a lock so concurrent deliveries never
/// interleave.
pub struct FileWriter {
    topic: String,
    file: Mutex<File>,
    closed: AtomicBool,
}

impl QueueWriter for FileWriter {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn write(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut line = serde_json::to_vec(&Envelope::encode(key, value))
            .map_err(|e| QueueError::write(&self.topic, e.to_string()))?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::closed(&self.topic));
        }
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut file = self.file.lock().await;
        self.closed.store(true, Ordering::SeqCst);
        file.sync_all().await?;
        Ok(())
    }
}
