//! File destination: append events as raw lines or JSONL.

use super::{Destination, DestinationError};
use crate::events::Event;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Output encoding for [`FileDestination`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// One `event.raw` per line.
    Raw,
    /// One compact JSON event per line.
    Jsonl,
}

impl FileFormat {
    fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("jsonl") {
            Self::Jsonl
        } else {
            Self::Raw
        }
    }
}

/// Appends events to a file, flushing before acknowledging the batch.
pub struct FileDestination {
    path: PathBuf,
    format: FileFormat,
}

impl FileDestination {
    /// Create the destination; parent directories are created up front.
    pub fn new(path: &str, format: &str) -> Result<Self, DestinationError> {
        let path = PathBuf::from(path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            format: FileFormat::parse(format),
        })
    }
}

#[async_trait]
impl Destination for FileDestination {
    async fn send(&self, batch: &[Event]) -> Result<(), DestinationError> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;

        let mut out = Vec::with_capacity(batch.len() * 128);
        for event in batch {
            match self.format {
                FileFormat::Jsonl => {
                    serde_json::to_writer(&mut out, event)?;
                    out.push(b'\n');
                }
                FileFormat::Raw => {
                    out.extend_from_slice(event.raw.as_bytes());
                    out.push(b'\n');
                }
            }
        }

        file.write_all(&out)?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }
}
