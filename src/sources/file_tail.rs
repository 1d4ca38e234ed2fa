//! File tail source: emits new whole lines appended to a text file.

use super::{Source, SourceError};
use crate::events::Event;
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use tracing::info;

/// Tails a text file and emits appended lines as events.
///
/// Default start position is end-of-file (`tail -f` behaviour);
/// `from_start = true` reads from offset 0. Only whole lines are emitted:
/// a trailing fragment without a newline is held back until the writer
/// completes it. Truncation (size dropping below the read offset) reopens
/// the file from the start so rotation-by-truncate does not wedge the tail.
pub struct FileTailSource {
    path: PathBuf,
    from_start: bool,
    reader: Option<BufReader<File>>,
    offset: u64,
    partial: String,
}

/// Undo accidental escape interpretation in configured paths.
///
/// Windows paths pasted into JSON often arrive with `\t`/`\n`/`\r`
/// already collapsed into control characters; restore the two-character
/// escape so the path can be opened.
fn repair_escaped_path(s: &str) -> String {
    s.replace('\t', "\\t").replace('\n', "\\n").replace('\r', "\\r")
}

impl FileTailSource {
    /// Create a tail source. The file is opened lazily on the first poll.
    ///
    /// `start_position` is the legacy spelling of `from_start`:
    /// `"begin"|"start"|"from_start"` read from offset 0, `"end"|"tail"`
    /// keep the default tail behaviour.
    pub fn new(path: &str, from_start: bool, start_position: Option<&str>) -> Self {
        let mut from_start = from_start;
        if let Some(sp) = start_position {
            match sp.trim().to_ascii_lowercase().as_str() {
                "begin" | "start" | "from_start" => from_start = true,
                "end" | "tail" => from_start = false,
                _ => {}
            }
        }

        Self {
            path: PathBuf::from(repair_escaped_path(path)),
            from_start,
            reader: None,
            offset: 0,
            partial: String::new(),
        }
    }

    fn open_if_needed(&mut self) -> Result<(), SourceError> {
        if self.reader.is_some() {
            return Ok(());
        }

        if !self.path.exists() {
            return Err(SourceError::PathNotFound(self.path.display().to_string()));
        }

        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        self.offset = if self.from_start {
            0
        } else {
            reader.seek(SeekFrom::End(0))?
        };
        self.reader = Some(reader);
        Ok(())
    }

    /// Reopen from offset 0 when the file shrank below the read offset.
    fn reopen_if_truncated(&mut self) -> Result<(), SourceError> {
        let Ok(meta) = std::fs::metadata(&self.path) else {
            // File vanished (rename rotation); keep reading the open handle.
            return Ok(());
        };
        if meta.len() >= self.offset {
            return Ok(());
        }

        info!(path = %self.path.display(), "tail file truncated, reopening from start");
        self.reader = Some(BufReader::new(File::open(&self.path)?));
        self.offset = 0;
        self.partial.clear();
        Ok(())
    }
}

#[async_trait]
impl Source for FileTailSource {
    async fn poll(&mut self, max_events: usize) -> Result<Vec<Event>, SourceError> {
        self.open_if_needed()?;
        self.reopen_if_truncated()?;

        let reader = match self.reader.as_mut() {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };

        let mut out = Vec::new();
        let mut buf = Vec::new();
        while out.len() < max_events {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                break;
            }
            self.offset += n as u64;

            let chunk = String::from_utf8_lossy(&buf);
            if !chunk.ends_with('\n') {
                // Writer is mid-line; hold the fragment for the next poll.
                self.partial.push_str(&chunk);
                break;
            }

            let mut line = std::mem::take(&mut self.partial);
            line.push_str(&chunk);
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if !trimmed.is_empty() {
                out.push(Event::from_raw(trimmed));
            }
        }
        Ok(out)
    }

    fn close(&mut self) {
        self.reader = None;
    }
}
