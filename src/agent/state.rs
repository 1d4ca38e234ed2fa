//! Agent state directory: token and file-tail offsets.
//!
//! Two small JSON files live under `state_dir`: `agent_token.json`
//! (`{"token": ...}`) and `offsets.json` (`{path: offset}`, reserved for
//! tail resume). Writes go through a temp file and rename so a crash
//! mid-write never leaves a torn file.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub struct AgentState {
    token_path: PathBuf,
    offsets_path: PathBuf,
}

fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

impl AgentState {
    /// Open (and create) the state directory.
    pub fn open(state_dir: impl AsRef<Path>) -> io::Result<Self> {
        let root = state_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            token_path: root.join("agent_token.json"),
            offsets_path: root.join("offsets.json"),
        })
    }

    pub fn load_token(&self) -> Option<String> {
        let data = fs::read_to_string(&self.token_path).ok()?;
        let value: Value = serde_json::from_str(&data).ok()?;
        value.get("token").and_then(Value::as_str).map(ToString::to_string)
    }

    pub fn save_token(&self, token: &str) -> io::Result<()> {
        let body = serde_json::json!({ "token": token }).to_string();
        write_atomic(&self.token_path, body.as_bytes())
    }

    pub fn load_offsets(&self) -> HashMap<String, u64> {
        fs::read_to_string(&self.offsets_path)
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default()
    }

    pub fn save_offsets(&self, offsets: &HashMap<String, u64>) -> io::Result<()> {
        let body = serde_json::to_string(offsets)?;
        write_atomic(&self.offsets_path, body.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AgentState::open(tmp.path().join("state")).unwrap();

        assert!(state.load_token().is_none());
        state.save_token("tok-123").unwrap();
        assert_eq!(state.load_token().as_deref(), Some("tok-123"));

        // Reopen sees the same token.
        let state = AgentState::open(tmp.path().join("state")).unwrap();
        assert_eq!(state.load_token().as_deref(), Some("tok-123"));
    }

    #[test]
    fn test_offsets_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AgentState::open(tmp.path()).unwrap();

        assert!(state.load_offsets().is_empty());

        let mut offsets = HashMap::new();
        offsets.insert("/var/log/app.log".to_string(), 4096u64);
        state.save_offsets(&offsets).unwrap();

        assert_eq!(state.load_offsets().get("/var/log/app.log"), Some(&4096));
    }

    #[test]
    fn test_corrupt_files_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AgentState::open(tmp.path()).unwrap();

        fs::write(tmp.path().join("agent_token.json"), "{broken").unwrap();
        fs::write(tmp.path().join("offsets.json"), "[1,2,3]").unwrap();

        assert!(state.load_token().is_none());
        assert!(state.load_offsets().is_empty());
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let state = AgentState::open(tmp.path()).unwrap();
        state.save_token("t").unwrap();

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
