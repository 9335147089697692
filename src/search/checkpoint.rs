//! Checkpoint persistence for resumable search runs.
//!
//! A checkpoint is the serialized [`SearchState`] written at a
//! generation boundary. Corruption is surfaced explicitly; a damaged
//! checkpoint never degrades into a silent fresh start.

use std::fs;
use std::path::Path;

use super::engine::SearchState;

/// Checkpoint persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint io: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Write a checkpoint. The file is written to a sibling temp path first
/// and renamed so an interrupted write never leaves a half-written
/// checkpoint behind.
pub fn write_checkpoint(path: &Path, state: &SearchState) -> Result<(), CheckpointError> {
    let json = serde_json::to_string(state)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a checkpoint.
pub fn load_checkpoint(path: &Path) -> Result<SearchState, CheckpointError> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
