//! Durable per-stream byte-offset checkpoint. Grounded on
//! `lib/file-source/src/checkpointer.rs`'s atomic tmp-file-then-rename
//! persistence strategy, simplified from per-file fingerprint keying
//! down to a plain `symbol||symbol_period` string key.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointEntry {
    pub last_position: u64,
    pub initial_load_done: bool,
}

/// In-memory view of the checkpoint document, loaded from and persisted
/// to a single JSON file. Touched only by the coordinator; workers never
/// see this type.
#[derive(Debug, Default)]
pub struct OffsetStore {
    path: PathBuf,
    entries: BTreeMap<String, CheckpointEntry>,
}

impl OffsetStore {
    /// Loads the checkpoint document. An absent, unreadable, or
    /// syntactically invalid file yields an empty map; corruption is
    /// logged, not fatal.
    pub fn load(path: &Path) -> OffsetStore {
        let entries = match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => map,
                Err(error) => {
                    tracing::warn!(
                        message = "checkpoint file is corrupted, starting from an empty checkpoint",
                        path = %path.display(),
                        %error,
                    );
                    BTreeMap::new()
                }
            },
            Err(error) if error.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => {
                tracing::warn!(
                    message = "checkpoint file is unreadable, starting from an empty checkpoint",
                    path = %path.display(),
                    %error,
                );
                BTreeMap::new()
            }
        };

        OffsetStore {
            path: path.to_owned(),
            entries,
        }
    }

    pub fn get(&self, stream_id: &str) -> CheckpointEntry {
        self.entries
            .get(stream_id)
            .copied()
            .unwrap_or(CheckpointEntry {
                last_position: 0,
                initial_load_done: false,
            })
    }

    /// Persists `new_offset` for `stream_id` only if it advances the
    /// current position; idempotent otherwise. Returns whether a write
    /// actually happened.
    pub fn advance(&mut self, stream_id: &str, new_offset: u64) -> io::Result<bool> {
        let current = self.get(stream_id).last_position;
        if new_offset <= current {
            return Ok(false);
        }

        self.entries.insert(
            stream_id.to_owned(),
            CheckpointEntry {
                last_position: new_offset,
                initial_load_done: true,
            },
        );
        self.save()?;
        Ok(true)
    }

    /// Atomic rewrite: write to a temp path, flush, then rename over the
    /// stable path, so a crash mid-write never leaves a half-written
    /// document.
    fn save(&self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut f = io::BufWriter::new(fs::File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut f, &self.entries)?;
            use std::io::Write;
            f.flush()?;
            f.into_inner()?.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)
    }
}
