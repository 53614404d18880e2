//! Persisted playback positions.
//!
//! Positions live in one flat JSON object, `{"<media name>": <seconds>, ...}`.
//! The whole table is the unit of persistence: every update reads the file,
//! changes one key and writes the file back.
//!
//! # Consistency
//!
//! - Updates ([`PositionStore::set`], [`PositionStore::forget`]) hold a single
//!   async mutex across the whole read-modify-write, so concurrent updates are
//!   applied one at a time in arrival order and none are lost.
//! - The file is replaced by writing a temp file in the same directory and
//!   renaming it over the old one. Readers take no lock and always see either
//!   the complete old table or the complete new one.
//! - A missing or empty file is an empty table. An unparsable file is logged
//!   and also read as an empty table; before it is overwritten it is copied
//!   aside (`<file>.corrupt-<unix secs>`) unless that is disabled.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use audioshelf_common::{Error, Result};
use tokio::sync::Mutex;

use crate::config::PlaybackConfig;

/// Media name to playback offset in seconds.
pub type PositionTable = BTreeMap<String, f64>;

struct LoadedTable {
    table: PositionTable,
    corrupt: bool,
}

/// Durable `media name -> seconds` store backed by a single JSON file.
pub struct PositionStore {
    path: PathBuf,
    backup_corrupt: bool,
    write_lock: Mutex<()>,
}

impl PositionStore {
    pub fn new(path: impl Into<PathBuf>, backup_corrupt: bool) -> Self {
        Self {
            path: path.into(),
            backup_corrupt,
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self::new(config.state_file.clone(), config.backup_corrupt)
    }

    /// Path of the backing JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved offset for `name`, or `0.0` when nothing has been saved.
    pub async fn get(&self, name: &str) -> Result<f64> {
        require_name(name)?;
        let loaded = self.load().await?;
        Ok(loaded.table.get(name).copied().unwrap_or(0.0))
    }

    /// Save `offset` seconds for `name` and persist the table.
    ///
    /// Rejects empty names and negative or non-finite offsets without
    /// touching the file.
    pub async fn set(&self, name: &str, offset: f64) -> Result<()> {
        require_name(name)?;
        if !offset.is_finite() || offset < 0.0 {
            return Err(Error::invalid_argument(format!(
                "playback offset must be a finite, non-negative number of seconds, got {offset}"
            )));
        }

        let _guard = self.write_lock.lock().await;
        let mut loaded = self.load().await?;
        self.backup_if_corrupt(&loaded).await?;

        loaded.table.insert(name.to_string(), offset);
        self.store(&loaded.table).await?;

        tracing::debug!(name = %name, offset, "Saved playback position");
        Ok(())
    }

    /// Drop the record for `name`. Returns whether a record existed.
    pub async fn forget(&self, name: &str) -> Result<bool> {
        require_name(name)?;

        let _guard = self.write_lock.lock().await;
        let mut loaded = self.load().await?;
        if loaded.table.remove(name).is_none() {
            return Ok(false);
        }
        self.backup_if_corrupt(&loaded).await?;
        self.store(&loaded.table).await?;

        tracing::debug!(name = %name, "Removed playback position");
        Ok(true)
    }

    /// The whole table as currently persisted.
    pub async fn snapshot(&self) -> Result<PositionTable> {
        Ok(self.load().await?.table)
    }

    async fn load(&self) -> Result<LoadedTable> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LoadedTable {
                    table: PositionTable::new(),
                    corrupt: false,
                });
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    "Failed to read playback positions: {e}"
                );
                return Err(e.into());
            }
        };

        if content.trim().is_empty() {
            return Ok(LoadedTable {
                table: PositionTable::new(),
                corrupt: false,
            });
        }

        match serde_json::from_str::<PositionTable>(&content) {
            Ok(table) => Ok(LoadedTable {
                table,
                corrupt: false,
            }),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Playback positions file is malformed, treating as empty: {e}"
                );
                Ok(LoadedTable {
                    table: PositionTable::new(),
                    corrupt: true,
                })
            }
        }
    }

    async fn backup_if_corrupt(&self, loaded: &LoadedTable) -> Result<()> {
        if !loaded.corrupt || !self.backup_corrupt {
            return Ok(());
        }

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let mut backup: OsString = self.path.as_os_str().to_owned();
        backup.push(format!(".corrupt-{stamp}"));
        let backup = PathBuf::from(backup);

        tokio::fs::copy(&self.path, &backup).await?;
        tracing::warn!(
            backup = %backup.display(),
            "Backed up malformed playback positions before overwriting"
        );
        Ok(())
    }

    async fn store(&self, table: &PositionTable) -> Result<()> {
        let json = serde_json::to_string(table)
            .map_err(|e| Error::Internal(format!("Failed to serialize positions: {e}")))?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, json.as_bytes()))
            .await
            .map_err(|e| Error::Internal(format!("spawn_blocking join error: {e}")))?
            .map_err(|e| {
                tracing::error!(
                    path = %self.path.display(),
                    "Failed to persist playback positions: {e}"
                );
                Error::from(e)
            })
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_argument("media name is empty"));
    }
    Ok(())
}

/// Replace `path` with `data` via a synced temp file and rename.
fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
