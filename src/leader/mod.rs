//! File-based leader lock.
//!
//! One lease file per controller deployment, shared over a common volume
//! (typically a `ReadWriteMany` PVC mounted by every replica). Acquisition
//! is an atomic `create_new`; only the replica whose `create_new` call wins
//! the race ever holds the file descriptor that matters. Renewal rewrites
//! the file in place and re-checks the inode, so a replica that lost the
//! lease to a stale-takeover (the file got deleted and recreated under it)
//! notices on its very next renewal instead of renewing a lease it no
//! longer owns.
//!
//! Staleness is judged from a timestamp recorded *inside* the lease file's
//! content, not the file's access time. Many container runtimes mount
//! volumes `relatime` or `noatime`, which makes atime an unreliable signal
//! for "nobody has touched this in a while".

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LeaderElectionConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LeaseRecord {
    holder_id: String,
    renewed_at: DateTime<Utc>,
}

/// A held or contended file-based lease.
///
/// `held_inode` is only set while this instance believes it owns the
/// lease; it is the `st_ino` observed at the moment of acquisition or
/// renewal, and is what [`LeaderLock::is_leader`] compares against the
/// live file to detect a takeover.
pub struct LeaderLock {
    path: PathBuf,
    holder_id: String,
    ttl: Duration,
    held_inode: Option<u64>,
}

impl LeaderLock {
    pub fn new(config: &LeaderElectionConfig, holder_id: impl Into<String>) -> Self {
        Self {
            path: config.lease_path(),
            holder_id: holder_id.into(),
            ttl: config.lease_ttl,
            held_inode: None,
        }
    }

    /// Attempts to become leader: acquires the lease if unheld, renews it
    /// if we already hold it, or force-acquires it if the current holder
    /// has gone stale. Returns `true` iff this call leaves us holding the
    /// lease.
    pub fn acquire(&mut self) -> Result<bool> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::LeaderLock)?;
        }

        if self.create_new()? {
            return Ok(true);
        }

        if self.is_leader()? {
            return self.renew();
        }

        if self.is_stale()? {
            info!(path = %self.path.display(), "lease is stale, force-acquiring");
            return self.force_acquire();
        }

        Ok(false)
    }

    /// Returns `true` if this instance currently holds the lease, verified
    /// by comparing the live file's inode against the one observed at our
    /// last successful acquire/renew.
    pub fn is_leader(&self) -> Result<bool> {
        let Some(held_inode) = self.held_inode else {
            return Ok(false);
        };

        let metadata = match std::fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::LeaderLock(e)),
        };

        Ok(metadata.ino() == held_inode)
    }

    /// Releases the lease if we hold it. A no-op if we don't.
    pub fn release(&mut self) -> Result<()> {
        if self.is_leader()? {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(Error::LeaderLock(e));
                }
            }
            debug!(holder_id = %self.holder_id, "released lease");
        }
        self.held_inode = None;
        Ok(())
    }

    /// How often this holder should call [`acquire`](Self::acquire) to
    /// keep a held lease alive: half the TTL, floored at 500ms.
    pub fn renew_period(&self) -> Duration {
        let half = self.ttl / 2;
        half.max(Duration::from_millis(500))
    }

    fn create_new(&mut self) -> Result<bool> {
        let result = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path);

        match result {
            Ok(mut file) => {
                self.write_record(&mut file)?;
                let metadata = file.metadata().map_err(Error::LeaderLock)?;
                self.held_inode = Some(metadata.ino());
                info!(holder_id = %self.holder_id, "acquired lease");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(Error::LeaderLock(e)),
        }
    }

    fn renew(&mut self) -> Result<bool> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(Error::LeaderLock)?;
        self.write_record(&mut file)?;
        let metadata = file.metadata().map_err(Error::LeaderLock)?;
        self.held_inode = Some(metadata.ino());
        debug!(holder_id = %self.holder_id, "renewed lease");
        Ok(true)
    }

    fn force_acquire(&mut self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::LeaderLock(e)),
        }

        match self.create_new() {
            Ok(true) => {
                warn!(holder_id = %self.holder_id, "took over stale lease");
                Ok(true)
            }
            Ok(false) => {
                // Another replica won the re-creation race.
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn is_stale(&self) -> Result<bool> {
        let record = match self.read_record() {
            Ok(Some(r)) => r,
            Ok(None) => return Ok(true),
            Err(_) => return Ok(true),
        };

        let age = Utc::now().signed_duration_since(record.renewed_at);
        let stale_after = chrono::Duration::from_std(self.ttl * 2)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 2));
        Ok(age > stale_after)
    }

    fn read_record(&self) -> Result<Option<LeaseRecord>> {
        let mut contents = String::new();
        match std::fs::File::open(&self.path) {
            Ok(mut f) => {
                f.read_to_string(&mut contents).map_err(Error::LeaderLock)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::LeaderLock(e)),
        }

        match serde_json::from_str(&contents) {
            Ok(record) => Ok(Some(record)),
            Err(_) => Ok(None),
        }
    }

    fn write_record(&self, file: &mut std::fs::File) -> Result<()> {
        let record = LeaseRecord {
            holder_id: self.holder_id.clone(),
            renewed_at: Utc::now(),
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| Error::Config(format!("failed to serialize lease record: {e}")))?;
        file.set_len(0).map_err(Error::LeaderLock)?;
        use std::io::Seek;
        file.seek(std::io::SeekFrom::Start(0))
            .map_err(Error::LeaderLock)?;
        file.write_all(json.as_bytes()).map_err(Error::LeaderLock)?;
        file.sync_all().map_err(Error::LeaderLock)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
