//! Reloadable store of secret values shared across redacting writers
//!
//! The store hands out immutable [`SecretSet`] snapshots behind an `Arc`.
//! Reloading (secret rotation) builds a fresh snapshot and swaps the
//! reference atomically; a writer mid-scan keeps the snapshot it fetched and
//! never observes a half-updated set. Handles are cheap to clone, so the two
//! per-process writers and any number of unrelated invocations can share one
//! store.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use super::redacting_writer::SecretSet;

/// Default interval between background reloads of the secret sources.
const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(300);

/// Errors raised while loading secret sources
#[derive(Error, Debug)]
pub enum SecretStoreError {
    /// A secret source file could not be read
    #[error("failed to read secret file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A secret source file contained no usable value
    #[error("secret file {path} is empty")]
    EmptySecret { path: PathBuf },
}

/// Shared, reloadable secret store.
///
/// # Examples
///
/// ```
/// use image_bumper::security::SecretStore;
///
/// let store = SecretStore::from_values(vec![b"hunter2".to_vec()]);
/// let snapshot = store.current();
/// assert_eq!(snapshot.len(), 1);
/// ```
#[derive(Clone)]
pub struct SecretStore {
    current: Arc<RwLock<Arc<SecretSet>>>,
    paths: Arc<RwLock<Vec<PathBuf>>>,
}

impl Default for SecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore {
    /// Creates a store with an empty secret set.
    pub fn new() -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(SecretSet::empty()))),
            paths: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Creates a store seeded with in-memory values (tests, tokens already
    /// held in memory).
    pub fn from_values(values: Vec<Vec<u8>>) -> Self {
        let store = Self::new();
        store.set_values(values);
        store
    }

    /// Replaces the current snapshot with one built from `values`.
    pub fn set_values(&self, values: Vec<Vec<u8>>) {
        self.swap(SecretSet::new(values));
    }

    /// Returns the current snapshot.
    ///
    /// Safe to call concurrently with reloads; the lock is held only long
    /// enough to clone the snapshot reference.
    pub fn current(&self) -> Arc<SecretSet> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Loads secret values from `paths`, then keeps them fresh with a
    /// background reload task.
    ///
    /// The initial load is synchronous so a caller never runs a subprocess
    /// before its secrets are known. Later reload failures keep the previous
    /// snapshot and log a warning; rotation problems must not take down a
    /// run in flight.
    ///
    /// Must be called from within a tokio runtime, as the reload task is
    /// spawned onto it.
    pub fn start(
        &self,
        paths: Vec<PathBuf>,
        reload_interval: Option<Duration>,
    ) -> Result<(), SecretStoreError> {
        *self
            .paths
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = paths;
        self.reload()?;

        let store = self.clone();
        let interval = reload_interval.unwrap_or(DEFAULT_RELOAD_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                if let Err(e) = store.reload() {
                    warn!(error = %e, "secret reload failed, keeping previous snapshot");
                }
            }
        });

        Ok(())
    }

    /// Re-reads every registered source and swaps in a fresh snapshot.
    pub fn reload(&self) -> Result<(), SecretStoreError> {
        let paths = self
            .paths
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let mut values = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = fs::read(&path).map_err(|source| SecretStoreError::ReadFailed {
                path: path.clone(),
                source,
            })?;
            let trimmed = trim_ascii_whitespace(&raw);
            if trimmed.is_empty() {
                return Err(SecretStoreError::EmptySecret { path });
            }
            values.push(trimmed.to_vec());
        }

        self.swap(SecretSet::new(values));
        Ok(())
    }

    fn swap(&self, set: SecretSet) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(set);
    }
}

/// Secret files routinely carry a trailing newline that is not part of the
/// secret value.
fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
