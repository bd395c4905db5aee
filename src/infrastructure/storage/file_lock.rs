//! Advisory locks guarding read-modify-write cycles on registry files.
//!
//! Each registry file `credentials.json` is guarded by a sibling
//! `credentials.json.lock`; the data file itself is replaced by rename and
//! so cannot carry the lock.

use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

use crate::domain::models::LockConfig;
use crate::domain::{CredentialError, CredentialResult};

/// Path of the lock file guarding `path`
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// Exclusive locks over a set of registry files, released on drop.
#[derive(Debug)]
pub struct RegistryLock {
    held: Vec<(PathBuf, File)>,
}

impl RegistryLock {
    /// Lock every file in `paths`.
    ///
    /// Locks are taken in sorted path order so that two writers touching
    /// overlapping file sets cannot deadlock. Contention is retried with
    /// exponential backoff until `policy.timeout_ms` has elapsed.
    pub fn acquire(paths: &[PathBuf], policy: &LockConfig) -> CredentialResult<Self> {
        let mut targets: Vec<PathBuf> = paths.iter().map(|p| lock_path(p)).collect();
        targets.sort();
        targets.dedup();

        let mut held = Vec::with_capacity(targets.len());
        for target in targets {
            let file = lock_one(&target, policy)?;
            trace!(lock = %target.display(), "registry lock acquired");
            held.push((target, file));
        }
        Ok(Self { held })
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        // Reverse acquisition order
        for (path, file) in self.held.drain(..).rev() {
            if let Err(e) = FileExt::unlock(&file) {
                debug!(lock = %path.display(), error = %e, "unlock failed, closing handle");
            }
        }
    }
}

fn lock_one(target: &Path, policy: &LockConfig) -> CredentialResult<File> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CredentialError::storage(parent, e))?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(target)
        .map_err(|e| CredentialError::storage(target, e))?;

    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(policy.initial_backoff_ms.max(1)))
        .with_max_interval(Duration::from_millis(policy.max_backoff_ms.max(1)))
        .with_max_elapsed_time(Some(Duration::from_millis(policy.timeout_ms)))
        .build();

    backoff::retry(backoff, || {
        FileExt::try_lock_exclusive(&file).map_err(|e| {
            if is_contention(&e) {
                backoff::Error::transient(e)
            } else {
                backoff::Error::permanent(e)
            }
        })
    })
    .map_err(|e| match e {
        backoff::Error::Transient { err, .. } if is_contention(&err) => CredentialError::storage(
            target,
            format!(
                "timed out after {}ms waiting for the registry lock",
                policy.timeout_ms
            ),
        ),
        backoff::Error::Permanent(err) | backoff::Error::Transient { err, .. } => {
            CredentialError::storage(target, err)
        }
    })?;

    Ok(file)
}

fn is_contention(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
