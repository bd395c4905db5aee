//! The credential registry: lookup, creation, update and removal of profiles.
//!
//! The registry is the ordered union of up to three JSON files (configured
//! credential file, per-user file, working-directory file) plus the optional
//! read-only environment profile. Nothing is cached between calls; every
//! operation reads the files it needs, and every mutation runs
//! lock, re-read, check, atomic replace, unlock.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::encryption::EncryptionEngine;
use crate::domain::models::credential::{validate_api_key, validate_name};
use crate::domain::models::{
    ApiKey, Config, CredentialFields, CredentialPatch, CredentialRecord, CredentialSummary,
    LockConfig, SecretAccess, ENVIRONMENT_PROFILE_NAME,
};
use crate::domain::{CredentialError, CredentialResult};
use crate::infrastructure::storage::{
    environment_record, read_entries, read_records, write_entries, CredentialFileEntry,
    RegistryLock,
};

const DEFAULT_FILE_NAME: &str = "credentials.json";

/// Where a new profile is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLocation {
    /// The configured credential file, else the per-user file
    #[default]
    Default,
    /// The per-user file (`~/.pylo/credentials.json`)
    Home,
    /// The file in the working directory
    WorkingDirectory,
    /// An explicit file; a directory gets `credentials.json` appended
    Path(PathBuf),
}

/// Registry files in search order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryFiles {
    pub credential_file: Option<PathBuf>,
    pub home_file: PathBuf,
    pub workdir_file: PathBuf,
}

impl RegistryFiles {
    pub fn from_config(config: &Config) -> Self {
        Self {
            credential_file: config.credential_file.as_deref().map(absolutize),
            home_file: absolutize(&config.storage.resolved_home_file()),
            workdir_file: absolutize(&config.storage.workdir_file),
        }
    }

    /// Distinct files in search order
    pub fn search_path(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = Vec::with_capacity(3);
        for file in self
            .credential_file
            .iter()
            .chain([&self.home_file, &self.workdir_file])
        {
            if !files.contains(file) {
                files.push(file.clone());
            }
        }
        files
    }

    /// File a create aimed at `location` writes to.
    ///
    /// An explicit path must be one of the registry files; anything else
    /// would hold a profile that no lookup can see.
    fn target(&self, location: &StorageLocation) -> CredentialResult<PathBuf> {
        let target = self.resolve(location);
        if matches!(location, StorageLocation::Path(_)) && !self.search_path().contains(&target) {
            return Err(CredentialError::Validation(format!(
                "{} is not a registry file (expected one of: {})",
                target.display(),
                self.search_path()
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(target)
    }

    fn resolve(&self, location: &StorageLocation) -> PathBuf {
        match location {
            StorageLocation::Default => self
                .credential_file
                .clone()
                .unwrap_or_else(|| self.home_file.clone()),
            StorageLocation::Home => self.home_file.clone(),
            StorageLocation::WorkingDirectory => self.workdir_file.clone(),
            StorageLocation::Path(path) if path.is_dir() => absolutize(&path.join(DEFAULT_FILE_NAME)),
            StorageLocation::Path(path) => absolutize(path),
        }
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
}

fn index_key(name: &str) -> String {
    name.to_lowercase()
}

/// Snapshot of the registry, keyed by lowercase name
type Index = BTreeMap<String, CredentialRecord>;

/// Persistent, name-unique set of credential profiles.
pub struct CredentialStore {
    files: RegistryFiles,
    lock: LockConfig,
    environment_profile: bool,
    engine: EncryptionEngine,
}

impl CredentialStore {
    pub fn new(config: &Config, engine: EncryptionEngine) -> Self {
        Self {
            files: RegistryFiles::from_config(config),
            lock: config.lock.clone(),
            environment_profile: config.storage.environment_profile,
            engine,
        }
    }

    pub const fn engine(&self) -> &EncryptionEngine {
        &self.engine
    }

    pub const fn files(&self) -> &RegistryFiles {
        &self.files
    }

    /// All profiles ordered by name.
    pub fn list(&self, access: SecretAccess) -> CredentialResult<Vec<CredentialRecord>> {
        Ok(self
            .load_index()?
            .into_values()
            .map(|record| record.with_access(access))
            .collect())
    }

    /// Non-secret view of every profile.
    pub fn summaries(&self) -> CredentialResult<Vec<CredentialSummary>> {
        Ok(self
            .load_index()?
            .values()
            .map(CredentialRecord::summary)
            .collect())
    }

    /// Profile named `name` (case-insensitive).
    pub fn get(&self, name: &str, access: SecretAccess) -> CredentialResult<CredentialRecord> {
        self.load_index()?
            .remove(&index_key(name))
            .map(|record| record.with_access(access))
            .ok_or_else(|| CredentialError::NotFound(name.to_string()))
    }

    /// Profile whose name, or failing that whose fqdn, matches.
    pub fn resolve(
        &self,
        name_or_fqdn: &str,
        access: SecretAccess,
    ) -> CredentialResult<CredentialRecord> {
        let mut index = self.load_index()?;
        if let Some(record) = index.remove(&index_key(name_or_fqdn)) {
            return Ok(record.with_access(access));
        }
        index
            .into_values()
            .find(|record| record.fqdn.eq_ignore_ascii_case(name_or_fqdn))
            .map(|record| record.with_access(access))
            .ok_or_else(|| CredentialError::NotFound(name_or_fqdn.to_string()))
    }

    /// Persist a new profile and return it with the key redacted.
    #[instrument(skip(self, fields, api_key))]
    pub fn create(
        &self,
        name: &str,
        fields: CredentialFields,
        api_key: &str,
        encrypt_with: Option<usize>,
        location: &StorageLocation,
    ) -> CredentialResult<CredentialRecord> {
        ensure_writable_name(name)?;
        validate_api_key(api_key)?;
        fields.validate(name)?;

        let target = self.files.target(location)?;

        // Cheap early check so a duplicate never triggers an agent signature
        if self.load_index()?.contains_key(&index_key(name)) {
            return Err(CredentialError::DuplicateName(name.to_string()));
        }

        let stored_key = match encrypt_with {
            Some(index) => ApiKey::Encrypted(self.engine.encrypt(api_key, index)?),
            None => ApiKey::Plain(api_key.to_string()),
        };
        let record = fields.into_record(name, stored_key, target.clone())?;

        let _lock = self.lock_registry(Some(&target))?;
        if self.load_index()?.contains_key(&index_key(name)) {
            return Err(CredentialError::DuplicateName(name.to_string()));
        }

        let mut entries = read_entries(&target)?;
        if entries.iter().any(|entry| index_key(&entry.name) == index_key(name)) {
            return Err(CredentialError::DuplicateName(name.to_string()));
        }
        entries.push(CredentialFileEntry::from_record(&record)?);
        write_entries(&target, &entries)?;

        info!(
            name = %record.name,
            file = %target.display(),
            encrypted = record.encrypted(),
            "credential created"
        );
        Ok(record.with_access(SecretAccess::Redacted))
    }

    /// Change an existing profile and return it with the key redacted.
    ///
    /// Without `api_key` and `encrypt_with` the stored key is left exactly as
    /// it is. With only `encrypt_with` the current secret is re-sealed with
    /// that key, unless it is already sealed with it.
    #[instrument(skip(self, patch, api_key))]
    pub fn update(
        &self,
        name: &str,
        patch: &CredentialPatch,
        api_key: Option<&str>,
        encrypt_with: Option<usize>,
    ) -> CredentialResult<CredentialRecord> {
        ensure_writable_name(name)?;
        if let Some(key) = api_key {
            validate_api_key(key)?;
        }

        let _lock = self.lock_registry(None)?;
        let current = self
            .load_index()?
            .remove(&index_key(name))
            .ok_or_else(|| CredentialError::NotFound(name.to_string()))?;
        if current.is_environment() {
            return Err(read_only(&current.name));
        }

        let mut next = patch.apply(&current)?;
        next.api_key = self.next_api_key(&current, api_key, encrypt_with)?;

        let file = current.originating_file.clone();
        let mut entries = read_entries(&file)?;
        let key = index_key(&current.name);
        let slot = entries
            .iter_mut()
            .find(|entry| index_key(&entry.name) == key)
            .ok_or_else(|| {
                CredentialError::storage(&file, format!("entry '{}' vanished", current.name))
            })?;
        *slot = CredentialFileEntry::from_record(&next)?;
        write_entries(&file, &entries)?;

        info!(
            name = %next.name,
            file = %file.display(),
            encrypted = next.encrypted(),
            secret_changed = next.api_key != current.api_key,
            "credential updated"
        );
        Ok(next.with_access(SecretAccess::Redacted))
    }

    /// Remove a profile, along with any copies shadowed by it in later
    /// registry files.
    #[instrument(skip(self))]
    pub fn delete(&self, name: &str) -> CredentialResult<()> {
        ensure_writable_name(name)?;

        let _lock = self.lock_registry(None)?;
        let current = self
            .load_index()?
            .remove(&index_key(name))
            .ok_or_else(|| CredentialError::NotFound(name.to_string()))?;
        if current.is_environment() {
            return Err(read_only(&current.name));
        }

        let key = index_key(&current.name);
        for file in self.files.search_path() {
            let mut entries = read_entries(&file)?;
            let before = entries.len();
            entries.retain(|entry| index_key(&entry.name) != key);
            if entries.len() == before {
                continue;
            }
            write_entries(&file, &entries)?;
            if file != current.originating_file {
                warn!(name = %current.name, file = %file.display(), "shadowed copy deleted");
            }
        }

        info!(
            name = %current.name,
            file = %current.originating_file.display(),
            "credential deleted"
        );
        Ok(())
    }

    fn next_api_key(
        &self,
        current: &CredentialRecord,
        api_key: Option<&str>,
        encrypt_with: Option<usize>,
    ) -> CredentialResult<ApiKey> {
        match (api_key, encrypt_with) {
            (Some(key), None) => Ok(ApiKey::Plain(key.to_string())),
            (Some(key), Some(index)) => Ok(ApiKey::Encrypted(self.engine.encrypt(key, index)?)),
            (None, None) => Ok(current.api_key.clone()),
            (None, Some(index)) => {
                let target = self.engine.key_at(index)?;
                if current
                    .api_key
                    .envelope()
                    .is_some_and(|e| e.key_fingerprint == target.fingerprint)
                {
                    debug!(name = %current.name, "already encrypted with the selected key");
                    return Ok(current.api_key.clone());
                }
                let plaintext = self.engine.reveal(current)?;
                Ok(ApiKey::Encrypted(
                    self.engine.encrypt_for(&plaintext, &target.fingerprint)?,
                ))
            }
        }
    }

    /// Lock the per-user file, every existing registry file, and `target`
    /// when creating.
    ///
    /// The per-user lock is taken even when that file does not exist yet, so
    /// two creates aimed at different new files still serialize.
    fn lock_registry(&self, target: Option<&Path>) -> CredentialResult<RegistryLock> {
        let mut paths = vec![self.files.home_file.clone()];
        paths.extend(self.files.search_path().into_iter().filter(|p| p.exists()));
        if let Some(target) = target {
            paths.push(target.to_path_buf());
        }
        RegistryLock::acquire(&paths, &self.lock)
    }

    fn load_index(&self) -> CredentialResult<Index> {
        let mut index = Index::new();

        if self.environment_profile {
            match environment_record() {
                Ok(Some(record)) => {
                    index.insert(index_key(&record.name), record);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "ignoring environment profile"),
            }
        }

        for file in self.files.search_path() {
            for record in read_records(&file)? {
                let key = index_key(&record.name);
                if let Some(existing) = index.get(&key) {
                    warn!(
                        name = %record.name,
                        file = %file.display(),
                        shadowed_by = %existing.originating_file.display(),
                        "duplicate credential name ignored"
                    );
                    continue;
                }
                index.insert(key, record);
            }
        }
        Ok(index)
    }
}

fn ensure_writable_name(name: &str) -> CredentialResult<()> {
    validate_name(name)?;
    if name.eq_ignore_ascii_case(ENVIRONMENT_PROFILE_NAME) {
        return Err(read_only(name));
    }
    Ok(())
}

fn read_only(name: &str) -> CredentialError {
    CredentialError::Validation(format!(
        "'{name}' is the reserved environment profile and is read-only"
    ))
}
