//! A filesystem store.

use std::{
    collections::HashMap,
    fs::File,
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use walkdir::WalkDir;

use crate::storage::{
    ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey,
    StoreKeyError, StoreKeys, StorePrefix, WritableStorageTraits,
};

/// A file system store.
///
/// Each key is a file below the base directory, e.g. the key `data/3/c/0/1` is the file `<base>/data/3/c/0/1`.
///
/// Values are written to a sibling partial file which is then renamed over the key, so a concurrent reader sees either the old or the new value.
#[derive(Debug)]
pub struct FilesystemStore {
    base_directory: PathBuf,
    readonly: bool,
    files: RwLock<HashMap<StoreKey, Arc<Mutex<()>>>>,
}

/// A filesystem store creation error.
#[derive(Debug, Error)]
pub enum FilesystemStoreCreateError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The path is not valid on this system.
    #[error("base directory {0} is not valid")]
    InvalidBaseDirectory(PathBuf),
    /// The path points to an existing file rather than a directory.
    #[error("base directory {0} is a file")]
    ExistingFile(PathBuf),
}

const PARTIAL_SUFFIX: &str = ".partial";

impl FilesystemStore {
    /// Create a new file system store at a given `base_directory`.
    /// The base directory will be created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`FilesystemStoreCreateError`] if `base_directory`:
    ///   - is not valid, or
    ///   - it points to an existing file rather than a directory.
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self, FilesystemStoreCreateError> {
        let base_directory = base_directory.as_ref().to_path_buf();
        if base_directory.to_str().is_none() {
            return Err(FilesystemStoreCreateError::InvalidBaseDirectory(
                base_directory,
            ));
        }
        if base_directory.is_file() {
            return Err(FilesystemStoreCreateError::ExistingFile(base_directory));
        }
        let readonly = if base_directory.is_dir() {
            std::fs::metadata(&base_directory)?.permissions().readonly()
        } else {
            std::fs::create_dir_all(&base_directory)?;
            false
        };
        Ok(Self {
            base_directory,
            readonly,
            files: RwLock::new(HashMap::new()),
        })
    }

    /// Open an existing directory without allowing writes.
    ///
    /// # Errors
    /// Returns a [`FilesystemStoreCreateError`] if `base_directory` is not an existing directory.
    pub fn new_read_only<P: AsRef<Path>>(
        base_directory: P,
    ) -> Result<Self, FilesystemStoreCreateError> {
        let base_directory = base_directory.as_ref().to_path_buf();
        if base_directory.is_file() {
            return Err(FilesystemStoreCreateError::ExistingFile(base_directory));
        }
        if !base_directory.is_dir() {
            return Err(std::io::Error::from(ErrorKind::NotFound).into());
        }
        Ok(Self {
            base_directory,
            readonly: true,
            files: RwLock::new(HashMap::new()),
        })
    }

    /// Return the base directory.
    #[must_use]
    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Returns true if the store does not accept writes.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.readonly
    }

    /// Maps a [`StoreKey`] to a filesystem [`PathBuf`].
    #[must_use]
    pub fn key_to_fspath(&self, key: &StoreKey) -> PathBuf {
        let mut path = self.base_directory.clone();
        path.extend(key.as_str().split('/'));
        path
    }

    /// Maps a filesystem [`Path`] to a [`StoreKey`].
    fn fspath_to_key(&self, path: &Path) -> Result<StoreKey, StoreKeyError> {
        let invalid = || StoreKeyError::from(path.to_string_lossy().to_string());
        let relative = pathdiff::diff_paths(path, &self.base_directory).ok_or_else(invalid)?;
        let key = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid)?
            .join("/");
        StoreKey::new(key)
    }

    /// Maps a [`StorePrefix`] to a filesystem [`PathBuf`].
    #[must_use]
    pub fn prefix_to_fspath(&self, prefix: &StorePrefix) -> PathBuf {
        let mut path = self.base_directory.clone();
        path.extend(prefix.as_str().split('/').filter(|name| !name.is_empty()));
        path
    }

    fn key_lock(&self, key: &StoreKey) -> Arc<Mutex<()>> {
        if let Some(lock) = self.files.read().get(key) {
            return lock.clone();
        }
        self.files.write().entry(key.clone()).or_default().clone()
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.readonly {
            Err(StorageError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn is_partial(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX))
    }

    fn walk_files(&self, prefix: &StorePrefix) -> impl Iterator<Item = walkdir::DirEntry> {
        WalkDir::new(self.prefix_to_fspath(prefix))
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && !Self::is_partial(entry.path()))
    }
}

impl ReadableStorageTraits for FilesystemStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        let mut file = match File::open(self.key_to_fspath(key)) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(Some(buffer))
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        match std::fs::metadata(self.key_to_fspath(key)) {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl WritableStorageTraits for FilesystemStore {
    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        self.check_writable()?;
        let key_path = self.key_to_fspath(key);
        let lock = self.key_lock(key);
        let _lock = lock.lock();

        let Some(parent) = key_path.parent() else {
            return Err(StorageError::InvalidStoreKey(key.to_string().into()));
        };
        std::fs::create_dir_all(parent)?;
        let file_name = key_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let partial_path = parent.join(format!(".{file_name}{PARTIAL_SUFFIX}"));
        let mut file = File::create(&partial_path)?;
        file.write_all(value)?;
        file.sync_data()?;
        drop(file);
        std::fs::rename(&partial_path, &key_path)?;
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.check_writable()?;
        let lock = self.key_lock(key);
        let _lock = lock.lock();
        match std::fs::remove_file(self.key_to_fspath(key)) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.check_writable()?;
        if prefix.as_str().is_empty() {
            for entry in std::fs::read_dir(&self.base_directory)? {
                let path = entry?.path();
                if path.is_dir() {
                    std::fs::remove_dir_all(path)?;
                } else {
                    std::fs::remove_file(path)?;
                }
            }
            return Ok(());
        }
        match std::fs::remove_dir_all(self.prefix_to_fspath(prefix)) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

impl ListableStorageTraits for FilesystemStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        let mut keys = self
            .walk_files(prefix)
            .map(|entry| self.fspath_to_key(entry.path()))
            .collect::<Result<StoreKeys, _>>()?;
        keys.sort();
        Ok(keys)
    }

    fn size_prefix(&self, prefix: &StorePrefix) -> Result<u64, StorageError> {
        let mut size = 0;
        for entry in self.walk_files(prefix) {
            size += entry.metadata().map_err(std::io::Error::from)?.len();
        }
        Ok(size)
    }
}
