use std::path::PathBuf;
use tracing::debug;

use super::{MemoryRepository, Record, RepoError, Repository, SqliteRepository};

/// Where repositories keep their records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Storage {
    /// One SQLite file shared by every record type (one table each).
    File(PathBuf),
    /// Process-local, gone when the repository is dropped.
    Memory,
}

/// Builds ready-to-use repositories so callers only name the record type.
#[derive(Debug, Clone)]
pub(crate) struct RepositoryFactory {
    storage: Storage,
}

impl RepositoryFactory {
    pub(crate) fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub(crate) fn repository<T: Record + 'static>(
        &self,
    ) -> Result<Box<dyn Repository<T>>, RepoError> {
        match &self.storage {
            Storage::File(path) => {
                let repo = SqliteRepository::<T>::open(path.clone())?;
                debug!(record = T::NAME, path = %repo.path().display(), "sqlite repository ready");
                Ok(Box::new(repo))
            }
            Storage::Memory => Ok(Box::new(MemoryRepository::<T>::new()?)),
        }
    }
}
