//! Access to result files packed in `.zip` archives.

use std::{
    collections::VecDeque,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use zip::{result::ZipError, ZipArchive};

use crate::error::AuditError;

/// Entries larger than this are refused rather than read into memory.
pub const MAX_ENTRY_BYTES: u64 = 100 * 1024 * 1024; // 100 MB

pub type SharedArchive = Arc<Mutex<ZipArchive<File>>>;

/// A small cache of open archives. When full, the archive opened longest
/// ago is closed first.
pub struct ContainerCache {
    capacity: usize,
    archives: Mutex<VecDeque<(PathBuf, SharedArchive)>>,
}

impl std::fmt::Debug for ContainerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerCache")
            .field("capacity", &self.capacity)
            .field("open", &self.len())
            .finish()
    }
}

impl Default for ContainerCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl ContainerCache {
    pub const DEFAULT_CAPACITY: usize = 10;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            archives: Mutex::new(VecDeque::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.archives
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn open(&self, path: &Path) -> Result<SharedArchive, AuditError> {
        let mut archives = self.archives.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((_, archive)) = archives.iter().find(|(open, _)| open == path) {
            return Ok(Arc::clone(archive));
        }

        tracing::debug!(path = %path.display(), "opening archive");
        let file = File::open(path).map_err(|error| AuditError::io(path, error))?;
        let archive = Arc::new(Mutex::new(
            ZipArchive::new(file).map_err(|error| AuditError::archive(path, error))?,
        ));

        archives.push_back((path.to_owned(), Arc::clone(&archive)));
        while archives.len() > self.capacity {
            if let Some((evicted, _)) = archives.pop_front() {
                tracing::trace!(path = %evicted.display(), "closing archive");
            }
        }

        Ok(archive)
    }

    /// Names of the file entries of `path` that end in one of `suffixes`,
    /// ignoring case, in archive order.
    pub fn entry_names(&self, path: &Path, suffixes: &[&str]) -> Result<Vec<String>, AuditError> {
        let archive = self.open(path)?;
        let archive = archive.lock().unwrap_or_else(PoisonError::into_inner);

        Ok(archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .filter(|name| {
                let name = name.to_ascii_lowercase();
                suffixes.iter().any(|suffix| name.ends_with(suffix))
            })
            .map(str::to_owned)
            .collect())
    }

    /// Reads the entry called `name`, or `None` when there is no such entry.
    pub fn read_entry(&self, path: &Path, name: &str) -> Result<Option<Vec<u8>>, AuditError> {
        let archive = self.open(path)?;
        let mut archive = archive.lock().unwrap_or_else(PoisonError::into_inner);

        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(error) => return Err(AuditError::archive(path, error)),
        };

        if entry.size() > MAX_ENTRY_BYTES {
            return Err(AuditError::EntryTooLarge {
                name: name.to_owned(),
                size: entry.size(),
                limit: MAX_ENTRY_BYTES,
            });
        }

        let mut contents = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
        entry
            .read_to_end(&mut contents)
            .map_err(|error| AuditError::io(path, error))?;
        Ok(Some(contents))
    }
}

#[cfg(test)]
pub(crate) mod test_archives {
    use std::{io::Write, path::Path};

    use zip::{write::FileOptions, ZipWriter};

    /// Writes a zip archive at `path` holding `entries`.
    pub(crate) fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(std::fs::File::create(path).unwrap());
        for (name, contents) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
    }
}
