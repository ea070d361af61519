//! Batch processing of result files across directories and archives.

use std::{
    fmt::Display,
    path::{Component, Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use rayon::prelude::*;
use types_rs::{decode_as, decode_enveloped, Bulletin, Office, RdvFile, SignatureEnvelope};

use crate::{
    bulletin::verify_bulletin,
    container::ContainerCache,
    error::AuditError,
    outcome::VerificationOutcome,
    tally::Tally,
    vscmr::{inspect_certificates, verify_signature_envelope, CertificateInspection},
};

fn is_bare_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    !name.contains(['/', '\\'])
        && matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
}

/// The kinds of result file a batch can process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Bulletin,
    DigitalVoteRecord,
    SignatureEnvelope,
}

impl EntryKind {
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Bulletin => ".bu",
            Self::DigitalVoteRecord => ".rdv",
            Self::SignatureEnvelope => ".vscmr",
        }
    }

    fn matches(self, name: &str) -> bool {
        name.to_ascii_lowercase().ends_with(self.suffix())
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("zip"))
}

/// A result file, standalone or inside an archive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Entry {
    File(PathBuf),
    Archived { archive: PathBuf, name: String },
}

impl Entry {
    /// The bare file name, without directories or archive.
    pub fn file_name(&self) -> String {
        let path = match self {
            Self::File(path) => path.as_path(),
            Self::Archived { name, .. } => Path::new(name),
        };
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Archived { archive, name } => write!(f, "{}:{name}", archive.display()),
        }
    }
}

#[derive(Debug)]
pub struct EntryFailure {
    pub entry: Entry,
    pub error: AuditError,
}

#[derive(Debug)]
pub struct BatchReport<T> {
    pub results: Vec<(Entry, T)>,
    pub failures: Vec<EntryFailure>,
    /// Whether the batch stopped early because it was cancelled.
    pub cancelled: bool,
}

impl<T> BatchReport<T> {
    /// Orders results and failures by entry. Entries are processed in
    /// parallel, so they arrive in no particular order.
    pub fn sort(&mut self) {
        self.results.sort_by(|(a, _), (b, _)| a.cmp(b));
        self.failures.sort_by(|a, b| a.entry.cmp(&b.entry));
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> BatchReport<U> {
        BatchReport {
            results: self
                .results
                .into_iter()
                .map(|(entry, value)| (entry, f(value)))
                .collect(),
            failures: self.failures,
            cancelled: self.cancelled,
        }
    }
}

/// Runs decoding and verification over many files in parallel.
#[derive(Debug, Default)]
pub struct Auditor {
    containers: ContainerCache,
    cancelled: Arc<AtomicBool>,
}

impl Auditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares `flag` as the cancellation flag: once it is set, no further
    /// entries are started.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Expands `paths` into the entries of `kind` they hold. Directories are
    /// listed without recursing, archives are searched by suffix, and
    /// files named directly are taken as they are.
    pub fn entries(&self, paths: &[PathBuf], kind: EntryKind) -> Result<Vec<Entry>, AuditError> {
        let mut entries = Vec::new();

        for path in paths {
            if path.is_dir() {
                let mut children = std::fs::read_dir(path)
                    .map_err(|error| AuditError::io(path, error))?
                    .map(|child| child.map(|child| child.path()))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|error| AuditError::io(path, error))?;
                children.sort();

                for child in children.into_iter().filter(|child| child.is_file()) {
                    if is_archive(&child) {
                        entries.extend(self.archive_entries(&child, kind)?);
                    } else if kind.matches(&child.to_string_lossy()) {
                        entries.push(Entry::File(child));
                    }
                }
            } else if is_archive(path) {
                entries.extend(self.archive_entries(path, kind)?);
            } else {
                entries.push(Entry::File(path.clone()));
            }
        }

        tracing::debug!(count = entries.len(), ?kind, "collected entries");
        Ok(entries)
    }

    fn archive_entries(
        &self,
        archive: &Path,
        kind: EntryKind,
    ) -> Result<impl Iterator<Item = Entry>, AuditError> {
        let archive = archive.to_owned();
        Ok(self
            .containers
            .entry_names(&archive, &[kind.suffix()])?
            .into_iter()
            .map(move |name| Entry::Archived {
                archive: archive.clone(),
                name,
            }))
    }

    pub fn read(&self, entry: &Entry) -> Result<Vec<u8>, AuditError> {
        match entry {
            Entry::File(path) => std::fs::read(path).map_err(|error| AuditError::io(path, error)),
            Entry::Archived { archive, name } => self
                .containers
                .read_entry(archive, name)?
                .ok_or_else(|| AuditError::archive(archive, zip::result::ZipError::FileNotFound)),
        }
    }

    /// Contents of the file called `name` next to `entry`, if there is one.
    /// `name` comes from a signed manifest, so anything but a bare file name
    /// is refused.
    pub fn sibling(&self, entry: &Entry, name: &str) -> Option<Vec<u8>> {
        if !is_bare_file_name(name) {
            tracing::warn!(%entry, name, "refusing signed file name outside the entry's directory");
            return None;
        }

        let result = match entry {
            Entry::File(path) => {
                let sibling = path.with_file_name(name);
                if !sibling.is_file() {
                    return None;
                }
                std::fs::read(&sibling).map_err(|error| AuditError::io(sibling, error))
            }
            Entry::Archived { archive, name: entry_name } => {
                let sibling = match entry_name.rsplit_once('/') {
                    Some((directory, _)) => format!("{directory}/{name}"),
                    None => name.to_owned(),
                };
                self.containers.read_entry(archive, &sibling).transpose()?
            }
        };

        result
            .map_err(|error| tracing::warn!(%error, %entry, name, "could not read signed file"))
            .ok()
    }

    /// Applies `process` to every entry of `kind` in parallel. Entries that
    /// fail are recorded and the batch carries on.
    pub fn process<T, F>(
        &self,
        paths: &[PathBuf],
        kind: EntryKind,
        process: F,
    ) -> Result<BatchReport<T>, AuditError>
    where
        T: Send,
        F: Fn(&Entry, Vec<u8>) -> Result<T, AuditError> + Sync,
    {
        let entries = self.entries(paths, kind)?;

        let (results, failures) = entries
            .into_par_iter()
            .fold(
                || (Vec::new(), Vec::new()),
                |(mut results, mut failures), entry| {
                    if self.is_cancelled() {
                        return (results, failures);
                    }

                    match self.read(&entry).and_then(|bytes| process(&entry, bytes)) {
                        Ok(value) => results.push((entry, value)),
                        Err(error) => {
                            tracing::warn!(%entry, %error, "skipping entry");
                            failures.push(EntryFailure { entry, error });
                        }
                    }
                    (results, failures)
                },
            )
            .reduce(
                || (Vec::new(), Vec::new()),
                |(mut results, mut failures), (more_results, more_failures)| {
                    results.extend(more_results);
                    failures.extend(more_failures);
                    (results, failures)
                },
            );

        let cancelled = self.is_cancelled();
        if cancelled {
            tracing::warn!(processed = results.len() + failures.len(), "batch cancelled");
        }

        Ok(BatchReport {
            results,
            failures,
            cancelled,
        })
    }

    pub fn bulletins(&self, paths: &[PathBuf]) -> Result<BatchReport<Bulletin>, AuditError> {
        self.process(paths, EntryKind::Bulletin, |_, bytes| {
            Ok(decode_enveloped::<Bulletin>(&bytes)?)
        })
    }

    pub fn vote_records(&self, paths: &[PathBuf]) -> Result<BatchReport<RdvFile>, AuditError> {
        self.process(paths, EntryKind::DigitalVoteRecord, |_, bytes| {
            Ok(decode_as::<RdvFile>(&bytes)?)
        })
    }

    /// Tallies every bulletin under `paths`. Each worker tallies its own
    /// share and the partial tallies are merged at the end.
    pub fn tally(
        &self,
        paths: &[PathBuf],
        offices: &[Office],
    ) -> Result<(Tally, BatchReport<()>), AuditError> {
        let report = self.process(paths, EntryKind::Bulletin, |_, bytes| {
            let bulletin = decode_enveloped::<Bulletin>(&bytes)?;
            let mut tally = Tally::new(offices);
            tally.add_bulletin(&bulletin);
            Ok(tally)
        })?;

        let BatchReport {
            results,
            failures,
            cancelled,
        } = report;
        let (entries, tallies): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        let tally = tallies
            .into_par_iter()
            .reduce(|| Tally::new(offices), Tally::merged);

        Ok((
            tally,
            BatchReport {
                results: entries.into_iter().map(|entry| (entry, ())).collect(),
                failures,
                cancelled,
            },
        ))
    }

    pub fn verify_bulletins(
        &self,
        paths: &[PathBuf],
    ) -> Result<BatchReport<Vec<VerificationOutcome>>, AuditError> {
        self.process(paths, EntryKind::Bulletin, |entry, bytes| {
            let bulletin = decode_enveloped::<Bulletin>(&bytes)?;
            let file_name = entry.file_name();
            Ok(verify_bulletin(&bulletin)
                .into_iter()
                .map(|outcome| outcome.in_file(&file_name))
                .collect())
        })
    }

    /// Verifies every signature envelope under `paths`, reading the signed
    /// files from the envelope's own directory or archive folder.
    pub fn verify_signature_envelopes(
        &self,
        paths: &[PathBuf],
    ) -> Result<BatchReport<Vec<VerificationOutcome>>, AuditError> {
        self.process(paths, EntryKind::SignatureEnvelope, |entry, bytes| {
            let envelope = decode_as::<SignatureEnvelope>(&bytes)?;
            let file_name = entry.file_name();
            Ok(
                verify_signature_envelope(&envelope, |name| self.sibling(entry, name))
                    .into_iter()
                    .map(|outcome| {
                        // per-file checks already name the signed file
                        if outcome.location.filename.is_some() {
                            outcome
                        } else {
                            outcome.in_file(&file_name)
                        }
                    })
                    .collect(),
            )
        })
    }

    pub fn inspect_certificates(
        &self,
        paths: &[PathBuf],
    ) -> Result<BatchReport<Vec<CertificateInspection>>, AuditError> {
        self.process(paths, EntryKind::SignatureEnvelope, |_, bytes| {
            Ok(inspect_certificates(&decode_as::<SignatureEnvelope>(&bytes)?))
        })
    }
}
