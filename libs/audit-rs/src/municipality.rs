//! Municipality code to name lookup.

use std::{
    collections::HashMap,
    fmt::Display,
    path::Path,
    sync::{Mutex, PoisonError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Municipality {
    pub name: String,
    /// Two-letter state abbreviation.
    pub state: String,
}

impl Display for Municipality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.state)
    }
}

pub trait MunicipalityLookup: Send + Sync {
    fn lookup(&self, code: u32) -> Option<Municipality>;
}

/// Used when no reference table is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMunicipalities;

impl MunicipalityLookup for NoMunicipalities {
    fn lookup(&self, _code: u32) -> Option<Municipality> {
        None
    }
}

/// Reads `code,name,state` rows. A header row, blank lines and rows with
/// a non-numeric code are ignored. Codes are resolved lazily and the
/// answers, including misses, are cached.
#[derive(Debug)]
pub struct CsvMunicipalities {
    source: String,
    cache: Mutex<HashMap<u32, Option<Municipality>>>,
}

impl CsvMunicipalities {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::read_to_string(path)?))
    }

    fn find(&self, code: u32) -> Option<Municipality> {
        self.source.lines().find_map(|line| {
            let mut fields = line.split(',').map(|field| field.trim().trim_matches('"'));
            let row_code = fields.next()?.parse::<u32>().ok()?;
            if row_code != code {
                return None;
            }

            let name = fields.next()?;
            let state = fields.next()?;
            Some(Municipality {
                name: name.to_owned(),
                state: state.to_owned(),
            })
        })
    }
}

impl MunicipalityLookup for CsvMunicipalities {
    fn lookup(&self, code: u32) -> Option<Municipality> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .entry(code)
            .or_insert_with(|| {
                let found = self.find(code);
                if found.is_none() {
                    tracing::debug!(code, "municipality not found");
                }
                found
            })
            .clone()
    }
}
