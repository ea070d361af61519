use std::collections::BTreeMap;

use serde::Serialize;
use types_rs::{Bulletin, CandidateVoteTotal, Office, VoteKind};

pub const BLANK: &str = "Blank";
pub const NULL: &str = "Null";

/// Summed vote counts per office and candidate key. The candidate key is
/// the candidate number for nominal and slate votes, or [`BLANK`] and
/// [`NULL`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tally(BTreeMap<Office, BTreeMap<String, u64>>);

fn candidate_key(total: &CandidateVoteTotal) -> Option<String> {
    match total.kind {
        VoteKind::Nominal | VoteKind::Slate => {
            total.candidate.map(|candidate| candidate.number.to_string())
        }
        VoteKind::Blank => Some(BLANK.to_owned()),
        VoteKind::Null => Some(NULL.to_owned()),
        VoteKind::NoCandidate => None,
    }
}

/// Adds `count` to the running total, pinning it at `u64::MAX` instead of
/// wrapping.
fn accumulate(sum: &mut u64, count: u64, office: Office, key: &str) {
    *sum = sum.checked_add(count).unwrap_or_else(|| {
        tracing::warn!(%office, key, count, "vote count overflowed, saturating");
        u64::MAX
    });
}

impl Tally {
    /// An empty tally over `offices`, or over every office when `offices`
    /// is empty. Only these offices are ever counted.
    pub fn new(offices: &[Office]) -> Self {
        let offices = if offices.is_empty() {
            &Office::ALL[..]
        } else {
            offices
        };

        Self(
            offices
                .iter()
                .map(|office| (*office, BTreeMap::new()))
                .collect(),
        )
    }

    #[tracing::instrument(level = "trace", skip_all, fields(section = %bulletin.section_key()))]
    pub fn add_bulletin(&mut self, bulletin: &Bulletin) {
        for (office_total, total) in bulletin.vote_totals() {
            let office = match office_total.office_code() {
                Ok(code) => match code.office() {
                    Some(office) => office,
                    None => {
                        tracing::trace!(%code, "skipping consultation vote total");
                        continue;
                    }
                },
                Err(error) => {
                    tracing::debug!(%error, "skipping vote total with unknown office code");
                    continue;
                }
            };

            let Some(candidates) = self.0.get_mut(&office) else {
                continue;
            };

            let Some(key) = candidate_key(total) else {
                if total.kind != VoteKind::NoCandidate {
                    tracing::debug!(%office, kind = ?total.kind, "skipping vote total without a candidate");
                }
                continue;
            };

            let sum = candidates.entry(key.clone()).or_default();
            accumulate(sum, total.count, office, &key);
        }
    }

    /// Adds every count of `other` into this tally.
    pub fn merge(&mut self, other: Tally) {
        for (office, candidates) in other.0 {
            let entry = self.0.entry(office).or_default();
            for (key, count) in candidates {
                let sum = entry.entry(key.clone()).or_default();
                accumulate(sum, count, office, &key);
            }
        }
    }

    #[must_use]
    pub fn merged(mut self, other: Tally) -> Self {
        self.merge(other);
        self
    }

    pub fn get(&self, office: Office, key: &str) -> u64 {
        self.office(office)
            .and_then(|candidates| candidates.get(key))
            .copied()
            .unwrap_or_default()
    }

    pub fn office(&self, office: Office) -> Option<&BTreeMap<String, u64>> {
        self.0.get(&office)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Office, &BTreeMap<String, u64>)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> BTreeMap<Office, BTreeMap<String, u64>> {
        self.0
    }
}

/// Sums the vote totals of `bulletins` for `offices` (every office when
/// empty).
pub fn tally(bulletins: &[Bulletin], offices: &[Office]) -> BTreeMap<Office, BTreeMap<String, u64>> {
    let mut tally = Tally::new(offices);
    for bulletin in bulletins {
        tally.add_bulletin(bulletin);
    }
    tally.into_inner()
}
