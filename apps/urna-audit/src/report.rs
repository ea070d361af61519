//! CSV and text rendering of audit results.

use std::{
    borrow::Cow,
    io::{self, Write},
};

use audit_rs::{MunicipalityLookup, Tally, VerificationOutcome};
use time::macros::format_description;
use types_rs::{Bulletin, Office, RdvFile};

/// Writes RFC 4180 rows: fields holding a comma, quote or line break are
/// quoted, with quotes doubled.
#[derive(Debug)]
pub(crate) struct CsvWriter<W: Write> {
    inner: W,
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

impl<W: Write> CsvWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner }
    }

    pub(crate) fn write_row<I, S>(&mut self, fields: I) -> io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let line = fields
            .into_iter()
            .map(|field| escape(field.as_ref()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        writeln!(self.inner, "{line}")
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

pub(crate) const OUTCOME_HEADER: [&str; 7] = [
    "municipality",
    "zone",
    "section",
    "filename",
    "check",
    "status",
    "error",
];

/// One row for `outcome`, naming the municipality when `municipalities`
/// knows it.
pub(crate) fn outcome_row(
    outcome: &VerificationOutcome,
    municipalities: &dyn MunicipalityLookup,
) -> [String; 7] {
    let location = &outcome.location;
    let municipality = location.municipality.map(|code| {
        municipalities
            .lookup(code)
            .map_or_else(|| code.to_string(), |found| found.name)
    });
    [
        municipality.unwrap_or_default(),
        optional(location.zone),
        optional(location.section),
        location.filename.clone().unwrap_or_default(),
        outcome.check.as_str().to_owned(),
        outcome.status.label().to_owned(),
        outcome.status.detail(),
    ]
}

pub(crate) fn bulletin_header(candidates: &[String]) -> Vec<String> {
    ["state", "municipality", "local", "section"]
        .into_iter()
        .map(str::to_owned)
        .chain(candidates.iter().cloned())
        .collect()
}

/// One row for `bulletin`: where it was counted and how many votes each of
/// `candidates` got for `office`.
pub(crate) fn bulletin_row(
    bulletin: &Bulletin,
    municipalities: &dyn MunicipalityLookup,
    office: Office,
    candidates: &[String],
) -> Vec<String> {
    let key = bulletin.section_key();
    let (state, municipality) = match municipalities.lookup(key.municipality) {
        Some(found) => (found.state, found.name),
        None => (String::new(), key.municipality.to_string()),
    };

    let mut tally = Tally::new(&[office]);
    tally.add_bulletin(bulletin);

    [state, municipality, key.local.to_string(), key.section.to_string()]
        .into_iter()
        .chain(
            candidates
                .iter()
                .map(|candidate| tally.get(office, candidate).to_string()),
        )
        .collect()
}

pub(crate) const VOTE_HEADER: [&str; 7] = [
    "filename",
    "election",
    "generated_at",
    "office",
    "max_choices",
    "kind",
    "typed",
];

/// One row per vote in `file`.
pub(crate) fn vote_rows(filename: &str, file: &RdvFile) -> tlv::Result<Vec<[String; 7]>> {
    let generated_at = file
        .header
        .generated_at
        .parse()
        .and_then(|at| {
            at.format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .ok()
        })
        .unwrap_or_else(|| file.header.generated_at.to_string());

    let elections = file.record.elections()?;
    let mut rows = Vec::new();
    for (election_id, offices) in elections.iter() {
        for office in offices {
            let office_name = office
                .office_code()
                .map_or_else(|_| "unknown".to_owned(), |code| code.to_string());
            for vote in &office.votes {
                rows.push([
                    filename.to_owned(),
                    election_id.to_string(),
                    generated_at.clone(),
                    office_name.clone(),
                    office.max_choices.to_string(),
                    vote.kind.to_string(),
                    vote.typed.clone().unwrap_or_default(),
                ]);
            }
        }
    }
    Ok(rows)
}

/// Prints each office followed by its vote counts, largest first.
pub(crate) fn write_tally(out: &mut dyn Write, tally: &Tally) -> io::Result<()> {
    for (office, counts) in tally.iter() {
        writeln!(out, "{office}")?;
        let mut counts = counts.iter().collect::<Vec<_>>();
        counts.sort_by(|(a_key, a), (b_key, b)| b.cmp(a).then_with(|| a_key.cmp(b_key)));
        for (key, count) in counts {
            writeln!(out, "  {key}: {count}")?;
        }
    }
    Ok(())
}
