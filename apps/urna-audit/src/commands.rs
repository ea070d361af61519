//! Subcommand implementations.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use audit_rs::{
    Auditor, BatchReport, CsvMunicipalities, MunicipalityLookup, NoMunicipalities,
    VerificationOutcome,
};
use color_eyre::eyre::{bail, WrapErr};
use types_rs::Office;

use crate::{
    config::{BuCommand, Command, Config, RdvCommand, VscmrCommand},
    report::{self, CsvWriter},
};

pub(crate) fn run(config: &Config, auditor: &Auditor) -> color_eyre::Result<()> {
    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    match &config.command {
        Command::Bu(BuCommand::Count {
            offices,
            json,
            sources,
        }) => bu_count(auditor, &sources.paths, offices, *json, &mut stdout),
        Command::Bu(BuCommand::Verify {
            failures_only,
            sources,
        }) => print_outcomes(
            auditor.verify_bulletins(&sources.paths)?,
            *failures_only,
            &mut stdout,
        ),
        Command::Bu(BuCommand::Csv {
            office,
            candidates,
            output,
            sources,
        }) => {
            let municipalities = municipalities(config.municipalities_csv.as_deref())?;
            let mut out = CsvWriter::new(open_output(output.out.as_deref(), &mut stdout)?);
            bu_csv(
                auditor,
                &sources.paths,
                municipalities.as_ref(),
                *office,
                candidates,
                &mut out,
            )
        }
        Command::Rdv(RdvCommand::Csv { output, sources }) => {
            let mut out = CsvWriter::new(open_output(output.out.as_deref(), &mut stdout)?);
            rdv_csv(auditor, &sources.paths, &mut out)
        }
        Command::Vscmr(VscmrCommand::Verify {
            failures_only,
            sources,
        }) => print_outcomes(
            auditor.verify_signature_envelopes(&sources.paths)?,
            *failures_only,
            &mut stdout,
        ),
        Command::Vscmr(VscmrCommand::Csv { output, sources }) => {
            let municipalities = municipalities(config.municipalities_csv.as_deref())?;
            let mut out = CsvWriter::new(open_output(output.out.as_deref(), &mut stdout)?);
            vscmr_csv(auditor, &sources.paths, municipalities.as_ref(), &mut out)
        }
        Command::Vscmr(VscmrCommand::Cert { sources }) => {
            vscmr_cert(auditor, &sources.paths, &mut stdout)
        }
        Command::Vscmr(VscmrCommand::Export { out, sources }) => {
            vscmr_export(auditor, &sources.paths, out, &mut stdout)
        }
    }
}

fn municipalities(path: Option<&Path>) -> color_eyre::Result<Box<dyn MunicipalityLookup>> {
    match path {
        Some(path) => Ok(Box::new(CsvMunicipalities::from_path(path).wrap_err_with(
            || format!("reading municipalities from {}", path.display()),
        )?)),
        None => Ok(Box::new(NoMunicipalities)),
    }
}

fn open_output<'a>(
    path: Option<&Path>,
    stdout: &'a mut dyn Write,
) -> color_eyre::Result<Box<dyn Write + 'a>> {
    match path {
        Some(path) => {
            let file =
                File::create(path).wrap_err_with(|| format!("creating {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(stdout)),
    }
}

/// Fails when the batch was interrupted or some entries could not be read.
/// The entries themselves were already logged while processing.
fn check_report<T>(report: &BatchReport<T>) -> color_eyre::Result<()> {
    if report.cancelled {
        bail!("interrupted after {} entries", report.results.len());
    }
    if !report.failures.is_empty() {
        for failure in &report.failures {
            tracing::error!(entry = %failure.entry, error = %failure.error, "unreadable entry");
        }
        bail!("{} entries could not be read", report.failures.len());
    }
    Ok(())
}

fn bu_count(
    auditor: &Auditor,
    paths: &[PathBuf],
    offices: &[Office],
    json: bool,
    out: &mut dyn Write,
) -> color_eyre::Result<()> {
    let (tally, report) = auditor.tally(paths, offices)?;
    tracing::info!(bulletins = report.results.len(), "tallied");

    if json {
        serde_json::to_writer_pretty(&mut *out, &tally)?;
        writeln!(out)?;
    } else {
        report::write_tally(out, &tally)?;
    }
    check_report(&report)
}

fn print_outcomes(
    mut report: BatchReport<Vec<VerificationOutcome>>,
    failures_only: bool,
    out: &mut dyn Write,
) -> color_eyre::Result<()> {
    report.sort();

    let mut failed = 0;
    for (entry, outcomes) in &report.results {
        for outcome in outcomes {
            if outcome.status.is_failed() {
                failed += 1;
            } else if failures_only {
                continue;
            }
            writeln!(out, "{entry}: {outcome}")?;
        }
    }

    check_report(&report)?;
    if failed > 0 {
        bail!("{failed} checks failed");
    }
    Ok(())
}

fn bu_csv<W: Write>(
    auditor: &Auditor,
    paths: &[PathBuf],
    municipalities: &dyn MunicipalityLookup,
    office: Office,
    candidates: &[String],
    out: &mut CsvWriter<W>,
) -> color_eyre::Result<()> {
    let mut report = auditor.bulletins(paths)?;
    report.sort();

    out.write_row(report::bulletin_header(candidates))?;
    for (_, bulletin) in &report.results {
        out.write_row(report::bulletin_row(
            bulletin,
            municipalities,
            office,
            candidates,
        ))?;
    }
    out.flush()?;
    check_report(&report)
}

fn rdv_csv<W: Write>(
    auditor: &Auditor,
    paths: &[PathBuf],
    out: &mut CsvWriter<W>,
) -> color_eyre::Result<()> {
    let mut report = auditor.vote_records(paths)?;
    report.sort();

    out.write_row(report::VOTE_HEADER)?;
    let mut unreadable = 0;
    for (entry, file) in &report.results {
        match report::vote_rows(&entry.file_name(), file) {
            Ok(rows) => {
                for row in rows {
                    out.write_row(row)?;
                }
            }
            Err(error) => {
                unreadable += 1;
                tracing::error!(%entry, %error, "unreadable vote record");
            }
        }
    }
    out.flush()?;

    check_report(&report)?;
    if unreadable > 0 {
        bail!("{unreadable} vote records could not be read");
    }
    Ok(())
}

fn vscmr_csv<W: Write>(
    auditor: &Auditor,
    paths: &[PathBuf],
    municipalities: &dyn MunicipalityLookup,
    out: &mut CsvWriter<W>,
) -> color_eyre::Result<()> {
    let mut report = auditor.verify_signature_envelopes(paths)?;
    report.sort();

    out.write_row(report::OUTCOME_HEADER)?;
    for outcome in report.results.iter().flat_map(|(_, outcomes)| outcomes) {
        out.write_row(report::outcome_row(outcome, municipalities))?;
    }
    out.flush()?;
    check_report(&report)
}

fn vscmr_cert(auditor: &Auditor, paths: &[PathBuf], out: &mut dyn Write) -> color_eyre::Result<()> {
    let mut report = auditor.inspect_certificates(paths)?;
    report.sort();

    for (entry, inspections) in &report.results {
        for inspection in inspections {
            writeln!(out, "{entry}: {}", inspection.outcome())?;
        }
    }
    check_report(&report)
}

fn vscmr_export(
    auditor: &Auditor,
    paths: &[PathBuf],
    directory: &Path,
    out: &mut dyn Write,
) -> color_eyre::Result<()> {
    std::fs::create_dir_all(directory)
        .wrap_err_with(|| format!("creating {}", directory.display()))?;

    let mut report = auditor.inspect_certificates(paths)?;
    report.sort();

    for (entry, inspections) in &report.results {
        let name = entry.file_name();
        let stem = Path::new(&name)
            .file_stem()
            .map_or_else(|| name.clone(), |stem| stem.to_string_lossy().into_owned());

        for inspection in inspections {
            let Some(parsed) = inspection.certificate() else {
                continue;
            };
            let path = directory.join(format!("{stem}-{}.pem", inspection.origin));
            std::fs::write(&path, parsed.certificate.to_pem()?)
                .wrap_err_with(|| format!("writing {}", path.display()))?;
            writeln!(out, "{}", path.display())?;
        }
    }
    check_report(&report)
}
