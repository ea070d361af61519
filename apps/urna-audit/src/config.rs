//! Command-line configuration.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use types_rs::Office;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about)]
pub(crate) struct Config {
    /// Log level.
    #[arg(long, env = "LOG_LEVEL", default_value = "warn", global = true)]
    pub(crate) log_level: tracing::Level,

    /// CSV file of `code,name,state` rows used to name municipalities.
    #[arg(long, env = "MUNICIPALITIES_CSV", global = true)]
    pub(crate) municipalities_csv: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum Command {
    /// Ballot box bulletins (`.bu`).
    #[command(subcommand)]
    Bu(BuCommand),

    /// Digital vote records (`.rdv`).
    #[command(subcommand)]
    Rdv(RdvCommand),

    /// Signature envelopes (`.vscmr`).
    #[command(subcommand)]
    Vscmr(VscmrCommand),
}

/// Files, directories or `.zip` archives to read.
#[derive(Debug, Clone, Args)]
pub(crate) struct Sources {
    #[arg(required = true)]
    pub(crate) paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct Output {
    /// Write to this file instead of standard output.
    #[arg(long, short)]
    pub(crate) out: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum BuCommand {
    /// Sum the votes of every bulletin per office and candidate.
    Count {
        /// Office to count, in English or Portuguese. May be repeated;
        /// defaults to every office.
        #[arg(long = "office")]
        offices: Vec<Office>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        sources: Sources,
    },

    /// Check the signature of every candidate vote total.
    Verify {
        /// Only print checks that did not pass.
        #[arg(long)]
        failures_only: bool,

        #[command(flatten)]
        sources: Sources,
    },

    /// One CSV row per bulletin with the votes of the given candidates.
    Csv {
        #[arg(long)]
        office: Office,

        /// Candidate numbers, `Blank` or `Null`, separated by commas.
        #[arg(long, value_delimiter = ',', required = true)]
        candidates: Vec<String>,

        #[command(flatten)]
        output: Output,

        #[command(flatten)]
        sources: Sources,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum RdvCommand {
    /// One CSV row per recorded vote.
    Csv {
        #[command(flatten)]
        output: Output,

        #[command(flatten)]
        sources: Sources,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum VscmrCommand {
    /// Check the signature envelopes and the files they sign.
    Verify {
        /// Only print checks that did not pass.
        #[arg(long)]
        failures_only: bool,

        #[command(flatten)]
        sources: Sources,
    },

    /// Write the result of every check as CSV.
    Csv {
        #[command(flatten)]
        output: Output,

        #[command(flatten)]
        sources: Sources,
    },

    /// Show whether the embedded certificates can be read.
    Cert {
        #[command(flatten)]
        sources: Sources,
    },

    /// Write every readable embedded certificate as PEM.
    Export {
        /// Directory to write certificates to.
        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        sources: Sources,
    },
}
