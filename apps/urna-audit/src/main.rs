//! `urna-audit` reads the result files a voting machine writes at the close
//! of a polling section: ballot box bulletins (`.bu`), digital vote records
//! (`.rdv`), and the signature envelopes (`.vscmr`) that cover them. It sums
//! votes, checks signatures and exports CSV reports. Files may be given
//! directly, by directory, or inside `.zip` archives.

#![warn(
    clippy::all,
    clippy::todo,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::mem_forget,
    clippy::unused_self,
    clippy::filter_map_next,
    clippy::needless_continue,
    clippy::needless_borrow,
    clippy::match_wildcard_for_single_variants,
    clippy::if_let_mutex,
    clippy::match_on_vec_items,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::fn_params_excessive_bools,
    clippy::exit,
    clippy::inefficient_to_string,
    clippy::linkedlist,
    clippy::macro_use_imports,
    clippy::option_option,
    clippy::verbose_file_reads,
    clippy::unnested_or_patterns,
    clippy::str_to_string,
    rust_2018_idioms,
    future_incompatible,
    nonstandard_style,
    missing_debug_implementations,
    missing_docs
)]
#![allow(elided_lifetimes_in_paths, clippy::type_complexity)]
#![forbid(unsafe_code)]
#![cfg_attr(not(test), warn(clippy::dbg_macro))]

use std::sync::atomic::Ordering;

use audit_rs::Auditor;
use clap::Parser;

use crate::config::Config;

mod commands;
mod config;
mod log;
mod report;

fn main() -> color_eyre::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();
    let config = Config::parse();
    log::setup(&config)?;

    let auditor = Auditor::new();
    let cancelled = auditor.cancel_flag();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupted, finishing the files in progress");
        cancelled.store(true, Ordering::SeqCst);
    })?;

    commands::run(&config, &auditor)
}
