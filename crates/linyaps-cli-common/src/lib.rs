// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Shared traits and error/reporting conventions for the `ll-builder`
//! and `ll-cli` binaries.

mod error;

pub use error::{Error, Result};

/// Trait every CLI subcommand implements to be runnable, mirroring the
/// shape both binaries dispatch on after clap has parsed arguments.
#[async_trait::async_trait]
pub trait Run {
    async fn run(&mut self) -> Result<i32>;
}

/// Prints the three-line error format from §7: a trace hint, the
/// innermost message, and the child process stderr tail when the
/// error carries one.
pub fn print_error(err: &Error) {
    eprintln!("{}", "error".red().bold());
    eprintln!("{err}");
    if let Some(tail) = stderr_tail(err) {
        eprintln!("{}", tail.dimmed());
    }
}

fn stderr_tail(err: &Error) -> Option<String> {
    match err {
        Error::Builder(linyaps_builder::Error::CommandFailed { stderr_tail, .. }) => Some(stderr_tail.clone()),
        Error::Uab(linyaps_uab::Error::CommandFailed { stderr_tail, .. }) => Some(stderr_tail.clone()),
        _ => None,
    }
}

use colored::Colorize;
