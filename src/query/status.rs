// SPDX-License-Identifier: MIT OR Apache-2.0

//! Report index contents for the configured backend

use anyhow::Result;

use super::{with_engine, Context};
use crate::cli::OutputFormat;
use esco_search::output::{self, print_json, StatusResponse};

/// Run the status command
pub fn run(ctx: &Context) -> Result<()> {
    let mut engine = ctx.open_engine()?;
    with_engine(&mut engine, |engine| {
        let stats = engine.index_stats()?;
        match ctx.format {
            OutputFormat::Json => print_json(&StatusResponse::new(&stats), ctx.compact)?,
            OutputFormat::Text => print!("{}", output::format_status(&stats, output::use_colors())),
        }
        Ok(())
    })
}
