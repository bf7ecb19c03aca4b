// SPDX-License-Identifier: MIT OR Apache-2.0

//! esco - semantic search over the ESCO taxonomy
//!
//! Embeds a free-text query, ranks skills and occupations stored in a graph
//! or vector backend, and optionally expands results into related entities
//! or full occupation profiles.

mod cli;
mod query;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use esco_search::logging::{self, LogLevel};

fn main() -> Result<()> {
    let cli = Cli::parse();
    // ESCO_LOG overrides the flag-derived level (e.g. ESCO_LOG=debug esco search "cook")
    logging::init(LogLevel::from_flags(cli.quiet, cli.verbose));

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "esco", &mut std::io::stdout());
        return Ok(());
    }

    let ctx = query::Context::from_cli(&cli)?;

    match cli.command {
        Commands::Search {
            query,
            node_type,
            limit,
            threshold,
            related,
            profile_search,
            search_only,
        } => {
            query::search::run(
                &ctx,
                query::search::SearchArgs {
                    query,
                    node_type: node_type.map(Into::into),
                    limit,
                    threshold,
                    related,
                    profile_search,
                    search_only,
                },
            )?;
        }
        Commands::Related { uri, node_type } => {
            query::related::run(&ctx, &uri, node_type.map(Into::into))?;
        }
        Commands::Status => {
            query::status::run(&ctx)?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
