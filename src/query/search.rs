// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic search command, plain or with occupation profiles

use anyhow::Result;

use super::{with_engine, Context};
use crate::cli::OutputFormat;
use esco_search::output::{
    self, print_json, ProfileParameters, ProfileSearchResponse, SearchResponse,
};
use esco_search::profile::PROFILE_FILTER;
use esco_search::TypeFilter;

/// Search options; unset values fall back to `[search]` configuration.
#[derive(Debug, Clone)]
pub struct SearchArgs {
    pub query: String,
    pub node_type: Option<TypeFilter>,
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
    pub related: bool,
    pub profile_search: bool,
    pub search_only: bool,
}

/// Run the search command
pub fn run(ctx: &Context, args: SearchArgs) -> Result<()> {
    let defaults = ctx.config.search();
    let filter = match args.node_type {
        Some(filter) => filter,
        None => defaults.node_type()?,
    };
    let limit = args.limit.unwrap_or_else(|| defaults.limit());
    let threshold = args.threshold.unwrap_or_else(|| defaults.threshold());
    let cap = defaults.related_cap();

    let mut engine = ctx.open_engine()?;
    with_engine(&mut engine, |engine| {
        if args.profile_search {
            if args.search_only {
                engine.ensure_indexed(PROFILE_FILTER)?;
            }
            let outcome = engine.profile_search(&args.query, filter, limit, threshold)?;
            match ctx.format {
                OutputFormat::Json => print_json(
                    &ProfileSearchResponse {
                        query: &args.query,
                        parameters: ProfileParameters {
                            limit,
                            similarity_threshold: threshold,
                        },
                        results: &outcome.profiles,
                        type_override: outcome.type_override,
                    },
                    ctx.compact,
                )?,
                OutputFormat::Text => print!(
                    "{}",
                    output::format_profiles(
                        &args.query,
                        filter,
                        threshold,
                        &outcome,
                        cap,
                        output::use_colors()
                    )
                ),
            }
            return Ok(());
        }

        if args.search_only {
            engine.ensure_indexed(filter)?;
        }
        let results = engine.search(&args.query, filter, limit, threshold)?;
        let related = if args.related {
            engine.related_to_top(&results)?
        } else {
            None
        };

        match ctx.format {
            OutputFormat::Json => print_json(
                &SearchResponse {
                    query: &args.query,
                    results: &results,
                    related_graph: related.as_ref(),
                },
                ctx.compact,
            )?,
            OutputFormat::Text => print!(
                "{}",
                output::format_search(
                    &args.query,
                    filter,
                    threshold,
                    &results,
                    related.as_ref(),
                    cap,
                    output::use_colors()
                )
            ),
        }
        Ok(())
    })
}
