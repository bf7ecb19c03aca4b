// SPDX-License-Identifier: MIT OR Apache-2.0

//! Expand one node into its related entities

use anyhow::Result;

use super::{with_engine, Context};
use crate::cli::OutputFormat;
use esco_search::output::{self, print_json};
use esco_search::NodeType;

/// Run the related command
pub fn run(ctx: &Context, uri: &str, node_type: Option<NodeType>) -> Result<()> {
    let cap = ctx.config.search().related_cap();
    let mut engine = ctx.open_engine()?;
    with_engine(&mut engine, |engine| {
        let graph = match node_type {
            Some(node_type) => engine.related(uri, node_type)?,
            None => engine.related_node(uri)?,
        };
        match ctx.format {
            OutputFormat::Json => print_json(&graph, ctx.compact)?,
            OutputFormat::Text => print!(
                "{}",
                output::format_expansion(&graph, cap, output::use_colors())
            ),
        }
        Ok(())
    })
}
