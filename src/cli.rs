// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use esco_search::config::BackendKind;
use esco_search::model::{NodeType, TypeFilter};

/// esco - semantic search over the ESCO taxonomy
///
/// Ranks skills and occupations against free-text queries, expands entries
/// into their related entities and builds occupation profiles.
#[derive(Parser, Debug)]
#[command(name = "esco")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to .escorc.toml, then ~/.config/esco/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend profile from the configuration file
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Storage backend (overrides configuration)
    #[arg(long, global = true, value_enum)]
    pub backend: Option<CliBackend>,

    /// Taxonomy database path (overrides configuration)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Compact JSON output (no pretty formatting)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log progress information
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliBackend {
    Graph,
    Vector,
}

impl From<CliBackend> for BackendKind {
    fn from(value: CliBackend) -> Self {
        match value {
            CliBackend::Graph => BackendKind::Graph,
            CliBackend::Vector => BackendKind::Vector,
        }
    }
}

/// Search type filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliNodeType {
    Skill,
    Occupation,
    Both,
}

impl From<CliNodeType> for TypeFilter {
    fn from(value: CliNodeType) -> Self {
        match value {
            CliNodeType::Skill => TypeFilter::Skill,
            CliNodeType::Occupation => TypeFilter::Occupation,
            CliNodeType::Both => TypeFilter::Both,
        }
    }
}

/// Entity type for `related`
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliEntityType {
    Skill,
    Occupation,
    SkillGroup,
    #[value(name = "isco-group", alias = "iscogroup")]
    IscoGroup,
}

impl From<CliEntityType> for NodeType {
    fn from(value: CliEntityType) -> Self {
        match value {
            CliEntityType::Skill => NodeType::Skill,
            CliEntityType::Occupation => NodeType::Occupation,
            CliEntityType::SkillGroup => NodeType::SkillGroup,
            CliEntityType::IscoGroup => NodeType::IscoGroup,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Semantic search over skills and occupations
    #[command(alias = "s")]
    Search {
        /// Free-text query
        query: String,

        /// Restrict results to one node type
        #[arg(short = 't', long = "type", value_enum)]
        node_type: Option<CliNodeType>,

        /// Maximum number of results
        #[arg(short = 'l', long)]
        limit: Option<usize>,

        /// Minimum similarity score (0.0-1.0)
        #[arg(long)]
        threshold: Option<f32>,

        /// Expand the top result into its related entities
        #[arg(long)]
        related: bool,

        /// Search occupations and return complete profiles
        #[arg(long, conflicts_with = "related")]
        profile_search: bool,

        /// Fail instead of searching when the store holds no embeddings
        #[arg(long)]
        search_only: bool,
    },

    /// Show every entity related to one URI
    Related {
        /// Node URI
        uri: String,

        /// Node type (looked up when omitted)
        #[arg(short = 't', long = "type", value_enum)]
        node_type: Option<CliEntityType>,
    },

    /// Show what the configured store holds
    Status,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
