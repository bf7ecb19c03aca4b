// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output and color utilities for consistent terminal formatting
//!
//! Text renderers return strings so commands decide where they go. Colors
//! respect the NO_COLOR environment variable and are off when stdout is not
//! a terminal. Related groups are capped here, never in the engine.

use colored::Colorize;
use serde::Serialize;
use std::io::IsTerminal;

use crate::backend::IndexStats;
use crate::model::{NodeType, Profile, RelatedGraph, SearchResult, TypeFilter};
use crate::profile::{ProfileSearch, TypeOverride};

const WIDTH: usize = 80;
const DESCRIPTION_LIMIT: usize = 100;

/// Check if colors should be used
pub fn use_colors() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

/// Colorize banner title (magenta)
pub fn colorize_header(text: &str, use_color: bool) -> String {
    if use_color {
        text.magenta().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize section title (blue)
pub fn colorize_section(text: &str, use_color: bool) -> String {
    if use_color {
        text.blue().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize node type tag and warnings (yellow)
pub fn colorize_type(text: &str, use_color: bool) -> String {
    if use_color {
        text.yellow().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize score (green)
pub fn colorize_score(text: &str, use_color: bool) -> String {
    if use_color {
        text.green().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize label or field name (bold)
pub fn colorize_bold(text: &str, use_color: bool) -> String {
    if use_color {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

fn center(text: &str, fill: char) -> String {
    let padded = format!(" {} ", text);
    let len = padded.chars().count();
    if len >= WIDTH {
        return padded;
    }
    let left = (WIDTH - len) / 2;
    let right = WIDTH - len - left;
    format!(
        "{}{}{}",
        fill.to_string().repeat(left),
        padded,
        fill.to_string().repeat(right)
    )
}

/// Full-width banner framed by `=` rules.
pub fn header(text: &str, use_color: bool) -> String {
    let rule = "=".repeat(WIDTH);
    format!(
        "\n{}\n{}\n{}\n",
        rule,
        colorize_header(&center(text, '='), use_color),
        rule
    )
}

/// Full-width banner framed by `-` rules.
pub fn section(text: &str, use_color: bool) -> String {
    let rule = "-".repeat(WIDTH);
    format!(
        "\n{}\n{}\n{}\n",
        rule,
        colorize_section(&center(text, '-'), use_color),
        rule
    )
}

/// Descriptions over 100 characters keep 97 and end in `...`.
pub fn truncate_description(description: &str) -> String {
    if description.chars().count() <= DESCRIPTION_LIMIT {
        return description.to_string();
    }
    let kept: String = description.chars().take(DESCRIPTION_LIMIT - 3).collect();
    format!("{}...", kept)
}

/// `N. [Type] label (Score: 0.1234)` plus an optional description line.
pub fn format_result(result: &SearchResult, index: Option<usize>, use_color: bool) -> String {
    let prefix = match index {
        Some(i) => format!("{}. ", i),
        None => "• ".to_string(),
    };
    let mut out = format!(
        "{}{} {} {}",
        prefix,
        colorize_type(&format!("[{}]", result.node_type()), use_color),
        result.label(),
        colorize_score(&format!("(Score: {:.4})", result.score), use_color)
    );
    if let Some(description) = result.node.description.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&format!(
            "\n   {} {}",
            colorize_bold("Description:", use_color),
            truncate_description(description)
        ));
    }
    out
}

/// Non-empty groups with at most `cap` labels each.
pub fn format_related(graph: &RelatedGraph, cap: usize, use_color: bool) -> String {
    let mut out = section(
        &format!("Related entities for '{}'", graph.node.label),
        use_color,
    );
    for (group, nodes) in graph.non_empty_groups() {
        out.push_str(&format!(
            "\n{} ({}):\n",
            colorize_bold(&group.title(), use_color),
            nodes.len()
        ));
        for node in nodes.iter().take(cap) {
            out.push_str(&format!("  • {}\n", node.label));
        }
        if nodes.len() > cap {
            out.push_str(&format!("  ... and {} more\n", nodes.len() - cap));
        }
    }
    out
}

fn query_banner(query: &str, filter: TypeFilter, threshold: f32, use_color: bool) -> String {
    let mut out = header("ESCO Semantic Search", use_color);
    out.push_str(&format!("Query: {}\n", colorize_bold(query, use_color)));
    out.push_str(&format!(
        "Type: {}\n",
        colorize_bold(filter.as_str(), use_color)
    ));
    out.push_str(&format!(
        "Threshold: {}\n",
        colorize_bold(&threshold.to_string(), use_color)
    ));
    out
}

fn no_results(use_color: bool) -> String {
    format!("\n{}\n", colorize_type("No results found.", use_color))
}

/// Text page for a plain search, with the optional top-result expansion.
pub fn format_search(
    query: &str,
    filter: TypeFilter,
    threshold: f32,
    results: &[SearchResult],
    related: Option<&RelatedGraph>,
    cap: usize,
    use_color: bool,
) -> String {
    let mut out = query_banner(query, filter, threshold, use_color);
    if results.is_empty() {
        out.push_str(&no_results(use_color));
        return out;
    }

    out.push_str(&section("Search Results", use_color));
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format_result(result, Some(i + 1), use_color));
        out.push('\n');
    }
    if let Some(graph) = related {
        out.push_str(&format_related(graph, cap, use_color));
    }
    out
}

/// Text page for a profile search.
pub fn format_profiles(
    query: &str,
    requested: TypeFilter,
    threshold: f32,
    search: &ProfileSearch,
    cap: usize,
    use_color: bool,
) -> String {
    let mut out = query_banner(query, requested, threshold, use_color);
    if let Some(TypeOverride { applied, .. }) = search.type_override {
        out.push_str(&format!(
            "\n{}\n",
            colorize_type(
                &format!(
                    "Warning: Profile search is only available for {} type. Switching to {} type.",
                    applied, applied
                ),
                use_color
            )
        ));
    }
    if search.profiles.is_empty() {
        out.push_str(&no_results(use_color));
        return out;
    }

    out.push_str(&section("Search Results with Profiles", use_color));
    for (i, profile) in search.profiles.iter().enumerate() {
        out.push_str(&format_result(&profile.search_result, Some(i + 1), use_color));
        out.push('\n');
        out.push_str(&format_related(&profile.profile, cap, use_color));
    }
    out
}

/// Text page for `esco related`.
pub fn format_expansion(graph: &RelatedGraph, cap: usize, use_color: bool) -> String {
    let mut out = header("ESCO Related Entities", use_color);
    out.push_str(&format!(
        "{} {} <{}>\n",
        colorize_type(&format!("[{}]", graph.node.node_type), use_color),
        colorize_bold(&graph.node.label, use_color),
        graph.node.uri
    ));
    if graph.total_related() == 0 {
        out.push_str(&format!(
            "\n{}\n",
            colorize_type("No related entities.", use_color)
        ));
        return out;
    }
    out.push_str(&format_related(graph, cap, use_color));
    out
}

/// Text page for `esco status`.
pub fn format_status(stats: &IndexStats, use_color: bool) -> String {
    let mut out = header("ESCO Index Status", use_color);
    out.push_str(&format!(
        "Backend: {}\n\n",
        colorize_bold(stats.backend, use_color)
    ));
    for node_type in NodeType::ALL {
        out.push_str(&format!(
            "{:<12} {:>8} nodes {:>8} embedded\n",
            node_type.as_str(),
            stats.node_count(node_type),
            stats.embedded_count(node_type)
        ));
    }
    out.push_str(&format!("{:<12} {:>8}\n", "Relations", stats.relations));

    let problems = stats.validate();
    if problems.is_empty() {
        out.push_str(&format!("\n{}\n", colorize_score("✓ Index is valid", use_color)));
    } else {
        for problem in problems {
            out.push_str(&format!("\n{}", colorize_type(&format!("! {}", problem), use_color)));
        }
        out.push('\n');
    }
    out
}

/// JSON body for a plain search.
#[derive(Debug, Serialize)]
pub struct SearchResponse<'a> {
    pub query: &'a str,
    pub results: &'a [SearchResult],
    pub related_graph: Option<&'a RelatedGraph>,
}

#[derive(Debug, Serialize)]
pub struct ProfileParameters {
    pub limit: usize,
    pub similarity_threshold: f32,
}

/// JSON body for a profile search.
#[derive(Debug, Serialize)]
pub struct ProfileSearchResponse<'a> {
    pub query: &'a str,
    pub parameters: ProfileParameters,
    pub results: &'a [Profile],
    pub type_override: Option<TypeOverride>,
}

/// JSON body for `esco status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse<'a> {
    #[serde(flatten)]
    pub stats: &'a IndexStats,
    pub valid: bool,
    pub problems: Vec<String>,
}

impl<'a> StatusResponse<'a> {
    pub fn new(stats: &'a IndexStats) -> Self {
        let problems = stats.validate();
        Self {
            stats,
            valid: problems.is_empty(),
            problems,
        }
    }
}

/// Pretty-printed unless `compact`.
pub fn to_json<T: Serialize>(value: &T, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
}

/// Writes `value` as JSON to stdout.
pub fn print_json<T: Serialize>(value: &T, compact: bool) -> serde_json::Result<()> {
    println!("{}", to_json(value, compact)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, RelationGroup};

    fn chef_graph(skills: usize) -> RelatedGraph {
        let mut graph = RelatedGraph::empty(Node::new("o:chef", NodeType::Occupation, "Chef"));
        graph.related.insert(
            RelationGroup::EssentialSkills,
            (0..skills)
                .map(|i| Node::new(format!("s:{}", i), NodeType::Skill, format!("skill {}", i)))
                .collect(),
        );
        graph
    }

    #[test]
    fn test_truncate_description() {
        let short = "a".repeat(100);
        assert_eq!(truncate_description(&short), short);

        let long = "é".repeat(101);
        let truncated = truncate_description(&long);
        assert_eq!(truncated.chars().count(), 100);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_format_result_plain() {
        let result = SearchResult::new(
            Node::new("s:py", NodeType::Skill, "Python").with_description("programming language"),
            0.87654,
        );
        assert_eq!(
            format_result(&result, Some(1), false),
            "1. [Skill] Python (Score: 0.8765)\n   Description: programming language"
        );
    }

    #[test]
    fn test_related_groups_are_capped_for_display() {
        let text = format_related(&chef_graph(7), 5, false);
        assert!(text.contains("Essential Skills (7):"));
        assert!(text.contains("  • skill 4\n"));
        assert!(!text.contains("skill 5"));
        assert!(text.contains("  ... and 2 more"));
        assert!(!text.contains("Optional Skills"));
    }

    #[test]
    fn test_banners_are_full_width() {
        let banner = header("ESCO Semantic Search", false);
        for line in banner.lines().filter(|l| !l.is_empty()) {
            assert_eq!(line.chars().count(), WIDTH);
        }
    }

    #[test]
    fn test_profile_page_shows_override_warning() {
        let search = ProfileSearch {
            profiles: Vec::new(),
            type_override: Some(TypeOverride {
                requested: TypeFilter::Skill,
                applied: TypeFilter::Occupation,
            }),
        };
        let text = format_profiles("cook", TypeFilter::Skill, 0.3, &search, 5, false);
        assert!(text.contains("Switching to Occupation type."));
        assert!(text.contains("No results found."));
    }

    #[test]
    fn test_search_response_shape() {
        let results = vec![SearchResult::new(Node::new("s:py", NodeType::Skill, "Python"), 0.9)];
        let graph = chef_graph(1);
        let response = SearchResponse {
            query: "python",
            results: &results,
            related_graph: Some(&graph),
        };
        let value: serde_json::Value =
            serde_json::from_str(&to_json(&response, true).unwrap()).unwrap();
        assert_eq!(value["query"], "python");
        assert_eq!(value["results"][0]["uri"], "s:py");
        assert_eq!(value["results"][0]["type"], "Skill");
        assert!(value["results"][0]["description"].is_null());
        assert!(value["results"][0].get("embedding").is_none());
        assert_eq!(value["related_graph"]["node"]["label"], "Chef");
        assert_eq!(
            value["related_graph"]["related"]["essential_skills"][0]["label"],
            "skill 0"
        );
        assert!(value["related_graph"]["related"]["optional_skills"]
            .as_array()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_status_response_flattens_stats() {
        let stats = IndexStats::new("vector");
        let value = serde_json::to_value(StatusResponse::new(&stats)).unwrap();
        assert_eq!(value["backend"], "vector");
        assert_eq!(value["valid"], false);
        assert_eq!(value["problems"].as_array().unwrap().len(), 3);
    }
}
