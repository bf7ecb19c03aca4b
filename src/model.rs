// SPDX-License-Identifier: MIT OR Apache-2.0

//! Taxonomy data model: nodes, relations, search results and profiles.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::EngineError;

/// Kind of taxonomy entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    Skill,
    Occupation,
    SkillGroup,
    #[serde(rename = "ISCOGroup")]
    IscoGroup,
}

impl NodeType {
    pub const ALL: [NodeType; 4] = [
        NodeType::Skill,
        NodeType::Occupation,
        NodeType::SkillGroup,
        NodeType::IscoGroup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Skill => "Skill",
            NodeType::Occupation => "Occupation",
            NodeType::SkillGroup => "SkillGroup",
            NodeType::IscoGroup => "ISCOGroup",
        }
    }

    /// Only skills and occupations carry embeddings after indexing.
    pub fn is_embedded(&self) -> bool {
        matches!(self, NodeType::Skill | NodeType::Occupation)
    }

    /// Relation groups returned when expanding a node of this type, in display order.
    pub fn relation_groups(&self) -> &'static [RelationGroup] {
        match self {
            NodeType::Skill => &[
                RelationGroup::EssentialOccupations,
                RelationGroup::OptionalOccupations,
                RelationGroup::RelatedSkills,
                RelationGroup::BroaderSkills,
                RelationGroup::NarrowerSkills,
            ],
            NodeType::Occupation => &[
                RelationGroup::EssentialSkills,
                RelationGroup::OptionalSkills,
                RelationGroup::IscoGroups,
                RelationGroup::BroaderOccupations,
                RelationGroup::NarrowerOccupations,
            ],
            NodeType::SkillGroup => &[RelationGroup::BroaderSkills, RelationGroup::NarrowerSkills],
            NodeType::IscoGroup => &[
                RelationGroup::MemberOccupations,
                RelationGroup::BroaderGroups,
                RelationGroup::NarrowerGroups,
            ],
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "skill" => Ok(NodeType::Skill),
            "occupation" => Ok(NodeType::Occupation),
            "skillgroup" => Ok(NodeType::SkillGroup),
            "iscogroup" => Ok(NodeType::IscoGroup),
            _ => Err(EngineError::invalid_argument(
                "type",
                format!("unknown node type '{}'", s),
            )),
        }
    }
}

/// Restriction applied to similarity search candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TypeFilter {
    Skill,
    Occupation,
    #[default]
    Both,
}

impl TypeFilter {
    /// Node types admitted by this filter.
    pub fn node_types(&self) -> &'static [NodeType] {
        match self {
            TypeFilter::Skill => &[NodeType::Skill],
            TypeFilter::Occupation => &[NodeType::Occupation],
            TypeFilter::Both => &[NodeType::Skill, NodeType::Occupation],
        }
    }

    pub fn admits(&self, node_type: NodeType) -> bool {
        self.node_types().contains(&node_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeFilter::Skill => "Skill",
            TypeFilter::Occupation => "Occupation",
            TypeFilter::Both => "Both",
        }
    }

    /// The admitted node types in prose, e.g. "Skill or Occupation".
    pub fn describe(&self) -> &'static str {
        match self {
            TypeFilter::Both => "Skill or Occupation",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeFilter {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skill" => Ok(TypeFilter::Skill),
            "occupation" => Ok(TypeFilter::Occupation),
            "both" | "all" => Ok(TypeFilter::Both),
            _ => Err(EngineError::invalid_argument(
                "type",
                format!("'{}' is not one of Skill, Occupation, Both", s),
            )),
        }
    }
}

/// A taxonomy entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub uri: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub label: String,
    pub description: Option<String>,
    /// Precomputed embedding; never serialized into responses.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl Node {
    pub fn new(uri: impl Into<String>, node_type: NodeType, label: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            node_type,
            label: label.into(),
            description: None,
            embedding: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Edge types stored in the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// parent -> child, between nodes of the same family
    BroaderThan,
    /// skill -> occupation
    EssentialFor,
    /// skill -> occupation
    OptionalFor,
    /// skill -> skill
    RelatedSkill,
    /// occupation -> ISCO group
    PartOfIscoGroup,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::BroaderThan => "BROADER_THAN",
            RelationType::EssentialFor => "ESSENTIAL_FOR",
            RelationType::OptionalFor => "OPTIONAL_FOR",
            RelationType::RelatedSkill => "RELATED_SKILL",
            RelationType::PartOfIscoGroup => "PART_OF_ISCOGROUP",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BROADER_THAN" => Ok(RelationType::BroaderThan),
            "ESSENTIAL_FOR" => Ok(RelationType::EssentialFor),
            "OPTIONAL_FOR" => Ok(RelationType::OptionalFor),
            "RELATED_SKILL" => Ok(RelationType::RelatedSkill),
            "PART_OF_ISCOGROUP" => Ok(RelationType::PartOfIscoGroup),
            other => Err(EngineError::invalid_argument(
                "relation",
                format!("unknown relation type '{}'", other),
            )),
        }
    }
}

/// A directed, typed edge `(source) -[relation]-> (target)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub source_uri: String,
    pub relation: RelationType,
    pub target_uri: String,
}

impl Relation {
    pub fn new(
        source_uri: impl Into<String>,
        relation: RelationType,
        target_uri: impl Into<String>,
    ) -> Self {
        Self {
            source_uri: source_uri.into(),
            relation,
            target_uri: target_uri.into(),
        }
    }
}

/// Named group of nodes adjacent to an expanded root.
///
/// Declaration order is the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationGroup {
    EssentialSkills,
    OptionalSkills,
    EssentialOccupations,
    OptionalOccupations,
    RelatedSkills,
    IscoGroups,
    MemberOccupations,
    BroaderOccupations,
    NarrowerOccupations,
    BroaderSkills,
    NarrowerSkills,
    BroaderGroups,
    NarrowerGroups,
}

impl RelationGroup {
    pub fn key(&self) -> &'static str {
        match self {
            RelationGroup::EssentialSkills => "essential_skills",
            RelationGroup::OptionalSkills => "optional_skills",
            RelationGroup::EssentialOccupations => "essential_occupations",
            RelationGroup::OptionalOccupations => "optional_occupations",
            RelationGroup::RelatedSkills => "related_skills",
            RelationGroup::IscoGroups => "isco_groups",
            RelationGroup::MemberOccupations => "member_occupations",
            RelationGroup::BroaderOccupations => "broader_occupations",
            RelationGroup::NarrowerOccupations => "narrower_occupations",
            RelationGroup::BroaderSkills => "broader_skills",
            RelationGroup::NarrowerSkills => "narrower_skills",
            RelationGroup::BroaderGroups => "broader_groups",
            RelationGroup::NarrowerGroups => "narrower_groups",
        }
    }

    /// Human-readable title, e.g. `Essential Skills`.
    pub fn title(&self) -> String {
        self.key()
            .split('_')
            .map(|word| match word {
                "isco" => "ISCO".to_string(),
                _ => {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Which end of an edge the expanded root sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// root is the source
    Outgoing,
    /// root is the target
    Incoming,
    /// either end
    Any,
}

impl RelationGroup {
    /// The stored edge type and direction this group collects.
    pub fn edge(&self) -> (RelationType, Direction) {
        use Direction::*;
        use RelationType::*;
        match self {
            RelationGroup::EssentialSkills => (EssentialFor, Incoming),
            RelationGroup::OptionalSkills => (OptionalFor, Incoming),
            RelationGroup::EssentialOccupations => (EssentialFor, Outgoing),
            RelationGroup::OptionalOccupations => (OptionalFor, Outgoing),
            RelationGroup::RelatedSkills => (RelatedSkill, Any),
            RelationGroup::IscoGroups => (PartOfIscoGroup, Outgoing),
            RelationGroup::MemberOccupations => (PartOfIscoGroup, Incoming),
            RelationGroup::BroaderOccupations
            | RelationGroup::BroaderSkills
            | RelationGroup::BroaderGroups => (BroaderThan, Incoming),
            RelationGroup::NarrowerOccupations
            | RelationGroup::NarrowerSkills
            | RelationGroup::NarrowerGroups => (BroaderThan, Outgoing),
        }
    }
}

impl fmt::Display for RelationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub node: Node,
    /// Similarity in `[0, 1]`, higher is more similar.
    pub score: f32,
}

impl SearchResult {
    pub fn new(node: Node, score: f32) -> Self {
        Self { node, score }
    }

    pub fn uri(&self) -> &str {
        &self.node.uri
    }

    pub fn label(&self) -> &str {
        &self.node.label
    }

    pub fn node_type(&self) -> NodeType {
        self.node.node_type
    }

    /// Result order: score descending, then label ascending.
    pub fn ranking(a: &SearchResult, b: &SearchResult) -> Ordering {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.node.label.cmp(&b.node.label))
    }
}

/// A root node with every adjacent node grouped by relation.
///
/// Every group defined for the root's type is present, empty or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedGraph {
    pub node: Node,
    pub related: BTreeMap<RelationGroup, Vec<Node>>,
}

impl RelatedGraph {
    /// Creates a graph with every group of the root's type present and empty.
    pub fn empty(node: Node) -> Self {
        let related = node
            .node_type
            .relation_groups()
            .iter()
            .map(|group| (*group, Vec::new()))
            .collect();
        Self { node, related }
    }

    pub fn group(&self, group: RelationGroup) -> &[Node] {
        self.related.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Groups that hold at least one node.
    pub fn non_empty_groups(&self) -> impl Iterator<Item = (&RelationGroup, &Vec<Node>)> {
        self.related.iter().filter(|(_, nodes)| !nodes.is_empty())
    }

    pub fn total_related(&self) -> usize {
        self.related.values().map(Vec::len).sum()
    }
}

/// A search hit on an occupation paired with its expanded context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub search_result: SearchResult,
    pub profile: RelatedGraph,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_filter_parsing() {
        assert_eq!("skill".parse::<TypeFilter>().unwrap(), TypeFilter::Skill);
        assert_eq!("Occupation".parse::<TypeFilter>().unwrap(), TypeFilter::Occupation);
        assert_eq!("BOTH".parse::<TypeFilter>().unwrap(), TypeFilter::Both);
        let err = "SkillGroup".parse::<TypeFilter>().unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument { name: "type", .. }));
    }

    #[test]
    fn test_node_type_parsing() {
        assert_eq!("ISCOGroup".parse::<NodeType>().unwrap(), NodeType::IscoGroup);
        assert_eq!("skill-group".parse::<NodeType>().unwrap(), NodeType::SkillGroup);
        assert!("tool".parse::<NodeType>().is_err());
    }

    #[test]
    fn test_filter_admits() {
        assert!(TypeFilter::Both.admits(NodeType::Skill));
        assert!(TypeFilter::Both.admits(NodeType::Occupation));
        assert!(!TypeFilter::Both.admits(NodeType::SkillGroup));
        assert!(!TypeFilter::Skill.admits(NodeType::Occupation));
    }

    #[test]
    fn test_search_result_json_shape() {
        let node = Node::new("http://esco/skill/1", NodeType::Skill, "Python")
            .with_embedding(vec![1.0, 0.0]);
        let value = serde_json::to_value(SearchResult::new(node, 0.75)).unwrap();
        assert_eq!(value["uri"], "http://esco/skill/1");
        assert_eq!(value["type"], "Skill");
        assert_eq!(value["label"], "Python");
        assert!(value["description"].is_null());
        assert!((value["score"].as_f64().unwrap() - 0.75).abs() < 1e-6);
        assert!(value.get("embedding").is_none());
    }

    #[test]
    fn test_empty_graph_has_all_groups() {
        let graph = RelatedGraph::empty(Node::new("o", NodeType::Occupation, "Chef"));
        assert_eq!(graph.related.len(), 5);
        assert_eq!(graph.non_empty_groups().count(), 0);
        assert_eq!(graph.total_related(), 0);

        let value = serde_json::to_value(&graph).unwrap();
        assert!(value["related"]["essential_skills"].as_array().unwrap().is_empty());
        assert_eq!(value["node"]["type"], "Occupation");
    }

    #[test]
    fn test_group_titles() {
        assert_eq!(RelationGroup::EssentialSkills.title(), "Essential Skills");
        assert_eq!(RelationGroup::IscoGroups.title(), "ISCO Groups");
    }
}
