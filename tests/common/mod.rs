// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use esco_search::backend::{Backend, GraphBackend, TaxonomyWriter, VectorBackend};
use esco_search::config::BackendKind;
use esco_search::embedding::HashingEmbedder;
use esco_search::model::{Node, NodeType, Relation, RelationType};

pub const DIMENSION: usize = 1024;

pub const PYTHON: &str = "http://data.europa.eu/esco/skill/python";
pub const CARPENTRY: &str = "http://data.europa.eu/esco/skill/carpentry";
pub const PREPARE_FOOD: &str = "http://data.europa.eu/esco/skill/prepare-food";
pub const SEASON_DISHES: &str = "http://data.europa.eu/esco/skill/season-dishes";
pub const KITCHEN: &str = "http://data.europa.eu/esco/skill/supervise-kitchen";
pub const ISOLATED: &str = "http://data.europa.eu/esco/skill/basket-weaving";
pub const CHEF: &str = "http://data.europa.eu/esco/occupation/chef";
pub const DEVELOPER: &str = "http://data.europa.eu/esco/occupation/developer";
pub const CARPENTER: &str = "http://data.europa.eu/esco/occupation/carpenter";
pub const PROGRAMMING: &str = "http://data.europa.eu/esco/skill-group/programming";
pub const COOKS: &str = "http://data.europa.eu/esco/isco/C5120";

pub fn embedder() -> HashingEmbedder {
    HashingEmbedder::new(DIMENSION)
}

/// `(uri, type, label, embedded text, description)`
fn nodes() -> Vec<(&'static str, NodeType, &'static str, Option<&'static str>, Option<&'static str>)> {
    vec![
        (
            PYTHON,
            NodeType::Skill,
            "Python (programming language)",
            Some("python programming language"),
            Some("Python is a general-purpose programming language."),
        ),
        (CARPENTRY, NodeType::Skill, "carpentry", Some("carpentry woodwork"), None),
        (PREPARE_FOOD, NodeType::Skill, "prepare food", Some("prepare food"), None),
        (SEASON_DISHES, NodeType::Skill, "season dishes", Some("season dishes"), None),
        (KITCHEN, NodeType::Skill, "supervise kitchen staff", Some("supervise kitchen staff"), None),
        (ISOLATED, NodeType::Skill, "basket weaving", Some("basket weaving"), None),
        (
            CHEF,
            NodeType::Occupation,
            "Chef",
            Some("chef cook"),
            Some("Chefs design recipes and run professional kitchens."),
        ),
        (DEVELOPER, NodeType::Occupation, "software developer", Some("software developer"), None),
        (CARPENTER, NodeType::Occupation, "carpenter", Some("carpenter joiner"), None),
        (PROGRAMMING, NodeType::SkillGroup, "programming", None, None),
        (COOKS, NodeType::IscoGroup, "Cooks", None, None),
    ]
}

fn relations() -> Vec<(&'static str, RelationType, &'static str)> {
    vec![
        (PREPARE_FOOD, RelationType::EssentialFor, CHEF),
        (SEASON_DISHES, RelationType::EssentialFor, CHEF),
        (KITCHEN, RelationType::EssentialFor, CHEF),
        (PYTHON, RelationType::EssentialFor, DEVELOPER),
        (CARPENTRY, RelationType::EssentialFor, CARPENTER),
        (CARPENTRY, RelationType::OptionalFor, CHEF),
        (PROGRAMMING, RelationType::BroaderThan, PYTHON),
        (CHEF, RelationType::PartOfIscoGroup, COOKS),
        (SEASON_DISHES, RelationType::RelatedSkill, PREPARE_FOOD),
    ]
}

pub fn seed(writer: &mut dyn TaxonomyWriter) {
    let embedder = embedder();
    for (uri, node_type, label, text, description) in nodes() {
        let mut node = Node::new(uri, node_type, label);
        if let Some(text) = text {
            node = node.with_embedding(embedder.vector_for(text));
        }
        if let Some(description) = description {
            node = node.with_description(description);
        }
        writer.put_node(&node).expect("put node");
    }
    for (source, relation, target) in relations() {
        writer
            .put_relation(&Relation::new(source, relation, target))
            .expect("put relation");
    }
}

/// Creates a seeded database of `kind` under `dir` and returns its path.
pub fn seeded_db(dir: &Path, kind: BackendKind) -> PathBuf {
    let path = dir.join(format!("{}.sqlite", kind.as_str()));
    match kind {
        BackendKind::Graph => {
            let mut backend = GraphBackend::create(&path).expect("create graph db");
            seed(&mut backend);
            backend.close().expect("close");
        }
        BackendKind::Vector => {
            let mut backend = VectorBackend::create(&path).expect("create vector db");
            seed(&mut backend);
            backend.close().expect("close");
        }
    }
    path
}

/// Creates a database with the schema but no nodes.
pub fn empty_db(dir: &Path, kind: BackendKind) -> PathBuf {
    let path = dir.join(format!("empty-{}.sqlite", kind.as_str()));
    match kind {
        BackendKind::Graph => GraphBackend::create(&path).expect("create").close().expect("close"),
        BackendKind::Vector => VectorBackend::create(&path).expect("create").close().expect("close"),
    }
    path
}

/// Writes a `.escorc.toml` using the hashing provider.
pub fn write_config(dir: &Path, kind: BackendKind, db: &Path) {
    fs::write(
        dir.join(".escorc.toml"),
        format!(
            r#"
[backend]
kind = "{}"
path = "{}"

[embeddings]
provider = "hashing"
dimension = {}
"#,
            kind.as_str(),
            db.display(),
            DIMENSION
        ),
    )
    .expect("write config");
}
