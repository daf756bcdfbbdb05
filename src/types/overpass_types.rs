use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The three OSM element kinds, in the order rows are sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "node" => Some(ElementKind::Node),
            "way" => Some(ElementKind::Way),
            "relation" => Some(ElementKind::Relation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        }
    }

    /// Sort rank: node(0) < way(1) < relation(2).
    pub fn order(&self) -> u8 {
        *self as u8
    }

    pub const ALL: [ElementKind; 3] = [ElementKind::Node, ElementKind::Way, ElementKind::Relation];
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of an Overpass `[out:json]` answer, as it arrives on the wire.
///
/// `elements` stays optional here so a body without it can be told apart from
/// an empty result.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverpassResponse {
    pub version: Option<f64>,
    pub generator: Option<String>,
    pub osm3s: Option<Osm3s>,
    pub remark: Option<String>,
    pub elements: Option<Vec<Element>>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Osm3s {
    #[serde(rename = "timestamp_osm_base")]
    pub timestamp_osm_base: Option<String>,
    #[serde(rename = "timestamp_areas_base")]
    pub timestamp_areas_base: Option<String>,
    pub copyright: Option<String>,
}

/// One raw element. Nodes carry `lat`/`lon`; ways and relations carry the
/// `center` requested by `out center`.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(rename = "type", default)]
    pub type_field: String,
    pub id: Option<i64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<Center>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Element {
    pub fn kind(&self) -> Option<ElementKind> {
        ElementKind::parse(&self.type_field)
    }

    /// `(kind, id)`, or `None` when either half is missing or unknown.
    pub fn identity(&self) -> Option<(ElementKind, i64)> {
        Some((self.kind()?, self.id?))
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Center {
    pub lat: f64,
    pub lon: f64,
}

/// A validated response: the element list is known to be present and no
/// truncation remark was reported.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub osm3s: Option<Osm3s>,
    pub elements: Vec<Element>,
}

impl RawResponse {
    pub fn osm_base_ts(&self) -> Option<String> {
        self.osm3s.as_ref()?.timestamp_osm_base.clone()
    }
}
