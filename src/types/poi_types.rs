use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{BoundingBox, ElementKind, GeoPoint};

/// The canonical, deduplicated form of one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub name: String,
    pub tags: BTreeMap<String, String>,
}

impl NormalizedRow {
    /// `"{kind}:{id}"`, the unit the identity hash is built from.
    pub fn identity_key(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }
}

/// Metadata envelope written next to the rows. Field order is the output order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMeta {
    pub input_address: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub utm_zone: u8,
    pub bbox_wgs84: [f64; 4],
    pub tagset_hash: String,
    pub overpass_url: String,
    pub osm_base_ts: Option<String>,
    /// Filled in by the writer from the rows it is given.
    #[serde(default)]
    pub id_list_sha256: String,
}

impl ExtractionMeta {
    pub fn new(
        input_address: Option<&str>,
        center: GeoPoint,
        bbox: &BoundingBox,
        tagset_hash: String,
        overpass_url: String,
        osm_base_ts: Option<String>,
    ) -> Self {
        ExtractionMeta {
            input_address: input_address.unwrap_or_default().to_string(),
            center_lat: center.lat,
            center_lon: center.lon,
            utm_zone: bbox.utm_zone,
            bbox_wgs84: bbox.to_array(),
            tagset_hash,
            overpass_url,
            osm_base_ts,
            id_list_sha256: String::new(),
        }
    }
}

/// The JSON document written by the output writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub meta: ExtractionMeta,
    pub rows: Vec<NormalizedRow>,
}
