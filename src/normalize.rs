//! Turns raw Overpass elements into one canonical row per `(kind, id)`.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::hash::id_list_hash;
use crate::types::{Element, ElementKind, NormalizedRow};

pub const MISSING_NAME: &str = "N/A";

/// Why an element did not become a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SkipReason {
    UnknownKind,
    MissingId,
    /// A node without lat/lon, or a way/relation without a center.
    MissingPosition,
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct SkipCounts {
    pub unknown_kind: usize,
    pub missing_id: usize,
    pub missing_position: usize,
    /// Earlier copies replaced by a later element with the same identity.
    pub duplicates: usize,
}

impl SkipCounts {
    fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::UnknownKind => self.unknown_kind += 1,
            SkipReason::MissingId => self.missing_id += 1,
            SkipReason::MissingPosition => self.missing_position += 1,
        }
    }

    /// Elements discarded for a reason other than deduplication.
    pub fn discarded(&self) -> usize {
        self.unknown_kind + self.missing_id + self.missing_position
    }
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct Normalized {
    pub rows: Vec<NormalizedRow>,
    pub skipped: SkipCounts,
}

/// Deduplicates by `(kind, id)` (the last occurrence wins) and returns rows
/// sorted by kind order, then id.
pub fn normalize(elements: &[Element]) -> Normalized {
    let mut skipped = SkipCounts::default();
    // BTreeMap order is (ElementKind, id), which is the canonical row order.
    let mut latest: BTreeMap<(ElementKind, i64), &Element> = BTreeMap::new();

    for element in elements {
        let Some(kind) = element.kind() else {
            skipped.record(SkipReason::UnknownKind);
            continue;
        };
        let Some(id) = element.id else {
            skipped.record(SkipReason::MissingId);
            continue;
        };
        if latest.insert((kind, id), element).is_some() {
            skipped.duplicates += 1;
        }
    }

    let mut rows = Vec::with_capacity(latest.len());
    for ((kind, id), element) in latest {
        match position(kind, element) {
            Some((lat, lon)) => rows.push(NormalizedRow {
                kind,
                id,
                lat,
                lon,
                name: element
                    .tags
                    .get("name")
                    .cloned()
                    .unwrap_or_else(|| MISSING_NAME.to_string()),
                tags: element.tags.clone(),
            }),
            None => {
                debug!(%kind, id, "element has no usable position");
                skipped.record(SkipReason::MissingPosition);
            }
        }
    }

    info!(
        rows = rows.len(),
        discarded = skipped.discarded(),
        duplicates = skipped.duplicates,
        "normalized elements"
    );
    Normalized { rows, skipped }
}

fn position(kind: ElementKind, element: &Element) -> Option<(f64, f64)> {
    match kind {
        ElementKind::Node => Some((element.lat?, element.lon?)),
        ElementKind::Way | ElementKind::Relation => {
            let center = element.center?;
            Some((center.lat, center.lon))
        }
    }
}

/// Identity hash straight from raw elements: unique `(kind, id)` pairs in
/// canonical order, hashed the same way as written rows. Positions are not
/// required, so the hash reflects everything the server returned.
pub fn elements_id_hash(elements: &[Element]) -> String {
    let mut identities: Vec<(ElementKind, i64)> =
        elements.iter().filter_map(Element::identity).collect();
    identities.sort_unstable();
    identities.dedup();
    id_list_hash(identities)
}

/// Identity hash over rows in the order given.
pub fn rows_id_hash(rows: &[NormalizedRow]) -> String {
    id_list_hash(rows.iter().map(|row| (row.kind, row.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Center;

    fn node(id: i64, lat: f64, lon: f64, name: Option<&str>) -> Element {
        let mut element = Element {
            type_field: "node".into(),
            id: Some(id),
            lat: Some(lat),
            lon: Some(lon),
            ..Default::default()
        };
        if let Some(name) = name {
            element.tags.insert("name".into(), name.into());
        }
        element
    }

    fn centered(kind: &str, id: i64, lat: f64, lon: f64) -> Element {
        Element {
            type_field: kind.into(),
            id: Some(id),
            center: Some(Center { lat, lon }),
            ..Default::default()
        }
    }

    fn ids(rows: &[NormalizedRow]) -> Vec<(ElementKind, i64)> {
        rows.iter().map(|row| (row.kind, row.id)).collect()
    }

    #[test]
    fn sorts_by_kind_then_id_and_dedups() {
        let elements = vec![
            centered("way", 2, 1.0, 1.0),
            node(1, 0.0, 0.0, Some("A")),
            centered("relation", 3, 2.0, 2.0),
            node(1, 0.0, 0.0, None),
        ];
        let normalized = normalize(&elements);
        assert_eq!(
            ids(&normalized.rows),
            vec![
                (ElementKind::Node, 1),
                (ElementKind::Way, 2),
                (ElementKind::Relation, 3)
            ]
        );
        assert_eq!(normalized.rows.len(), 3);
        assert_eq!(normalized.skipped.duplicates, 1);
    }

    #[test]
    fn last_occurrence_wins() {
        let elements = vec![
            node(7, 0.0, 0.0, Some("first")),
            node(7, 5.0, 6.0, Some("second")),
        ];
        let rows = normalize(&elements).rows;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "second");
        assert_eq!((rows[0].lat, rows[0].lon), (5.0, 6.0));
    }

    #[test]
    fn ids_are_only_unique_within_a_kind() {
        let elements = vec![centered("way", 1, 1.0, 1.0), node(1, 0.0, 0.0, None)];
        let rows = normalize(&elements).rows;
        assert_eq!(
            ids(&rows),
            vec![(ElementKind::Node, 1), (ElementKind::Way, 1)]
        );
    }

    #[test]
    fn numeric_ids_sort_numerically() {
        let elements = vec![node(10, 0.0, 0.0, None), node(9, 0.0, 0.0, None)];
        let rows = normalize(&elements).rows;
        assert_eq!(ids(&rows), vec![(ElementKind::Node, 9), (ElementKind::Node, 10)]);
    }

    #[test]
    fn unknown_kinds_and_missing_ids_are_counted() {
        let mut no_id = node(1, 0.0, 0.0, None);
        no_id.id = None;
        let elements = vec![centered("area", 5, 0.0, 0.0), no_id, node(2, 0.0, 0.0, None)];
        let normalized = normalize(&elements);
        assert_eq!(normalized.rows.len(), 1);
        assert_eq!(normalized.skipped.unknown_kind, 1);
        assert_eq!(normalized.skipped.missing_id, 1);
        assert_eq!(normalized.skipped.discarded(), 2);
    }

    #[test]
    fn ways_without_center_are_skipped_not_fabricated() {
        let mut way = centered("way", 4, 0.0, 0.0);
        way.center = None;
        let normalized = normalize(&[way, node(1, 3.0, 4.0, None)]);
        assert_eq!(ids(&normalized.rows), vec![(ElementKind::Node, 1)]);
        assert_eq!(normalized.skipped.missing_position, 1);
    }

    #[test]
    fn missing_name_becomes_placeholder() {
        let rows = normalize(&[node(1, 0.0, 0.0, None)]).rows;
        assert_eq!(rows[0].name, MISSING_NAME);
    }

    #[test]
    fn normalizing_twice_is_idempotent_on_identities() {
        let elements = vec![centered("way", 2, 1.0, 1.0), node(1, 0.0, 0.0, Some("A"))];
        let first = normalize(&elements).rows;
        let again: Vec<Element> = first
            .iter()
            .map(|row| match row.kind {
                ElementKind::Node => node(row.id, row.lat, row.lon, Some(&row.name)),
                kind => centered(kind.as_str(), row.id, row.lat, row.lon),
            })
            .collect();
        assert_eq!(ids(&normalize(&again).rows), ids(&first));
    }

    #[test]
    fn element_hash_matches_row_hash_for_positioned_elements() {
        let elements = vec![
            centered("relation", 3, 2.0, 2.0),
            node(1, 0.0, 0.0, None),
            centered("way", 2, 1.0, 1.0),
            node(1, 0.0, 0.0, None),
        ];
        let rows = normalize(&elements).rows;
        assert_eq!(elements_id_hash(&elements), rows_id_hash(&rows));
    }
}
