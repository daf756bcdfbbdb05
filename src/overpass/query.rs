use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{PoiError, Result};
use crate::tags::TagFilterFragment;
use crate::types::BoundingBox;

const SELECTORS: [&str; 3] = ["node", "way", "relation"];

/// Builds the Overpass-QL for `fragments` inside `bbox`.
///
/// Every fragment gets a node, way and relation selector, in the order the
/// fragments are given (callers pass the canonical sorted order). With a
/// snapshot the query is pinned through `[date:"..."]`; without one the
/// server answers from its current state.
pub fn build_query(
    bbox: &BoundingBox,
    fragments: &[TagFilterFragment],
    snapshot_iso: Option<&str>,
    timeout_s: u64,
) -> String {
    let mut query = format!("[out:json][timeout:{timeout_s}]");
    if let Some(snapshot) = snapshot_iso {
        query.push_str(&format!("[date:\"{snapshot}\"]"));
    }
    query.push_str(";\n(\n");
    for fragment in fragments {
        for selector in SELECTORS {
            query.push_str(&format!("  {selector}{fragment}({bbox});\n"));
        }
    }
    query.push_str(");\nout center tags;");
    query
}

/// Accepts `YYYY-MM-DD` (pinned to midnight UTC) or an RFC 3339 timestamp and
/// returns the `YYYY-MM-DDTHH:MM:SSZ` form Overpass expects.
pub fn normalize_snapshot(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(format!("{}T00:00:00Z", date.format("%Y-%m-%d")));
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(timestamp) => Ok(timestamp
            .with_timezone(&Utc)
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string()),
        Err(err) => Err(PoiError::Config(format!(
            "snapshot {raw:?} is neither YYYY-MM-DD nor RFC 3339: {err}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> BoundingBox {
        BoundingBox {
            south: 0.0,
            west: 0.0,
            north: 1.0,
            east: 1.0,
            utm_zone: 31,
        }
    }

    #[test]
    fn snapshot_adds_the_date_clause() {
        let query = build_query(
            &bbox(),
            &[TagFilterFragment::presence("amenity")],
            Some("2025-09-01T00:00:00Z"),
            180,
        );
        assert!(query.starts_with("[out:json][timeout:180][date:\"2025-09-01T00:00:00Z\"];"));
    }

    #[test]
    fn no_snapshot_means_no_date_clause() {
        let query = build_query(&bbox(), &[TagFilterFragment::presence("amenity")], None, 180);
        assert!(!query.contains("[date:"));
        assert!(query.starts_with("[out:json][timeout:180];"));
    }

    #[test]
    fn every_fragment_gets_three_selectors_in_order() {
        let fragments = vec![
            TagFilterFragment::equals("amenity", "cafe"),
            TagFilterFragment::presence("shop"),
        ];
        let query = build_query(&bbox(), &fragments, None, 60);
        let expected = concat!(
            "[out:json][timeout:60];\n(\n",
            "  node[\"amenity\"=\"cafe\"](0,0,1,1);\n",
            "  way[\"amenity\"=\"cafe\"](0,0,1,1);\n",
            "  relation[\"amenity\"=\"cafe\"](0,0,1,1);\n",
            "  node[\"shop\"](0,0,1,1);\n",
            "  way[\"shop\"](0,0,1,1);\n",
            "  relation[\"shop\"](0,0,1,1);\n",
            ");\nout center tags;"
        );
        assert_eq!(query, expected);
    }

    #[test]
    fn bbox_is_rendered_at_stored_precision() {
        let bbox = BoundingBox {
            south: 39.99554617,
            west: -74.005922,
            north: 40.00445352,
            east: -73.99407723,
            utm_zone: 18,
        };
        let query = build_query(&bbox, &[TagFilterFragment::presence("shop")], None, 180);
        assert!(query.contains("node[\"shop\"](39.99554617,-74.005922,40.00445352,-73.99407723);"));
    }

    #[test]
    fn same_inputs_build_the_same_text() {
        let fragments = vec![TagFilterFragment::presence("shop")];
        assert_eq!(
            build_query(&bbox(), &fragments, Some("2024-01-01T00:00:00Z"), 180),
            build_query(&bbox(), &fragments, Some("2024-01-01T00:00:00Z"), 180)
        );
    }

    #[test]
    fn bare_dates_expand_to_midnight_utc() {
        assert_eq!(normalize_snapshot("2025-09-01").unwrap(), "2025-09-01T00:00:00Z");
    }

    #[test]
    fn rfc3339_timestamps_are_converted_to_utc() {
        assert_eq!(
            normalize_snapshot("2025-09-01T02:30:00+02:00").unwrap(),
            "2025-09-01T00:30:00Z"
        );
    }

    #[test]
    fn garbage_snapshots_are_rejected() {
        assert!(matches!(
            normalize_snapshot("last tuesday"),
            Err(PoiError::Config(_))
        ));
    }
}
