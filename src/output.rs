use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::normalize::rows_id_hash;
use crate::types::{ExtractionMeta, ExtractionResult, NormalizedRow};

pub const CSV_FILE_NAME: &str = "pois.csv";
pub const JSON_FILE_NAME: &str = "pois.json";
const CSV_HEADER: [&str; 5] = ["type", "id", "lat", "lon", "name"];

/// Writes `pois.csv` and `pois.json` under `out_dir`, replacing earlier
/// files. The identity hash is computed over `rows` as given and stored in
/// the metadata of both files.
///
/// Both documents are rendered and staged under temporary names before
/// either target is replaced, so a failure leaves no new file behind.
pub fn write_outputs(
    rows: &[NormalizedRow],
    out_dir: &Path,
    meta: &ExtractionMeta,
) -> Result<(PathBuf, PathBuf)> {
    let mut meta = meta.clone();
    meta.id_list_sha256 = rows_id_hash(rows);

    let mut csv = Vec::new();
    write_csv(&mut csv, rows, &meta)?;

    let result = ExtractionResult {
        meta,
        rows: rows.to_vec(),
    };
    let mut json = serde_json::to_vec_pretty(&result)?;
    json.push(b'\n');

    fs::create_dir_all(out_dir)?;
    let csv_path = out_dir.join(CSV_FILE_NAME);
    let json_path = out_dir.join(JSON_FILE_NAME);
    for target in [&csv_path, &json_path] {
        if target.is_dir() {
            return Err(io::Error::other(format!(
                "output path {} is a directory",
                target.display()
            ))
            .into());
        }
    }

    let staged_csv = stage(out_dir, CSV_FILE_NAME, &csv)?;
    let staged_json = match stage(out_dir, JSON_FILE_NAME, &json) {
        Ok(path) => path,
        Err(err) => {
            let _ = fs::remove_file(&staged_csv);
            return Err(err);
        }
    };
    if let Err(err) = fs::rename(&staged_json, &json_path) {
        let _ = fs::remove_file(&staged_csv);
        let _ = fs::remove_file(&staged_json);
        return Err(err.into());
    }
    if let Err(err) = fs::rename(&staged_csv, &csv_path) {
        let _ = fs::remove_file(&staged_csv);
        return Err(err.into());
    }

    info!(
        rows = rows.len(),
        id_list_sha256 = %result.meta.id_list_sha256,
        csv = %csv_path.display(),
        json = %json_path.display(),
        "wrote outputs"
    );
    Ok((csv_path, json_path))
}

/// Writes `bytes` to `.{name}.tmp` in `dir` and returns that path.
fn stage(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.join(format!(".{name}.tmp"));
    let mut file = fs::File::create(&path)?;
    if let Err(err) = file.write_all(bytes).and_then(|()| file.sync_all()) {
        let _ = fs::remove_file(&path);
        return Err(err.into());
    }
    Ok(path)
}

fn write_csv<W: Write>(out: &mut W, rows: &[NormalizedRow], meta: &ExtractionMeta) -> Result<()> {
    let bbox = serde_json::to_string(&meta.bbox_wgs84)?;
    let meta_record = [
        "# input_address".to_string(),
        meta.input_address.clone(),
        "center_lat".to_string(),
        serde_json::to_string(&meta.center_lat)?,
        "center_lon".to_string(),
        serde_json::to_string(&meta.center_lon)?,
        "utm_zone".to_string(),
        meta.utm_zone.to_string(),
        "bbox_wgs84".to_string(),
        bbox,
        "tagset_hash".to_string(),
        meta.tagset_hash.clone(),
        "overpass_url".to_string(),
        meta.overpass_url.clone(),
        "osm_base_ts".to_string(),
        meta.osm_base_ts.clone().unwrap_or_default(),
        "id_list_sha256".to_string(),
        meta.id_list_sha256.clone(),
    ];
    write_record(out, &meta_record)?;
    write_record(out, &CSV_HEADER)?;

    for row in rows {
        write_record(
            out,
            &[
                row.kind.as_str().to_string(),
                row.id.to_string(),
                format!("{:.8}", row.lat),
                format!("{:.8}", row.lon),
                row.name.clone(),
            ],
        )?;
    }
    Ok(())
}

fn write_record<W: Write, S: AsRef<str>>(out: &mut W, fields: &[S]) -> Result<()> {
    let line = fields
        .iter()
        .map(|field| quote_field(field.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    out.write_all(line.as_bytes())?;
    out.write_all(b"\r\n")?;
    Ok(())
}

/// RFC 4180: fields holding a comma, quote or line break are wrapped in
/// quotes, with inner quotes doubled.
fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::hash::sha256_hex;
    use crate::types::{BoundingBox, ElementKind, GeoPoint};

    fn meta() -> ExtractionMeta {
        let bbox = BoundingBox {
            south: 39.99554617,
            west: -74.005922,
            north: 40.00445352,
            east: -73.99407723,
            utm_zone: 18,
        };
        ExtractionMeta::new(
            Some("Lower Manhattan, NY"),
            GeoPoint::new(40.0, -74.0),
            &bbox,
            "abc".into(),
            "http://localhost/api/interpreter".into(),
            Some("2025-09-01T00:00:00Z".into()),
        )
    }

    fn row(kind: ElementKind, id: i64, name: &str) -> NormalizedRow {
        NormalizedRow {
            kind,
            id,
            lat: 40.0001,
            lon: -74.00015,
            name: name.to_string(),
            tags: BTreeMap::from([("amenity".to_string(), "cafe".to_string())]),
        }
    }

    #[test]
    fn csv_has_meta_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![row(ElementKind::Node, 1, "Cafe"), row(ElementKind::Way, 2, "Mall")];
        let (csv_path, _) = write_outputs(&rows, dir.path(), &meta()).unwrap();

        let text = fs::read_to_string(csv_path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with(
            "# input_address,\"Lower Manhattan, NY\",center_lat,40.0,center_lon,-74.0,utm_zone,18,"
        ));
        assert!(lines[0].contains("bbox_wgs84,\"[39.99554617,-74.005922,40.00445352,-73.99407723]\""));
        assert!(lines[0].contains(&format!(
            "id_list_sha256,{}",
            sha256_hex(b"node:1|way:2")
        )));
        assert_eq!(lines[1], "type,id,lat,lon,name");
        assert_eq!(lines[2], "node,1,40.00010000,-74.00015000,Cafe");
        assert_eq!(lines[3], "way,2,40.00010000,-74.00015000,Mall");
    }

    #[test]
    fn json_round_trips_meta_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![row(ElementKind::Relation, 9, "Park")];
        let (_, json_path) = write_outputs(&rows, dir.path(), &meta()).unwrap();

        let result: ExtractionResult =
            serde_json::from_str(&fs::read_to_string(json_path).unwrap()).unwrap();
        assert_eq!(result.rows, rows);
        assert_eq!(result.meta.id_list_sha256, sha256_hex(b"relation:9"));
        assert_eq!(result.meta.utm_zone, 18);
        assert_eq!(result.meta.osm_base_ts.as_deref(), Some("2025-09-01T00:00:00Z"));
    }

    #[test]
    fn json_rows_use_type_key() {
        let dir = tempfile::tempdir().unwrap();
        let (_, json_path) =
            write_outputs(&[row(ElementKind::Node, 1, "x")], dir.path(), &meta()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(json_path).unwrap()).unwrap();
        assert_eq!(value["rows"][0]["type"], "node");
        assert_eq!(value["rows"][0]["tags"]["amenity"], "cafe");
    }

    #[test]
    fn creates_missing_dirs_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        write_outputs(&[row(ElementKind::Node, 1, "x"), row(ElementKind::Node, 2, "y")], &nested, &meta())
            .unwrap();
        let (csv_path, _) = write_outputs(&[row(ElementKind::Node, 3, "z")], &nested, &meta()).unwrap();
        let text = fs::read_to_string(csv_path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("node,3,"));
        assert!(!text.contains("node,1,"));
    }

    #[test]
    fn identical_inputs_give_identical_bytes() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let rows = vec![row(ElementKind::Node, 1, "Cafe")];
        let a = write_outputs(&rows, first.path(), &meta()).unwrap();
        let b = write_outputs(&rows, second.path(), &meta()).unwrap();
        assert_eq!(fs::read(a.0).unwrap(), fs::read(b.0).unwrap());
        assert_eq!(fs::read(a.1).unwrap(), fs::read(b.1).unwrap());
    }

    #[test]
    fn empty_result_still_has_both_header_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (csv_path, _) = write_outputs(&[], dir.path(), &meta()).unwrap();
        let text = fs::read_to_string(csv_path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains(&sha256_hex(b"")));
    }

    #[test]
    fn a_blocked_json_target_leaves_no_csv_behind() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(JSON_FILE_NAME)).unwrap();

        assert!(write_outputs(&[row(ElementKind::Node, 1, "x")], dir.path(), &meta()).is_err());
        assert!(!dir.path().join(CSV_FILE_NAME).exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn a_failed_write_keeps_the_previous_pair() {
        let dir = tempfile::tempdir().unwrap();
        let (csv_path, json_path) =
            write_outputs(&[row(ElementKind::Node, 1, "x")], dir.path(), &meta()).unwrap();
        let before = (fs::read(&csv_path).unwrap(), fs::read(&json_path).unwrap());

        fs::remove_file(&json_path).unwrap();
        fs::create_dir(&json_path).unwrap();
        assert!(write_outputs(&[row(ElementKind::Node, 2, "y")], dir.path(), &meta()).is_err());
        assert_eq!(fs::read(&csv_path).unwrap(), before.0);
    }

    #[test]
    fn quoting_follows_rfc_4180() {
        assert_eq!(quote_field("plain"), "plain");
        assert_eq!(quote_field("a,b"), "\"a,b\"");
        assert_eq!(quote_field("Joe's \"Diner\""), "\"Joe's \"\"Diner\"\"\"");
        assert_eq!(quote_field("two\nlines"), "\"two\nlines\"");
    }
}
