//! PPOCRLabel `Label.txt` reader.
//!
//! Each non-blank line holds an image path, a single tab, and a JSON array of
//! region objects:
//!
//! ```text
//! receipts/img1.jpg\t[{"points": [[x1, y1], ..., [x4, y4]], "transcription": "TEXT"}]
//! ```
//!
//! Extra keys on a region object (`difficult`, `key_cls`, ...) are ignored.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::model::{Annotation, ImageRecord, Quad};
use crate::error::LabelCropError;

const FIELD_DELIMITER: char = '\t';
const QUAD_POINTS: usize = 4;

#[derive(Debug, Deserialize)]
struct PpocrRegion {
    points: Vec<[f64; 2]>,
    transcription: String,
}

/// Reads a whole label file into memory.
///
/// An unreadable label file is fatal for a run, so this is the only reader
/// entry point that fails as a whole.
pub fn read_label_file(path: &Path) -> Result<String, LabelCropError> {
    fs::read_to_string(path).map_err(|source| LabelCropError::LabelFileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses every record of a label file's content, in file order.
///
/// Blank lines are skipped. Each remaining line yields either a record or the
/// `MalformedRecord` error for that line; one bad line never hides the rest.
pub fn parse_label_records(
    content: &str,
) -> impl Iterator<Item = Result<ImageRecord, LabelCropError>> + '_ {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| parse_label_line(line, idx + 1).transpose())
}

/// Parses a single label line.
///
/// Returns `Ok(None)` for blank lines. A record with an empty JSON array is
/// valid and simply has no annotations.
pub fn parse_label_line(line: &str, line_num: usize) -> Result<Option<ImageRecord>, LabelCropError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let malformed = |message: String| LabelCropError::MalformedRecord {
        line: line_num,
        message,
    };

    let (image_path, payload) = trimmed
        .split_once(FIELD_DELIMITER)
        .ok_or_else(|| malformed("missing tab between image path and JSON payload".to_string()))?;

    let image_path = image_path.trim();
    if image_path.is_empty() {
        return Err(malformed("empty image path".to_string()));
    }

    let regions: Vec<PpocrRegion> = serde_json::from_str(payload)
        .map_err(|err| malformed(format!("invalid annotation JSON: {err}")))?;

    let mut annotations = Vec::with_capacity(regions.len());
    for (index, region) in regions.into_iter().enumerate() {
        let quad = Quad::from_pairs(&region.points).ok_or_else(|| {
            malformed(format!(
                "annotation {index} has {} point(s), expected {QUAD_POINTS}",
                region.points.len()
            ))
        })?;
        annotations.push(Annotation::new(quad, region.transcription));
    }

    Ok(Some(ImageRecord {
        line: line_num,
        image_path: image_path.to_string(),
        annotations,
    }))
}

#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_label_line(input: &str) -> Result<(), LabelCropError> {
    let _ = parse_label_line(input, 1)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Point;

    #[test]
    fn parse_label_line_accepts_valid_rows() {
        let line = "receipts/img1.jpg\t[{\"points\": [[0, 0], [100, 0], [100, 50], [0, 50]], \"transcription\": \"TEST\", \"difficult\": false}]";
        let record = parse_label_line(line, 3)
            .expect("parse should succeed")
            .expect("line should produce a record");

        assert_eq!(record.line, 3);
        assert_eq!(record.image_path, "receipts/img1.jpg");
        assert_eq!(record.annotations.len(), 1);
        assert_eq!(record.annotations[0].transcription, "TEST");
        assert_eq!(record.annotations[0].quad.points[1], Point::new(100.0, 0.0));
    }

    #[test]
    fn parse_label_line_keeps_annotation_order() {
        let line = "a.png\t[{\"points\":[[0,0],[1,0],[1,1],[0,1]],\"transcription\":\"first\"},{\"points\":[[5,5],[6,5],[6,6],[5,6]],\"transcription\":\"\"}]";
        let record = parse_label_line(line, 1).unwrap().unwrap();
        let texts: Vec<&str> = record
            .annotations
            .iter()
            .map(|a| a.transcription.as_str())
            .collect();
        assert_eq!(texts, vec!["first", ""]);
    }

    #[test]
    fn parse_label_line_skips_blank_rows() {
        assert!(parse_label_line("   ", 2).unwrap().is_none());
        assert!(parse_label_line("", 2).unwrap().is_none());
    }

    #[test]
    fn parse_label_line_accepts_empty_payload() {
        let record = parse_label_line("img.jpg\t[]", 1).unwrap().unwrap();
        assert!(record.annotations.is_empty());
    }

    #[test]
    fn parse_label_line_splits_on_first_tab_only() {
        let line = "img.jpg\t[{\"points\":[[0,0],[1,0],[1,1],[0,1]],\"transcription\":\"a\\tb\"}]";
        let record = parse_label_line(line, 1).unwrap().unwrap();
        assert_eq!(record.annotations[0].transcription, "a\tb");
    }

    #[test]
    fn parse_label_line_rejects_missing_delimiter() {
        let err = parse_label_line("img.jpg [] ", 4).unwrap_err();
        assert!(matches!(err, LabelCropError::MalformedRecord { line: 4, .. }));
    }

    #[test]
    fn parse_label_line_rejects_invalid_json() {
        let err = parse_label_line("img.jpg\t[{\"points\": ", 5).unwrap_err();
        assert!(matches!(err, LabelCropError::MalformedRecord { line: 5, .. }));
    }

    #[test]
    fn parse_label_line_rejects_missing_transcription() {
        let err = parse_label_line("img.jpg\t[{\"points\":[[0,0],[1,0],[1,1],[0,1]]}]", 6)
            .unwrap_err();
        assert!(matches!(err, LabelCropError::MalformedRecord { line: 6, .. }));
    }

    #[test]
    fn parse_label_line_rejects_polygons() {
        let line = "img.jpg\t[{\"points\":[[0,0],[1,0],[2,1],[1,2],[0,1]],\"transcription\":\"x\"}]";
        let err = parse_label_line(line, 7).unwrap_err();
        match err {
            LabelCropError::MalformedRecord { line, message } => {
                assert_eq!(line, 7);
                assert!(message.contains("5 point(s)"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_label_records_reports_each_line() {
        let content = "\u{feff}a.jpg\t[]\n\nbroken line\nb.jpg\t[]\n";
        let results: Vec<_> = parse_label_records(content).collect();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().image_path, "a.jpg");
        assert!(matches!(
            results[1],
            Err(LabelCropError::MalformedRecord { line: 3, .. })
        ));
        assert_eq!(results[2].as_ref().unwrap().line, 4);
    }

    #[test]
    fn read_label_file_fails_for_missing_file() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let err = read_label_file(&temp.path().join("Label.txt")).unwrap_err();
        assert!(matches!(err, LabelCropError::LabelFileRead { .. }));
    }
}
