//! Calibration samples and the sample file format.
//!
//! A sample file is row-oriented CSV text, one row per sample:
//!
//! ```text
//! # {"schema_version":"1.0","feature_layout":"eye-centers-v1","created_at":"..."}
//! left_eye_x,left_eye_y,right_eye_x,right_eye_y,target_x,target_y
//! -0.43,0.02,0.44,0.01,0.15,0.15
//! ```
//!
//! The comment line is optional; without it the layout is recognized from
//! the column names, which also accepts the legacy `f1..fN,tx,ty` header.
//! Files are only ever appended to, so the only damage a crash can cause
//! is a truncated final line. An unterminated last row that still parses
//! with the full column count is kept; anything else there is reported and
//! skipped.

use serde::{Deserialize, Serialize};

use crate::feature::{FeatureLayout, FeatureVector};
use crate::model::ModelError;
use crate::screen::ScreenPoint;

/// Current sample file schema version.
pub const SAMPLE_SCHEMA_VERSION: &str = "1.0";

/// Target column names.
pub const TARGET_COLUMNS: [&str; 2] = ["target_x", "target_y"];

const LEGACY_TARGET_COLUMNS: [&str; 2] = ["tx", "ty"];

/// One labeled observation: features seen while the user fixated `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSample {
    pub features: FeatureVector,
    pub target: ScreenPoint,
}

impl CalibrationSample {
    pub fn new(features: FeatureVector, target: ScreenPoint) -> Self {
        Self { features, target }
    }
}

/// Header comment of a sample file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleFileHeader {
    pub schema_version: String,
    pub feature_layout: FeatureLayout,
    /// Creation time (RFC 3339).
    pub created_at: String,
}

impl SampleFileHeader {
    pub fn new(feature_layout: FeatureLayout) -> Self {
        Self {
            schema_version: SAMPLE_SCHEMA_VERSION.to_string(),
            feature_layout,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Parsed contents of a sample file.
#[derive(Debug, Clone)]
pub struct SampleFile {
    pub layout: FeatureLayout,
    /// Header comment, absent for legacy files.
    pub header: Option<SampleFileHeader>,
    /// Samples in insertion order.
    pub samples: Vec<CalibrationSample>,
    /// Whether an interrupted final row was dropped.
    pub truncated_tail: bool,
}

/// Header comment line plus column line for a new file, newline-terminated.
pub fn file_preamble(header: &SampleFileHeader) -> Result<String, serde_json::Error> {
    Ok(format!(
        "# {}\n{}\n",
        serde_json::to_string(header)?,
        column_line(header.feature_layout)
    ))
}

/// Column names line for `layout`.
pub fn column_line(layout: FeatureLayout) -> String {
    let mut columns = layout.component_names();
    columns.extend(TARGET_COLUMNS.iter().map(|c| c.to_string()));
    columns.join(",")
}

/// Format one sample as a CSV row (without newline).
///
/// Floats use the shortest representation that reads back exactly.
pub fn format_row(sample: &CalibrationSample) -> String {
    sample
        .features
        .values()
        .iter()
        .chain([&sample.target.x, &sample.target.y])
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Serialize a complete sample file.
pub fn serialize_samples(
    header: &SampleFileHeader,
    samples: &[CalibrationSample],
) -> Result<String, serde_json::Error> {
    let mut output = file_preamble(header)?;
    for sample in samples {
        output.push_str(&format_row(sample));
        output.push('\n');
    }
    Ok(output)
}

/// Parse a sample file.
pub fn parse_samples(content: &str) -> Result<SampleFile, ModelError> {
    let mut header: Option<SampleFileHeader> = None;
    let mut layout: Option<FeatureLayout> = None;
    let mut samples = Vec::new();
    let mut truncated_tail = false;

    let lines: Vec<&str> = content.lines().collect();
    let unterminated_tail = !content.is_empty() && !content.ends_with('\n');

    for (i, raw_line) in lines.iter().enumerate() {
        let line_no = i + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            if header.is_none() && layout.is_none() {
                let parsed: SampleFileHeader =
                    serde_json::from_str(comment.trim()).map_err(|e| ModelError::Format {
                        line: line_no,
                        message: format!("bad header comment: {e}"),
                    })?;
                header = Some(parsed);
            }
            continue;
        }

        let Some(row_layout) = layout else {
            layout = Some(parse_columns(line, line_no, header.as_ref())?);
            continue;
        };

        // An unterminated last row that does not parse is an interrupted append.
        let is_tail = unterminated_tail && i == lines.len() - 1;
        match parse_row(line, line_no, row_layout) {
            Ok(sample) => samples.push(sample),
            Err(_) if is_tail => truncated_tail = true,
            Err(e) => return Err(e),
        }
    }

    let layout = match (layout, &header) {
        (Some(layout), _) => layout,
        (None, Some(header)) => header.feature_layout,
        (None, None) => {
            return Err(ModelError::Format {
                line: 1,
                message: "missing column header".to_string(),
            })
        }
    };

    Ok(SampleFile {
        layout,
        header,
        samples,
        truncated_tail,
    })
}

fn parse_columns(
    line: &str,
    line_no: usize,
    header: Option<&SampleFileHeader>,
) -> Result<FeatureLayout, ModelError> {
    let columns: Vec<String> = line.split(',').map(|c| c.trim().to_string()).collect();
    let bad = |message: String| ModelError::Format {
        line: line_no,
        message,
    };

    if columns.len() < 2 {
        return Err(bad(format!("expected feature and target columns, got {line:?}")));
    }
    let (features, targets) = columns.split_at(columns.len() - 2);
    if targets != TARGET_COLUMNS && targets != LEGACY_TARGET_COLUMNS {
        return Err(bad(format!("last two columns must be target_x,target_y, got {targets:?}")));
    }

    match header {
        Some(header) => {
            let expected = header.feature_layout.component_names();
            if features != expected.as_slice() {
                return Err(bad(format!(
                    "columns do not match layout {}: {features:?}",
                    header.feature_layout
                )));
            }
            Ok(header.feature_layout)
        }
        None => FeatureLayout::from_component_names(features)
            .ok_or_else(|| bad(format!("unrecognized feature columns {features:?}"))),
    }
}

fn parse_row(
    line: &str,
    line_no: usize,
    layout: FeatureLayout,
) -> Result<CalibrationSample, ModelError> {
    let values = line
        .split(',')
        .map(|field| field.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|e| ModelError::Format {
            line: line_no,
            message: format!("{e} in {line:?}"),
        })?;

    if values.len() != layout.len() + 2 {
        return Err(ModelError::Format {
            line: line_no,
            message: format!(
                "expected {} columns, found {}",
                layout.len() + 2,
                values.len()
            ),
        });
    }

    let n = layout.len();
    let target = ScreenPoint::new(values[n], values[n + 1]);
    let features = FeatureVector::new(layout, values[..n].to_vec())?;
    Ok(CalibrationSample::new(features, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<CalibrationSample> {
        vec![
            CalibrationSample::new(
                FeatureVector::new(FeatureLayout::EyeCentersV1, vec![-0.43, 0.1 + 0.2, 0.44, 1e-9])
                    .unwrap(),
                ScreenPoint::new(0.15, 0.85),
            ),
            CalibrationSample::new(
                FeatureVector::new(FeatureLayout::EyeCentersV1, vec![-0.5, 0.0, 0.5, -0.0])
                    .unwrap(),
                ScreenPoint::new(0.5, 0.5),
            ),
        ]
    }

    #[test]
    fn test_roundtrip_preserves_values_and_order() {
        let header = SampleFileHeader::new(FeatureLayout::EyeCentersV1);
        let text = serialize_samples(&header, &samples()).unwrap();

        let parsed = parse_samples(&text).unwrap();
        assert_eq!(parsed.layout, FeatureLayout::EyeCentersV1);
        assert_eq!(parsed.header, Some(header));
        assert_eq!(parsed.samples, samples());
        assert!(!parsed.truncated_tail);
    }

    #[test]
    fn test_header_names_every_column() {
        assert_eq!(
            column_line(FeatureLayout::EyeApertureV1),
            "left_eye_x,left_eye_y,right_eye_x,right_eye_y,left_aperture,right_aperture,target_x,target_y"
        );
    }

    #[test]
    fn test_legacy_file_without_comment() {
        let text = "f1,f2,f3,f4,tx,ty\n0.1,0.2,0.3,0.4,0.15,0.15\n";
        let parsed = parse_samples(text).unwrap();
        assert_eq!(parsed.layout, FeatureLayout::Raw(4));
        assert!(parsed.header.is_none());
        assert_eq!(parsed.samples.len(), 1);
        assert_eq!(parsed.samples[0].target, ScreenPoint::new(0.15, 0.15));
    }

    #[test]
    fn test_truncated_tail_is_skipped() {
        let header = SampleFileHeader::new(FeatureLayout::EyeCentersV1);
        let mut text = serialize_samples(&header, &samples()).unwrap();
        text.push_str("-0.4,0.0");

        let parsed = parse_samples(&text).unwrap();
        assert_eq!(parsed.samples.len(), 2);
        assert!(parsed.truncated_tail);
    }

    #[test]
    fn test_complete_unterminated_tail_is_kept() {
        let header = SampleFileHeader::new(FeatureLayout::EyeCentersV1);
        let mut text = serialize_samples(&header, &samples()).unwrap();
        text.push_str("0.1,0.2,0.3,0.4,0.5,0.5");

        let parsed = parse_samples(&text).unwrap();
        assert!(!parsed.truncated_tail);
        assert_eq!(parsed.samples.len(), 3);
        assert_eq!(parsed.samples[2].target, ScreenPoint::new(0.5, 0.5));
    }

    #[test]
    fn test_malformed_middle_row_is_an_error() {
        let text = "f1,tx,ty\n0.1,0.2\n0.3,0.4,0.5\n";
        let err = parse_samples(text).unwrap_err();
        assert!(matches!(err, ModelError::Format { line: 2, .. }));
    }

    #[test]
    fn test_columns_must_match_header_layout() {
        let text = "# {\"schema_version\":\"1.0\",\"feature_layout\":\"eye-centers-v1\",\"created_at\":\"x\"}\nf1,f2,f3,f4,target_x,target_y\n";
        assert!(parse_samples(text).is_err());
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let header = SampleFileHeader::new(FeatureLayout::IrisOffsetV1);
        let text = file_preamble(&header).unwrap();
        let parsed = parse_samples(&text).unwrap();
        assert_eq!(parsed.layout, FeatureLayout::IrisOffsetV1);
        assert!(parsed.samples.is_empty());
    }
}
