//! Record admission: decides whether a candidate document is indexable.
//!
//! Admission only checks for the minimum a table needs, a numeric identifier
//! and a supported geometry. The accepted payload is the original bytes;
//! nothing is rewritten.

use crate::error::AdmissionError;
use crate::feature::{Feature, Properties, SUPPORTED_GEOMETRY_TYPES, as_integer};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Options controlling which documents are admitted.
#[derive(Debug, Clone)]
pub struct AdmissionOptions {
    /// Admit alternate-geometry records.
    pub index_alt_files: bool,
    /// Surface alt record failures as run errors instead of skipping them.
    pub strict_alt_files: bool,
}

impl Default for AdmissionOptions {
    fn default() -> Self {
        Self {
            index_alt_files: false,
            strict_alt_files: true,
        }
    }
}

/// Outcome of admitting one candidate.
#[derive(Debug)]
pub enum Admission {
    Accepted(Feature),
    /// Not indexable and not an error: cancelled, or an alt record with alt
    /// indexing disabled.
    Skipped,
    /// Rejected; the engine skips this document.
    Rejected(AdmissionError),
    /// Rejected alt record under strict alt-file handling; fatal to the run.
    Fatal(AdmissionError),
}

/// Validates candidate documents read from a source.
#[derive(Debug, Clone, Default)]
pub struct Admitter {
    options: AdmissionOptions,
}

impl Admitter {
    pub fn new(options: AdmissionOptions) -> Self {
        Self { options }
    }

    /// Admit one candidate document.
    ///
    /// Cancellation is only observed before any parsing starts.
    pub fn admit(&self, cancel: &CancellationToken, path: &str, bytes: Vec<u8>) -> Admission {
        if cancel.is_cancelled() {
            return Admission::Skipped;
        }

        let named_alt = path_is_alt(path);
        if named_alt && !self.options.index_alt_files {
            tracing::debug!(path, "alt record with alt indexing disabled, skipping");
            return Admission::Skipped;
        }

        let document: Value = match serde_json::from_slice(&bytes) {
            Ok(document) => document,
            Err(error) => {
                return self.reject(
                    named_alt,
                    path,
                    AdmissionError::Malformed {
                        path: path.to_string(),
                        reason: error.to_string(),
                    },
                );
            }
        };

        let alt_label = alt_label(&document, path);

        if alt_label.is_some() && !self.options.index_alt_files {
            tracing::debug!(path, "alt record with alt indexing disabled, skipping");
            return Admission::Skipped;
        }

        let id = match extract_id(&document, path) {
            Ok(id) => id,
            Err(error) => return self.reject(alt_label.is_some(), path, error),
        };

        if let Err(error) = validate_geometry(&document, path) {
            return self.reject(alt_label.is_some(), path, error);
        }

        Admission::Accepted(Feature::admitted(id, alt_label, bytes, document))
    }

    fn reject(&self, is_alt: bool, path: &str, error: AdmissionError) -> Admission {
        if !is_alt {
            return Admission::Rejected(error);
        }

        if self.options.strict_alt_files {
            return Admission::Fatal(error);
        }

        tracing::warn!(path, %error, "unable to load alt record, strict alt files disabled so skipping");
        Admission::Skipped
    }
}

fn extract_id(document: &Value, path: &str) -> Result<i64, AdmissionError> {
    let invalid = |reason: &str| AdmissionError::InvalidIdentifier {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let value = Properties::of(document)
        .get("wof:id")
        .or_else(|| document.get("id").filter(|v| !v.is_null()))
        .ok_or_else(|| invalid("missing identifier"))?;

    if let Value::String(s) = value {
        if s.trim().is_empty() {
            return Err(invalid("empty identifier"));
        }
    }

    let id = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(_) => as_integer(value),
        _ => None,
    }
    .ok_or_else(|| invalid("identifier is not an integer"))?;

    if id < 0 {
        return Err(invalid("identifier is negative"));
    }

    Ok(id)
}

fn validate_geometry(document: &Value, path: &str) -> Result<(), AdmissionError> {
    let invalid = |reason: String| AdmissionError::InvalidGeometry {
        path: path.to_string(),
        reason,
    };

    let geometry = document
        .get("geometry")
        .filter(|g| g.is_object())
        .ok_or_else(|| invalid("missing geometry".into()))?;

    check_geometry(geometry).map_err(invalid)
}

fn check_geometry(geometry: &Value) -> Result<(), String> {
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "geometry has no type".to_string())?;

    if !SUPPORTED_GEOMETRY_TYPES.contains(&kind) {
        return Err(format!("unsupported geometry type '{kind}'"));
    }

    if kind == "GeometryCollection" {
        let members = geometry
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or_else(|| "geometry collection has no geometries".to_string())?;
        return members.iter().try_for_each(check_geometry);
    }

    match geometry.get("coordinates") {
        Some(Value::Array(_)) => Ok(()),
        _ => Err(format!("{kind} has no coordinates")),
    }
}

fn alt_label(document: &Value, path: &str) -> Option<String> {
    if let Some(label) = Properties::of(document)
        .str("src:alt_label")
        .filter(|label| !label.is_empty())
    {
        return Some(label.to_string());
    }

    let file_name = path.rsplit('/').next()?;
    let stem = file_name.strip_suffix(".geojson").unwrap_or(file_name);
    let (_, label) = stem.split_once("-alt-")?;
    (!label.is_empty()).then(|| label.to_string())
}

fn path_is_alt(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|file_name| file_name.contains("-alt-"))
}
