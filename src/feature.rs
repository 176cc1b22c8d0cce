//! Feature records and typed access to their GeoJSON structure.

use crate::error::AdmissionError;
use serde_json::Value;

/// GeoJSON geometry types a record may carry.
pub const SUPPORTED_GEOMETRY_TYPES: &[&str] = &[
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// One feature record.
///
/// `body` is the document exactly as it was read from the store. Tables that
/// persist the raw document write it verbatim; everything else goes through
/// the parsed `document`.
#[derive(Debug, Clone)]
pub struct Feature {
    id: i64,
    alt_label: Option<String>,
    body: Vec<u8>,
    document: Option<Value>,
}

impl Feature {
    pub(crate) fn admitted(
        id: i64,
        alt_label: Option<String>,
        body: Vec<u8>,
        document: Value,
    ) -> Self {
        Self {
            id,
            alt_label,
            body,
            document: Some(document),
        }
    }

    /// Wrap bytes fetched for a relation id without running admission.
    ///
    /// The record is keyed by the body's own identifier when it has one, and by
    /// `relation_id` otherwise. A body that does not parse is kept as-is; the
    /// failure surfaces when a table asks for the document.
    pub fn fetched(relation_id: i64, body: Vec<u8>) -> Self {
        let document: Option<Value> = serde_json::from_slice(&body).ok();
        let id = document
            .as_ref()
            .and_then(declared_id)
            .unwrap_or(relation_id);
        Self {
            id,
            alt_label: None,
            body,
            document,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn alt_label(&self) -> Option<&str> {
        self.alt_label.as_deref()
    }

    pub fn is_alt(&self) -> bool {
        self.alt_label.is_some()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// The parsed document, or `Malformed` if the body never parsed.
    pub fn document(&self) -> Result<&Value, AdmissionError> {
        self.document.as_ref().ok_or_else(|| AdmissionError::Malformed {
            path: self.id.to_string(),
            reason: "body is not valid JSON".into(),
        })
    }

    /// Typed view of the `properties` object. Missing properties read as empty.
    pub fn properties(&self) -> Result<Properties<'_>, AdmissionError> {
        Ok(Properties::of(self.document()?))
    }

    pub fn geometry(&self) -> Result<&Value, AdmissionError> {
        self.document()?
            .get("geometry")
            .filter(|geometry| !geometry.is_null())
            .ok_or_else(|| AdmissionError::InvalidGeometry {
                path: self.id.to_string(),
                reason: "missing geometry".into(),
            })
    }
}

/// Read-only accessor over a feature's `properties` object.
///
/// Lookups of absent keys return `None` rather than failing; callers decide
/// whether absence matters.
#[derive(Debug, Clone, Copy)]
pub struct Properties<'a> {
    map: Option<&'a serde_json::Map<String, Value>>,
}

impl<'a> Properties<'a> {
    pub fn of(document: &'a Value) -> Self {
        Self {
            map: document.get("properties").and_then(Value::as_object),
        }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.and_then(|map| map.get(key)).filter(|v| !v.is_null())
    }

    pub fn str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(as_integer)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|value| match value {
            Value::Number(number) => number.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Values of a list-valued property. A scalar reads as a one-element list.
    pub fn list(&self, key: &str) -> Vec<&'a Value> {
        match self.get(key) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(value) => vec![value],
            None => Vec::new(),
        }
    }

    pub fn object(&self, key: &str) -> Option<&'a serde_json::Map<String, Value>> {
        self.get(key).and_then(Value::as_object)
    }

    /// All `(key, value)` pairs whose key starts with `prefix`.
    pub fn with_prefix(self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.map
            .into_iter()
            .flat_map(|map| map.iter())
            .filter(move |(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn raw(&self) -> Option<&'a serde_json::Map<String, Value>> {
        self.map
    }
}

/// Non-negative `wof:id`, falling back to the top-level `id`.
fn declared_id(document: &Value) -> Option<i64> {
    Properties::of(document)
        .get("wof:id")
        .or_else(|| document.get("id"))
        .and_then(as_integer)
        .filter(|id| *id >= 0)
}

/// Interpret a JSON value as an integer the way loosely-typed WOF data needs:
/// integers as-is, floats truncated, numeric strings parsed.
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Bounding box of a GeoJSON geometry as `(min_x, min_y, max_x, max_y)`.
///
/// Uses the geometry's own `bbox` member when present, otherwise walks the
/// coordinates. Returns `None` for empty geometries.
pub fn bounding_box(geometry: &Value) -> Option<(f64, f64, f64, f64)> {
    if let Some(Value::Array(bbox)) = geometry.get("bbox") {
        let values: Vec<f64> = bbox.iter().filter_map(Value::as_f64).collect();
        if values.len() == 4 {
            return Some((values[0], values[1], values[2], values[3]));
        }
    }

    let mut bounds: Option<(f64, f64, f64, f64)> = None;
    collect_bounds(geometry, &mut bounds);
    bounds
}

fn collect_bounds(geometry: &Value, bounds: &mut Option<(f64, f64, f64, f64)>) {
    if let Some(Value::Array(members)) = geometry.get("geometries") {
        for member in members {
            collect_bounds(member, bounds);
        }
        return;
    }

    if let Some(coordinates) = geometry.get("coordinates") {
        walk_positions(coordinates, bounds);
    }
}

fn walk_positions(value: &Value, bounds: &mut Option<(f64, f64, f64, f64)>) {
    let Value::Array(items) = value else {
        return;
    };

    // A position is an array whose first two members are numbers.
    if let (Some(x), Some(y)) = (
        items.first().and_then(Value::as_f64),
        items.get(1).and_then(Value::as_f64),
    ) {
        *bounds = Some(match *bounds {
            Some((min_x, min_y, max_x, max_y)) => {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            }
            None => (x, y, x, y),
        });
        return;
    }

    for item in items {
        walk_positions(item, bounds);
    }
}
