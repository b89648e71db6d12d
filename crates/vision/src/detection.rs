use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use shelfsync_core::{DomainError, DomainResult};

/// Region of the photo the vision model attributed a detection to.
///
/// Passed through untouched; the reconciliation pipeline never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    fn validate(&self) -> DomainResult<()> {
        let all_finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(DomainError::validation("boundingBox must have finite coordinates"));
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err(DomainError::validation(
                "boundingBox width/height cannot be negative",
            ));
        }
        Ok(())
    }
}

/// One item as reported by the vision collaborator, before validation.
///
/// Decoding never fails: a missing field is `None`, and a field of the wrong
/// JSON type (or an entry that is not an object at all) is recorded as a
/// decode problem that [`normalize`] reports as this item's validation error.
/// Quantities arrive as JSON numbers; fractional or negative counts are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetection {
    pub name: Option<String>,
    pub estimated_quantity: Option<f64>,
    pub confidence: Option<f64>,
    pub bounding_box: Option<BoundingBox>,
    #[serde(skip)]
    decode_problems: Vec<String>,
}

impl<'de> Deserialize<'de> for RawDetection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

impl RawDetection {
    pub fn new(name: impl Into<String>, estimated_quantity: i64, confidence: f64) -> Self {
        Self {
            name: Some(name.into()),
            estimated_quantity: Some(estimated_quantity as f64),
            confidence: Some(confidence),
            bounding_box: None,
            decode_problems: Vec::new(),
        }
    }

    /// Lenient decode of one `detectedItems` entry.
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self {
                decode_problems: vec![format!("detection must be a JSON object (got {})", json_kind(value))],
                ..Self::default()
            };
        };

        let mut problems = Vec::new();
        let mut field = |key: &str, expected: &str, value: Option<&Value>, ok: bool| {
            if !ok {
                if let Some(v) = value {
                    problems.push(format!("{key} must be {expected} (got {})", json_kind(v)));
                }
            }
        };

        let name = present(obj.get("name"));
        let quantity = present(obj.get("estimatedQuantity"));
        let confidence = present(obj.get("confidence"));
        let bbox = present(obj.get("boundingBox"));

        let name_str = name.and_then(Value::as_str).map(str::to_string);
        field("name", "a string", name, name.is_none() || name_str.is_some());
        let quantity_f = quantity.and_then(Value::as_f64);
        field("estimatedQuantity", "a number", quantity, quantity.is_none() || quantity_f.is_some());
        let confidence_f = confidence.and_then(Value::as_f64);
        field("confidence", "a number", confidence, confidence.is_none() || confidence_f.is_some());

        let bounding_box = match bbox {
            None => None,
            Some(v) => match serde_json::from_value::<BoundingBox>(v.clone()) {
                Ok(b) => Some(b),
                Err(e) => {
                    problems.push(format!("boundingBox is malformed: {e}"));
                    None
                }
            },
        };

        Self {
            name: name_str,
            estimated_quantity: quantity_f,
            confidence: confidence_f,
            bounding_box,
            decode_problems: problems,
        }
    }

    pub fn with_bounding_box(mut self, bbox: BoundingBox) -> Self {
        self.bounding_box = Some(bbox);
        self
    }

    /// Best-effort label for reporting, even when the item is invalid.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// A validated detection.
///
/// Invariants (enforced by [`DetectedItem::new`]):
/// - `name` is trimmed and non-empty
/// - `estimated_quantity >= 0`
/// - `confidence` is finite and within `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedItem {
    name: String,
    estimated_quantity: i64,
    confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounding_box: Option<BoundingBox>,
}

impl DetectedItem {
    pub fn new(name: impl Into<String>, estimated_quantity: i64, confidence: f64) -> DomainResult<Self> {
        let name = name.into();
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if estimated_quantity < 0 {
            return Err(DomainError::validation(format!(
                "estimatedQuantity cannot be negative (got {estimated_quantity})"
            )));
        }
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(DomainError::validation(format!(
                "confidence must be within [0, 1] (got {confidence})"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            estimated_quantity,
            confidence,
            bounding_box: None,
        })
    }

    pub fn with_bounding_box(mut self, bbox: BoundingBox) -> DomainResult<Self> {
        bbox.validate()?;
        self.bounding_box = Some(bbox);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn estimated_quantity(&self) -> i64 {
        self.estimated_quantity
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        self.bounding_box.as_ref()
    }
}

/// Validate one raw detection.
///
/// Out-of-range values are rejected, never clamped: a clamped confidence would
/// hide an upstream model bug behind a plausible-looking number.
pub fn normalize(raw: &RawDetection) -> DomainResult<DetectedItem> {
    if !raw.decode_problems.is_empty() {
        return Err(DomainError::validation(raw.decode_problems.join("; ")));
    }

    let name = raw
        .name
        .as_deref()
        .ok_or_else(|| DomainError::validation("name is required"))?;

    let quantity = raw
        .estimated_quantity
        .ok_or_else(|| DomainError::validation("estimatedQuantity is required"))?;
    let quantity = whole_quantity(quantity)?;

    let confidence = raw
        .confidence
        .ok_or_else(|| DomainError::validation("confidence is required"))?;

    let item = DetectedItem::new(name, quantity, confidence)?;
    match raw.bounding_box {
        Some(bbox) => item.with_bounding_box(bbox),
        None => Ok(item),
    }
}

/// Validate a batch, keeping one result per input in input order.
pub fn normalize_all(raw: &[RawDetection]) -> Vec<DomainResult<DetectedItem>> {
    raw.iter().map(normalize).collect()
}

/// JSON `null` is treated like an absent field.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn whole_quantity(value: f64) -> DomainResult<i64> {
    if !value.is_finite() {
        return Err(DomainError::validation("estimatedQuantity must be a finite number"));
    }
    if value < 0.0 {
        return Err(DomainError::validation(format!(
            "estimatedQuantity cannot be negative (got {value})"
        )));
    }
    if value.fract() != 0.0 {
        return Err(DomainError::validation(format!(
            "estimatedQuantity must be a whole number (got {value})"
        )));
    }
    if value > i64::MAX as f64 {
        return Err(DomainError::validation("estimatedQuantity is too large"));
    }
    Ok(value as i64)
}
