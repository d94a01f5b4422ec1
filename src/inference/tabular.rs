//! Production batch defect regressor
//!
//! A batch record is validated in four steps, each reporting the first
//! problem it finds: presence of a JSON object, presence of every
//! required field, numeric coercion, then categorical encoding.

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::Array2;
use serde_json::{Map, Value};

use super::artifact::Artifact;
use super::onnx::OnnxSession;
use super::{DefectRegressor, InferenceError};

/// Model input columns, in feature order
pub const REQUIRED_FIELDS: [&str; 9] = [
    "Product_ID",
    "Product_Type",
    "Production_Volume",
    "Shift",
    "Operator_Experience_Level",
    "Machine_Usage_Hours",
    "Temperature",
    "Humidity",
    "Previous_Day_Defects",
];

/// Columns that are always coerced to floats
pub const NUMERIC_FIELDS: [&str; 5] = [
    "Production_Volume",
    "Machine_Usage_Hours",
    "Temperature",
    "Humidity",
    "Previous_Day_Defects",
];

pub const FEATURE_COUNT: usize = REQUIRED_FIELDS.len();

// ============================================================================
// LABEL ENCODERS
// ============================================================================

/// Fitted categorical encoders: a value's code is its index in the class list
#[derive(Debug, Clone, Default)]
pub struct LabelEncoders {
    classes: BTreeMap<String, Vec<String>>,
}

impl LabelEncoders {
    pub fn from_path(path: &Path) -> Result<Self, InferenceError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
            .map_err(|e| InferenceError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, InferenceError> {
        let classes: BTreeMap<String, Vec<String>> = serde_json::from_str(raw)
            .map_err(|e| InferenceError::Config(e.to_string()))?;
        Self::new(classes)
    }

    pub fn new(classes: BTreeMap<String, Vec<String>>) -> Result<Self, InferenceError> {
        for (column, known) in &classes {
            if !REQUIRED_FIELDS.contains(&column.as_str()) {
                return Err(InferenceError::Config(format!("encoder for unknown column {}", column)));
            }
            if NUMERIC_FIELDS.contains(&column.as_str()) {
                return Err(InferenceError::Config(format!("encoder for numeric column {}", column)));
            }
            if known.is_empty() {
                return Err(InferenceError::Config(format!("encoder for {} has no classes", column)));
            }
        }

        Ok(Self { classes })
    }

    pub fn columns(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }

    pub fn is_encoded(&self, column: &str) -> bool {
        self.classes.contains_key(column)
    }

    /// Code for `value` in `column`, or `None` if the label was never seen
    pub fn encode(&self, column: &str, value: &str) -> Option<usize> {
        self.classes.get(column)?.iter().position(|known| known == value)
    }
}

// ============================================================================
// BATCH RECORD
// ============================================================================

/// A validated, fully encoded production batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRecord {
    features: [f32; FEATURE_COUNT],
}

impl BatchRecord {
    pub fn from_json(input: &Value, encoders: &LabelEncoders) -> Result<Self, InferenceError> {
        let object = match input {
            Value::Object(map) if !map.is_empty() => map,
            _ => return Err(invalid("No input data provided".to_string())),
        };

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| !object.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            return Err(invalid(format!("Missing required fields: {}", missing.join(", "))));
        }

        let mut features = [0.0f32; FEATURE_COUNT];

        for field in NUMERIC_FIELDS {
            features[feature_index(field)] = numeric_field(object, field)?;
        }

        for (idx, field) in REQUIRED_FIELDS.iter().enumerate() {
            if NUMERIC_FIELDS.contains(field) {
                continue;
            }

            features[idx] = if encoders.is_encoded(field) {
                categorical_field(object, field, encoders)?
            } else {
                numeric_field(object, field)?
            };
        }

        Ok(Self { features })
    }

    pub fn features(&self) -> &[f32] {
        &self.features
    }
}

fn invalid(msg: String) -> InferenceError {
    InferenceError::InvalidInput(msg)
}

fn feature_index(field: &str) -> usize {
    REQUIRED_FIELDS
        .iter()
        .position(|f| *f == field)
        .unwrap_or_default()
}

fn numeric_field(object: &Map<String, Value>, field: &str) -> Result<f32, InferenceError> {
    let value = match &object[field] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };

    value
        .filter(|v| v.is_finite())
        .map(|v| v as f32)
        .ok_or_else(|| invalid(format!("Invalid numeric value in field: {}", field)))
}

fn categorical_field(
    object: &Map<String, Value>,
    field: &str,
    encoders: &LabelEncoders,
) -> Result<f32, InferenceError> {
    let label = match &object[field] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(invalid(format!(
                "Invalid categorical value: {} must be a string, got {}",
                field, other
            )))
        }
    };

    encoders
        .encode(field, &label)
        .map(|code| code as f32)
        .ok_or_else(|| {
            invalid(format!(
                "Invalid categorical value: unseen label '{}' for {}",
                label, field
            ))
        })
}

/// Model output to a defect count: truncated toward zero, never negative
pub fn to_defect_count(raw: f32) -> Result<i64, InferenceError> {
    if !raw.is_finite() {
        return Err(InferenceError::Runtime(format!("Non-finite prediction: {}", raw)));
    }
    Ok((raw.trunc() as i64).max(0))
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

pub struct OnnxDefectRegressor {
    session: OnnxSession,
}

impl OnnxDefectRegressor {
    pub fn from_artifact(artifact: &Artifact) -> Result<Self, InferenceError> {
        let session = OnnxSession::from_bytes(&artifact.bytes)?;
        tracing::info!("Defect regressor loaded: {}", artifact.metadata.name);
        Ok(Self { session })
    }
}

impl DefectRegressor for OnnxDefectRegressor {
    fn predict(&self, features: &[f32]) -> Result<f32, InferenceError> {
        let input = Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| InferenceError::Runtime(format!("Array error: {}", e)))?;

        let output = self.session.run(input)?;
        output
            .first()
            .copied()
            .ok_or_else(|| InferenceError::Runtime("Empty model output".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encoders() -> LabelEncoders {
        LabelEncoders::from_json_str(
            r#"{
                "Product_Type": ["A", "B", "C", "Custom"],
                "Shift": ["Afternoon", "Morning", "Night"],
                "Operator_Experience_Level": ["Expert", "High", "Low", "Medium"]
            }"#,
        )
        .unwrap()
    }

    fn valid_record() -> Value {
        json!({
            "Product_ID": 17,
            "Product_Type": "B",
            "Production_Volume": "1200",
            "Shift": "Night",
            "Operator_Experience_Level": "Medium",
            "Machine_Usage_Hours": 6.5,
            "Temperature": " 71.2 ",
            "Humidity": 40,
            "Previous_Day_Defects": 3
        })
    }

    fn error_message(err: InferenceError) -> String {
        match err {
            InferenceError::InvalidInput(msg) => msg,
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_features_in_column_order() {
        let record = BatchRecord::from_json(&valid_record(), &encoders()).unwrap();
        assert_eq!(
            record.features(),
            &[17.0, 1.0, 1200.0, 2.0, 3.0, 6.5, 71.2, 40.0, 3.0]
        );
    }

    #[test]
    fn test_empty_input() {
        let err = BatchRecord::from_json(&json!({}), &encoders()).unwrap_err();
        assert_eq!(error_message(err), "No input data provided");

        let err = BatchRecord::from_json(&json!([1, 2]), &encoders()).unwrap_err();
        assert_eq!(error_message(err), "No input data provided");
    }

    #[test]
    fn test_missing_fields_are_listed_in_order() {
        let mut input = valid_record();
        let object = input.as_object_mut().unwrap();
        object.remove("Humidity");
        object.remove("Product_ID");

        let err = BatchRecord::from_json(&input, &encoders()).unwrap_err();
        assert_eq!(error_message(err), "Missing required fields: Product_ID, Humidity");
    }

    #[test]
    fn test_invalid_numeric() {
        let mut input = valid_record();
        input["Temperature"] = json!("hot");
        let err = BatchRecord::from_json(&input, &encoders()).unwrap_err();
        assert_eq!(error_message(err), "Invalid numeric value in field: Temperature");

        input["Temperature"] = Value::Null;
        assert!(BatchRecord::from_json(&input, &encoders()).is_err());

        input["Temperature"] = json!("NaN");
        assert!(BatchRecord::from_json(&input, &encoders()).is_err());
    }

    #[test]
    fn test_numeric_checked_before_categorical() {
        let mut input = valid_record();
        input["Shift"] = json!("Graveyard");
        input["Humidity"] = json!([]);
        let err = BatchRecord::from_json(&input, &encoders()).unwrap_err();
        assert_eq!(error_message(err), "Invalid numeric value in field: Humidity");
    }

    #[test]
    fn test_unseen_categorical() {
        let mut input = valid_record();
        input["Shift"] = json!("Graveyard");
        let err = BatchRecord::from_json(&input, &encoders()).unwrap_err();
        assert_eq!(
            error_message(err),
            "Invalid categorical value: unseen label 'Graveyard' for Shift"
        );
    }

    #[test]
    fn test_unencoded_product_id_must_be_numeric() {
        let mut input = valid_record();
        input["Product_ID"] = json!("P-17");
        let err = BatchRecord::from_json(&input, &encoders()).unwrap_err();
        assert_eq!(error_message(err), "Invalid numeric value in field: Product_ID");
    }

    #[test]
    fn test_encoded_numbers_match_string_classes() {
        let encoders = LabelEncoders::from_json_str(
            r#"{"Product_ID": ["101", "102"], "Shift": ["Day", "Night"]}"#,
        )
        .unwrap();
        let mut input = valid_record();
        input["Product_ID"] = json!(102);
        input["Shift"] = json!("Day");
        input["Product_Type"] = json!(2);
        input["Operator_Experience_Level"] = json!(1);

        let record = BatchRecord::from_json(&input, &encoders).unwrap();
        assert_eq!(record.features()[0], 1.0);
        assert_eq!(record.features()[1], 2.0);
        assert_eq!(record.features()[3], 0.0);
    }

    #[test]
    fn test_encoder_validation() {
        assert!(LabelEncoders::from_json_str(r#"{"Color": ["red"]}"#).is_err());
        assert!(LabelEncoders::from_json_str(r#"{"Humidity": ["low"]}"#).is_err());
        assert!(LabelEncoders::from_json_str(r#"{"Shift": []}"#).is_err());
        assert!(LabelEncoders::from_json_str("not json").is_err());
    }

    #[test]
    fn test_defect_count() {
        assert_eq!(to_defect_count(3.99).unwrap(), 3);
        assert_eq!(to_defect_count(0.2).unwrap(), 0);
        assert_eq!(to_defect_count(-2.5).unwrap(), 0);
        assert!(to_defect_count(f32::NAN).is_err());
    }
}
