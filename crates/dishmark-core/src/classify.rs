//! Classification of image-workflow responses.
//!
//! The workflow answers with an object such as
//! `{"is_a_dish": 1, "name": "Ramen", "desc": "Pork broth, egg"}`.
//! [`DishClassifier`] turns that into a [`Verdict`]; any other
//! [`Classifier`] can be plugged into the pipeline instead.

use serde_json::Value;

use crate::models::Verdict;
use crate::traits::Classifier;

/// Classifier for the dish-detection workflow.
#[derive(Debug, Clone)]
pub struct DishClassifier {
    flag_field: String,
    label_field: String,
    detail_field: String,
}

impl DishClassifier {
    pub fn new() -> Self {
        Self {
            flag_field: "is_a_dish".to_string(),
            label_field: "name".to_string(),
            detail_field: "desc".to_string(),
        }
    }

    /// Use different response field names.
    pub fn with_fields(
        flag_field: impl Into<String>,
        label_field: impl Into<String>,
        detail_field: impl Into<String>,
    ) -> Self {
        Self {
            flag_field: flag_field.into(),
            label_field: label_field.into(),
            detail_field: detail_field.into(),
        }
    }

    fn text_field(&self, response: &Value, field: &str) -> String {
        response
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }
}

impl Default for DishClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for DishClassifier {
    fn classify(&self, response: &Value) -> Verdict {
        if !response.is_object() {
            return Verdict::Malformed {
                reason: format!("expected an object, got {response}"),
            };
        }

        // Workflows sometimes stringify numbers, so "1" counts as 1.
        let flag = match response.get(&self.flag_field) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            Some(Value::Bool(b)) => Some(i64::from(*b)),
            _ => None,
        };

        match flag {
            Some(1) => {
                let label = self.text_field(response, &self.label_field);
                if label.is_empty() {
                    Verdict::NonMatch {
                        reason: "no dish name provided".to_string(),
                    }
                } else {
                    Verdict::Match {
                        label,
                        detail: self.text_field(response, &self.detail_field),
                    }
                }
            }
            Some(0) => Verdict::NonMatch {
                reason: "not a dish".to_string(),
            },
            Some(other) => Verdict::Malformed {
                reason: format!("invalid {} value: {other}", self.flag_field),
            },
            None => Verdict::Malformed {
                reason: format!("missing or non-integer {}", self.flag_field),
            },
        }
    }
}
