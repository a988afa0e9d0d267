use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::OnceLock;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomFieldType {
    Varchar,
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    List,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomField {
    pub id: u64,
    pub name: String,
    pub label: String,
    pub data_type: CustomFieldType,
    pub required: bool,
    pub max_length: Option<usize>,
    #[serde(default)]
    pub list_values: Vec<String>,
    pub ordering: i32,
}

impl CustomField {
    /// Key under which the field appears in ticket documents.
    pub fn api_key(&self) -> String {
        format!("custom_{}", self.name)
    }

    /// 校验并规范化一个输入值；未提供的值返回 `Value::Null`
    pub fn clean(&self, value: Option<&Value>) -> Result<Value, String> {
        let value = match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(v),
        };

        let Some(value) = value else {
            if self.required {
                return Err("This field is required.".to_string());
            }
            return Ok(Value::Null);
        };

        match self.data_type {
            CustomFieldType::Varchar | CustomFieldType::Text => {
                let text = value_as_text(value)?;
                if let Some(max) = self.max_length {
                    if text.chars().count() > max {
                        return Err(format!(
                            "Ensure this value has at most {} characters (it has {}).",
                            max,
                            text.chars().count()
                        ));
                    }
                }
                Ok(Value::String(text))
            }
            CustomFieldType::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::Number(n.clone())),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(|n| json!(n))
                    .map_err(|_| "Enter a whole number.".to_string()),
                _ => Err("Enter a whole number.".to_string()),
            },
            CustomFieldType::Decimal => match value {
                Value::Number(n) => Ok(Value::Number(n.clone())),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| "Enter a number.".to_string()),
                _ => Err("Enter a number.".to_string()),
            },
            CustomFieldType::Boolean => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "true" | "on" | "1" | "yes" => Ok(Value::Bool(true)),
                    "false" | "off" | "0" | "no" => Ok(Value::Bool(false)),
                    _ => Err("Must be either true or false.".to_string()),
                },
                _ => Err("Must be either true or false.".to_string()),
            },
            CustomFieldType::Date => {
                let text = value_as_text(value)?;
                NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                    .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                    .map_err(|_| "Enter a valid date.".to_string())
            }
            CustomFieldType::List => {
                let text = value_as_text(value)?;
                if self.list_values.iter().any(|choice| choice == &text) {
                    Ok(Value::String(text))
                } else {
                    Err(format!(
                        "Select a valid choice. {} is not one of the available choices.",
                        text
                    ))
                }
            }
        }
    }
}

fn value_as_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err("Enter a valid value.".to_string()),
    }
}

fn validate_field_name(name: &str) -> Result<(), ValidationError> {
    static FIELD_NAME: OnceLock<Regex> = OnceLock::new();
    let pattern = FIELD_NAME.get_or_init(|| Regex::new(r"^[a-z0-9_]+$").expect("valid regex"));

    if pattern.is_match(name) {
        Ok(())
    } else {
        let mut error = ValidationError::new("field_name");
        error.message = Some("Use lowercase letters, digits and underscores only.".into());
        Err(error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCustomFieldRequest {
    #[validate(length(min = 1, max = 50), custom = "validate_field_name")]
    pub name: String,
    #[validate(length(min = 1, max = 30))]
    pub label: String,
    pub data_type: CustomFieldType,
    #[serde(default)]
    pub required: bool,
    pub max_length: Option<usize>,
    #[serde(default)]
    pub list_values: Vec<String>,
    #[serde(default)]
    pub ordering: i32,
}
