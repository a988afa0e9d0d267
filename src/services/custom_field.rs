use crate::{
    error::{AppError, FieldErrors, Result},
    models::custom_field::{CreateCustomFieldRequest, CustomField, CustomFieldType},
    services::Database,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;
use validator::Validate;

#[derive(Clone)]
pub struct CustomFieldService {
    db: Database,
}

impl CustomFieldService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create_field(&self, request: CreateCustomFieldRequest) -> Result<CustomField> {
        request.validate()?;

        if request.data_type == CustomFieldType::List && request.list_values.is_empty() {
            return Err(AppError::field("list_values", "List fields need at least one choice."));
        }

        let field = self.db.transaction(|tables| {
            if tables.custom_fields.values().any(|f| f.name == request.name) {
                return Err(AppError::field("name", "Custom field with this name already exists."));
            }

            let field = CustomField {
                id: tables.next_id("custom_field"),
                name: request.name.clone(),
                label: request.label.clone(),
                data_type: request.data_type,
                required: request.required,
                max_length: request.max_length,
                list_values: request.list_values.clone(),
                ordering: request.ordering,
            };
            tables.custom_fields.insert(field.id, field.clone());
            Ok(field)
        })?;

        info!("Created custom field {}", field.name);
        Ok(field)
    }

    pub fn list_fields(&self) -> Vec<CustomField> {
        self.db.read(|t| t.custom_field_definitions())
    }
}

/// Validates `name -> raw value` input against the definitions.
///
/// With `partial` set only the supplied fields are checked, so a missing
/// required field is not an error; otherwise every definition is checked.
/// Unknown names are ignored.
pub fn clean_custom_values(
    definitions: &[CustomField],
    input: &BTreeMap<String, Value>,
    partial: bool,
) -> std::result::Result<BTreeMap<String, Value>, FieldErrors> {
    let mut cleaned = BTreeMap::new();
    let mut errors = FieldErrors::new();

    for field in definitions {
        let raw = input.get(&field.name);
        if partial && raw.is_none() {
            continue;
        }

        match field.clean(raw) {
            Ok(Value::Null) => {
                cleaned.insert(field.name.clone(), Value::Null);
            }
            Ok(value) => {
                cleaned.insert(field.name.clone(), value);
            }
            Err(message) => {
                errors.insert(field.api_key(), vec![message]);
            }
        }
    }

    if errors.is_empty() {
        Ok(cleaned)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(name: &str, data_type: CustomFieldType, required: bool) -> CreateCustomFieldRequest {
        CreateCustomFieldRequest {
            name: name.to_string(),
            label: name.to_string(),
            data_type,
            required,
            max_length: None,
            list_values: vec![],
            ordering: 0,
        }
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let service = CustomFieldService::new(Database::new());
        service.create_field(request("building", CustomFieldType::Varchar, false)).unwrap();
        assert!(service.create_field(request("building", CustomFieldType::Text, false)).is_err());
    }

    #[test]
    fn test_list_requires_choices() {
        let service = CustomFieldService::new(Database::new());
        assert!(service.create_field(request("tier", CustomFieldType::List, false)).is_err());
    }

    #[test]
    fn test_clean_custom_values() {
        let service = CustomFieldService::new(Database::new());
        service.create_field(request("building", CustomFieldType::Varchar, true)).unwrap();
        service.create_field(request("floor", CustomFieldType::Integer, false)).unwrap();
        let definitions = service.list_fields();

        let input: BTreeMap<String, Value> = [("building".to_string(), json!("B4"))].into_iter().collect();
        let cleaned = clean_custom_values(&definitions, &input, false).unwrap();
        assert_eq!(cleaned["building"], json!("B4"));
        assert_eq!(cleaned["floor"], Value::Null);

        let errors = clean_custom_values(&definitions, &BTreeMap::new(), false).unwrap_err();
        assert!(errors.contains_key("custom_building"));

        // partial updates skip absent fields
        assert!(clean_custom_values(&definitions, &BTreeMap::new(), true).unwrap().is_empty());
    }
}
