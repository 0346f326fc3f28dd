use serde_json::{Map, Value};

use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 1, 65_535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_non_empty_string_field(llm, "llm.model", "model")?;
        validate_u64_field(
            llm,
            "llm.generation_timeout_secs",
            "generation_timeout_secs",
            1,
            3_600,
        )?;
        validate_u64_field(
            llm,
            "llm.rewrite_timeout_secs",
            "rewrite_timeout_secs",
            1,
            3_600,
        )?;
        validate_optional_number_field(
            llm,
            "llm.generation_temperature",
            "generation_temperature",
            0.0,
            2.0,
        )?;
        validate_bool_field(llm, "llm.strip_reasoning", "strip_reasoning")?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_optional_string_field(retrieval, "retrieval.base_url", "base_url")?;
        validate_non_empty_string_field(retrieval, "retrieval.collection", "collection")?;
        validate_u64_field(retrieval, "retrieval.n_results", "n_results", 1, 100)?;
        validate_u64_field(retrieval, "retrieval.timeout_secs", "timeout_secs", 1, 3_600)?;
        validate_optional_string_field(retrieval, "retrieval.api_key", "api_key")?;
    }

    if let Some(history) = expect_optional_object(root, "history")? {
        validate_u64_field(history, "history.rewrite_window", "rewrite_window", 0, 100)?;
    }

    if let Some(prompts) = expect_optional_object(root, "prompts")? {
        validate_non_empty_string_field(prompts, "prompts.answer_template", "answer_template")?;
        validate_non_empty_string_field(prompts, "prompts.rewrite_template", "rewrite_template")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_number_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_non_empty_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_complete_configs() {
        assert!(validate_config(&json!({})).is_ok());
        assert!(validate_config(&json!({
            "server": { "host": "0.0.0.0", "port": 5001, "cors_allowed_origins": ["http://localhost"] },
            "llm": { "model": "deepseek-r1:7b", "generation_timeout_secs": 60, "generation_temperature": 0.2 },
            "retrieval": { "collection": "FAQ", "n_results": 5 },
            "history": { "rewrite_window": 4 }
        }))
        .is_ok());
    }

    #[test]
    fn rejects_non_object_root() {
        let err = validate_config(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("'root'"));
    }

    #[test]
    fn rejects_out_of_range_port() {
        let err = validate_config(&json!({ "server": { "port": 70000 } })).unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn rejects_blank_model_and_wrong_types() {
        assert!(validate_config(&json!({ "llm": { "model": "  " } })).is_err());
        assert!(validate_config(&json!({ "llm": { "strip_reasoning": "yes" } })).is_err());
        assert!(validate_config(&json!({ "llm": { "generation_temperature": 5.0 } })).is_err());
        assert!(validate_config(&json!({ "retrieval": "FAQ" })).is_err());
    }

    #[test]
    fn rejects_empty_origin_entries() {
        let err = validate_config(&json!({ "server": { "cors_allowed_origins": ["", "x"] } }))
            .unwrap_err();
        assert!(err.to_string().contains("server.cors_allowed_origins[0]"));
    }
}
