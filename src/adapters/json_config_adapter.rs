//! JSON configuration adapter: `{ "section": { "key": value } }`.
//!
//! Numbers, booleans and strings are accepted for every getter; arrays are
//! exposed to `get_string` (and therefore `get_list`) joined by commas.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use super::file_config_adapter::parse_bool;
use crate::domain::error::TraderError;
use crate::ports::config_port::ConfigPort;

pub struct JsonConfigAdapter {
    sections: HashMap<String, serde_json::Map<String, Value>>,
}

impl JsonConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TraderError> {
        let path = path.as_ref();
        let file = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| TraderError::ConfigParse {
            file: file.clone(),
            reason: e.to_string(),
        })?;
        Self::parse(&content, &file)
    }

    pub fn from_string(content: &str) -> Result<Self, TraderError> {
        Self::parse(content, "<string>")
    }

    fn parse(content: &str, file: &str) -> Result<Self, TraderError> {
        let parse_error = |reason: String| TraderError::ConfigParse {
            file: file.to_string(),
            reason,
        };

        let root: Value = serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?;
        let Value::Object(root) = root else {
            return Err(parse_error("top level must be an object".to_string()));
        };

        let mut sections = HashMap::new();
        for (name, body) in root {
            match body {
                Value::Object(keys) => {
                    sections.insert(name, keys);
                }
                _ => return Err(parse_error(format!("section '{}' must be an object", name))),
            }
        }
        Ok(Self { sections })
    }

    fn value(&self, section: &str, key: &str) -> Option<&Value> {
        self.sections.get(section)?.get(key)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl ConfigPort for JsonConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        match self.value(section, key)? {
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().filter_map(scalar_to_string).collect();
                Some(parts.join(","))
            }
            other => scalar_to_string(other),
        }
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        match self.value(section, key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => parse_bool(s).unwrap_or(default),
            Some(Value::Number(n)) => n.as_i64().map(|v| v != 0).unwrap_or(default),
            _ => default,
        }
    }
}
