//! JSON column (de)serialization helpers for SQLite storage.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::Result;

pub fn serialize_string_vec(vec: &[String]) -> Result<String> {
    Ok(serde_json::to_string(vec)?)
}

pub fn deserialize_string_vec(json: &str) -> Result<Vec<String>> {
    Ok(serde_json::from_str(json)?)
}

pub fn serialize_attributes(attrs: &HashMap<String, Value>) -> Result<Option<String>> {
    if attrs.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(attrs)?))
    }
}

pub fn deserialize_attributes(json: Option<String>) -> Result<HashMap<String, Value>> {
    match json {
        Some(json_str) => Ok(serde_json::from_str(&json_str)?),
        None => Ok(HashMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_vec_roundtrip() {
        let vec = vec!["alice".to_string(), "bob".to_string()];
        let json = serialize_string_vec(&vec).unwrap();
        assert_eq!(deserialize_string_vec(&json).unwrap(), vec);
    }

    #[test]
    fn empty_attributes_serialize_to_none() {
        let attrs = HashMap::new();
        assert_eq!(serialize_attributes(&attrs).unwrap(), None);
    }

    #[test]
    fn none_attributes_deserialize_to_empty() {
        assert!(deserialize_attributes(None).unwrap().is_empty());
    }

    #[test]
    fn attributes_roundtrip() {
        let mut attrs = HashMap::new();
        attrs.insert("color".to_string(), serde_json::json!("red"));
        let json = serialize_attributes(&attrs).unwrap().unwrap();
        let back = deserialize_attributes(Some(json)).unwrap();
        assert_eq!(back, attrs);
    }
}
