//! Sensitive field redaction for captured request bodies
//!
//! Two treatments, applied recursively through objects and arrays:
//! - masked fields are replaced with a fixed placeholder, unrecoverable
//! - encrypted fields are replaced with an AES-256-GCM blob, recoverable
//!   by an operator holding the master key

use std::collections::HashSet;

use serde_json::Value;

use crate::crypto::MasterKey;

const MASK: &str = "[***]";

pub struct Redactor {
    masked: HashSet<String>,
    encrypted: HashSet<String>,
    key: MasterKey,
}

impl Redactor {
    pub fn new(key: MasterKey, masked: &[String], encrypted: &[String]) -> Self {
        Self {
            masked: masked.iter().cloned().collect(),
            encrypted: encrypted.iter().cloned().collect(),
            key,
        }
    }

    /// Redact a JSON value in place
    pub fn redact(&self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (k, v) in map.iter_mut() {
                    if self.masked.contains(k.as_str()) {
                        *v = Value::String(MASK.to_string());
                    } else if self.encrypted.contains(k.as_str()) {
                        *v = Value::String(self.encrypt_value(v));
                    } else {
                        self.redact(v);
                    }
                }
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.redact(item);
                }
            }
            _ => {}
        }
    }

    fn encrypt_value(&self, value: &Value) -> String {
        let plaintext = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        // Masking is the fallback when encryption fails; the value must
        // never be stored in the clear
        self.key
            .encrypt_string(&plaintext)
            .unwrap_or_else(|_| MASK.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn redactor_with_key(key: MasterKey) -> Redactor {
        Redactor::new(
            key,
            &fields(&["password", "new_password"]),
            &fields(&["phone"]),
        )
    }

    fn redactor() -> Redactor {
        redactor_with_key(MasterKey::generate())
    }

    #[test]
    fn test_masks_password_fields() {
        let mut body = json!({"username": "alice", "password": "hunter2"});
        redactor().redact(&mut body);

        assert_eq!(body["username"], "alice");
        assert_eq!(body["password"], MASK);
    }

    #[test]
    fn test_redacts_nested_objects_and_arrays() {
        let mut body = json!({
            "users": [
                {"name": "a", "password": "x"},
                {"profile": {"new_password": "y"}}
            ]
        });
        redactor().redact(&mut body);

        assert_eq!(body["users"][0]["password"], MASK);
        assert_eq!(body["users"][1]["profile"]["new_password"], MASK);
        assert_eq!(body["users"][0]["name"], "a");
    }

    #[test]
    fn test_encrypted_fields_are_recoverable() {
        let key = MasterKey::generate();
        let r = redactor_with_key(key.clone());

        let mut body = json!({"phone": "13800138000"});
        r.redact(&mut body);

        let blob = body["phone"].as_str().unwrap();
        assert_ne!(blob, "13800138000");
        assert_eq!(key.decrypt_string(blob).unwrap(), "13800138000");
    }

    #[test]
    fn test_non_string_sensitive_value() {
        let key = MasterKey::generate();
        let r = redactor_with_key(key.clone());

        let mut body = json!({"phone": 13800138000i64});
        r.redact(&mut body);

        let blob = body["phone"].as_str().unwrap();
        assert_eq!(key.decrypt_string(blob).unwrap(), "13800138000");
    }
}
