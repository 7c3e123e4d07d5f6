use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Final object metadata as returned by the store.
///
/// `key` and `hash` are lifted out; every other field is kept as sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub hash: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ObjectMetadata {
    pub fn new<K: Into<String>, H: Into<String>>(key: K, hash: H) -> Self {
        Self {
            key: Some(key.into()),
            hash: Some(hash.into()),
            extra: serde_json::Map::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.extra.get(field)
    }
}

/// Form field the browser attaches the file under
pub const FILE_FIELD: &str = "file";

/// What a browser-side uploader needs to POST a file straight to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectUploadDescriptor {
    pub url: String,
    pub http_method: String,
    pub response_type: String,

    /// `key`, `token`, and `:file` naming the file field
    pub form_fields: BTreeMap<String, String>,
}

impl DirectUploadDescriptor {
    pub fn new<U: Into<String>>(url: U, key: &str, token: String) -> Self {
        let mut form_fields = BTreeMap::new();
        form_fields.insert("key".to_string(), key.to_string());
        form_fields.insert("token".to_string(), token);
        form_fields.insert(":file".to_string(), FILE_FIELD.to_string());

        Self {
            url: url.into(),
            http_method: "POST".to_string(),
            response_type: "json".to_string(),
            form_fields,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.form_fields.get("token").map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_keeps_unknown_fields() {
        let metadata: ObjectMetadata =
            serde_json::from_str(r#"{"key":"a.txt","hash":"Fh","fsize":3,"mimeType":"text/plain"}"#).unwrap();
        assert_eq!(metadata.key.as_deref(), Some("a.txt"));
        assert_eq!(metadata.get("fsize"), Some(&serde_json::json!(3)));

        let encoded = serde_json::to_value(&metadata).unwrap();
        assert_eq!(encoded["mimeType"], "text/plain");
    }

    #[test]
    fn test_direct_upload_fields() {
        let descriptor = DirectUploadDescriptor::new("https://up.example.com", "a/b.png", "tok".to_string());
        assert_eq!(descriptor.http_method, "POST");
        assert_eq!(descriptor.form_fields["key"], "a/b.png");
        assert_eq!(descriptor.form_fields[":file"], "file");
        assert_eq!(descriptor.token(), Some("tok"));
    }
}
