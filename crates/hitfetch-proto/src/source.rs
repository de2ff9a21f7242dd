//! Source payload encodings.

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use crate::error::Error;

/// Encoding tag of a serialized source payload.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Archive,
    Serialize,
    Deserialize,
    SerdeSerialize,
    SerdeDeserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// JSON text.
    #[default]
    Json,
    /// YAML text.
    Yaml,
}

impl SourceFormat {
    /// Parse a payload in this encoding into a generic tree.
    pub fn decode(self, bytes: &[u8]) -> Result<serde_json::Value, Error> {
        let decoded = match self {
            SourceFormat::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
            SourceFormat::Yaml => serde_yaml::from_slice(bytes).map_err(|e| e.to_string()),
        };
        decoded.map_err(|reason| Error::Decode {
            format: self.as_str(),
            reason,
        })
    }

    /// Serialize a tree in this encoding.
    pub fn encode(self, value: &serde_json::Value) -> Result<Vec<u8>, Error> {
        let encoded = match self {
            SourceFormat::Json => serde_json::to_vec(value).map_err(|e| e.to_string()),
            SourceFormat::Yaml => serde_yaml::to_string(value)
                .map(String::into_bytes)
                .map_err(|e| e.to_string()),
        };
        encoded.map_err(|reason| Error::Encode {
            format: self.as_str(),
            reason,
        })
    }

    /// Short name used in logs and rendered hits.
    pub fn as_str(self) -> &'static str {
        match self {
            SourceFormat::Json => "json",
            SourceFormat::Yaml => "yaml",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_encode_decode() {
        let tree = json!({"title": "a", "tags": ["x", "y"]});
        let bytes = SourceFormat::Json.encode(&tree).unwrap();
        assert_eq!(SourceFormat::Json.decode(&bytes).unwrap(), tree);
    }

    #[test]
    fn test_yaml_encode_decode() {
        let tree = json!({"user": {"name": "kim", "age": 31}});
        let bytes = SourceFormat::Yaml.encode(&tree).unwrap();
        assert!(std::str::from_utf8(&bytes).unwrap().contains("name: kim"));
        assert_eq!(SourceFormat::Yaml.decode(&bytes).unwrap(), tree);
    }

    #[test]
    fn test_decode_garbage() {
        let err = SourceFormat::Json.decode(b"{not json").unwrap_err();
        assert!(matches!(err, Error::Decode { format: "json", .. }));
        assert!(err.to_string().starts_with("cannot decode json source"));
    }
}
