//! `user-collections` payload
//!
//! The client stores its collections as a JSON object serialised into a
//! single KeyValues string. Inside that string every `"` and `\` of the JSON
//! text is preceded by a backslash. Decoding undoes exactly that escaping
//! before handing the text to the JSON parser; encoding applies it after
//! serialising.

use serde_json::{Map, Value};

use crate::category::UserCollections;
use crate::error::{Result, SyncError};

pub const COLLECTIONS_KEY: &str = "user-collections";

pub fn decode_collections(raw: &str) -> Result<UserCollections> {
    let json = unescape(raw);
    if json.trim().is_empty() {
        return Ok(UserCollections::new());
    }
    match serde_json::from_str::<Value>(&json)? {
        Value::Object(map) => Ok(UserCollections::from_map(map)),
        Value::Null => Ok(UserCollections::from_map(Map::new())),
        other => Err(SyncError::Structural {
            key: COLLECTIONS_KEY.to_string(),
            message: format!("expected an object, found {}", type_name(&other)),
        }),
    }
}

pub fn encode_collections(collections: &UserCollections) -> Result<String> {
    let json = serde_json::to_string(collections.as_map())?;
    Ok(escape(&json))
}

fn escape(json: &str) -> String {
    let mut out = String::with_capacity(json.len() + json.len() / 4);
    for c in json.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '"' || next == '\\' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_id::AppId;
    use crate::category::CollectionRecord;

    #[test]
    fn test_decode_client_payload() {
        let raw = r#"{\"srm-SNES\":{\"id\":\"srm-SNES\",\"added\":[2147484649],\"removed\":[]}}"#;
        let collections = decode_collections(raw).unwrap();
        let record = collections.get("srm-SNES").unwrap().unwrap();
        assert_eq!(record.added, vec![AppId(2_147_484_649)]);
    }

    #[test]
    fn test_encode_escapes_quotes() {
        let mut collections = UserCollections::new();
        collections.insert(&CollectionRecord::new("srm-A")).unwrap();
        assert_eq!(
            encode_collections(&collections).unwrap(),
            r#"{\"srm-A\":{\"id\":\"srm-A\",\"added\":[],\"removed\":[]}}"#
        );
    }

    #[test]
    fn test_round_trip_with_awkward_names() {
        let mut collections = UserCollections::new();
        for name in [r#"srm-Say "hi""#, r"srm-C:\Games", "srm-Tab\there", "srm-Ünïcödé"] {
            collections.insert(&CollectionRecord::new(name)).unwrap();
        }
        let encoded = encode_collections(&collections).unwrap();
        assert_eq!(decode_collections(&encoded).unwrap(), collections);
    }

    #[test]
    fn test_encoded_payload_survives_keyvalues() {
        use crate::localconfig::keyvalues::{parse, stringify, KeyValue, KeyValues};

        let mut collections = UserCollections::new();
        collections
            .insert(&CollectionRecord::new(r#"srm-Quote" and \ slash"#))
            .unwrap();
        let mut tree = KeyValues::new();
        tree.set(
            COLLECTIONS_KEY,
            KeyValue::String(encode_collections(&collections).unwrap()),
        );

        let reparsed = parse(&stringify(&tree)).unwrap();
        let raw = reparsed.get_str(COLLECTIONS_KEY).unwrap();
        assert_eq!(decode_collections(raw).unwrap(), collections);
    }

    #[test]
    fn test_empty_payload_is_empty_set() {
        assert!(decode_collections("").unwrap().is_empty());
        assert!(decode_collections("null").unwrap().is_empty());
    }

    #[test]
    fn test_non_object_payload_is_structural() {
        assert!(matches!(
            decode_collections("[1,2]"),
            Err(SyncError::Structural { .. })
        ));
        assert!(matches!(decode_collections("{broken"), Err(SyncError::Json(_))));
    }
}
