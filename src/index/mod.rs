//! The JSON document carried inside every index: a files list and a status message.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::IndexError;

/// A scalar field of a structured file entry.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Text(String),
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        FieldValue::Unsigned(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        if n >= 0 { FieldValue::Unsigned(n as u64) } else { FieldValue::Signed(n) }
    }
}

/// Fields of a structured file entry, kept in the order they were written
/// or read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, FieldValue)>);

impl Fields {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Fields(iter.into_iter().collect())
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Fields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of string or integer fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Fields, A::Error> {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, FieldValue>()? {
                    fields.push(entry);
                }
                Ok(Fields(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

/// One entry of the `files` list: a bare path/URL, or a record such as
/// `{"url": "...", "size": 1234}`.  The codec never interprets either form.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum FileEntry {
    Path(String),
    Record(Fields),
}

impl FileEntry {
    pub fn record<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        FileEntry::Record(fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<&str> for FileEntry {
    fn from(s: &str) -> Self {
        FileEntry::Path(s.to_string())
    }
}

impl From<String> for FileEntry {
    fn from(s: String) -> Self {
        FileEntry::Path(s)
    }
}

/// The logical content of an index: a files list and a status message.
///
/// Serialized as `{"files": [...], "success": "..."}`; a key is omitted when
/// its value is absent, and either key may be missing on input.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct IndexDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    files: Option<Vec<FileEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    success: Option<String>,
}

impl IndexDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> Option<&[FileEntry]> {
        self.files.as_deref()
    }

    pub fn success(&self) -> Option<&str> {
        self.success.as_deref()
    }

    /// Replace the files list.
    pub fn set_files<I, E>(&mut self, files: I) -> &mut Self
    where
        I: IntoIterator<Item = E>,
        E: Into<FileEntry>,
    {
        self.files = Some(files.into_iter().map(Into::into).collect());
        self
    }

    pub fn push_file(&mut self, entry: impl Into<FileEntry>) -> &mut Self {
        self.files.get_or_insert_with(Vec::new).push(entry.into());
        self
    }

    pub fn clear_files(&mut self) -> &mut Self {
        self.files = None;
        self
    }

    /// Append to the status message, creating it if absent.
    pub fn add_success_message(&mut self, message: &str) -> &mut Self {
        match &mut self.success {
            Some(s) => s.push_str(message),
            None => self.success = Some(message.to_string()),
        }
        self
    }

    pub fn to_json(&self) -> Result<Vec<u8>, IndexError> {
        serde_json::to_vec(self).map_err(|e| IndexError::CorruptPayload(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, IndexError> {
        serde_json::from_slice(bytes)
            .map_err(|e| IndexError::CorruptPayload(format!("metadata JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_omitted_when_absent() {
        let doc = IndexDocument::new();
        assert_eq!(doc.to_json().unwrap(), b"{}");

        let mut doc = IndexDocument::new();
        doc.add_success_message("ok");
        assert_eq!(doc.to_json().unwrap(), br#"{"success":"ok"}"#);
    }

    #[test]
    fn canonical_key_order() {
        let mut doc = IndexDocument::new();
        doc.add_success_message("ok").set_files(["game.nsp"]);
        assert_eq!(doc.to_json().unwrap(), br#"{"files":["game.nsp"],"success":"ok"}"#);
    }

    #[test]
    fn success_message_accumulates() {
        let mut doc = IndexDocument::new();
        assert_eq!(doc.success(), None);
        doc.add_success_message("Loaded ");
        doc.add_success_message("index ");
        doc.add_success_message("successfully!");
        assert_eq!(doc.success(), Some("Loaded index successfully!"));
    }

    #[test]
    fn set_files_replaces() {
        let mut doc = IndexDocument::new();
        doc.push_file("a.nsp").push_file("b.nsp");
        doc.set_files(vec![FileEntry::from("c.nsp")]);
        assert_eq!(doc.files(), Some(&[FileEntry::Path("c.nsp".into())][..]));
        doc.clear_files();
        assert_eq!(doc.files(), None);
    }

    #[test]
    fn mixed_entries_pass_through_unchanged() {
        let json = br#"{"files":["https://host/a.nsp",{"size":1048576,"url":"https://host/b.nsz"},{"offset":-4,"title":"x"}]}"#;
        let doc = IndexDocument::from_json(json).unwrap();
        let files = doc.files().unwrap();
        assert_eq!(files[0], FileEntry::Path("https://host/a.nsp".into()));
        assert_eq!(
            files[1],
            FileEntry::record([("size", FieldValue::from(1048576u64)), ("url", "https://host/b.nsz".into())])
        );
        assert_eq!(
            files[2],
            FileEntry::record([("offset", FieldValue::Signed(-4)), ("title", "x".into())])
        );
        assert_eq!(doc.success(), None);
        assert_eq!(doc.to_json().unwrap(), &json[..]);
    }

    #[test]
    fn record_fields_keep_their_order() {
        let json = br#"{"files":[{"url":"https://host/c.nsz","size":7,"name":"c"}]}"#;
        let doc = IndexDocument::from_json(json).unwrap();
        match &doc.files().unwrap()[0] {
            FileEntry::Record(fields) => {
                let keys: Vec<&str> = fields.iter().map(|(k, _)| k).collect();
                assert_eq!(keys, ["url", "size", "name"]);
                assert_eq!(fields.get("size"), Some(&FieldValue::Unsigned(7)));
                assert_eq!(fields.len(), 3);
            }
            other => panic!("expected a record, got {other:?}"),
        }
        assert_eq!(doc.to_json().unwrap(), &json[..]);

        let mut built = IndexDocument::new();
        built.push_file(FileEntry::record([("url", FieldValue::from("u")), ("size", 1u64.into())]));
        assert_eq!(built.to_json().unwrap(), br#"{"files":[{"url":"u","size":1}]}"#);
    }

    #[test]
    fn missing_keys_are_tolerated() {
        assert_eq!(IndexDocument::from_json(b"{}").unwrap(), IndexDocument::new());
        let doc = IndexDocument::from_json(br#"{"success":"hi","extra":1}"#).unwrap();
        assert_eq!(doc.success(), Some("hi"));
        assert_eq!(doc.files(), None);
    }

    #[test]
    fn malformed_json_is_corrupt_payload() {
        for bad in [&b"not json"[..], b"{\"files\":", b"\"text\"", b"{\"files\":[1.5]}"] {
            assert!(matches!(IndexDocument::from_json(bad), Err(IndexError::CorruptPayload(_))));
        }
    }
}
