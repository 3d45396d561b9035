//! Query arguments passed to providers alongside a location.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Only rows modified at or after this epoch-millis timestamp.
pub const QUERY_ARG_LAST_MODIFIED_AFTER: &str = "query-arg-last-modified-after";
/// Case-insensitive display-name match term.
pub const QUERY_ARG_DISPLAY_NAME: &str = "query-arg-display-name";
/// MIME type wildcards the provider should restrict results to.
pub const QUERY_ARG_MIME_TYPES: &str = "query-arg-mime-types";
/// Column names the provider should sort by.
pub const QUERY_ARG_SORT_COLUMNS: &str = "query-arg-sort-columns";
/// "asc" or "desc".
pub const QUERY_ARG_SORT_DIRECTION: &str = "query-arg-sort-direction";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Str(String),
    StrList(Vec<String>),
}

/// String-keyed argument map. Keys iterate in sorted order so two maps with
/// the same entries compare and hash equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryArgs(BTreeMap<String, ArgValue>);

impl QueryArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn put(&mut self, key: impl Into<String>, value: ArgValue) {
        self.0.insert(key.into(), value);
    }

    pub fn put_int(&mut self, key: impl Into<String>, value: i64) {
        self.put(key, ArgValue::Int(value));
    }

    pub fn put_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.put(key, ArgValue::Str(value.into()));
    }

    pub fn put_str_list<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.put(
            key,
            ArgValue::StrList(values.into_iter().map(Into::into).collect()),
        );
    }

    pub fn put_bool(&mut self, key: impl Into<String>, value: bool) {
        self.put(key, ArgValue::Bool(value));
    }

    /// Builder form of [`QueryArgs::put_str_list`].
    pub fn with_str_list<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.put_str_list(key, values);
        self
    }

    pub fn with_int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.put_int(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.0.get(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(ArgValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(ArgValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_str_list(&self, key: &str) -> Option<&[String]> {
        match self.0.get(key) {
            Some(ArgValue::StrList(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Copies every entry of `other` into `self`; `other` wins on collision.
    pub fn put_all(&mut self, other: &QueryArgs) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_all_overrides_on_collision() {
        let mut base = QueryArgs::new();
        base.put_int(QUERY_ARG_LAST_MODIFIED_AFTER, 10);
        base.put_str(QUERY_ARG_DISPLAY_NAME, "report");

        let mut extra = QueryArgs::new();
        extra.put_str(QUERY_ARG_DISPLAY_NAME, "invoice");
        extra.put_str_list(QUERY_ARG_MIME_TYPES, ["image/*"]);

        base.put_all(&extra);
        assert_eq!(base.len(), 3);
        assert_eq!(base.get_str(QUERY_ARG_DISPLAY_NAME), Some("invoice"));
        assert_eq!(base.get_int(QUERY_ARG_LAST_MODIFIED_AFTER), Some(10));
        assert_eq!(
            base.get_str_list(QUERY_ARG_MIME_TYPES),
            Some(&["image/*".to_string()][..])
        );
    }

    #[test]
    fn typed_getters_reject_other_variants() {
        let mut args = QueryArgs::new();
        args.put_str("k", "v");
        assert_eq!(args.get_int("k"), None);
        assert_eq!(args.get_str_list("k"), None);
        assert_eq!(args.get_str("missing"), None);
    }

    #[test]
    fn serializes_as_plain_json_object() {
        let mut args = QueryArgs::new();
        args.put_int("a", 1);
        args.put_bool("b", true);
        let json = serde_json::to_string(&args).unwrap();
        assert_eq!(json, r#"{"a":1,"b":true}"#);
        let back: QueryArgs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, args);
    }
}
