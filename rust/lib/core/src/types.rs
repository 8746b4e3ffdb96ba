use serde::{Deserialize, Serialize};

/// Hard ceiling on page size for every list endpoint.
pub const MAX_LIMIT: usize = 500;

/// Parameters for list/query operations.
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    /// Maximum number of results to return.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Offset for pagination.
    #[serde(default)]
    pub offset: usize,

    /// Sort field in camelCase. A leading `-` sorts descending.
    /// Defaults to newest first.
    #[serde(default)]
    pub sort: Option<String>,

    /// Free-text search term.
    #[serde(default)]
    pub q: Option<String>,
}

fn default_limit() -> usize {
    50
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
            sort: None,
            q: None,
        }
    }
}

impl ListParams {
    /// Page size clamped to `1..=MAX_LIMIT`.
    pub fn capped_limit(&self) -> usize {
        self.limit.clamp(1, MAX_LIMIT)
    }

    /// Search term with surrounding whitespace removed; `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Result wrapper for list operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Generate a new random ID (UUIDv4, no dashes).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string().replace('-', "")
}

/// Get the current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Merge a JSON patch into a base value.
///
/// For each key in `patch`:
/// - If the value is `null`, the key is removed from `base`.
/// - Otherwise, the key is set to the patch value.
///
/// This follows RFC 7386 (JSON Merge Patch) semantics.
pub fn merge_patch(base: &mut serde_json::Value, patch: &serde_json::Value) {
    if let (Some(base_obj), Some(patch_obj)) = (base.as_object_mut(), patch.as_object()) {
        for (key, value) in patch_obj {
            if value.is_null() {
                base_obj.remove(key);
            } else if value.is_object() {
                let entry = base_obj
                    .entry(key.clone())
                    .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
                merge_patch(entry, value);
            } else {
                base_obj.insert(key.clone(), value.clone());
            }
        }
    } else {
        *base = patch.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_hex32() {
        let id = new_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn capped_limit() {
        let mut p = ListParams::default();
        assert_eq!(p.capped_limit(), 50);
        p.limit = 10_000;
        assert_eq!(p.capped_limit(), MAX_LIMIT);
        p.limit = 0;
        assert_eq!(p.capped_limit(), 1);
    }

    #[test]
    fn blank_search_term_is_none() {
        let p = ListParams { q: Some("   ".into()), ..Default::default() };
        assert!(p.search_term().is_none());
        let p = ListParams { q: Some(" scope ".into()), ..Default::default() };
        assert_eq!(p.search_term(), Some("scope"));
    }

    #[test]
    fn merge_patch_removes_nulls_and_merges_objects() {
        let mut base = serde_json::json!({"name": "Oscilloscope", "make": "Tek", "meta": {"a": 1}});
        let patch = serde_json::json!({"make": null, "meta": {"b": 2}, "rate": 1200.5});
        merge_patch(&mut base, &patch);
        assert_eq!(
            base,
            serde_json::json!({"name": "Oscilloscope", "meta": {"a": 1, "b": 2}, "rate": 1200.5})
        );
    }
}
