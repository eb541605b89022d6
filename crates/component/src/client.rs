use std::collections::HashMap;

/// Read-only multimap of request metadata attached to an inbound call.
///
/// Keys are normalized to ASCII lowercase at construction, to be consistent
/// with http/2 headers; lookups are therefore case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: HashMap<String, Vec<String>>,
}

impl Metadata {
    pub fn new(entries: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        let mut normalized: HashMap<String, Vec<String>> = HashMap::new();
        for (key, mut values) in entries {
            normalized
                .entry(key.to_ascii_lowercase())
                .or_default()
                .append(&mut values);
        }
        Self {
            entries: normalized,
        }
    }

    /// All values recorded under `key`. Missing keys yield an empty slice.
    pub fn get(&self, key: &str) -> &[String] {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Call-scoped information about the client that submitted a payload.
#[derive(Debug, Clone, Default)]
pub struct Context {
    metadata: Metadata,
}

impl Context {
    pub fn new(metadata: Metadata) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
