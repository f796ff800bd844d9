//! Request header map as handed to the router by the codec layer.
//!
//! # Design Decisions
//! - Names are stored lowercase; lookups are case-insensitive
//! - Insertion order is preserved (header finalisation appends in a fixed order)
//! - HTTP/2 style pseudo-headers (`:authority`, `:path`, `:method`) are plain entries

/// Well-known header names consulted by the router.
pub mod names {
    pub const AUTHORITY: &str = ":authority";
    pub const PATH: &str = ":path";
    pub const METHOD: &str = ":method";
    pub const FORWARDED_PROTO: &str = "x-forwarded-proto";
    pub const INTERNAL_REQUEST: &str = "x-edge-internal";
    pub const ORIGINAL_PATH: &str = "x-edge-original-path";
}

/// Ordered, case-insensitive header multimap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Append a value, keeping any existing values for the same name.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .push((name.into().to_ascii_lowercase(), value.into()));
    }

    /// Replace every value of `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter().position(|(k, _)| *k == name) {
            Some(idx) => {
                self.entries[idx].1 = value;
                let mut i = 0;
                self.entries.retain(|(k, _)| {
                    let keep = i <= idx || *k != name;
                    i += 1;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Remove every value of `name`.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn host(&self) -> Option<&str> {
        self.get(names::AUTHORITY)
    }

    pub fn path(&self) -> Option<&str> {
        self.get(names::PATH)
    }

    pub fn method(&self) -> Option<&str> {
        self.get(names::METHOD)
    }

    pub fn forwarded_proto(&self) -> Option<&str> {
        self.get(names::FORWARDED_PROTO)
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (k, v) in iter {
            map.add(k, v);
        }
        map
    }
}

impl<const N: usize> From<[(&str, &str); N]> for HeaderMap {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Path without its query string.
pub fn strip_query(path: &str) -> &str {
    match path.find('?') {
        Some(idx) => &path[..idx],
        None => path,
    }
}
