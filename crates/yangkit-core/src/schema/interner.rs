//! The dictionary: a deduplicating string interner.
//!
//! Every identifier, prefix, and textual value in a compiled module is stored
//! once and referenced by a stable [`StrId`]. Identities remain valid for the
//! lifetime of the owning context.
//!
//! Deduplication uses a hash+verify table: candidate ids are stored per hash
//! key and verified against actual content on lookup, so hash collisions cost
//! a string compare instead of a wrong answer. Long strings (descriptions,
//! pattern sources) are stored without dedup since they are almost always
//! unique.

use super::ids::StrId;
use std::collections::BTreeMap;

/// Strings at least this long skip the dedup table.
const DEDUP_THRESHOLD: usize = 64;

#[inline]
fn hash_str(s: &str) -> u64 {
    // FxHash-style mix; fast and good enough for a verify-on-hit table.
    const K: u64 = 0x517c_c1b7_2722_0a95;
    let mut hash = 0u64;
    for byte in s.bytes() {
        hash = hash.rotate_left(5) ^ u64::from(byte);
        hash = hash.wrapping_mul(K);
    }
    hash
}

/// Context-scoped interned-string store.
#[derive(Clone, Debug)]
pub struct Dictionary {
    /// Concatenated string data.
    data: String,
    /// `offsets[i]` is the start of string `i`; one trailing sentinel entry.
    offsets: Vec<u32>,
    /// hash(string) -> candidate ids, verified on lookup.
    dedup: BTreeMap<u64, Vec<StrId>>,
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl Dictionary {
    /// Create an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: String::new(),
            offsets: vec![0],
            dedup: BTreeMap::new(),
        }
    }

    /// Insert a string, returning its stable identity.
    ///
    /// Short strings are deduplicated; inserting the same short string twice
    /// yields the same id.
    #[allow(clippy::cast_possible_truncation)] // data length bounded by u32 offsets
    pub fn insert(&mut self, s: &str) -> StrId {
        if s.len() < DEDUP_THRESHOLD {
            if let Some(candidates) = self.dedup.get(&hash_str(s)) {
                for &id in candidates {
                    if self.get(id) == s {
                        return id;
                    }
                }
            }
        }

        self.data.push_str(s);
        self.offsets.push(self.data.len() as u32);
        let id = StrId::from_index(self.offsets.len() - 2).expect("dictionary overflow");

        if s.len() < DEDUP_THRESHOLD {
            self.dedup.entry(hash_str(s)).or_default().push(id);
        }
        id
    }

    /// Resolve an identity back to its string.
    ///
    /// Returns an empty string for an identity that was not produced by this
    /// dictionary.
    #[must_use]
    pub fn get(&self, id: StrId) -> &str {
        let idx = id.to_index();
        let start = self.offsets.get(idx).map_or(0, |&v| v as usize);
        let end = self.offsets.get(idx + 1).map_or(start, |&v| v as usize);
        self.data.get(start..end).unwrap_or("")
    }

    /// Find an already-interned string without inserting it.
    #[must_use]
    pub fn find(&self, s: &str) -> Option<StrId> {
        if s.len() < DEDUP_THRESHOLD {
            let candidates = self.dedup.get(&hash_str(s))?;
            return candidates.iter().copied().find(|&id| self.get(id) == s);
        }
        // Long strings are not in the dedup table; scan offset pairs.
        for (idx, window) in self.offsets.windows(2).enumerate() {
            let (start, end) = (window[0] as usize, window[1] as usize);
            if self.data.get(start..end) == Some(s) {
                return StrId::from_index(idx);
            }
        }
        None
    }

    /// Number of stored strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Whether the dictionary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut dict = Dictionary::new();
        let id = dict.insert("interface");
        assert_eq!(dict.get(id), "interface");
    }

    #[test]
    fn test_short_strings_dedup() {
        let mut dict = Dictionary::new();
        let a = dict.insert("name");
        let b = dict.insert("name");
        let c = dict.insert("type");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_long_strings_stored_directly() {
        let mut dict = Dictionary::new();
        let long = "d".repeat(200);
        let a = dict.insert(&long);
        let b = dict.insert(&long);
        assert_ne!(a, b);
        assert_eq!(dict.get(a), long);
        assert_eq!(dict.get(b), long);
    }

    #[test]
    fn test_find() {
        let mut dict = Dictionary::new();
        let id = dict.insert("leaf-list");
        assert_eq!(dict.find("leaf-list"), Some(id));
        assert_eq!(dict.find("leaf"), None);

        let long = "x".repeat(100);
        let long_id = dict.insert(&long);
        assert_eq!(dict.find(&long), Some(long_id));
    }

    #[test]
    fn test_empty_string() {
        let mut dict = Dictionary::new();
        let id = dict.insert("");
        assert_eq!(dict.get(id), "");
        assert_eq!(dict.find(""), Some(id));
    }
}
