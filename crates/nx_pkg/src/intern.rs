//! String deduplication into the dense id space of the string table.

use indexmap::IndexSet;
use tracing::warn;

/// Insertion-ordered string deduplicator
///
/// Id 0 is always the empty string. Comparison is byte-exact; no locale
/// normalization is applied. Every node name and string value passes through
/// here exactly once per distinct value, and insertion order is id order, so
/// the table can be written out by simple iteration.
///
/// Mutated only by the thread driving the conversion.
#[derive(Debug)]
pub struct StringTable {
    strings: IndexSet<Box<str>>,
    control_chars: u32,
}

impl StringTable {
    /// Create a table holding only the reserved empty string
    pub fn new() -> Self {
        let mut strings = IndexSet::with_capacity(65536);
        strings.insert("".into());
        Self {
            strings,
            control_chars: 0,
        }
    }

    /// Return the id of `s`, assigning the next sequential id on first sight
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(id) = self.strings.get_index_of(s) {
            return id as u32;
        }
        if s.chars().any(char::is_control) {
            self.control_chars += 1;
            warn!("string {:?} contains control characters", s);
        }
        let (id, _) = self.strings.insert_full(s.into());
        id as u32
    }

    /// Number of distinct strings, the reserved empty string included
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether only the reserved empty string has been seen
    pub fn is_empty(&self) -> bool {
        self.strings.len() == 1
    }

    /// Number of interned strings that contained control characters
    pub fn control_char_count(&self) -> u32 {
        self.control_chars
    }

    /// The strings in id order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(|s| s.as_ref())
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}
