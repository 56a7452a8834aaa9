//! TXT data.
//!
//! [`TextList`] is the immutable, ordered list of `key=value` (or bare `key`)
//! byte strings carried by resolve results. [`TxtRecord`] is the mutable,
//! insertion-ordered mapping a published service keeps for its TXT set.

use std::borrow::Cow;

/// Ordered list of opaque TXT strings. The first entry matching a key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextList {
    entries: Vec<Vec<u8>>,
}

/// Build a [`TextList`] from string literals.
///
/// ```
/// use avahi_compat_core::text_list;
///
/// let txt = text_list!["path=/", "version=1.0"];
/// assert_eq!(txt.len(), 2);
/// ```
#[macro_export]
macro_rules! text_list {
    ($($item:expr),* $(,)?) => {
        $crate::txt::TextList::new([$($item),*])
    };
}

/// One entry split at its first `=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxtPair<'a> {
    pub key: &'a [u8],
    /// `None` for a bare key.
    pub value: Option<&'a [u8]>,
}

impl<'a> TxtPair<'a> {
    /// Split an entry into key and optional value.
    pub fn parse(entry: &'a [u8]) -> Self {
        match entry.iter().position(|b| *b == b'=') {
            Some(i) => TxtPair {
                key: &entry[..i],
                value: Some(&entry[i + 1..]),
            },
            None => TxtPair {
                key: entry,
                value: None,
            },
        }
    }

    /// Length of the value in bytes, `0` for a bare key.
    pub fn size(&self) -> usize {
        self.value.map_or(0, <[u8]>::len)
    }

    pub fn key_str(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.key)
    }
}

impl TextList {
    pub fn new<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Vec<u8>>,
    {
        Self {
            entries: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_array(items: &[&str]) -> Self {
        Self::new(items.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(Vec::as_slice)
    }

    /// First entry whose key is `key` (`key=...` or exactly `key`).
    pub fn find(&self, key: &str) -> Option<&[u8]> {
        let key = key.as_bytes();
        self.iter().find(|entry| TxtPair::parse(entry).key == key)
    }

    /// Split an entry into key and value; see [`TxtPair::parse`].
    pub fn get_pair(entry: &[u8]) -> TxtPair<'_> {
        TxtPair::parse(entry)
    }

    /// Value for `key`; a bare key yields an empty value.
    pub fn value(&self, key: &str) -> Option<&[u8]> {
        self.find(key)
            .map(|entry| TxtPair::parse(entry).value.unwrap_or_default())
    }
}

impl<T: Into<Vec<u8>>> FromIterator<T> for TextList {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl std::fmt::Display for TextList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "\"{}\"", String::from_utf8_lossy(entry))?;
        }
        Ok(())
    }
}

// ── Mutable TXT mapping ───────────────────────────────────────────────

/// Insertion-ordered key to optional value mapping for published services.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxtRecord {
    items: Vec<(String, Option<Vec<u8>>)>,
}

impl TxtRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list, keeping the first occurrence of each key.
    pub fn from_text_list(list: &TextList) -> Self {
        let mut record = Self::new();
        for entry in list.iter() {
            let pair = TxtPair::parse(entry);
            let key = pair.key_str().into_owned();
            if record.get(&key).is_none() {
                record.items.push((key, pair.value.map(<[u8]>::to_vec)));
            }
        }
        record
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.insert(key, Some(value.as_bytes().to_vec()));
    }

    pub fn set_arbitrary(&mut self, key: &str, value: &[u8]) {
        self.insert(key, Some(value.to_vec()));
    }

    /// Set a bare key without a value.
    pub fn set_flag(&mut self, key: &str) {
        self.insert(key, None);
    }

    fn insert(&mut self, key: &str, value: Option<Vec<u8>>) {
        match self.items.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.items.push((key.to_string(), value)),
        }
    }

    /// Remove `key`, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|(k, _)| k != key);
        self.items.len() != before
    }

    /// `Some(None)` for a bare key, `None` when absent.
    pub fn get(&self, key: &str) -> Option<Option<&[u8]>> {
        self.items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&[u8]>)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn to_text_list(&self) -> TextList {
        self.iter()
            .map(|(k, v)| match v {
                Some(v) => {
                    let mut entry = Vec::with_capacity(k.len() + 1 + v.len());
                    entry.extend_from_slice(k.as_bytes());
                    entry.push(b'=');
                    entry.extend_from_slice(v);
                    entry
                }
                None => k.as_bytes().to_vec(),
            })
            .collect()
    }
}
