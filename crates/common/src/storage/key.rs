//! Hierarchical chunk keys and the sharding convention.

use std::fmt;

use crate::bundle::STORAGE_PREFIX;

use super::StorageError;

/// Ordered, non-empty sequence of path segments identifying one chunk.
///
/// The first segment is the document (shard) id. On disk and inside a
/// bundle's `storage/` namespace the key is laid out with the first two
/// characters of that segment as their own component, mirroring a
/// two-level hash-sharded object store:
///
/// ```text
/// ["ab12cd", "snapshot"]  ->  ab/12cd/snapshot
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey(Vec<String>);

impl StorageKey {
    /// Build a key. Fails on an empty sequence or an empty segment.
    pub fn new<I, S>(segments: I) -> Result<Self, StorageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(StorageError::InvalidKey("key has no segments".into()));
        }
        if segments.iter().any(String::is_empty) {
            return Err(StorageError::InvalidKey(format!(
                "key has an empty segment: {segments:?}"
            )));
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The document (shard) id.
    pub fn first(&self) -> &str {
        &self.0[0]
    }

    /// Segment-wise prefix test; a key starts with itself.
    pub fn starts_with(&self, prefix: &StorageKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// Physical components: the first segment split at its second
    /// character, remaining segments verbatim.
    pub fn shard_segments(&self) -> Vec<String> {
        let first = &self.0[0];
        let mut components = Vec::with_capacity(self.0.len() + 1);
        if first.len() > 2 && first.is_char_boundary(2) {
            let (shard, rest) = first.split_at(2);
            components.push(shard.to_string());
            components.push(rest.to_string());
        } else {
            components.push(first.clone());
        }
        components.extend(self.0[1..].iter().cloned());
        components
    }

    /// Inverse of [`shard_segments`](Self::shard_segments): the first two
    /// physical components merge back into one logical segment.
    pub fn from_shard_segments<I, S>(components: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let components: Vec<String> = components.into_iter().map(Into::into).collect();
        let mut iter = components.into_iter();
        let shard = iter.next()?;
        let segments = match iter.next() {
            Some(rest) => {
                let mut segments = vec![format!("{shard}{rest}")];
                segments.extend(iter);
                segments
            }
            None => vec![shard],
        };
        StorageKey::new(segments).ok()
    }

    /// Container path of this key inside a bundle.
    pub fn storage_path(&self) -> String {
        format!("{STORAGE_PREFIX}{}", self.shard_segments().join("/"))
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl TryFrom<Vec<String>> for StorageKey {
    type Error = StorageError;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_keys() {
        assert!(StorageKey::new(Vec::<String>::new()).is_err());
        assert!(StorageKey::new(["ok", ""]).is_err());
    }

    #[test]
    fn test_sharding_splits_first_segment() {
        let key = StorageKey::new(["ab12cd", "snapshot"]).unwrap();
        assert_eq!(key.shard_segments(), ["ab", "12cd", "snapshot"]);
        assert_eq!(key.storage_path(), "storage/ab/12cd/snapshot");
    }

    #[test]
    fn test_short_first_segment_is_not_split() {
        let key = StorageKey::new(["ab"]).unwrap();
        assert_eq!(key.shard_segments(), ["ab"]);
        let key = StorageKey::new(["a", "b"]).unwrap();
        assert_eq!(key.shard_segments(), ["a", "b"]);
    }

    #[test]
    fn test_shard_roundtrip() {
        for segments in [
            vec!["ab12cd", "snapshot"],
            vec!["ab12cd", "incremental", "7"],
            vec!["ab"],
            vec!["storage", "ab", "1"],
        ] {
            let key = StorageKey::new(segments).unwrap();
            let physical = key.shard_segments();
            assert_eq!(StorageKey::from_shard_segments(physical).unwrap(), key);
        }
    }

    #[test]
    fn test_starts_with() {
        let key = StorageKey::new(["doc", "snapshot", "1"]).unwrap();
        let prefix = StorageKey::new(["doc", "snapshot"]).unwrap();
        let other = StorageKey::new(["doc", "incremental"]).unwrap();

        assert!(key.starts_with(&prefix));
        assert!(key.starts_with(&key));
        assert!(!key.starts_with(&other));
        assert!(!prefix.starts_with(&key));
    }

    #[test]
    fn test_display_joins_segments() {
        let key = StorageKey::new(["doc", "snapshot"]).unwrap();
        assert_eq!(key.to_string(), "doc/snapshot");
    }
}
