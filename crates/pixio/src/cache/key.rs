use sha2::{Digest, Sha256};

/// Identity of one cached image: the source URI plus the optional target
/// dimensions the consumer rendered it at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// URI of the image
    pub uri: String,
    /// Desired width, part of the key to support resizing contexts
    pub width: Option<u32>,
    /// Desired height
    pub height: Option<u32>,
}

impl CacheKey {
    /// Create a key for a bare URI with no dimension constraints
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            width: None,
            height: None,
        }
    }

    /// Fold target dimensions into the key
    pub fn with_dimensions(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Convert to a filename-safe string.
    ///
    /// Stable across process runs: the name doubles as the cache
    /// membership probe, so there is no randomness or time component.
    pub fn to_filename(&self) -> String {
        let mut hasher = Sha256::new();
        // Length-prefixed fields keep ("u", width 2) and ("u|w=2", no
        // width) apart; a bare concatenation would collide.
        hasher.update((self.uri.len() as u64).to_le_bytes());
        hasher.update(&self.uri);
        if let Some(w) = self.width {
            hasher.update(b"w");
            hasher.update(w.to_le_bytes());
        }
        if let Some(h) = self.height {
            hasher.update(b"h");
            hasher.update(h.to_le_bytes());
        }

        let hash = hasher.finalize();
        format!("{hash:x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_is_deterministic() {
        let a = CacheKey::new("https://img.example/cat.png").with_dimensions(Some(100), Some(80));
        let b = CacheKey::new("https://img.example/cat.png").with_dimensions(Some(100), Some(80));
        assert_eq!(a.to_filename(), b.to_filename());
    }

    #[test]
    fn test_filename_is_fixed_length_hex() {
        let name = CacheKey::new("https://img.example/cat.png").to_filename();
        assert_eq!(name.len(), 64);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(name, name.to_lowercase());
    }

    #[test]
    fn test_every_tuple_field_changes_the_key() {
        let keys = [
            CacheKey::new("https://img.example/cat.png"),
            CacheKey::new("https://img.example/dog.png"),
            CacheKey::new("https://img.example/cat.png").with_dimensions(Some(100), None),
            CacheKey::new("https://img.example/cat.png").with_dimensions(Some(200), None),
            CacheKey::new("https://img.example/cat.png").with_dimensions(None, Some(100)),
            CacheKey::new("https://img.example/cat.png").with_dimensions(Some(100), Some(100)),
        ];

        let names: std::collections::HashSet<_> =
            keys.iter().map(|k| k.to_filename()).collect();
        assert_eq!(names.len(), keys.len());
    }

    #[test]
    fn test_dimension_is_not_confused_with_uri_suffix() {
        let dimensioned = CacheKey::new("https://img.example/cat").with_dimensions(Some(2), None);
        let suffixed = CacheKey::new("https://img.example/cat|w=2");
        assert_ne!(dimensioned.to_filename(), suffixed.to_filename());
    }
}
