use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = pointer_common::id::prefixed_ulid("sub");
/// assert!(id.starts_with("sub_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const SUBSCRIBER: &str = "sub";
    pub const MESSAGE: &str = "msg";
    pub const ROOM: &str = "room";
}

/// Last `len` characters of an ID, used to disambiguate display labels.
pub fn short_suffix(id: &str, len: usize) -> &str {
    let start = id.len().saturating_sub(len);
    // ULIDs and prefixes are ASCII, but stay on a char boundary regardless.
    let start = (start..id.len())
        .find(|i| id.is_char_boundary(*i))
        .unwrap_or(id.len());
    &id[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_ulid_format() {
        let id = prefixed_ulid(prefix::SUBSCRIBER);
        assert!(id.starts_with("sub_"));
        // ULID is 26 chars, plus prefix + underscore
        assert_eq!(id.len(), 4 + 26);
    }

    #[test]
    fn test_uniqueness() {
        let a = prefixed_ulid(prefix::MESSAGE);
        let b = prefixed_ulid(prefix::MESSAGE);
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_suffix() {
        assert_eq!(short_suffix("sub_01ARZ3NDEKTSV4RRFFQ69G5FAV", 4), "5FAV");
        assert_eq!(short_suffix("ab", 4), "ab");
        assert_eq!(short_suffix("", 4), "");
    }
}
