//! Hash collections used across the cache.
//!
//! Every map in the cache is keyed by either a path string or a [`TypeId`],
//! neither of which needs DoS-resistant hashing, so the faster AHash hasher is
//! used everywhere.

use std::any::TypeId;

pub use ahash::AHashMap as HashMap;

/// A map keyed by a Rust type.
pub type TypeMap<V> = HashMap<TypeId, V>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_map_keys_by_type() {
        let mut map = TypeMap::new();
        map.insert(TypeId::of::<u32>(), "u32");
        map.insert(TypeId::of::<String>(), "string");

        assert_eq!(map.get(&TypeId::of::<u32>()), Some(&"u32"));
        assert_eq!(map.get(&TypeId::of::<String>()), Some(&"string"));
        assert!(!map.contains_key(&TypeId::of::<u64>()));
    }

    #[test]
    fn test_path_map_borrowed_lookup() {
        let mut map: HashMap<String, u32> = HashMap::new();
        map.insert("icons/a".to_string(), 1);

        // Lookups by &str do not allocate.
        assert_eq!(map.get("icons/a"), Some(&1));
        assert_eq!(map.remove("icons/a"), Some(1));
        assert!(map.is_empty());
    }
}
