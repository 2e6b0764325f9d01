//! Ordered, name-keyed collection of attributes.

use std::sync::Arc;

use super::cell::Attribute;

/// Ordered attribute map owned by a data assembly.
///
/// Keeps insertion order so bindings and manifest tools enumerate attributes
/// in the same order every time. Lookups are linear; assemblies hold a few
/// dozen attributes at most.
#[derive(Debug, Default, Clone)]
pub struct AttributeMap {
    entries: Vec<Arc<Attribute>>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `attr`, replacing an attribute with the same name in place.
    ///
    /// Returns a handle to the inserted attribute so the owner can keep a typed
    /// field next to the map entry.
    pub fn insert(&mut self, attr: Arc<Attribute>) -> Arc<Attribute> {
        match self.entries.iter_mut().find(|a| a.name() == attr.name()) {
            Some(slot) => *slot = Arc::clone(&attr),
            None => self.entries.push(Arc::clone(&attr)),
        }
        attr
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.entries.iter().find(|a| a.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Attribute>> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|a| a.name())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a AttributeMap {
    type Item = &'a Arc<Attribute>;
    type IntoIter = std::slice::Iter<'a, Arc<Attribute>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::DataType;

    #[test]
    fn test_insert_keeps_order_and_replaces_in_place() {
        let mut map = AttributeMap::new();
        map.insert(Attribute::new("A", DataType::Int, 1));
        map.insert(Attribute::new("B", DataType::Int, 2));
        map.insert(Attribute::new("A", DataType::Int, 3));

        assert_eq!(map.names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(map.get("A").map(|a| a.as_int()), Some(3));
        assert!(!map.contains("C"));
    }
}
