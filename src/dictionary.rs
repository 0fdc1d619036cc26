use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Bidirectional mapping between label or attribute names and dense ids.
///
/// Ids are assigned in insertion order starting at zero, so a dictionary
/// serializes as the plain list of its names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Dictionary {
    ids: HashMap<String, u32>,
    names: Vec<String>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Id of `name`, registering it when unseen.
    pub fn get_or_insert(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        id
    }

    /// Id of `name` without registering it.
    pub fn get(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.names.clear();
    }

    /// Iterate over `(name, id)` pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(id, s)| (s.as_str(), id as u32))
    }
}

impl From<Vec<String>> for Dictionary {
    fn from(names: Vec<String>) -> Self {
        let mut dict = Dictionary::new();
        for name in &names {
            dict.get_or_insert(name);
        }
        dict
    }
}

impl From<Dictionary> for Vec<String> {
    fn from(dict: Dictionary) -> Self {
        dict.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_basic() {
        let mut dict = Dictionary::new();
        assert!(dict.is_empty());

        assert_eq!(dict.get_or_insert("NOUN"), 0);
        assert_eq!(dict.get_or_insert("VERB"), 1);
        assert_eq!(dict.get_or_insert("NOUN"), 0);
        assert_eq!(dict.len(), 2);

        assert_eq!(dict.get("VERB"), Some(1));
        assert_eq!(dict.get("ADJ"), None);
        assert_eq!(dict.name(0), Some("NOUN"));
        assert_eq!(dict.name(7), None);
    }

    #[test]
    fn test_dictionary_iter_and_clear() {
        let mut dict = Dictionary::new();
        dict.get_or_insert("B");
        dict.get_or_insert("I");
        dict.get_or_insert("O");

        let items: Vec<_> = dict.iter().collect();
        assert_eq!(items, vec![("B", 0), ("I", 1), ("O", 2)]);

        dict.clear();
        assert_eq!(dict.len(), 0);
        assert_eq!(dict.get("B"), None);
    }

    #[test]
    fn test_dictionary_serde() {
        let mut dict = Dictionary::new();
        dict.get_or_insert("sunny");
        dict.get_or_insert("rainy");

        let json = serde_json::to_string(&dict).unwrap();
        assert_eq!(json, r#"["sunny","rainy"]"#);
        let back: Dictionary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("rainy"), Some(1));
    }
}
