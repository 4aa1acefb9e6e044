use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// `name → text` pairs in the order the client sent them.
///
/// A repeated name replaces the earlier text but keeps its original position,
/// matching how a JSON object is read into a dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedTexts(Vec<(String, String)>);

impl NamedTexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        let name = name.into();
        let text = text.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = text,
            None => self.0.push((name, text)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, text)| (name.as_str(), text.as_str()))
    }
}

impl<'de> Deserialize<'de> for NamedTexts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NamedTextsVisitor;

        impl<'de> Visitor<'de> for NamedTextsVisitor {
            type Value = NamedTexts;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping file names to text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut texts = NamedTexts::new();
                while let Some((name, text)) = map.next_entry::<String, String>()? {
                    texts.insert(name, text);
                }
                Ok(texts)
            }
        }

        deserializer.deserialize_map(NamedTextsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_document_order() {
        let texts: NamedTexts =
            serde_json::from_str(r#"{"zeta.txt":"z","alpha.txt":"a","mid.txt":"m"}"#).unwrap();

        let names: Vec<&str> = texts.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["zeta.txt", "alpha.txt", "mid.txt"]);
    }

    #[test]
    fn repeated_name_keeps_first_position_and_last_text() {
        let texts: NamedTexts =
            serde_json::from_str(r#"{"a":"one","b":"two","a":"three"}"#).unwrap();

        let pairs: Vec<(&str, &str)> = texts.iter().collect();
        assert_eq!(pairs, vec![("a", "three"), ("b", "two")]);
    }

    #[test]
    fn rejects_non_string_texts() {
        assert!(serde_json::from_str::<NamedTexts>(r#"{"a":1}"#).is_err());
        assert!(serde_json::from_str::<NamedTexts>(r#"["a"]"#).is_err());
    }
}
