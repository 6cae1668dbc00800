/// Extension-based file categorization.
///
/// A [`CategoryTable`] is an ordered list of named categories, each owning a set of
/// lowercase extensions written with their leading dot (`".jpg"`). Lookup is a total
/// function: anything the table does not know lands in [`OTHERS`].
///
/// # Examples
///
/// ```
/// use tidyfold::file_category::{CategoryTable, OTHERS};
///
/// let table = CategoryTable::default();
/// assert_eq!(table.classify(".JPG"), "Images");
/// assert_eq!(table.classify(".pdf"), "Documents");
/// assert_eq!(table.classify(".xyz"), OTHERS);
/// ```
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Reserved category for files whose extension matches no rule.
pub const OTHERS: &str = "Others";

/// One named category and the extensions that belong to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    /// Category name, also used as the destination folder name.
    pub name: String,
    /// Extensions including the leading dot, compared verbatim.
    pub extensions: Vec<String>,
}

/// Ordered mapping from category name to extensions.
///
/// Order matters only for malformed tables where two categories claim the same
/// extension: the first one listed wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    rules: Vec<CategoryRule>,
}

impl CategoryTable {
    /// Creates an empty table. Every lookup against it yields [`OTHERS`].
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Builder-style variant of [`CategoryTable::insert`].
    pub fn with_category<I, S>(mut self, name: &str, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, extensions);
        self
    }

    /// Adds a category, replacing the extensions of an existing one with the same name
    /// while keeping its position.
    pub fn insert<I, S>(&mut self, name: &str, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extensions: Vec<String> = extensions.into_iter().map(Into::into).collect();
        match self.rules.iter_mut().find(|rule| rule.name == name) {
            Some(rule) => rule.extensions = extensions,
            None => self.rules.push(CategoryRule {
                name: name.to_string(),
                extensions,
            }),
        }
    }

    /// Returns the category for an extension such as `".PNG"`.
    ///
    /// The input is lowercased; table entries are compared as written.
    pub fn classify(&self, extension: &str) -> &str {
        let folded = extension.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.extensions.iter().any(|ext| *ext == folded))
            .map(|rule| rule.name.as_str())
            .unwrap_or(OTHERS)
    }

    /// Category names in table order, not including [`OTHERS`] unless configured.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.name.as_str())
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Free-function form of [`CategoryTable::classify`].
pub fn classify<'a>(extension: &str, table: &'a CategoryTable) -> &'a str {
    table.classify(extension)
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::empty()
            .with_category(
                "Images",
                [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp"],
            )
            .with_category(
                "Documents",
                [".pdf", ".doc", ".docx", ".txt", ".csv", ".xlsx", ".pptx"],
            )
            .with_category("Installers", [".exe", ".msi", ".dmg", ".pkg"])
            .with_category("Archives", [".zip", ".rar", ".7z", ".tar", ".gz"])
            .with_category("Videos", [".mp4", ".mov", ".avi", ".mkv", ".wmv"])
            .with_category("Music", [".mp3", ".wav", ".aac", ".flac"])
    }
}

impl Serialize for CategoryTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rules.len()))?;
        for rule in &self.rules {
            map.serialize_entry(&rule.name, &rule.extensions)?;
        }
        map.end()
    }
}

// Deserialized through a map visitor so the document's category order survives.
impl<'de> Deserialize<'de> for CategoryTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = CategoryTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category names to extension lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut table = CategoryTable::empty();
                while let Some((name, extensions)) = access.next_entry::<String, Vec<String>>()? {
                    table.insert(&name, extensions);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions_map_to_their_category() {
        let table = CategoryTable::default();
        for rule in table.rules() {
            for ext in &rule.extensions {
                assert_eq!(table.classify(ext), rule.name, "extension {}", ext);
            }
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive_on_input() {
        let table = CategoryTable::default();
        assert_eq!(table.classify(".JPG"), "Images");
        assert_eq!(table.classify(".Pdf"), "Documents");
    }

    #[test]
    fn test_table_entries_are_not_normalized() {
        let table = CategoryTable::empty().with_category("Shouty", [".TXT"]);
        assert_eq!(table.classify(".txt"), OTHERS);
        assert_eq!(table.classify(".TXT"), OTHERS);
    }

    #[test]
    fn test_unknown_and_empty_extensions_fall_back_to_others() {
        let table = CategoryTable::default();
        assert_eq!(table.classify(".unknown"), OTHERS);
        assert_eq!(table.classify(""), OTHERS);
        assert_eq!(classify(".bin", &CategoryTable::empty()), OTHERS);
    }

    #[test]
    fn test_first_category_wins_on_overlap() {
        let table = CategoryTable::empty()
            .with_category("First", [".dat"])
            .with_category("Second", [".dat"]);
        assert_eq!(table.classify(".dat"), "First");
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut table = CategoryTable::default();
        table.insert("Images", [".heic"]);
        assert_eq!(table.names().next(), Some("Images"));
        assert_eq!(table.classify(".heic"), "Images");
        assert_eq!(table.classify(".png"), OTHERS);
    }

    #[test]
    fn test_deserialize_preserves_document_order() {
        let json = r#"{"Zeta": [".z"], "Alpha": [".a"], "Mid": [".m"]}"#;
        let table: CategoryTable = serde_json::from_str(json).unwrap();
        let names: Vec<_> = table.names().collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
        assert_eq!(table.classify(".A"), "Alpha");
    }

    #[test]
    fn test_serialize_roundtrips_through_json() {
        let table = CategoryTable::default();
        let json = serde_json::to_string(&table).unwrap();
        let back: CategoryTable = serde_json::from_str(&json).unwrap();
        assert_eq!(table, back);
    }
}
