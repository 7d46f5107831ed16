//! Extracted section text, keyed by title in outline order.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Key under which a nested section's own text is serialized.
pub const OWN_TEXT_KEY: &str = "_text";

/// Text of one section: either plain or nested with child sections.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionValue {
    /// Body text of a section without extracted subsections
    Text(String),
    /// Body text preceding the first subsection, plus the subsections
    Nested { text: String, children: SectionText },
}

impl SectionValue {
    /// The section's own body text.
    pub fn text(&self) -> &str {
        match self {
            SectionValue::Text(text) => text,
            SectionValue::Nested { text, .. } => text,
        }
    }

    pub fn children(&self) -> Option<&SectionText> {
        match self {
            SectionValue::Text(_) => None,
            SectionValue::Nested { children, .. } => Some(children),
        }
    }

    /// Whether neither this section nor any child carries text.
    pub fn is_empty(&self) -> bool {
        match self {
            SectionValue::Text(text) => text.is_empty(),
            SectionValue::Nested { text, children } => {
                text.is_empty() && children.iter().all(|(_, v)| v.is_empty())
            }
        }
    }
}

impl Serialize for SectionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SectionValue::Text(text) => serializer.serialize_str(text),
            SectionValue::Nested { text, children } => {
                let own = usize::from(!text.is_empty());
                let mut map = serializer.serialize_map(Some(children.len() + own))?;
                if !text.is_empty() {
                    map.serialize_entry(OWN_TEXT_KEY, text)?;
                }
                for (title, value) in children.iter() {
                    map.serialize_entry(title, value)?;
                }
                map.end()
            }
        }
    }
}

/// Ordered mapping from section title to extracted text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SectionText {
    entries: Vec<(String, SectionValue)>,
}

impl SectionText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a section, replacing the value of an existing title in place.
    pub fn insert(&mut self, title: impl Into<String>, value: SectionValue) {
        let title = title.into();
        if let Some(slot) = self.entries.iter_mut().find(|(t, _)| *t == title) {
            slot.1 = value;
        } else {
            self.entries.push((title, value));
        }
    }

    /// Append all sections of `other`, keeping its order.
    pub fn extend(&mut self, other: SectionText) {
        for (title, value) in other.entries {
            self.insert(title, value);
        }
    }

    pub fn get(&self, title: &str) -> Option<&SectionValue> {
        self.entries
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, v)| v)
    }

    /// Look a title up at any depth.
    pub fn find(&self, title: &str) -> Option<&SectionValue> {
        for (t, value) in &self.entries {
            if t == title {
                return Some(value);
            }
            if let Some(found) = value.children().and_then(|c| c.find(title)) {
                return Some(found);
            }
        }
        None
    }

    pub fn contains(&self, title: &str) -> bool {
        self.get(title).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SectionValue)> {
        self.entries.iter().map(|(t, v)| (t.as_str(), v))
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Depth-first `(title, own text)` pairs in document order.
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<(String, String)>) {
        for (title, value) in &self.entries {
            out.push((title.clone(), value.text().to_string()));
            if let Some(children) = value.children() {
                children.flatten_into(out);
            }
        }
    }
}

impl Serialize for SectionText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (title, value) in &self.entries {
            map.serialize_entry(title, value)?;
        }
        map.end()
    }
}

impl<'a> IntoIterator for &'a SectionText {
    type Item = &'a (String, SectionValue);
    type IntoIter = std::slice::Iter<'a, (String, SectionValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn methods() -> SectionText {
        let mut children = SectionText::new();
        children.insert("Data", SectionValue::Text("We collected data.".into()));
        children.insert("Analysis", SectionValue::Text("We analysed it.".into()));
        let mut sections = SectionText::new();
        sections.insert(
            "Methods",
            SectionValue::Nested {
                text: String::new(),
                children,
            },
        );
        sections
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut sections = SectionText::new();
        sections.insert("A", SectionValue::Text("one".into()));
        sections.insert("B", SectionValue::Text("two".into()));
        sections.insert("A", SectionValue::Text("three".into()));
        assert_eq!(sections.titles().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(sections.get("A").unwrap().text(), "three");
    }

    #[test]
    fn test_nested_json_shape() {
        let json = serde_json::to_string(&methods()).unwrap();
        assert_eq!(
            json,
            r#"{"Methods":{"Data":"We collected data.","Analysis":"We analysed it."}}"#
        );
    }

    #[test]
    fn test_nested_own_text_key() {
        let mut sections = methods();
        let children = sections.get("Methods").unwrap().children().unwrap().clone();
        sections.insert(
            "Methods",
            SectionValue::Nested {
                text: "Overview.".into(),
                children,
            },
        );
        let json = serde_json::to_string(&sections).unwrap();
        assert!(json.starts_with(r#"{"Methods":{"_text":"Overview.","Data""#));
    }

    #[test]
    fn test_flatten_and_find() {
        let sections = methods();
        let flat = sections.flatten();
        let titles: Vec<_> = flat.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(titles, vec!["Methods", "Data", "Analysis"]);
        assert_eq!(sections.find("Analysis").unwrap().text(), "We analysed it.");
        assert!(sections.get("Analysis").is_none());
        assert!(!sections.get("Methods").unwrap().is_empty());
    }
}
