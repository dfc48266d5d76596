//! Structured clinical documents and the templates that shape them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A structured document: section key to section text.
///
/// Rendering order comes from a [`Template`], never from the map itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    sections: BTreeMap<String, String>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document with every template section present and empty
    pub fn empty_for(template: &Template) -> Self {
        let sections = template
            .sections
            .iter()
            .map(|name| (name.clone(), String::new()))
            .collect();
        Self { sections }
    }

    /// Structural copy used at every hand-off between the live document and
    /// a stored snapshot. The two never share storage afterwards.
    pub fn snapshot(&self) -> Self {
        let mut sections = BTreeMap::new();
        for (name, text) in &self.sections {
            sections.insert(name.clone(), text.clone());
        }
        Self { sections }
    }

    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections.get(name).map(String::as_str)
    }

    pub fn set_section(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.sections.insert(name.into(), text.into());
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// True when no section carries any non-whitespace text.
    ///
    /// A blank document means "could not structure", not invalid input.
    pub fn is_blank(&self) -> bool {
        self.sections.values().all(|text| text.trim().is_empty())
    }

    /// Ensure every template section is present, filling gaps with `""`.
    /// Keys outside the template are kept.
    pub fn conform_to(&mut self, template: &Template) {
        for name in &template.sections {
            self.sections.entry(name.clone()).or_default();
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Document
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            sections: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Ordered list of section names; defines both extraction boundaries and
/// rendering order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Format id passed to the structuring backend
    pub id: String,
    pub name: String,
    pub sections: Vec<String>,
}

impl Template {
    pub fn new<I, S>(id: impl Into<String>, name: impl Into<String>, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            sections: sections.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_does_not_alias_live_document() {
        let mut live = Document::from_iter([("plan", "rest")]);
        let snapshot = live.snapshot();

        live.set_section("plan", "admit");

        assert_eq!(snapshot.section("plan"), Some("rest"));
        assert_eq!(live.section("plan"), Some("admit"));
    }

    #[test]
    fn test_conform_fills_missing_sections() {
        let template = Template::new("soap", "SOAP", ["subjective", "plan"]);
        let mut doc = Document::from_iter([("plan", "follow up"), ("extra", "kept")]);

        doc.conform_to(&template);

        assert_eq!(doc.section("subjective"), Some(""));
        assert_eq!(doc.section("plan"), Some("follow up"));
        assert_eq!(doc.section("extra"), Some("kept"));
    }

    #[test]
    fn test_blank_detection() {
        let template = Template::new("soap", "SOAP", ["subjective", "plan"]);
        let mut doc = Document::empty_for(&template);
        assert!(doc.is_blank());
        assert!(!doc.is_empty());

        doc.set_section("plan", "  \n");
        assert!(doc.is_blank());

        doc.set_section("plan", "return in 2 weeks");
        assert!(!doc.is_blank());
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let doc = Document::from_iter([("plan", "rest")]);
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"plan":"rest"}"#);
    }
}
