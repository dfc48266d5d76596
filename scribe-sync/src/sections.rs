//! Header-based segmentation of free text into template sections
//!
//! Each template section is located by its header (case-insensitive, tolerant
//! of markdown emphasis, list markers and trailing `:`/`-`/`.`), anywhere in
//! the text. A section's body runs from the end of its header to the start of
//! the next matched header, or to the end of the text.

use regex::Regex;
use tracing::debug;

use crate::document::{Document, Template};

/// Extract `template` sections from `text`.
///
/// Pure and deterministic. Missing headers yield empty sections; text with no
/// headers at all yields a blank document rather than an error.
pub fn extract(text: &str, template: &Template) -> Document {
    SectionExtractor::new(template).extract(text)
}

/// Compiled header patterns for one template
pub struct SectionExtractor {
    template: Template,
    patterns: Vec<Option<Regex>>,
}

#[derive(Debug, Clone, Copy)]
struct HeaderMatch {
    section: usize,
    start: usize,
    end: usize,
}

impl SectionExtractor {
    pub fn new(template: &Template) -> Self {
        let patterns = template
            .sections
            .iter()
            .map(|name| header_pattern(name))
            .collect();

        Self {
            template: template.clone(),
            patterns,
        }
    }

    pub fn extract(&self, text: &str) -> Document {
        let headers = self.locate_headers(text);
        let mut document = Document::empty_for(&self.template);

        for header in &headers {
            let boundary = headers
                .iter()
                .filter(|other| other.start >= header.end)
                .map(|other| other.start)
                .min()
                .unwrap_or(text.len());

            let body = text.get(header.end..boundary).unwrap_or_default().trim();
            if let Some(name) = self.template.sections.get(header.section) {
                document.set_section(name.clone(), body);
            }
        }

        debug!(
            template = %self.template.id,
            matched = headers.len(),
            expected = self.template.sections.len(),
            "Extracted sections"
        );

        document
    }

    /// First occurrence of each section header, wherever it appears
    fn locate_headers(&self, text: &str) -> Vec<HeaderMatch> {
        let mut headers = Vec::new();

        for (section, pattern) in self.patterns.iter().enumerate() {
            let Some(pattern) = pattern else { continue };
            let already_seen = self
                .template
                .sections
                .iter()
                .take(section)
                .any(|earlier| Some(earlier) == self.template.sections.get(section));
            if already_seen {
                continue;
            }
            if let Some(m) = pattern.find(text) {
                headers.push(HeaderMatch {
                    section,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        headers.sort_by_key(|h| (h.start, h.section));
        headers
    }
}

fn header_pattern(section: &str) -> Option<Regex> {
    let words = identifier_words(section);
    if words.is_empty() {
        return None;
    }

    let title = words
        .iter()
        .map(|word| regex::escape(word))
        .collect::<Vec<_>>()
        .join(r"[ \t_\-]*");

    let pattern = format!(
        r"(?imR)^[ \t]*(?:[#>*\-][ \t#*]*)?{title}[ \t]*[*_]*[ \t]*(?:[:.\-–—][ \t]*[*_]*|[ \t]*$)"
    );

    match Regex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            debug!(section = %section, error = %e, "Unusable section header pattern");
            None
        }
    }
}

/// Split an identifier-case key (snake, kebab, camel or Pascal) into words
pub(crate) fn identifier_words(key: &str) -> Vec<String> {
    let chars: Vec<char> = key.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = i.checked_sub(1).and_then(|p| chars.get(p)).copied();
            let next = chars.get(i + 1).copied();
            let after_lower = prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
            let acronym_end = prev.is_some_and(char::is_uppercase)
                && next.is_some_and(char::is_lowercase);
            if after_lower || acronym_end {
                words.push(std::mem::take(&mut current));
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }

    words
}

/// Human title for a section key: `chief_complaint` becomes `Chief Complaint`.
/// All-caps acronyms are kept as written.
pub fn title_case(key: &str) -> String {
    identifier_words(key)
        .iter()
        .map(|word| {
            let is_acronym = word.chars().count() > 1
                && word.chars().all(|c| !c.is_alphabetic() || c.is_uppercase());
            if is_acronym {
                return word.clone();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
