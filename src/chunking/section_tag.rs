use anyhow::{Context, Result};
use regex::Regex;

use crate::model::UNLABELED;

/// Best-effort location labels ("Section 6.7", "Exhibit G13") for a span of contract text.
///
/// Patterns are tried in a fixed priority order and each one scans the whole text, so an
/// explicit "Section" reference anywhere wins over an exhibit reference or a bare numbered line.
pub struct SectionTagger {
    section: Regex,
    exhibit: Regex,
    numbered_line: Regex,
}

impl SectionTagger {
    pub fn new() -> Result<Self> {
        Ok(Self {
            section: Regex::new(r"(?i)\bSection\s+(\d+(?:\.\d+)*)\b")
                .context("failed to compile section label regex")?,
            exhibit: Regex::new(r"(?i)\bExhibit\s+([A-Z]\d*|[A-Z])\b")
                .context("failed to compile exhibit label regex")?,
            numbered_line: Regex::new(r"(?m)^\s*(\d+(?:\.\d+)+)\s+")
                .context("failed to compile numbered line regex")?,
        })
    }

    pub fn label(&self, text: &str) -> Option<String> {
        if let Some(captures) = self.section.captures(text) {
            return Some(format!("Section {}", &captures[1]));
        }

        if let Some(captures) = self.exhibit.captures(text) {
            return Some(format!("Exhibit {}", captures[1].to_ascii_uppercase()));
        }

        self.numbered_line
            .captures(text)
            .map(|captures| format!("Section {}", &captures[1]))
    }

    pub fn label_or_unlabeled(&self, text: &str) -> String {
        self.label(text).unwrap_or_else(|| UNLABELED.to_string())
    }
}
