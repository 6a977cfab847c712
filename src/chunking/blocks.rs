use anyhow::{Context, Result};
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SectionBlock {
    pub(super) heading: Option<String>,
    pub(super) text: String,
    pub(super) start_char: usize,
}

pub(super) struct BlockSplitter {
    heading: Regex,
    paragraph_break: Regex,
}

impl BlockSplitter {
    pub(super) fn new() -> Result<Self> {
        Ok(Self {
            heading: Regex::new(
                r"(?im)^(?P<h>(?:section|sec\.?)\s+\d+(?:\.\d+)*|§\s*\d+(?:\.\d+)*|\d+(?:\.\d+)+\s*[:\-]|exhibit\s+[A-Z]\d*\b|schedule\s+[A-Z0-9]+\b|appendix\s+[A-Z0-9]+\b)[^\n]*$",
            )
            .context("failed to compile section heading regex")?,
            paragraph_break: Regex::new(r"\n\s*\n")
                .context("failed to compile paragraph break regex")?,
        })
    }

    pub(super) fn split_blocks(&self, text: &str) -> Vec<SectionBlock> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let matches = self
            .heading
            .captures_iter(text)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let heading = captures.name("h")?.as_str().trim().to_string();
                Some((whole.start(), heading))
            })
            .collect::<Vec<(usize, String)>>();

        if matches.is_empty() {
            return vec![SectionBlock {
                heading: None,
                text: text.to_string(),
                start_char: 0,
            }];
        }

        let mut blocks = Vec::<SectionBlock>::with_capacity(matches.len() + 1);

        let first_start = matches[0].0;
        let preamble = text[..first_start].trim();
        if !preamble.is_empty() {
            blocks.push(SectionBlock {
                heading: None,
                text: preamble.to_string(),
                start_char: 0,
            });
        }

        for (index, (start, heading)) in matches.iter().enumerate() {
            let end = matches
                .get(index + 1)
                .map(|(next_start, _)| *next_start)
                .unwrap_or(text.len());
            blocks.push(SectionBlock {
                heading: Some(heading.clone()),
                text: text[*start..end].trim().to_string(),
                start_char: text[..*start].chars().count(),
            });
        }

        blocks
    }

    pub(super) fn split_paragraphs(&self, text: &str) -> Vec<String> {
        self.paragraph_break
            .split(text)
            .map(str::trim)
            .filter(|paragraph| !paragraph.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }
}

pub(super) fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

pub(super) fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub(super) fn split_oversized_paragraph(paragraph: &str, max_piece_chars: usize) -> Vec<String> {
    let max_piece_chars = max_piece_chars.max(1);
    if char_len(paragraph) <= max_piece_chars {
        return vec![paragraph.to_string()];
    }

    let mut pieces = Vec::<String>::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in paragraph.split_whitespace() {
        let word_len = char_len(word);

        if word_len > max_piece_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let characters = word.chars().collect::<Vec<char>>();
            for slice in characters.chunks(max_piece_chars) {
                pieces.push(slice.iter().collect());
            }
            continue;
        }

        let separator = usize::from(!current.is_empty());
        if current_len + separator + word_len > max_piece_chars {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}
