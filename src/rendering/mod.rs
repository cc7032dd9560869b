// src/rendering/mod.rs

//! Digest renderers.
//!
//! Both renderers work from the same logical layout (see [`layout`]): a
//! header, one block per detailed entry, then the title-only list. A digest
//! with nothing in it lays out as a single "0 results" line.

pub mod pdf;
pub mod text;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{DigestResult, OutputConfig, OutputFormat, PaperRecord};

pub use pdf::PdfRenderer;
pub use text::TextRenderer;

/// Message rendered for an empty digest.
pub const NO_RESULTS: &str = "0 results";

/// Run metadata printed in the document header.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestMeta {
    pub title: String,
    pub category: String,
    /// First day of the lookback window.
    pub since: NaiveDate,
    /// Run date.
    pub date: NaiveDate,
    /// Print author surnames instead of full names.
    pub surnames_only: bool,
}

impl DigestMeta {
    pub fn from_output(output: &OutputConfig, category: &str, since: NaiveDate, date: NaiveDate) -> Self {
        Self {
            title: output.title.clone(),
            category: category.to_string(),
            since,
            date,
            surnames_only: output.surnames_only,
        }
    }

    fn subtitle(&self) -> String {
        format!("{}, submitted {} to {}", self.category, self.since, self.date)
    }
}

/// Turns a digest into the bytes of one document.
pub trait DigestRenderer {
    fn render(&self, digest: &DigestResult, meta: &DigestMeta) -> Result<Vec<u8>>;
}

/// Renderer for the configured output format.
pub fn renderer_for(format: OutputFormat) -> Box<dyn DigestRenderer> {
    match format {
        OutputFormat::Pdf => Box::new(PdfRenderer::default()),
        OutputFormat::Text => Box::new(TextRenderer::default()),
    }
}

/// Visual role of a laid-out line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Heading,
    Subheading,
    Section,
    Title,
    Body,
    Link,
    Blank,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub style: LineStyle,
    pub text: String,
}

impl Line {
    fn new(style: LineStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }

    fn blank() -> Self {
        Self::new(LineStyle::Blank, "")
    }
}

/// Logical document layout shared by all renderers.
pub fn layout(digest: &DigestResult, meta: &DigestMeta) -> Vec<Line> {
    let mut lines = vec![
        Line::new(LineStyle::Heading, meta.title.as_str()),
        Line::new(LineStyle::Subheading, meta.subtitle()),
        Line::blank(),
    ];

    if digest.is_empty {
        lines.push(Line::new(LineStyle::Body, NO_RESULTS));
        return lines;
    }

    for (rank, entry) in digest.detailed.iter().enumerate() {
        let paper = &entry.paper.paper;
        lines.push(Line::new(
            LineStyle::Title,
            format!("{}. {}", rank + 1, paper.title),
        ));
        let authors = author_line(paper, meta.surnames_only);
        if !authors.is_empty() {
            lines.push(Line::new(LineStyle::Body, authors));
        }
        if let Some(theorem) = &entry.theorem {
            lines.push(Line::new(LineStyle::Body, theorem.as_str()));
        }
        lines.push(Line::new(LineStyle::Link, paper.url.as_str()));
        lines.push(Line::blank());
    }

    if !digest.title_only.is_empty() {
        lines.push(Line::new(LineStyle::Section, "Also of interest"));
        for scored in &digest.title_only {
            lines.push(Line::new(
                LineStyle::Body,
                format!("- {}", scored.paper.title),
            ));
        }
    }

    lines
}

fn author_line(paper: &PaperRecord, surnames_only: bool) -> String {
    if surnames_only {
        paper.surnames().join(", ")
    } else {
        paper.authors.join(", ")
    }
}

/// Greedy word wrap to at most `width` characters per row.
///
/// Words longer than `width` get a row of their own and are not split, so
/// URLs stay intact.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    let mut row = String::new();
    let mut row_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if row_len > 0 && row_len + 1 + word_len > width {
            rows.push(std::mem::take(&mut row));
            row_len = 0;
        }
        if row_len > 0 {
            row.push(' ');
            row_len += 1;
        }
        row.push_str(word);
        row_len += word_len;
    }
    if !row.is_empty() {
        rows.push(row);
    }
    rows
}
