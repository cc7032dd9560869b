//! Plain-text digest.

use crate::error::Result;
use crate::models::DigestResult;
use crate::rendering::{DigestMeta, DigestRenderer, LineStyle, layout, wrap};

#[derive(Debug, Clone)]
pub struct TextRenderer {
    /// Column at which prose is wrapped.
    pub width: usize,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self { width: 78 }
    }
}

impl DigestRenderer for TextRenderer {
    fn render(&self, digest: &DigestResult, meta: &DigestMeta) -> Result<Vec<u8>> {
        let mut out = String::new();

        for line in layout(digest, meta) {
            match line.style {
                LineStyle::Blank => out.push('\n'),
                LineStyle::Heading | LineStyle::Section => {
                    out.push_str(&line.text);
                    out.push('\n');
                    out.push_str(&"=".repeat(line.text.chars().count()));
                    out.push('\n');
                }
                LineStyle::Link => {
                    out.push_str("   ");
                    out.push_str(&line.text);
                    out.push('\n');
                }
                LineStyle::Subheading | LineStyle::Title => {
                    for row in wrap(&line.text, self.width) {
                        out.push_str(&row);
                        out.push('\n');
                    }
                }
                LineStyle::Body => {
                    for row in wrap(&line.text, self.width.saturating_sub(3)) {
                        out.push_str("   ");
                        out.push_str(&row);
                        out.push('\n');
                    }
                }
            }
        }

        Ok(out.into_bytes())
    }
}
