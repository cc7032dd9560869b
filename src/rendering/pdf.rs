// src/rendering/pdf.rs

//! PDF digest built with lopdf.
//!
//! Text is set in the standard Helvetica fonts with WinAnsiEncoding, so no
//! font files are embedded. Characters outside that encoding print as `?`.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use crate::error::Result;
use crate::models::DigestResult;
use crate::rendering::{DigestMeta, DigestRenderer, LineStyle, layout, wrap};

/// Fill colour of the band behind paper titles.
const TITLE_BAND: [f32; 3] = [232.0 / 255.0, 180.0 / 255.0, 180.0 / 255.0];

/// Average Helvetica glyph width as a fraction of the font size.
const REGULAR_WIDTH: f64 = 0.5;
const BOLD_WIDTH: f64 = 0.55;

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";

/// A4 portrait in points.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    pub page_width: i64,
    pub page_height: i64,
    pub margin: i64,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self {
            page_width: 595,
            page_height: 842,
            margin: 56,
        }
    }
}

struct Style {
    font: &'static str,
    size: i64,
    leading: i64,
    glyph_width: f64,
}

fn style_of(style: LineStyle) -> Style {
    let (font, size, leading) = match style {
        LineStyle::Heading => (FONT_BOLD, 18, 24),
        LineStyle::Subheading => (FONT_REGULAR, 10, 16),
        LineStyle::Section => (FONT_BOLD, 13, 20),
        LineStyle::Title => (FONT_BOLD, 12, 17),
        LineStyle::Body => (FONT_REGULAR, 10, 14),
        LineStyle::Link => (FONT_REGULAR, 9, 13),
        LineStyle::Blank => (FONT_REGULAR, 10, 8),
    };
    let glyph_width = if font == FONT_BOLD { BOLD_WIDTH } else { REGULAR_WIDTH };
    Style {
        font,
        size,
        leading,
        glyph_width,
    }
}

impl PdfRenderer {
    fn text_width(&self) -> i64 {
        self.page_width - 2 * self.margin
    }

    /// Typeset the layout into per-page operation lists.
    fn paginate(&self, digest: &DigestResult, meta: &DigestMeta) -> Vec<Vec<Operation>> {
        let top = self.page_height - self.margin;
        let mut pages = Vec::new();
        let mut ops = Vec::new();
        let mut y = top;

        for line in layout(digest, meta) {
            let style = style_of(line.style);
            if line.style == LineStyle::Blank {
                y -= style.leading;
                continue;
            }

            let columns = (self.text_width() as f64 / (style.size as f64 * style.glyph_width)) as usize;
            for row in wrap(&line.text, columns.max(1)) {
                if y - style.leading < self.margin {
                    pages.push(std::mem::take(&mut ops));
                    y = top;
                }
                y -= style.leading;

                if line.style == LineStyle::Title {
                    self.title_band(&mut ops, y, &style);
                }
                ops.extend([
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![style.font.into(), style.size.into()]),
                    Operation::new("Td", vec![self.margin.into(), y.into()]),
                    Operation::new("Tj", vec![Object::string_literal(win_ansi(&row))]),
                    Operation::new("ET", vec![]),
                ]);
            }
        }

        pages.push(ops);
        pages
    }

    fn title_band(&self, ops: &mut Vec<Operation>, baseline: i64, style: &Style) {
        let [r, g, b] = TITLE_BAND;
        ops.extend([
            Operation::new("rg", vec![r.into(), g.into(), b.into()]),
            Operation::new(
                "re",
                vec![
                    (self.margin - 3).into(),
                    (baseline - 4).into(),
                    (self.text_width() + 6).into(),
                    style.leading.into(),
                ],
            ),
            Operation::new("f", vec![]),
            Operation::new("g", vec![0.into()]),
        ]);
    }
}

impl DigestRenderer for PdfRenderer {
    fn render(&self, digest: &DigestResult, meta: &DigestMeta) -> Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                FONT_REGULAR => regular_id,
                FONT_BOLD => bold_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for operations in self.paginate(digest, meta) {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id: ObjectId = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), self.page_width.into(), self.page_height.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(win_ansi(&meta.title)),
            "Producer" => Object::string_literal(concat!("arxiv-digest ", env!("CARGO_PKG_VERSION"))),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        log::debug!("PDF: {} pages, {} bytes", page_count, bytes.len());
        Ok(bytes)
    }
}

/// Encode text for a WinAnsiEncoding font.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DetailedEntry;
    use crate::rendering::tests::{meta, sample_digest, scored};

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_renders_valid_pdf() {
        let bytes = PdfRenderer::default()
            .render(&sample_digest(), &meta())
            .unwrap();

        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert!(contains(&bytes, b"(1. Moduli of stable curves)"));
        assert!(contains(&bytes, b"Helvetica-Bold"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_empty_digest_says_zero_results() {
        let bytes = PdfRenderer::default()
            .render(&DigestResult::empty(), &meta())
            .unwrap();
        assert!(contains(&bytes, b"(0 results)"));
    }

    #[test]
    fn test_long_digest_breaks_pages() {
        let detailed = (0..40)
            .map(|i| DetailedEntry {
                paper: scored(&format!("2410.{i:05}"), "A rather long title about derived categories"),
                theorem: Some("we prove that every smooth projective variety admits a model. ".repeat(3)),
            })
            .collect();
        let digest = DigestResult::new(detailed, Vec::new());

        let bytes = PdfRenderer::default().render(&digest, &meta()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
    }

    #[test]
    fn test_win_ansi_encoding() {
        assert_eq!(win_ansi("G\u{f6}del \u{2014} \u{221e}"), b"G\xf6del \x97 ?".to_vec());
    }
}
