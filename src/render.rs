//! Renders a [`Document`] tree into HTML.
//!
//! This is a pure tree-to-string transform: every block and mark variant maps
//! to one rendering rule via an exhaustive `match`, and the `Unknown`
//! variants render as empty output so that newer content schemas degrade
//! gracefully instead of crashing a page. The only collaboration is with
//! [`crate::image::UrlBuilder`], which resolves embedded image references
//! into size-parameterized URLs before the `<img>` tag is written.
//!
//! h2/h3 headings carry anchor ids derived with
//! [`crate::toc::slugify_heading`] so the table of contents can target them;
//! h4 headings render without an anchor and stay out of the navigation.

use crate::doc::{Block, CodeBlock, Document, ImageBlock, ListKind, Mark, Span};
use crate::image::UrlBuilder;
use crate::toc::slugify_heading;
use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use std::io;

// Article-body images are cropped to the same aspect ratio the themes use.
const IMAGE_WIDTH: u32 = 1200;
const IMAGE_HEIGHT: u32 = 675;

/// Renders documents for one site. Construction only borrows the image URL
/// builder; rendering itself holds no state, so rendering the same document
/// twice produces identical output.
pub struct Renderer<'a> {
    images: &'a UrlBuilder,
}

impl<'a> Renderer<'a> {
    pub fn new(images: &'a UrlBuilder) -> Renderer<'a> {
        Renderer { images }
    }

    /// Renders `doc` into a `String`. Writing into a `String` can't fail, so
    /// the [`StrWrite`] error is discarded.
    pub fn to_html(&self, doc: &Document) -> String {
        let mut out = String::new();
        let _ = self.push_html(&mut out, doc);
        out
    }

    /// Renders `doc` into `w`, block by block in document order. Adjacent
    /// list items of the same kind group into a single list element.
    pub fn push_html<W: StrWrite>(&self, w: &mut W, doc: &Document) -> io::Result<()> {
        let mut blocks = doc.blocks().iter().peekable();
        while let Some(block) = blocks.next() {
            match block {
                Block::Paragraph(spans) => {
                    w.write_str("<p>")?;
                    self.push_spans(w, spans)?;
                    w.write_str("</p>")?;
                }
                Block::Heading { level, spans } => self.push_heading(w, *level, spans)?,
                Block::Blockquote(spans) => {
                    w.write_str("<blockquote>")?;
                    self.push_spans(w, spans)?;
                    w.write_str("</blockquote>")?;
                }
                Block::ListItem { kind, spans } => {
                    let (open, close) = match kind {
                        ListKind::Bullet => ("<ul>", "</ul>"),
                        ListKind::Number => ("<ol>", "</ol>"),
                    };
                    w.write_str(open)?;
                    self.push_list_item(w, spans)?;
                    while let Some(Block::ListItem {
                        kind: next_kind,
                        spans,
                    }) = blocks.peek()
                    {
                        if next_kind != kind {
                            break;
                        }
                        self.push_list_item(w, spans)?;
                        blocks.next();
                    }
                    w.write_str(close)?;
                }
                Block::Image(image) => self.push_image(w, image)?,
                Block::Code(code) => self.push_code(w, code)?,
                Block::Unknown => {}
            }
        }
        Ok(())
    }

    fn push_heading<W: StrWrite>(&self, w: &mut W, level: u8, spans: &[Span]) -> io::Result<()> {
        // Only h2/h3 get anchors; they're the navigable levels.
        if level <= 3 {
            let text: String = spans.iter().map(|span| span.text.as_str()).collect();
            write!(w, r#"<h{} id=""#, level)?;
            escape_html(&mut *w, &slugify_heading(&text))?;
            w.write_str(r#"">"#)?;
        } else {
            write!(w, "<h{}>", level)?;
        }
        self.push_spans(w, spans)?;
        write!(w, "</h{}>", level)
    }

    fn push_list_item<W: StrWrite>(&self, w: &mut W, spans: &[Span]) -> io::Result<()> {
        w.write_str("<li>")?;
        self.push_spans(w, spans)?;
        w.write_str("</li>")
    }

    fn push_spans<W: StrWrite>(&self, w: &mut W, spans: &[Span]) -> io::Result<()> {
        for span in spans {
            self.push_span(w, span)?;
        }
        Ok(())
    }

    // Marks nest outside-in in a fixed order; each wraps the remainder.
    fn push_span<W: StrWrite>(&self, w: &mut W, span: &Span) -> io::Result<()> {
        for mark in &span.marks {
            match mark {
                Mark::Link { href, blank } => {
                    w.write_str(r#"<a href=""#)?;
                    escape_href(&mut *w, href)?;
                    match blank {
                        true => w.write_str(r#"" target="_blank" rel="noopener noreferrer">"#)?,
                        false => w.write_str(r#"">"#)?,
                    }
                }
                Mark::Strong => w.write_str("<strong>")?,
                Mark::Em => w.write_str("<em>")?,
                Mark::Underline => w.write_str("<u>")?,
                Mark::Code => w.write_str("<code>")?,
                Mark::Unknown => {}
            }
        }
        escape_html(&mut *w, &span.text)?;
        for mark in span.marks.iter().rev() {
            match mark {
                Mark::Link { .. } => w.write_str("</a>")?,
                Mark::Strong => w.write_str("</strong>")?,
                Mark::Em => w.write_str("</em>")?,
                Mark::Underline => w.write_str("</u>")?,
                Mark::Code => w.write_str("</code>")?,
                Mark::Unknown => {}
            }
        }
        Ok(())
    }

    fn push_image<W: StrWrite>(&self, w: &mut W, image: &ImageBlock) -> io::Result<()> {
        let resolved = image
            .asset
            .as_deref()
            .and_then(|asset| self.images.url(asset, IMAGE_WIDTH, IMAGE_HEIGHT));
        let url = match resolved {
            Some(url) => url,
            // An embed without a resolvable asset renders nothing.
            None => return Ok(()),
        };
        w.write_str(r#"<figure><img src=""#)?;
        escape_href(&mut *w, &url)?;
        w.write_str(r#"" alt=""#)?;
        escape_html(&mut *w, image.alt.as_deref().unwrap_or(""))?;
        w.write_str(r#"">"#)?;
        if let Some(caption) = &image.caption {
            w.write_str("<figcaption>")?;
            escape_html(&mut *w, caption)?;
            w.write_str("</figcaption>")?;
        }
        w.write_str("</figure>")
    }

    fn push_code<W: StrWrite>(&self, w: &mut W, code: &CodeBlock) -> io::Result<()> {
        if let Some(filename) = &code.filename {
            w.write_str(r#"<div class="filename">"#)?;
            escape_html(&mut *w, filename)?;
            w.write_str("</div>")?;
        }
        match &code.language {
            Some(language) if !language.is_empty() => {
                w.write_str(r#"<pre><code class="language-"#)?;
                escape_html(&mut *w, language)?;
                w.write_str(r#"">"#)?;
            }
            _ => w.write_str("<pre><code>")?,
        }
        escape_html(&mut *w, &code.code)?;
        w.write_str("</code></pre>")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use url::Url;

    fn render(doc: &Document) -> String {
        let images =
            UrlBuilder::new(Url::parse("https://cdn.example.org/images/demo/production/").unwrap());
        Renderer::new(&images).to_html(doc)
    }

    fn paragraph(text: &str) -> Block {
        Block::Paragraph(vec![Span::plain(text)])
    }

    #[test]
    fn test_render_is_deterministic() {
        let doc = Document::new(vec![
            Block::Heading {
                level: 2,
                spans: vec![Span::plain("Intro")],
            },
            paragraph("body & soul"),
        ]);
        assert_eq!(render(&doc), render(&doc));
    }

    #[test]
    fn test_heading_then_paragraph() {
        let doc = Document::new(vec![
            Block::Heading {
                level: 2,
                spans: vec![Span::plain("人間関係")],
            },
            paragraph("text"),
        ]);
        assert_eq!(render(&doc), r#"<h2 id="人間関係">人間関係</h2><p>text</p>"#);
    }

    #[test]
    fn test_h4_has_no_anchor() {
        let doc = Document::new(vec![Block::Heading {
            level: 4,
            spans: vec![Span::plain("Deep")],
        }]);
        assert_eq!(render(&doc), "<h4>Deep</h4>");
    }

    #[test]
    fn test_marks_nest_and_escape() {
        let doc = Document::new(vec![Block::Paragraph(vec![
            Span::marked("a < b", vec![Mark::Strong, Mark::Em]),
            Span::marked(
                "docs",
                vec![Mark::Link {
                    href: "https://example.org/?a=1&b=2".to_owned(),
                    blank: true,
                }],
            ),
        ])]);
        assert_eq!(
            render(&doc),
            concat!(
                "<p><strong><em>a &lt; b</em></strong>",
                r#"<a href="https://example.org/?a=1&amp;b=2" target="_blank" rel="noopener noreferrer">docs</a></p>"#,
            ),
        );
    }

    #[test]
    fn test_unknown_blocks_and_marks_render_empty() {
        let doc = Document::new(vec![
            Block::Unknown,
            Block::Paragraph(vec![Span::marked("kept", vec![Mark::Unknown])]),
        ]);
        assert_eq!(render(&doc), "<p>kept</p>");
    }

    #[test]
    fn test_list_grouping() {
        let doc = Document::new(vec![
            Block::ListItem {
                kind: ListKind::Bullet,
                spans: vec![Span::plain("one")],
            },
            Block::ListItem {
                kind: ListKind::Bullet,
                spans: vec![Span::plain("two")],
            },
            Block::ListItem {
                kind: ListKind::Number,
                spans: vec![Span::plain("first")],
            },
        ]);
        assert_eq!(
            render(&doc),
            "<ul><li>one</li><li>two</li></ul><ol><li>first</li></ol>",
        );
    }

    #[test]
    fn test_image_and_code_blocks() {
        let doc = Document::new(vec![
            Block::Image(crate::doc::ImageBlock {
                asset: Some("image-abc-1200x675-jpg".to_owned()),
                alt: Some("cover".to_owned()),
                caption: Some("a caption".to_owned()),
            }),
            Block::Image(crate::doc::ImageBlock::default()),
            Block::Code(CodeBlock {
                code: "let x = 1 < 2;".to_owned(),
                language: Some("rust".to_owned()),
                filename: Some("demo.rs".to_owned()),
            }),
        ]);
        assert_eq!(
            render(&doc),
            concat!(
                r#"<figure><img src="https://cdn.example.org/images/demo/production/abc-1200x675.jpg?w=1200&amp;h=675&amp;fit=crop" alt="cover">"#,
                "<figcaption>a caption</figcaption></figure>",
                r#"<div class="filename">demo.rs</div>"#,
                r#"<pre><code class="language-rust">let x = 1 &lt; 2;</code></pre>"#,
            ),
        );
    }

    #[test]
    fn test_blockquote() {
        let doc = Document::new(vec![Block::Blockquote(vec![Span::plain("wisdom")])]);
        assert_eq!(render(&doc), "<blockquote>wisdom</blockquote>");
    }
}
