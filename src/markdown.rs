//! Converts markdown source into the [`Document`] model. Used by the
//! flat-file backend so that markdown-authored posts flow through the same
//! renderer and heading indexer as API- and database-sourced content.
//!
//! The conversion walks the pulldown-cmark event stream and folds inline
//! events into [`Span`]s with a mark stack. Markdown heading levels clamp
//! into the document model's 2-4 range (`#` and `##` both become level 2) so
//! that top-level sections stay navigable under the site's h1.

use crate::doc::{Block, CodeBlock, Document, ImageBlock, ListKind, Mark, Span};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};

/// Parses `markdown` into a [`Document`].
pub fn to_document(markdown: &str) -> Document {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut builder = Builder::default();
    for event in Parser::new_ext(markdown, options) {
        builder.on_event(event);
    }
    Document::new(builder.blocks)
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    spans: Vec<Span>,
    marks: Vec<Mark>,
    lists: Vec<ListKind>,
    quote_depth: usize,
    heading: Option<u8>,
    code: Option<CodeBlock>,
    image: Option<ImageBlock>,
}

impl Builder {
    fn on_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.on_start(tag),
            Event::End(tag) => self.on_end(tag),
            Event::Text(text) => {
                if let Some(code) = &mut self.code {
                    code.code.push_str(&text);
                } else if let Some(image) = &mut self.image {
                    let alt = image.alt.get_or_insert_with(String::new);
                    alt.push_str(&text);
                } else {
                    self.push_text(&text);
                }
            }
            Event::Code(text) => {
                let mut marks = self.marks.clone();
                marks.push(Mark::Code);
                self.spans.push(Span::marked(text.to_string(), marks));
            }
            Event::SoftBreak => self.push_text(" "),
            Event::HardBreak => self.push_text("\n"),
            // Raw HTML, rules, footnotes, and task markers have no
            // counterpart in the document model.
            Event::Html(_)
            | Event::Rule
            | Event::FootnoteReference(_)
            | Event::TaskListMarker(_) => {}
        }
    }

    fn on_start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading(level) => {
                self.heading = Some(clamp_heading(level));
            }
            Tag::BlockQuote => self.quote_depth += 1,
            Tag::List(ordered) => self.lists.push(match ordered {
                Some(_) => ListKind::Number,
                None => ListKind::Bullet,
            }),
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split(' ')
                        .next()
                        .filter(|lang| !lang.is_empty())
                        .map(str::to_owned),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(CodeBlock {
                    code: String::new(),
                    language,
                    filename: None,
                });
            }
            Tag::Emphasis => self.marks.push(Mark::Em),
            Tag::Strong => self.marks.push(Mark::Strong),
            Tag::Link(_, dest, _) => self.marks.push(Mark::Link {
                href: dest.to_string(),
                blank: false,
            }),
            Tag::Image(_, dest, title) => {
                self.image = Some(ImageBlock {
                    asset: Some(dest.to_string()),
                    alt: None,
                    caption: match title.is_empty() {
                        true => None,
                        false => Some(title.to_string()),
                    },
                });
            }
            Tag::Paragraph
            | Tag::Item
            | Tag::FootnoteDefinition(_)
            | Tag::Table(_)
            | Tag::TableHead
            | Tag::TableRow
            | Tag::TableCell
            | Tag::Strikethrough => {}
        }
    }

    fn on_end(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => {
                // A paragraph directly inside a list item folds into the
                // item; the item flushes on End(Item).
                if self.lists.is_empty() {
                    match self.quote_depth > 0 {
                        true => self.flush(Block::Blockquote),
                        false => self.flush(Block::Paragraph),
                    }
                }
            }
            Tag::Heading(_) => {
                if let Some(level) = self.heading.take() {
                    self.flush(|spans| Block::Heading { level, spans });
                }
            }
            Tag::BlockQuote => self.quote_depth = self.quote_depth.saturating_sub(1),
            Tag::List(_) => {
                self.lists.pop();
            }
            Tag::Item => {
                let kind = self.lists.last().copied().unwrap_or(ListKind::Bullet);
                self.flush(|spans| Block::ListItem { kind, spans });
            }
            Tag::CodeBlock(_) => {
                if let Some(code) = self.code.take() {
                    self.blocks.push(Block::Code(code));
                }
            }
            Tag::Emphasis | Tag::Strong | Tag::Link(..) => {
                self.marks.pop();
            }
            Tag::Image(..) => {
                if let Some(image) = self.image.take() {
                    self.blocks.push(Block::Image(image));
                }
            }
            Tag::FootnoteDefinition(_)
            | Tag::Table(_)
            | Tag::TableHead
            | Tag::TableRow
            | Tag::TableCell
            | Tag::Strikethrough => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        self.spans
            .push(Span::marked(text.to_owned(), self.marks.clone()));
    }

    fn flush(&mut self, into: impl FnOnce(Vec<Span>) -> Block) {
        if self.spans.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);
        self.blocks.push(into(spans));
    }
}

fn clamp_heading(level: u32) -> u8 {
    level.max(2).min(4) as u8
}
