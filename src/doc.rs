//! Defines the [`Document`] tree: the structured rich-text format used for
//! article bodies and the about-page content. A document is an ordered
//! sequence of [`Block`]s in display order; text-bearing blocks carry ordered
//! [`Span`]s whose overlapping mark ranges have already been resolved into
//! nested spans by the content source.
//!
//! The wire format is the content store's JSON node list (`_type`-tagged
//! blocks with `style`, `children`, and `markDefs` fields). Deserialization
//! maps every node onto the closed [`Block`]/[`Mark`] sums; node and mark
//! types this crate doesn't know about become the `Unknown` variants so that
//! a newer content schema degrades to empty output instead of an error.

use serde::{Deserialize, Deserializer};

/// An ordered rich-text document. Block order is display order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Document {
        Document { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Concatenates the text of every text-bearing block, separated by single
    /// spaces. Marks are ignored. Used for full-text search and excerpt
    /// derivation by the flat-file backend.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            if let Some(spans) = block.spans() {
                if !out.is_empty() {
                    out.push(' ');
                }
                for span in spans {
                    out.push_str(&span.text);
                }
            }
        }
        out
    }
}

/// A single block-level node.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Paragraph(Vec<Span>),
    Heading { level: u8, spans: Vec<Span> },
    Blockquote(Vec<Span>),
    ListItem { kind: ListKind, spans: Vec<Span> },
    Image(ImageBlock),
    Code(CodeBlock),

    /// A node type this crate doesn't know about. Renders as empty.
    Unknown,
}

impl Block {
    /// The inline spans of a text-bearing block; `None` for embeds and
    /// unknown nodes.
    pub fn spans(&self) -> Option<&[Span]> {
        match self {
            Block::Paragraph(spans) => Some(spans),
            Block::Heading { spans, .. } => Some(spans),
            Block::Blockquote(spans) => Some(spans),
            Block::ListItem { spans, .. } => Some(spans),
            _ => None,
        }
    }
}

/// List flavor for [`Block::ListItem`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Number,
}

/// An embedded image. The `asset` field is a content-store asset reference
/// (or a plain URL); it is resolved into a display URL by
/// [`crate::image::UrlBuilder`] at render time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageBlock {
    pub asset: Option<String>,
    pub alt: Option<String>,
    pub caption: Option<String>,
}

/// An embedded code block. Rendered verbatim; syntax highlighting is
/// delegated to the theme.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CodeBlock {
    pub code: String,
    pub language: Option<String>,
    pub filename: Option<String>,
}

/// An inline text run and the marks applied to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    pub text: String,
    pub marks: Vec<Mark>,
}

impl Span {
    /// A span with no marks.
    pub fn plain(text: impl Into<String>) -> Span {
        Span {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn marked(text: impl Into<String>, marks: Vec<Mark>) -> Span {
        Span {
            text: text.into(),
            marks,
        }
    }
}

/// A decoration applied to a [`Span`]. Marks compose independently.
#[derive(Clone, Debug, PartialEq)]
pub enum Mark {
    Strong,
    Em,
    Code,
    Underline,
    Link { href: String, blank: bool },

    /// A mark this crate doesn't know about. Ignored at render time.
    Unknown,
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawNode {
    #[serde(rename = "_type")]
    kind: String,

    #[serde(default)]
    style: Option<String>,

    #[serde(default)]
    children: Vec<RawSpan>,

    #[serde(default, rename = "markDefs")]
    mark_defs: Vec<RawMarkDef>,

    #[serde(default, rename = "listItem")]
    list_item: Option<String>,

    #[serde(default)]
    asset: Option<RawAsset>,

    #[serde(default)]
    alt: Option<String>,

    #[serde(default)]
    caption: Option<String>,

    #[serde(default)]
    code: Option<String>,

    #[serde(default)]
    language: Option<String>,

    #[serde(default)]
    filename: Option<String>,
}

#[derive(Deserialize)]
struct RawSpan {
    #[serde(default)]
    text: String,

    #[serde(default)]
    marks: Vec<String>,
}

#[derive(Deserialize)]
struct RawMarkDef {
    #[serde(rename = "_key")]
    key: String,

    #[serde(rename = "_type")]
    kind: String,

    #[serde(default)]
    href: Option<String>,

    #[serde(default)]
    blank: Option<bool>,
}

#[derive(Deserialize)]
struct RawAsset {
    #[serde(rename = "_ref", alias = "url")]
    reference: String,
}

impl RawNode {
    fn into_block(self) -> Block {
        match self.kind.as_str() {
            "block" => {
                let spans = resolve_spans(self.children, &self.mark_defs);
                if let Some(kind) = self.list_item.as_deref() {
                    let kind = match kind {
                        "number" => ListKind::Number,
                        _ => ListKind::Bullet,
                    };
                    return Block::ListItem { kind, spans };
                }
                match self.style.as_deref().unwrap_or("normal") {
                    "normal" => Block::Paragraph(spans),
                    "h2" => Block::Heading { level: 2, spans },
                    "h3" => Block::Heading { level: 3, spans },
                    "h4" => Block::Heading { level: 4, spans },
                    "blockquote" => Block::Blockquote(spans),
                    _ => Block::Unknown,
                }
            }
            "image" => Block::Image(ImageBlock {
                asset: self.asset.map(|a| a.reference),
                alt: self.alt,
                caption: self.caption,
            }),
            "code" => Block::Code(CodeBlock {
                code: self.code.unwrap_or_default(),
                language: self.language,
                filename: self.filename,
            }),
            _ => Block::Unknown,
        }
    }
}

fn resolve_spans(children: Vec<RawSpan>, mark_defs: &[RawMarkDef]) -> Vec<Span> {
    children
        .into_iter()
        .map(|child| Span {
            text: child.text,
            marks: child
                .marks
                .iter()
                .map(|mark| resolve_mark(mark, mark_defs))
                .collect(),
        })
        .collect()
}

// A span's mark entry is either a decorator name or the key of an annotation
// in the block's `markDefs`.
fn resolve_mark(mark: &str, mark_defs: &[RawMarkDef]) -> Mark {
    match mark {
        "strong" => Mark::Strong,
        "em" => Mark::Em,
        "code" => Mark::Code,
        "underline" => Mark::Underline,
        _ => match mark_defs.iter().find(|def| def.key == mark) {
            Some(def) if def.kind == "link" => Mark::Link {
                href: def.href.clone().unwrap_or_else(|| "#".to_owned()),
                blank: def.blank.unwrap_or(false),
            },
            _ => Mark::Unknown,
        },
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D>(deserializer: D) -> Result<Document, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nodes = Vec::<RawNode>::deserialize(deserializer)?;
        Ok(Document {
            blocks: nodes.into_iter().map(RawNode::into_block).collect(),
        })
    }
}
