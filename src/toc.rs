//! Derives the in-page table of contents from a [`Document`] and tracks the
//! section the reader is currently looking at.
//!
//! [`headings`] is a lazy, restartable pass over the block list: only level-2
//! and level-3 headings participate (level-4 headings are intentionally
//! excluded from navigation). Anchor ids come from [`slugify_heading`], a
//! pure function of the heading text; two headings with the same normalized
//! text therefore collide, and which anchor wins is undefined.
//!
//! Active-section tracking is the one long-running observer in the pipeline.
//! The embedding view supplies a [`VisibilityWatch`] implementation;
//! [`ScrollSpy::attach`] subscribes to visibility notifications for every
//! heading anchor and keeps a last-write-wins "current id". The subscription
//! is released when the spy is dropped (or unsubscribed explicitly), so a
//! replaced document view never leaks per-heading watches.

use crate::doc::{Block, Document};
use std::cell::RefCell;
use std::rc::Rc;

/// A derived navigation entry: anchor id, display text, heading level (2-3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadingEntry {
    pub id: String,
    pub text: String,
    pub level: u8,
}

/// Derives a URL-safe anchor id from heading text. Lowercases, collapses
/// every run of characters that is neither ASCII alphanumeric nor CJK
/// (hiragana, katakana, unified ideographs) into a single `-`, and trims
/// leading/trailing separators.
pub fn slugify_heading(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if is_slug_char(c) {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }
    slug
}

fn is_slug_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || ('\u{3040}'..='\u{309f}').contains(&c) // hiragana
        || ('\u{30a0}'..='\u{30ff}').contains(&c) // katakana
        || ('\u{4e00}'..='\u{9faf}').contains(&c) // CJK unified ideographs
}

/// Returns a lazy iterator over the navigable headings of `doc`. Finite and
/// restartable: call again for a fresh pass.
pub fn headings(doc: &Document) -> Headings {
    Headings {
        blocks: doc.blocks().iter(),
    }
}

/// Iterator returned by [`headings`].
pub struct Headings<'a> {
    blocks: std::slice::Iter<'a, Block>,
}

impl<'a> Iterator for Headings<'a> {
    type Item = HeadingEntry;

    fn next(&mut self) -> Option<HeadingEntry> {
        loop {
            match self.blocks.next()? {
                Block::Heading { level, spans } if *level <= 3 => {
                    let text: String =
                        spans.iter().map(|span| span.text.as_str()).collect();
                    return Some(HeadingEntry {
                        id: slugify_heading(&text),
                        text,
                        level: *level,
                    });
                }
                _ => continue,
            }
        }
    }
}

/// Shared "currently active heading id" cell. Last write wins; briefly stale
/// values are acceptable.
#[derive(Clone, Default)]
pub struct ActiveSection {
    current: Rc<RefCell<Option<String>>>,
}

impl ActiveSection {
    pub fn new() -> ActiveSection {
        ActiveSection::default()
    }

    /// Records that the heading with `id` crossed the visibility threshold.
    pub fn enter(&self, id: &str) {
        *self.current.borrow_mut() = Some(id.to_owned());
    }

    pub fn current(&self) -> Option<String> {
        self.current.borrow().clone()
    }
}

/// A capability for watching viewport visibility of a set of anchor ids.
/// Implemented by the embedding view layer; [`RecordingWatch`] in the test
/// module shows the contract.
pub trait VisibilityWatch {
    /// Begins watching `ids`, delivering threshold crossings into `sink`.
    /// Watching continues until the returned handle is unsubscribed.
    fn watch(&self, ids: &[String], sink: ActiveSection) -> Box<dyn Subscription>;
}

/// Handle for an active visibility watch. [`Subscription::unsubscribe`] must
/// release every per-heading subscription; it must be safe to call more than
/// once.
pub trait Subscription {
    fn unsubscribe(&mut self);
}

/// Observes the navigable headings of a document and exposes the active
/// anchor id. Tears its watch down on drop.
pub struct ScrollSpy {
    active: ActiveSection,
    watch: Box<dyn Subscription>,
}

impl ScrollSpy {
    /// Subscribes to visibility notifications for every navigable heading of
    /// `doc`. Returns `None` when the document has no qualifying headings, in
    /// which case the navigation panel must not be shown at all.
    pub fn attach(watcher: &dyn VisibilityWatch, doc: &Document) -> Option<ScrollSpy> {
        let ids: Vec<String> = headings(doc).map(|entry| entry.id).collect();
        if ids.is_empty() {
            return None;
        }
        let active = ActiveSection::new();
        let watch = watcher.watch(&ids, active.clone());
        Some(ScrollSpy { active, watch })
    }

    /// The id of the heading most recently reported visible, if any yet.
    pub fn active(&self) -> Option<String> {
        self.active.current()
    }
}

impl Drop for ScrollSpy {
    fn drop(&mut self) {
        self.watch.unsubscribe();
    }
}
