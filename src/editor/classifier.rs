use regex::Regex;
use tracing::debug;

use super::crawler::text_nodes;
use super::tracked::{CallbackPayload, TrackedItem, TrackedKind};
use super::{Editor, Result};
use crate::dom::{HASHTAG_CLASS, NodeId, URLLINK_CLASS, ZERO_WIDTH_SPACE};

const HASHTAG_PATTERN: &str = r"#[\p{L}\p{N}_]+";
const URLLINK_PATTERN: &str = r"(?i)https?://(?:www\.)?[a-z0-9][a-z0-9-]*\.[^\s]{2,}|www\.[a-z0-9][a-z0-9-]*\.[^\s]{2,}";

/// A tagged run inside one text node, in character offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMatch {
    pub kind: TrackedKind,
    pub start: usize,
    pub end: usize,
}

/// Finds hashtags and urls in plain text.
pub trait TextClassifier {
    fn classify(&self, text: &str) -> Vec<TextMatch>;
}

pub struct RegexClassifier {
    hashtag: Option<Regex>,
    urllink: Option<Regex>,
}

impl RegexClassifier {
    pub fn new(hashtag: bool, urllink: bool) -> Self {
        Self {
            hashtag: hashtag.then(|| Regex::new(HASHTAG_PATTERN).ok()).flatten(),
            urllink: urllink.then(|| Regex::new(URLLINK_PATTERN).ok()).flatten(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.hashtag.is_some() || self.urllink.is_some()
    }
}

impl TextClassifier for RegexClassifier {
    fn classify(&self, text: &str) -> Vec<TextMatch> {
        let char_offset = |byte: usize| text[..byte].chars().count();
        let mut matches: Vec<TextMatch> = Vec::new();
        if let Some(regex) = &self.urllink {
            for found in regex.find_iter(text) {
                matches.push(TextMatch {
                    kind: TrackedKind::Urllink,
                    start: char_offset(found.start()),
                    end: char_offset(found.end()),
                });
            }
        }
        if let Some(regex) = &self.hashtag {
            for found in regex.find_iter(text) {
                let start = char_offset(found.start());
                let end = char_offset(found.end());
                // a fragment inside a url stays part of the url
                if matches
                    .iter()
                    .any(|existing| start < existing.end && existing.start < end)
                {
                    continue;
                }
                matches.push(TextMatch {
                    kind: TrackedKind::Hashtag,
                    start,
                    end,
                });
            }
        }
        matches.sort_by_key(|found| found.start);
        matches
    }
}

impl Editor {
    /// Turns hashtags and urls below `node` into atomic tags, tracks them
    /// and announces them. Returns the anchor after the last tag.
    pub(crate) fn classify_text(&mut self, node: NodeId) -> Result<Option<NodeId>> {
        let scope = if self.doc.is_text(node) {
            match self.doc.parent(node) {
                Some(parent) => parent,
                None => return Ok(None),
            }
        } else {
            node
        };
        let runs: Vec<NodeId> = text_nodes(&mut self.doc, scope)?
            .into_iter()
            .filter(|run| {
                let text = self.doc.text(*run).unwrap_or_default();
                !text.is_empty()
                    && text != ZERO_WIDTH_SPACE.to_string()
                    && self
                        .doc
                        .closest(*run, |ancestor| self.doc.class_of(ancestor).is_atomic())
                        .is_none()
            })
            .collect();

        let mut found: Vec<(TrackedKind, TrackedItem)> = Vec::new();
        let mut anchor = None;
        for run in runs {
            let text = self.doc.text(run).unwrap_or_default().to_string();
            let matches = self.classifier.classify(&text);
            let mut run_anchor = None;
            // right to left so earlier offsets stay valid
            for text_match in matches.into_iter().rev() {
                let tagged = text
                    .chars()
                    .skip(text_match.start)
                    .take(text_match.end - text_match.start)
                    .collect::<String>();
                if tagged.chars().count() < 2 {
                    continue;
                }
                let tail = self.doc.split_text(run, text_match.end)?;
                let middle = self.doc.split_text(run, text_match.start)?;
                let class = match text_match.kind {
                    TrackedKind::Hashtag => HASHTAG_CLASS,
                    _ => URLLINK_CLASS,
                };
                let element_id = text_match.kind.generate_id();
                let span = self.doc.create_element_with_class("span", class);
                self.doc.set_attribute(span, "id", &element_id);
                self.doc.set_attribute(span, "contenteditable", "false");
                self.doc.wrap(middle, span)?;
                let after = self.doc.create_text("");
                self.doc.insert_after(span, after)?;
                if self.doc.text(tail).is_some_and(str::is_empty) {
                    self.doc.remove(tail);
                }
                run_anchor.get_or_insert(after);

                let mut item = TrackedItem::new(element_id, span);
                match text_match.kind {
                    TrackedKind::Hashtag => {
                        item.tag = Some(tagged.trim_start_matches('#').to_string());
                    }
                    _ => item.url = Some(tagged),
                }
                found.push((text_match.kind, item));
            }
            if run_anchor.is_some() {
                anchor = run_anchor;
            }
        }
        if found.is_empty() {
            return Ok(None);
        }
        debug!(count = found.len(), "text tagged");
        self.announce(found)?;
        Ok(anchor)
    }

    /// Tracks newly tagged items and hands them to the callback, one key per
    /// kind.
    pub(crate) fn announce(&mut self, items: Vec<(TrackedKind, TrackedItem)>) -> Result<()> {
        let mut payload = CallbackPayload::default();
        for kind in TrackedKind::ALL {
            let of_kind: Vec<TrackedItem> = items
                .iter()
                .filter(|(item_kind, _)| *item_kind == kind)
                .map(|(_, item)| item.clone())
                .collect();
            if of_kind.is_empty() {
                continue;
            }
            for item in &of_kind {
                self.tracked.upsert(kind, item.clone());
            }
            payload.set_items(kind, of_kind);
        }
        self.emit(payload)
    }
}
