use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::position::Selection;
use super::styles::StyleReport;
use super::{Editor, Result};
use crate::dom::{MutationBatch, NodeClass, NodeId};

/// Handler attached to a tracked element by the enrichment callback.
pub type ClickHandler = Rc<dyn Fn(&TrackedItem)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackedKind {
    Image,
    Hashtag,
    Urllink,
    Custom,
}

impl TrackedKind {
    pub const ALL: [TrackedKind; 4] = [
        TrackedKind::Image,
        TrackedKind::Hashtag,
        TrackedKind::Urllink,
        TrackedKind::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TrackedKind::Image => "image",
            TrackedKind::Hashtag => "hashtag",
            TrackedKind::Urllink => "urllink",
            TrackedKind::Custom => "custom",
        }
    }

    pub(crate) fn generate_id(self) -> String {
        format!("{}_{}", self.as_str(), Uuid::new_v4().simple())
    }
}

/// One atomic element the editor reports to its host.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItem {
    pub element_id: String,
    pub element: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub style: IndexMap<String, String>,
    #[serde(skip)]
    pub onclick: Option<ClickHandler>,
}

impl TrackedItem {
    pub fn new(element_id: impl Into<String>, element: NodeId) -> Self {
        Self {
            element_id: element_id.into(),
            element,
            source: None,
            tag: None,
            url: None,
            style: IndexMap::new(),
            onclick: None,
        }
    }

    pub fn with_style(mut self, property: &str, value: &str) -> Self {
        self.style.insert(property.to_string(), value.to_string());
        self
    }

    pub fn with_onclick(mut self, handler: impl Fn(&TrackedItem) + 'static) -> Self {
        self.onclick = Some(Rc::new(handler));
        self
    }
}

impl fmt::Debug for TrackedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedItem")
            .field("element_id", &self.element_id)
            .field("element", &self.element)
            .field("source", &self.source)
            .field("tag", &self.tag)
            .field("url", &self.url)
            .field("style", &self.style)
            .field("onclick", &self.onclick.is_some())
            .finish()
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TrackedItems {
    pub image: Vec<TrackedItem>,
    pub hashtag: Vec<TrackedItem>,
    pub urllink: Vec<TrackedItem>,
    pub custom: Vec<TrackedItem>,
}

impl TrackedItems {
    pub fn list(&self, kind: TrackedKind) -> &[TrackedItem] {
        match kind {
            TrackedKind::Image => &self.image,
            TrackedKind::Hashtag => &self.hashtag,
            TrackedKind::Urllink => &self.urllink,
            TrackedKind::Custom => &self.custom,
        }
    }

    pub(crate) fn list_mut(&mut self, kind: TrackedKind) -> &mut Vec<TrackedItem> {
        match kind {
            TrackedKind::Image => &mut self.image,
            TrackedKind::Hashtag => &mut self.hashtag,
            TrackedKind::Urllink => &mut self.urllink,
            TrackedKind::Custom => &mut self.custom,
        }
    }

    /// Inserts or replaces the item with the same element id.
    pub(crate) fn upsert(&mut self, kind: TrackedKind, item: TrackedItem) {
        let list = self.list_mut(kind);
        match list
            .iter_mut()
            .find(|existing| existing.element_id == item.element_id)
        {
            Some(existing) => *existing = item,
            None => list.push(item),
        }
    }

    pub fn find_by_element(&self, element: NodeId) -> Option<(TrackedKind, &TrackedItem)> {
        TrackedKind::ALL.into_iter().find_map(|kind| {
            self.list(kind)
                .iter()
                .find(|item| item.element == element)
                .map(|item| (kind, item))
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CaretPosition {
    pub row: usize,
    pub column: usize,
}

/// Partial payload handed to the host callback. Only set keys are present.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<TrackedItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashtag: Option<Vec<TrackedItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urllink: Option<Vec<TrackedItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<Vec<TrackedItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<IndexMap<TrackedKind, Vec<TrackedItem>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_tracker: Option<StyleReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Selection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carat_position: Option<CaretPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation: Option<MutationBatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading: Option<bool>,
}

impl CallbackPayload {
    pub fn items(&self, kind: TrackedKind) -> Option<&[TrackedItem]> {
        match kind {
            TrackedKind::Image => self.image.as_deref(),
            TrackedKind::Hashtag => self.hashtag.as_deref(),
            TrackedKind::Urllink => self.urllink.as_deref(),
            TrackedKind::Custom => self.custom.as_deref(),
        }
    }

    pub(crate) fn set_items(&mut self, kind: TrackedKind, items: Vec<TrackedItem>) {
        let slot = match kind {
            TrackedKind::Image => &mut self.image,
            TrackedKind::Hashtag => &mut self.hashtag,
            TrackedKind::Urllink => &mut self.urllink,
            TrackedKind::Custom => &mut self.custom,
        };
        *slot = Some(items);
    }

    fn carries_items(&self) -> bool {
        TrackedKind::ALL
            .into_iter()
            .any(|kind| self.items(kind).is_some_and(|items| !items.is_empty()))
    }
}

/// Items returned by the callback to be merged onto tracked elements.
#[derive(Clone, Debug, Default)]
pub struct Enrichment {
    pub items: Vec<(TrackedKind, TrackedItem)>,
}

impl Enrichment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: TrackedKind, item: TrackedItem) -> Self {
        self.items.push((kind, item));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Ticket(u64);

#[derive(Debug)]
pub enum CallbackReply {
    Done(Enrichment),
    /// The host answers later through [`Editor::resolve_enrichment`].
    Deferred,
    Failed(String),
}

pub trait EditorCallback {
    fn notify(&mut self, ticket: Ticket, payload: &CallbackPayload) -> CallbackReply;
}

impl<F> EditorCallback for F
where
    F: FnMut(Ticket, &CallbackPayload) -> CallbackReply,
{
    fn notify(&mut self, ticket: Ticket, payload: &CallbackPayload) -> CallbackReply {
        self(ticket, payload)
    }
}

impl Editor {
    pub fn tracked(&self) -> &TrackedItems {
        &self.tracked
    }

    /// Hands `payload` to the host callback and merges a synchronous reply.
    pub(crate) fn emit(&mut self, payload: CallbackPayload) -> Result<()> {
        let Some(callback) = self.callback.as_mut() else {
            return Ok(());
        };
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        let expects_reply = payload.carries_items();
        match callback.notify(ticket, &payload) {
            CallbackReply::Done(enrichment) => {
                if expects_reply {
                    self.apply_enrichment(enrichment)?;
                }
            }
            CallbackReply::Deferred => {
                if expects_reply {
                    debug!(?ticket, "enrichment deferred");
                    self.pending_enrichment.insert(ticket);
                }
            }
            CallbackReply::Failed(reason) => {
                warn!(?ticket, %reason, "callback failed");
            }
        }
        Ok(())
    }

    /// Completes a deferred callback. Failures are logged and dropped; the
    /// content stays in the document without enrichment.
    pub fn resolve_enrichment(
        &mut self,
        ticket: Ticket,
        outcome: std::result::Result<Enrichment, String>,
    ) -> Result<()> {
        if !self.pending_enrichment.remove(&ticket) {
            warn!(?ticket, "unknown enrichment ticket");
            return Ok(());
        }
        match outcome {
            Ok(enrichment) => self.apply_enrichment(enrichment),
            Err(reason) => {
                warn!(?ticket, %reason, "enrichment rejected");
                Ok(())
            }
        }
    }

    pub fn pending_enrichments(&self) -> usize {
        self.pending_enrichment.len()
    }

    fn apply_enrichment(&mut self, enrichment: Enrichment) -> Result<()> {
        let observing = self.doc.set_observing(false);
        for (kind, item) in enrichment.items {
            let element = if self.doc.owns(item.element) {
                Some(item.element)
            } else {
                self.doc.find_by_id(&item.element_id)
            };
            let Some(element) = element else {
                warn!(element_id = %item.element_id, "enrichment for unknown element");
                continue;
            };
            let target = match kind {
                TrackedKind::Image => self
                    .doc
                    .closest(element, |node| self.doc.class_of(node) == NodeClass::Media)
                    .unwrap_or(element),
                _ => element,
            };
            for (property, value) in &item.style {
                self.doc.set_style_property(target, property, value);
            }
            if item.onclick.is_some() {
                self.doc.add_class(target, "_hover_");
            }
            if self.doc.attribute(target, "contenteditable") != Some("true") {
                self.doc.set_attribute(target, "contenteditable", "false");
            }
            let mut item = item;
            item.element = element;
            self.tracked.upsert(kind, item);
        }
        self.doc.set_observing(observing);
        Ok(())
    }

    /// Runs the `onclick` handler of the tracked item owning `node`.
    pub fn click(&mut self, node: NodeId) -> bool {
        let owner = self.doc.closest(node, |candidate| {
            self.tracked.find_by_element(candidate).is_some()
        });
        let Some(owner) = owner else {
            return false;
        };
        let Some((_, item)) = self.tracked.find_by_element(owner) else {
            return false;
        };
        match item.onclick.clone() {
            Some(handler) => {
                let item = item.clone();
                handler(&item);
                true
            }
            None => false,
        }
    }

    /// Gives every atomic node below `node` an id, tracks it and reports the
    /// batch once.
    pub(crate) fn announce_atomic(&mut self, node: NodeId) -> Result<()> {
        let mut found = Vec::new();
        for candidate in self.doc.descendants(node) {
            let kind = match self.doc.class_of(candidate) {
                NodeClass::Media => TrackedKind::Image,
                NodeClass::Hashtag => TrackedKind::Hashtag,
                NodeClass::UrlLink => TrackedKind::Urllink,
                NodeClass::CustomEmbed => TrackedKind::Custom,
                _ => continue,
            };
            if self.doc.attribute(candidate, "contenteditable") != Some("true") {
                self.doc.set_attribute(candidate, "contenteditable", "false");
            }
            let element = match kind {
                TrackedKind::Image => {
                    let image = self
                        .doc
                        .descendants(candidate)
                        .into_iter()
                        .find(|child| self.doc.is_tag(*child, "img"));
                    match image {
                        Some(image) => image,
                        None => continue,
                    }
                }
                _ => candidate,
            };
            let element_id = match self.doc.attribute(element, "id") {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    let id = kind.generate_id();
                    self.doc.set_attribute(element, "id", &id);
                    id
                }
            };
            let mut item = TrackedItem::new(element_id, element);
            let text = self.doc.text_content(candidate);
            match kind {
                TrackedKind::Image => {
                    item.source = self.doc.attribute(element, "src").map(str::to_string);
                }
                TrackedKind::Hashtag => item.tag = Some(text.trim_start_matches('#').to_string()),
                TrackedKind::Urllink => item.url = Some(text),
                TrackedKind::Custom => {}
            }
            found.push((kind, item));
        }
        if found.is_empty() {
            return Ok(());
        }
        debug!(count = found.len(), "atomic content discovered");
        self.announce(found)
    }

    /// Drops every tracked item whose element is `node` or lies below it
    /// and reports them.
    pub(crate) fn forget_tracked(&mut self, node: NodeId) -> Result<()> {
        let mut removed: IndexMap<TrackedKind, Vec<TrackedItem>> = IndexMap::new();
        for kind in TrackedKind::ALL {
            let list = self.tracked.list_mut(kind);
            let (gone, kept): (Vec<TrackedItem>, Vec<TrackedItem>) = std::mem::take(list)
                .into_iter()
                .partition(|item| self.doc.contains(node, item.element));
            *list = kept;
            if !gone.is_empty() {
                removed.insert(kind, gone);
            }
        }
        if removed.is_empty() {
            return Ok(());
        }
        debug!(count = removed.len(), "tracked items removed");
        self.emit(CallbackPayload {
            removed: Some(removed),
            ..CallbackPayload::default()
        })
    }
}
