use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::StructureError;

mod classify;
pub mod markup;
mod range;

pub use classify::{
    COLOR_CLASS, CUSTOM_CLASS, HASHTAG_CLASS, MEDIA_CLASS, NodeClass, URLLINK_CLASS,
};
pub use range::BoundaryPoint;

pub const ZERO_WIDTH_SPACE: char = '\u{200B}';
pub const FRAGMENT_TAG: &str = "#fragment";

pub type DomResult<T> = std::result::Result<T, StructureError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Token placed on a node for the duration of a bounded walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeMarker(u64);

#[derive(Clone, Debug)]
pub enum NodeKind {
    Text(String),
    Element(ElementData),
}

#[derive(Clone, Debug, Default)]
pub struct ElementData {
    pub tag: String,
    /// `None` when the node carries no class attribute at all. An empty list
    /// means the attribute is present but was emptied.
    classes: Option<Vec<String>>,
    attributes: IndexMap<String, String>,
}

#[derive(Clone, Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    class: NodeClass,
    scopes: Vec<ScopeMarker>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttributeChange {
    pub target: NodeId,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChildChange {
    pub target: NodeId,
    pub node: NodeId,
}

/// Structural deltas recorded since the last reconciliation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MutationBatch {
    pub attribute_changes: Vec<AttributeChange>,
    pub removed: Vec<ChildChange>,
    pub added: Vec<ChildChange>,
}

impl MutationBatch {
    pub fn is_empty(&self) -> bool {
        self.attribute_changes.is_empty() && self.removed.is_empty() && self.added.is_empty()
    }
}

/// The editable document tree. Nodes live in an arena and are addressed by
/// [`NodeId`]; detached nodes stay allocated until the document is dropped.
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    observing: bool,
    journal: MutationBatch,
    next_scope: u64,
    active_scopes: Vec<(ScopeMarker, NodeId)>,
}

impl Document {
    pub fn new(root_id: &str) -> Self {
        let mut document = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            observing: false,
            journal: MutationBatch::default(),
            next_scope: 0,
            active_scopes: Vec::new(),
        };
        let root = document.create_element("div");
        document.root = root;
        document.set_attribute(root, "id", root_id);
        document.reclassify(root);
        document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn owns(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            class: NodeClass::PlainText,
            scopes: Vec::new(),
        });
        self.reclassify(id);
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            ..ElementData::default()
        }))
    }

    pub fn create_element_with_class(&mut self, tag: &str, class: &str) -> NodeId {
        let id = self.create_element(tag);
        self.add_class(id, class);
        id
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_string()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.create_element(FRAGMENT_TAG)
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn class_of(&self, id: NodeId) -> NodeClass {
        self.node(id).class
    }

    fn reclassify(&mut self, id: NodeId) {
        let class = match &self.node(id).kind {
            NodeKind::Text(_) => NodeClass::PlainText,
            NodeKind::Element(data) => NodeClass::derive(
                &data.tag,
                data.classes.as_deref().unwrap_or(&[]),
                id == self.root,
            ),
        };
        self.node_mut(id).class = class;
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Text(_))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Element(_))
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element(data) => Some(data.tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag(id) == Some(tag)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text(text) => Some(text.as_str()),
            NodeKind::Element(_) => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: &str) {
        if let NodeKind::Text(text) = &mut self.node_mut(id).kind {
            text.clear();
            text.push_str(value);
        }
    }

    // --- tree navigation -------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .and_then(|prev| self.children(parent).get(prev).copied())
    }

    /// Iterates over `id`'s ancestors, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |node| self.parent(*node))
    }

    /// Inclusive containment check.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|candidate| candidate == ancestor)
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.root, id)
    }

    pub fn closest(&self, id: NodeId, mut predicate: impl FnMut(NodeId) -> bool) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|node| predicate(*node))
    }

    /// All descendants in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut output = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            output.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        output
    }

    pub fn text_content(&self, id: NodeId) -> String {
        match &self.node(id).kind {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Element(_) => {
                let mut output = String::new();
                for node in self.descendants(id) {
                    if let Some(text) = self.text(node) {
                        output.push_str(text);
                    }
                }
                output
            }
        }
    }

    /// Boundary length: characters for text, child count for elements.
    pub fn node_length(&self, id: NodeId) -> usize {
        match &self.node(id).kind {
            NodeKind::Text(text) => text.chars().count(),
            NodeKind::Element(_) => self.children(id).len(),
        }
    }

    pub fn find_by_id(&self, element_id: &str) -> Option<NodeId> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .find(|node| self.attribute(*node, "id") == Some(element_id))
    }

    /// Compares two connected nodes in document order.
    pub fn tree_order(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let path_a = self.index_path(a);
        let path_b = self.index_path(b);
        path_a.cmp(&path_b)
    }

    fn index_path(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(index) = self.index_in_parent(current) {
            path.push(index);
            match self.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        path.reverse();
        path
    }

    // --- mutation --------------------------------------------------------

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` into `parent` before `reference`, or at the end when
    /// `reference` is `None`. Fragments insert their children instead.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        if self.is_text(parent) {
            return Err(StructureError::NotAnElement(parent));
        }
        if let Some(reference) = reference
            && self.parent(reference) != Some(parent)
        {
            return Err(StructureError::NotAChild {
                parent,
                node: reference,
            });
        }
        if self.is_tag(child, FRAGMENT_TAG) {
            let moved: Vec<NodeId> = self.children(child).to_vec();
            for node in moved {
                self.insert_before(parent, node, reference)?;
            }
            return Ok(());
        }
        if self.contains(child, parent) {
            return Err(StructureError::HierarchyRequest(child));
        }
        if reference == Some(child) {
            return Ok(());
        }
        self.detach(child);
        let index = match reference {
            Some(reference) => self
                .index_in_parent(reference)
                .unwrap_or(self.children(parent).len()),
            None => self.children(parent).len(),
        };
        self.node_mut(parent).children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
        if self.observing && self.is_connected(parent) {
            self.journal.added.push(ChildChange {
                target: parent,
                node: child,
            });
        }
        Ok(())
    }

    pub fn insert_after(&mut self, node: NodeId, new_node: NodeId) -> DomResult<()> {
        let parent = self.parent(node).ok_or(StructureError::Detached(node))?;
        let reference = self.next_sibling(node);
        self.insert_before(parent, new_node, reference)
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        let reference = self.first_child(parent);
        self.insert_before(parent, child, reference)
    }

    /// Detaches `id` from its parent. Removing a detached node is a no-op.
    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let was_connected = self.observing && self.is_connected(parent);
        self.node_mut(parent).children.retain(|child| *child != id);
        self.node_mut(id).parent = None;
        if was_connected {
            self.journal.removed.push(ChildChange {
                target: parent,
                node: id,
            });
        }
    }

    /// Replaces `id` by its children.
    pub fn unwrap(&mut self, id: NodeId) -> DomResult<Vec<NodeId>> {
        let parent = self.parent(id).ok_or(StructureError::Detached(id))?;
        let children = self.children(id).to_vec();
        for child in &children {
            self.insert_before(parent, *child, Some(id))?;
        }
        self.remove(id);
        Ok(children)
    }

    /// Puts `wrapper` where `id` was and moves `id` inside it.
    pub fn wrap(&mut self, id: NodeId, wrapper: NodeId) -> DomResult<()> {
        if self.is_text(wrapper) {
            return Err(StructureError::NotAnElement(wrapper));
        }
        let parent = self.parent(id).ok_or(StructureError::Detached(id))?;
        self.insert_before(parent, wrapper, Some(id))?;
        self.append_child(wrapper, id)
    }

    pub fn replace_with(&mut self, id: NodeId, replacement: NodeId) -> DomResult<()> {
        let parent = self.parent(id).ok_or(StructureError::Detached(id))?;
        self.insert_before(parent, replacement, Some(id))?;
        self.remove(id);
        Ok(())
    }

    /// Moves every child of `from` to the end of `to`.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) -> DomResult<()> {
        for child in self.children(from).to_vec() {
            self.append_child(to, child)?;
        }
        Ok(())
    }

    /// Splits a text node at a character offset. Returns the new node holding
    /// the remainder, inserted right after `id` when it has a parent.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> DomResult<NodeId> {
        let text = self.text(id).ok_or(StructureError::NotText(id))?.to_string();
        let split_at = char_to_byte_idx(&text, offset);
        let remainder = self.create_text(&text[split_at..]);
        self.set_text(id, &text[..split_at]);
        if self.parent(id).is_some() {
            self.insert_after(id, remainder)?;
        }
        Ok(remainder)
    }

    /// Deep or shallow copy. The clone is detached.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> NodeId {
        let kind = self.node(id).kind.clone();
        let clone = self.push_node(kind);
        if deep {
            for child in self.children(id).to_vec() {
                let child_clone = self.clone_node(child, true);
                self.node_mut(clone).children.push(child_clone);
                self.node_mut(child_clone).parent = Some(clone);
            }
        }
        clone
    }

    /// Merges adjacent text runs and drops empty ones below `id`.
    pub fn normalize(&mut self, id: NodeId) {
        let mut index = 0;
        while index < self.children(id).len() {
            let child = self.children(id)[index];
            if let Some(text) = self.text(child) {
                if text.is_empty() {
                    self.remove(child);
                    continue;
                }
                if let Some(next) = self.children(id).get(index + 1).copied()
                    && let Some(next_text) = self.text(next)
                {
                    let merged = format!("{text}{next_text}");
                    self.set_text(child, &merged);
                    self.remove(next);
                    continue;
                }
            } else {
                self.normalize(child);
            }
            index += 1;
        }
    }

    // --- classes and attributes ----------------------------------------

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id).kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.node_mut(id).kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    pub fn classes(&self, id: NodeId) -> &[String] {
        self.element(id)
            .and_then(|data| data.classes.as_deref())
            .unwrap_or(&[])
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).iter().any(|existing| existing == class)
    }

    pub fn has_class_attribute(&self, id: NodeId) -> bool {
        self.element(id)
            .map(|data| data.classes.is_some())
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if class.is_empty() || self.has_class(id, class) {
            return;
        }
        let Some(data) = self.element_mut(id) else {
            return;
        };
        data.classes.get_or_insert_with(Vec::new).push(class.to_string());
        self.reclassify(id);
        self.record_attribute(id, "class");
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if !self.has_class(id, class) {
            return;
        }
        let Some(data) = self.element_mut(id) else {
            return;
        };
        if let Some(classes) = data.classes.as_mut() {
            classes.retain(|existing| existing != class);
        }
        self.reclassify(id);
        self.record_attribute(id, "class");
    }

    /// Drops the class attribute entirely.
    pub fn clear_class_attribute(&mut self, id: NodeId) {
        let Some(data) = self.element_mut(id) else {
            return;
        };
        if data.classes.take().is_some() {
            self.reclassify(id);
            self.record_attribute(id, "class");
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|data| data.attributes.get(name))
            .map(String::as_str)
    }

    pub fn attributes(&self, id: NodeId) -> Vec<(&str, &str)> {
        self.element(id)
            .map(|data| {
                data.attributes
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if name == "class" {
            self.clear_class_attribute(id);
            for class in value.split_whitespace().map(str::to_string).collect::<Vec<_>>() {
                self.add_class(id, &class);
            }
            if let Some(data) = self.element_mut(id) {
                data.classes.get_or_insert_with(Vec::new);
            }
            return;
        }
        let Some(data) = self.element_mut(id) else {
            return;
        };
        if data.attributes.get(name).map(String::as_str) == Some(value) {
            return;
        }
        data.attributes.insert(name.to_string(), value.to_string());
        self.record_attribute(id, name);
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if name == "class" {
            self.clear_class_attribute(id);
            return;
        }
        let Some(data) = self.element_mut(id) else {
            return;
        };
        if data.attributes.shift_remove(name).is_some() {
            self.record_attribute(id, name);
        }
    }

    /// Parsed inline `style` declarations, in source order.
    pub fn style(&self, id: NodeId) -> IndexMap<String, String> {
        let mut output = IndexMap::new();
        let Some(style) = self.attribute(id, "style") else {
            return output;
        };
        for declaration in style.split(';') {
            if let Some((property, value)) = declaration.split_once(':') {
                let property = property.trim();
                let value = value.trim();
                if !property.is_empty() && !value.is_empty() {
                    output.insert(property.to_ascii_lowercase(), value.to_string());
                }
            }
        }
        output
    }

    pub fn set_style_property(&mut self, id: NodeId, property: &str, value: &str) {
        let mut style = self.style(id);
        style.insert(property.to_string(), value.to_string());
        let serialized = style
            .iter()
            .map(|(property, value)| format!("{property}: {value};"))
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(id, "style", &serialized);
    }

    fn record_attribute(&mut self, id: NodeId, name: &str) {
        if self.observing && self.is_connected(id) {
            self.journal.attribute_changes.push(AttributeChange {
                target: id,
                name: name.to_string(),
            });
        }
    }

    // --- observation -----------------------------------------------------

    /// Enables or disables the mutation journal and returns the previous
    /// setting.
    pub fn set_observing(&mut self, observing: bool) -> bool {
        std::mem::replace(&mut self.observing, observing)
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn take_mutations(&mut self) -> MutationBatch {
        std::mem::take(&mut self.journal)
    }

    pub fn has_pending_mutations(&self) -> bool {
        !self.journal.is_empty()
    }

    // --- scope markers ---------------------------------------------------

    pub fn mark_scope(&mut self, id: NodeId) -> ScopeMarker {
        self.next_scope += 1;
        let marker = ScopeMarker(self.next_scope);
        self.node_mut(id).scopes.push(marker);
        self.active_scopes.push((marker, id));
        marker
    }

    pub fn release_scope(&mut self, marker: ScopeMarker) {
        let Some(index) = self
            .active_scopes
            .iter()
            .position(|(active, _)| *active == marker)
        else {
            return;
        };
        let (_, node) = self.active_scopes.swap_remove(index);
        self.node_mut(node).scopes.retain(|existing| *existing != marker);
    }

    /// True when some strict ancestor of `id` carries `marker`.
    pub fn within_scope(&self, id: NodeId, marker: ScopeMarker) -> bool {
        self.ancestors(id)
            .any(|ancestor| self.node(ancestor).scopes.contains(&marker))
    }

    pub fn carries_scope(&self, id: NodeId, marker: ScopeMarker) -> bool {
        self.node(id).scopes.contains(&marker)
    }

    // --- semantic helpers ------------------------------------------------

    /// Whether `id` is Unselectable, honoring custom embeds that opt back
    /// into editing.
    pub fn is_unselectable(&self, id: NodeId) -> bool {
        let class = self.class_of(id);
        if class == NodeClass::CustomEmbed && self.attribute(id, "contenteditable") == Some("true")
        {
            return false;
        }
        class.is_unselectable()
    }

    /// Nearest Unselectable inclusive ancestor, unless a nested editable
    /// region sits in between.
    pub fn unselectable_ancestor(&self, id: NodeId) -> Option<NodeId> {
        for node in std::iter::once(id).chain(self.ancestors(id)) {
            if node == self.root {
                return None;
            }
            if self.attribute(node, "contenteditable") == Some("true") {
                return None;
            }
            if self.is_unselectable(node) {
                return Some(node);
            }
        }
        None
    }

    pub fn restricted_ancestor(&self, id: NodeId) -> Option<NodeId> {
        for node in std::iter::once(id).chain(self.ancestors(id)) {
            if node == self.root || self.attribute(node, "contenteditable") == Some("true") {
                return None;
            }
            if self.class_of(node).is_restricted() {
                return Some(node);
            }
        }
        None
    }

    pub fn nearest_ceiling(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id)
            .find(|ancestor| self.class_of(*ancestor).is_ceiling())
    }

    pub fn is_text_element(&self, id: NodeId) -> bool {
        self.class_of(id).is_text_element()
    }

    /// A text element with no text at all.
    pub fn is_empty_text_element(&self, id: NodeId) -> bool {
        self.is_text_element(id) && self.text_content(id).is_empty()
    }

    /// Text that is neither empty nor a lone zero-width anchor.
    pub fn has_visible_text(&self, id: NodeId) -> bool {
        self.text_content(id)
            .chars()
            .any(|ch| ch != ZERO_WIDTH_SPACE)
    }
}

pub fn char_to_byte_idx(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}


#[cfg(test)]
#[path = "dom/range_tests.rs"]
mod range_tests;

#[cfg(test)]
#[path = "dom/markup_tests.rs"]
mod markup_tests;
