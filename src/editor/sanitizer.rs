use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use super::climber::{ClimbStep, climb_to_eldest};
use super::styles::track_style;
use super::tracked::CallbackPayload;
use super::{Editor, Result};
use crate::dom::{AttributeChange, ChildChange, MutationBatch, NodeClass, NodeId, ZERO_WIDTH_SPACE};

const MAX_DOCUMENT_PASSES: usize = 8;

impl Editor {
    /// Drains the mutation journal and repairs the tree before returning.
    /// Repairs run unobserved, so they are never reported back as a new
    /// batch.
    pub fn reconcile(&mut self) -> Result<()> {
        if self.detached {
            return Ok(());
        }
        let batch = self.doc.take_mutations();
        if batch.is_empty() {
            return Ok(());
        }
        trace!(
            attributes = batch.attribute_changes.len(),
            removed = batch.removed.len(),
            added = batch.added.len(),
            "reconciling"
        );
        let observing = self.doc.set_observing(false);
        let outcome = self.sanitize_batch(&batch);
        self.doc.set_observing(observing);
        outcome?;
        self.repair_selection();
        if self.options.log_mutation {
            self.emit(CallbackPayload {
                mutation: Some(batch),
                ..CallbackPayload::default()
            })?;
        }
        Ok(())
    }

    /// Runs the repair rules over the whole tree until nothing changes.
    pub fn sanitize_document(&mut self) -> Result<()> {
        let observing = self.doc.set_observing(false);
        let outcome = self.sanitize_passes();
        self.doc.set_observing(observing);
        outcome
    }

    fn sanitize_passes(&mut self) -> Result<()> {
        let root = self.doc.root();
        for pass in 0..MAX_DOCUMENT_PASSES {
            let before = self.doc.inner_html(root);
            let batch = self.document_batch();
            self.sanitize_batch(&batch)?;
            let ceilings: Vec<NodeId> = std::iter::once(root)
                .chain(self.doc.descendants(root))
                .filter(|node| self.doc.class_of(*node).is_ceiling())
                .collect();
            for ceiling in ceilings.into_iter().rev() {
                if self.doc.is_connected(ceiling) {
                    self.repair_container(ceiling)?;
                }
            }
            self.ensure_flanking_lines()?;
            if self.doc.inner_html(root) == before {
                trace!(pass, "document settled");
                return Ok(());
            }
        }
        warn!("document did not settle");
        Ok(())
    }

    /// Every node of the document, expressed as if it had just been
    /// inserted.
    fn document_batch(&self) -> MutationBatch {
        let root = self.doc.root();
        let mut batch = MutationBatch::default();
        for node in self.doc.descendants(root) {
            if !self.doc.is_element(node) {
                continue;
            }
            if self.doc.has_class_attribute(node) {
                batch.attribute_changes.push(AttributeChange {
                    target: node,
                    name: "class".into(),
                });
            }
            if self.doc.attribute(node, "style").is_some() {
                batch.attribute_changes.push(AttributeChange {
                    target: node,
                    name: "style".into(),
                });
            }
        }
        batch.added = self
            .doc
            .children(root)
            .iter()
            .map(|child| ChildChange {
                target: root,
                node: *child,
            })
            .collect();
        batch
    }

    pub(crate) fn sanitize_batch(&mut self, batch: &MutationBatch) -> Result<()> {
        for change in &batch.attribute_changes {
            self.repair_attribute(change)?;
        }
        for change in &batch.removed {
            self.repair_removed(*change)?;
        }
        let mut queue: VecDeque<NodeId> = batch.added.iter().map(|change| change.node).collect();
        while let Some(node) = queue.pop_front() {
            self.repair_added(node, &mut queue)?;
        }
        if !batch.removed.is_empty() || !batch.added.is_empty() {
            self.ensure_flanking_lines()?;
        }
        Ok(())
    }

    fn repair_attribute(&mut self, change: &AttributeChange) -> Result<()> {
        let node = change.target;
        if node == self.doc.root() || !self.doc.is_connected(node) {
            return Ok(());
        }
        match change.name.as_str() {
            "class" => {
                if self.doc.has_class_attribute(node) && self.doc.classes(node).is_empty() {
                    self.doc.clear_class_attribute(node);
                }
                if !self.doc.has_class_attribute(node) && self.is_bare_wrapper(node) {
                    debug!(?node, "unwrapping classless wrapper");
                    self.doc.unwrap(node)?;
                }
            }
            "style" => {
                if self.doc.attribute(node, "style").is_some() && !self.style_permitted(node) {
                    self.doc.remove_attribute(node, "style");
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn repair_removed(&mut self, change: ChildChange) -> Result<()> {
        if !self.doc.is_connected(change.node) {
            self.forget_tracked(change.node)?;
        }
        if self.doc.is_connected(change.target) {
            self.repair_container(change.target)?;
        }
        Ok(())
    }

    /// An emptied Ceiling goes away (the root gets a fresh line instead); a
    /// line holding only an Unselectable gets a text run to stay
    /// addressable.
    fn repair_container(&mut self, target: NodeId) -> Result<()> {
        let class = self.doc.class_of(target);
        if class.is_ceiling()
            && self.doc.element_children(target).is_empty()
            && self.doc.text_content(target).is_empty()
        {
            if target == self.doc.root() {
                for child in self.doc.children(target).to_vec() {
                    self.doc.remove(child);
                }
                let line = self.empty_line()?;
                self.doc.append_child(target, line)?;
                debug!("root emptied, fresh line added");
            } else {
                let parent = self.doc.parent(target);
                self.doc.remove(target);
                debug!(?target, "empty ceiling removed");
                if let Some(parent) = parent {
                    self.repair_container(parent)?;
                }
            }
            return Ok(());
        }
        self.anchor_lone_unselectable(target)
    }

    fn repair_added(&mut self, node: NodeId, queue: &mut VecDeque<NodeId>) -> Result<()> {
        let root = self.doc.root();
        if node == root || !self.doc.is_connected(node) {
            return Ok(());
        }
        let Some(parent) = self.doc.parent(node) else {
            return Ok(());
        };
        let eldest = self.doc.class_of(parent).is_ceiling();

        if self.doc.is_text(node) {
            if eldest {
                let text = self.doc.text(node).unwrap_or_default();
                if text
                    .chars()
                    .all(|ch| ch.is_whitespace() || ch == ZERO_WIDTH_SPACE)
                {
                    self.doc.remove(node);
                } else {
                    let line = self.wrap_inline_run(node)?;
                    queue.extend(self.doc.children(line).iter().copied());
                }
            } else if self.doc.has_visible_text(node) {
                self.remove_line_breaks(parent, None);
            }
            return Ok(());
        }

        let class = self.doc.class_of(node);
        if let Some(atomic) = self
            .doc
            .closest(node, |candidate| self.doc.class_of(candidate).is_atomic())
        {
            if self.doc.attribute(atomic, "contenteditable") != Some("true") {
                self.doc.set_attribute(atomic, "contenteditable", "false");
            }
            if atomic == node && eldest && !class.is_block() {
                self.wrap_inline_run(node)?;
            }
            return Ok(());
        }

        if self.doc.classes(node).is_empty()
            && class != NodeClass::LineBreak
            && !(eldest && (class.is_block() || class.is_text_block()))
        {
            trace!(?node, "unwrapping classless element");
            queue.extend(self.doc.unwrap(node)?);
            return Ok(());
        }

        if self.doc.attribute(node, "style").is_some() && !self.style_permitted(node) {
            self.doc.remove_attribute(node, "style");
        }

        if eldest && !(class.is_block() || class.is_text_block()) {
            if class == NodeClass::LineBreak {
                self.doc.remove(node);
            } else {
                let line = self.wrap_inline_run(node)?;
                queue.extend(self.doc.children(line).iter().copied());
            }
            return Ok(());
        }

        if self.doc.has_visible_text(parent) && self.remove_line_breaks(parent, Some(node)) {
            return Ok(());
        }

        if eldest && !class.is_ceiling() {
            self.prepare_new_line(node)?;
            queue.extend(self.doc.children(node).iter().copied());
            return Ok(());
        }

        let children = self.doc.children(node).to_vec();
        self.dedupe_classes(node)?;
        queue.extend(children);
        self.anchor_lone_unselectable(parent)
    }

    /// Injects the pending indentation and a placeholder break into a line
    /// that was just created.
    fn prepare_new_line(&mut self, line: NodeId) -> Result<()> {
        if !self.insert_tab_pending.is_empty() {
            let tabs = std::mem::take(&mut self.insert_tab_pending);
            let tab = self.doc.create_text(&tabs);
            self.doc.prepend_child(line, tab)?;
            self.set_caret(tab, super::Position::End)?;
            debug!(width = tabs.len(), "indentation carried to new line");
        }
        if self.doc.class_of(line).is_text_block()
            && !self.doc.has_visible_text(line)
            && !self
                .doc
                .descendants(line)
                .into_iter()
                .any(|child| self.doc.class_of(child) == NodeClass::LineBreak)
        {
            let line_break = self.doc.create_element("br");
            self.doc.append_child(line, line_break)?;
        }
        Ok(())
    }

    /// Unwraps single-child ancestors that carry the same or a competing
    /// style class, then drops classes the parent already implies.
    fn dedupe_classes(&mut self, node: NodeId) -> Result<()> {
        let registered: Vec<String> = self
            .doc
            .classes(node)
            .iter()
            .filter(|class| self.registry.lookup_class(class).is_some())
            .cloned()
            .collect();
        if registered.is_empty() {
            return Ok(());
        }
        let ceiling = self.doc.nearest_ceiling(node).unwrap_or(self.doc.root());
        let competing: Vec<String> = registered
            .iter()
            .flat_map(|class| self.registry.class_set(class))
            .collect();
        let mut redundant = Vec::new();
        climb_to_eldest(&mut self.doc, node, ceiling, true, |document, ancestor| {
            if matches!(document.class_of(ancestor), NodeClass::StyleSpan { .. })
                && competing.iter().any(|class| document.has_class(ancestor, class))
            {
                redundant.push(ancestor);
            }
            ClimbStep::Continue
        })?;
        for ancestor in redundant.into_iter().rev() {
            trace!(?ancestor, "unwrapping competing style wrapper");
            self.doc.unwrap(ancestor)?;
        }

        let Some(parent) = self.doc.parent(node) else {
            return Ok(());
        };
        for class in registered {
            let Some((command, _)) = self.registry.lookup_class(&class) else {
                continue;
            };
            let property = command.property;
            let own = track_style(
                &self.doc,
                &self.registry,
                node,
                property,
                &self.options.default_color,
            );
            let inherited = track_style(
                &self.doc,
                &self.registry,
                parent,
                property,
                &self.options.default_color,
            );
            if own == inherited {
                trace!(?node, %class, "dropping redundant class");
                self.doc.remove_class(node, &class);
            }
        }
        if self.doc.classes(node).is_empty() {
            self.doc.clear_class_attribute(node);
            if self.is_bare_wrapper(node) {
                self.doc.unwrap(node)?;
            }
        }
        Ok(())
    }

    /// Moves `node` and its neighbouring inline siblings into a new
    /// paragraph. Returns the paragraph.
    fn wrap_inline_run(&mut self, node: NodeId) -> Result<NodeId> {
        let is_inline = |editor: &Self, candidate: NodeId| {
            let class = editor.doc.class_of(candidate);
            !(class.is_block() || class.is_text_block())
        };
        let mut first = node;
        while let Some(previous) = self.doc.previous_sibling(first) {
            if !is_inline(self, previous) {
                break;
            }
            first = previous;
        }
        let mut run = vec![first];
        let mut cursor = first;
        while let Some(next) = self.doc.next_sibling(cursor) {
            if !is_inline(self, next) {
                break;
            }
            run.push(next);
            cursor = next;
        }
        let line = self.doc.create_element("p");
        self.doc.wrap(first, line)?;
        for member in run.into_iter().skip(1) {
            self.doc.append_child(line, member)?;
        }
        if let Some(last) = self.doc.last_child(line)
            && self.doc.class_of(last) == NodeClass::LineBreak
            && self.doc.has_visible_text(line)
        {
            self.doc.remove(last);
        }
        trace!(?line, "inline run promoted to a line");
        Ok(line)
    }

    /// Removes the breaks directly inside `container`. Returns whether
    /// `node` was one of them.
    pub(crate) fn remove_line_breaks(&mut self, container: NodeId, node: Option<NodeId>) -> bool {
        let mut removed_node = false;
        for child in self.doc.children(container).to_vec() {
            if self.doc.class_of(child) == NodeClass::LineBreak {
                removed_node |= Some(child) == node;
                self.doc.remove(child);
            }
        }
        removed_node
    }

    fn anchor_lone_unselectable(&mut self, line: NodeId) -> Result<()> {
        if self.doc.class_of(line).is_text_block()
            && let [only] = self.doc.children(line)
            && self.doc.is_unselectable(*only)
        {
            let anchor = self.doc.create_text("");
            self.doc.append_child(line, anchor)?;
        }
        Ok(())
    }

    /// Keeps a line above and below atomic content sitting at the edges of
    /// the document.
    pub(crate) fn ensure_flanking_lines(&mut self) -> Result<()> {
        let root = self.doc.root();
        let needs_line = |editor: &Self, node: NodeId| {
            let class = editor.doc.class_of(node);
            class.is_restricted() || class == NodeClass::Divider
        };
        if let Some(first) = self.doc.first_child(root)
            && needs_line(self, first)
        {
            let line = self.empty_line()?;
            self.doc.prepend_child(root, line)?;
        }
        if let Some(last) = self.doc.last_child(root)
            && needs_line(self, last)
        {
            let line = self.empty_line()?;
            self.doc.append_child(root, line)?;
        }
        Ok(())
    }

    /// `<p><br></p>`, detached.
    pub(crate) fn empty_line(&mut self) -> Result<NodeId> {
        let line = self.doc.create_element("p");
        let line_break = self.doc.create_element("br");
        self.doc.append_child(line, line_break)?;
        Ok(line)
    }

    /// Classless spans and unknown inline tags carry no meaning.
    fn is_bare_wrapper(&self, node: NodeId) -> bool {
        if !self.doc.is_element(node) || !self.doc.classes(node).is_empty() {
            return false;
        }
        let class = self.doc.class_of(node);
        let inline = matches!(class, NodeClass::StyleSpan { .. } | NodeClass::Inline);
        let void = matches!(self.doc.tag(node), Some("img" | "input" | "wbr"));
        inline
            && !void
            && self
                .doc
                .closest(node, |ancestor| self.doc.class_of(ancestor).is_atomic())
                .is_none()
    }

    fn style_permitted(&self, node: NodeId) -> bool {
        self.doc.class_of(node).is_style_allowed()
            || self
                .doc
                .closest(node, |ancestor| self.doc.class_of(ancestor).is_restricted())
                .is_some()
    }
}
