use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::crawler::{CrawlOptions, Visit, crawl};
use super::position::{EndpointSpec, Position, PositionRequest, Selection};
use super::styles::{ALIGN_CLASSES, StyleCommand, StyleProperty, StyleState, align_name};
use super::tracked::{CallbackPayload, TrackedItem, TrackedKind};
use super::{Editor, Result};
use crate::dom::{BoundaryPoint, CUSTOM_CLASS, MEDIA_CLASS, NodeClass, NodeId, ZERO_WIDTH_SPACE};
use crate::error::{EditorError, SelectionError};
use crate::options::normalize_color;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSource {
    pub source: String,
    pub element_id: Option<String>,
}

impl ImageSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            element_id: None,
        }
    }
}

/// An embedded widget supplied by the host.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomSpec {
    pub element_id: Option<String>,
    /// Inner markup of the widget.
    pub markup: String,
    pub style: IndexMap<String, String>,
    /// Splice at the caret instead of after the current line.
    pub insert: bool,
    /// Lets the caret enter the widget.
    pub contenteditable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Quote,
    UnorderedList,
    OrderedList,
    Divider,
    /// The host should let the user pick image files.
    RequestImage,
    Image(Vec<ImageSource>),
    AlignLeft,
    AlignCenter,
    AlignRight,
    /// A registered style command name such as `bold` or `h2`.
    Style(String),
    /// `None` applies the highlight color.
    Color(Option<String>),
    Custom(CustomSpec),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandOutcome {
    Applied,
    /// The command toggled an existing format off.
    Removed,
    Rejected,
    ImageRequested,
}

/// Content a wrap-mode or splice command may not swallow.
fn blocks_insertion(class: NodeClass) -> bool {
    matches!(
        class,
        NodeClass::Divider
            | NodeClass::List { .. }
            | NodeClass::ListItem
            | NodeClass::Media
            | NodeClass::CustomEmbed
    )
}

impl Editor {
    /// Resolves a command verb: structural names first, then registered
    /// style names, then color values.
    pub fn parse_command(&self, verb: &str) -> Result<Command> {
        let command = match verb {
            "quote" => Command::Quote,
            "unorderedList" => Command::UnorderedList,
            "orderedList" => Command::OrderedList,
            "divider" => Command::Divider,
            "image" => Command::RequestImage,
            "alignLeft" => Command::AlignLeft,
            "alignCenter" => Command::AlignCenter,
            "alignRight" => Command::AlignRight,
            "color" => Command::Color(None),
            name if self.registry.get(name).is_some() => Command::Style(name.to_string()),
            value => match normalize_color(value) {
                Some(color) => Command::Color(Some(color)),
                None => return Err(EditorError::UnknownCommand(verb.to_string())),
            },
        };
        Ok(command)
    }

    /// Parses and applies a command verb.
    pub fn command(&mut self, verb: &str) -> Result<CommandOutcome> {
        let command = self.parse_command(verb)?;
        self.apply_command(command)
    }

    pub fn apply_command(&mut self, command: Command) -> Result<CommandOutcome> {
        if self.detached {
            return Err(EditorError::Detached);
        }
        if command == Command::RequestImage {
            return Ok(CommandOutcome::ImageRequested);
        }
        self.reconcile()?;
        self.ensure_selection()?;
        debug!(?command, "applying command");

        let outcome = match command {
            Command::Quote => {
                let quote = self.doc.create_element("blockquote");
                let placeholder = self.empty_line()?;
                self.splice_block(quote, Some(placeholder), true, None)?
            }
            Command::UnorderedList | Command::OrderedList => {
                let tag = if command == Command::OrderedList {
                    "ol"
                } else {
                    "ul"
                };
                let list = self.doc.create_element(tag);
                let item = self.doc.create_element("li");
                self.doc.append_child(list, item)?;
                let placeholder = self.empty_line()?;
                self.splice_block(list, Some(placeholder), false, Some(item))?
            }
            Command::Divider => {
                let divider = self.doc.create_element("hr");
                self.doc.set_attribute(divider, "contenteditable", "false");
                let placeholder = self.empty_line()?;
                self.splice_block(divider, Some(placeholder), false, None)?
            }
            Command::RequestImage => CommandOutcome::ImageRequested,
            Command::Image(sources) => self.insert_images(sources)?,
            Command::AlignLeft => self.align_lines("alignLeft")?,
            Command::AlignCenter => self.align_lines("alignCenter")?,
            Command::AlignRight => self.align_lines("alignRight")?,
            Command::Style(name) => {
                let style = self
                    .registry
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| EditorError::UnknownCommand(name.clone()))?;
                self.apply_style(&style, None)?
            }
            Command::Color(value) => {
                let style = self
                    .registry
                    .iter()
                    .find(|command| command.property == StyleProperty::Color)
                    .cloned()
                    .ok_or_else(|| EditorError::UnknownCommand("color".into()))?;
                let color = value.unwrap_or_else(|| self.options.highlight_color.clone());
                self.apply_style(&style, Some(color))?
            }
            Command::Custom(spec) => self.insert_custom(spec)?,
        };
        if outcome == CommandOutcome::Rejected {
            warn!("command rejected");
        }
        self.finish_event()?;
        Ok(outcome)
    }

    /// Restores the backed-up selection, or puts the caret at the end of
    /// the document when there is nothing to restore.
    pub(crate) fn ensure_selection(&mut self) -> Result<Selection> {
        match self.working_selection() {
            Ok(selection) => Ok(selection),
            Err(EditorError::Selection(SelectionError::NoSelection)) => {
                let root = self.doc.root();
                let line = match self.doc.last_child(root) {
                    Some(line) => line,
                    None => {
                        let line = self.empty_line()?;
                        self.doc.append_child(root, line)?;
                        line
                    }
                };
                self.set_caret(line, Position::End)?;
                self.working_selection()
            }
            Err(error) => Err(error),
        }
    }

    /// Places `block` after the line holding the selection end, followed by
    /// `placeholder`. In wrap mode the selected content moves into `block`,
    /// or an enclosing wrapper of the same kind is removed instead.
    pub(crate) fn splice_block(
        &mut self,
        block: NodeId,
        placeholder: Option<NodeId>,
        wrap: bool,
        focus: Option<NodeId>,
    ) -> Result<CommandOutcome> {
        let selection = self.working_selection()?;
        let root = self.doc.root();
        let mut end_line = selection.end_line.unwrap_or(root);

        if wrap {
            let tag = self.doc.tag(block).unwrap_or_default().to_string();
            let mut enclosing: Vec<NodeId> = Vec::new();
            let mut restricted = false;
            if selection.collapsed() {
                if let Some(existing) = self
                    .doc
                    .closest(selection.start.node, |node| self.doc.is_tag(node, &tag))
                {
                    enclosing.push(existing);
                }
            } else {
                crawl(
                    &mut self.doc,
                    CrawlOptions::range(selection.start, selection.end).within(root),
                    |document, node| {
                        if document
                            .closest(node, |candidate| blocks_insertion(document.class_of(candidate)))
                            .is_some_and(|found| found != root)
                        {
                            restricted = true;
                            return Visit::Break;
                        }
                        if let Some(existing) =
                            document.closest(node, |candidate| document.is_tag(candidate, &tag))
                            && !enclosing.contains(&existing)
                        {
                            enclosing.push(existing);
                        }
                        Visit::Continue
                    },
                )?;
            }
            if restricted {
                return Ok(CommandOutcome::Rejected);
            }
            if !enclosing.is_empty() {
                for existing in enclosing {
                    self.doc.unwrap(existing)?;
                }
                debug!(%tag, "wrapper toggled off");
                return Ok(CommandOutcome::Removed);
            }

            self.insert_after_line(block, placeholder, end_line)?;
            let (extracted, _) = self.doc.extract_contents(selection.start, selection.end)?;
            let mut moved = false;
            for child in self.doc.children(extracted).to_vec() {
                if self.doc.text_content(child).is_empty() {
                    continue;
                }
                self.doc.append_child(block, child)?;
                moved = true;
            }
            if !moved {
                let line = self.empty_line()?;
                self.doc.append_child(block, line)?;
            }
            self.set_caret(focus.unwrap_or(block), Position::End)?;

            for line in [selection.start_line, selection.end_line].into_iter().flatten() {
                if self.doc.is_connected(line)
                    && self.doc.is_text_element(line)
                    && !self.doc.has_visible_text(line)
                    && self.doc.last_child(root) != Some(line)
                {
                    self.doc.remove(line);
                }
            }
            return Ok(CommandOutcome::Applied);
        }

        if let Some(outermost) = std::iter::once(end_line)
            .chain(self.doc.ancestors(end_line))
            .take_while(|node| *node != root)
            .filter(|node| blocks_insertion(self.doc.class_of(*node)))
            .last()
        {
            end_line = outermost;
        }
        self.insert_after_line(block, placeholder, end_line)?;
        if let Some(target) = focus.or(placeholder) {
            self.set_caret(target, Position::Start)?;
        }
        self.ensure_flanking_lines()?;
        Ok(CommandOutcome::Applied)
    }

    fn insert_after_line(
        &mut self,
        block: NodeId,
        placeholder: Option<NodeId>,
        line: NodeId,
    ) -> Result<()> {
        let root = self.doc.root();
        let line = if line == root {
            match self.doc.last_child(root) {
                Some(last) => last,
                None => {
                    self.doc.append_child(root, block)?;
                    if let Some(placeholder) = placeholder {
                        self.doc.append_child(root, placeholder)?;
                    }
                    return Ok(());
                }
            }
        } else {
            line
        };
        let parent = self
            .doc
            .parent(line)
            .ok_or(crate::error::StructureError::Detached(line))?;
        let next = self.doc.next_sibling(line);
        if let Some(placeholder) = placeholder {
            self.doc.insert_before(parent, placeholder, next)?;
        }
        self.doc.insert_before(parent, block, placeholder.or(next))?;
        if self.doc.is_text_element(line)
            && self.doc.text_content(line).is_empty()
            && self.doc.last_child(root) != Some(line)
        {
            self.doc.remove(line);
        }
        Ok(())
    }

    /// Sets or clears the alignment class on every line from the start line
    /// to the end line.
    fn align_lines(&mut self, action: &str) -> Result<CommandOutcome> {
        let selection = self.working_selection()?;
        let (Some(start_line), Some(end_line)) = (selection.start_line, selection.end_line) else {
            return Ok(CommandOutcome::Rejected);
        };
        let mut lines = vec![start_line];
        let mut current = start_line;
        while current != end_line {
            let mut next = self.doc.next_sibling(current);
            while let Some(candidate) = next {
                if self.doc.class_of(candidate).is_text_block() {
                    break;
                }
                if self.doc.class_of(candidate).is_ceiling()
                    && let Some(first) = self.doc.first_child(candidate)
                    && self.doc.class_of(first).is_text_block()
                {
                    next = Some(first);
                    break;
                }
                if self.doc.contains(candidate, end_line) {
                    next = Some(end_line);
                    break;
                }
                next = self.doc.next_sibling(candidate);
            }
            if next.is_none()
                && let Some(parent) = self.doc.parent(current)
                && self.doc.class_of(parent).is_ceiling()
                && parent != self.doc.root()
            {
                next = self.doc.next_sibling(parent);
            }
            match next {
                Some(line) if !lines.contains(&line) => {
                    lines.push(line);
                    current = line;
                }
                _ => break,
            }
        }

        let was_active = self.command_tracker.is_active(action);
        let mut outcome = CommandOutcome::Removed;
        for line in lines {
            if !self.doc.class_of(line).is_text_block() {
                continue;
            }
            for class in ALIGN_CLASSES {
                self.doc.remove_class(line, class);
            }
            if action != "alignLeft" && !was_active {
                if let Some(class) = ALIGN_CLASSES
                    .iter()
                    .find(|class| align_name(class) == action)
                {
                    self.doc.add_class(line, class);
                }
                outcome = CommandOutcome::Applied;
            }
        }
        for class in ALIGN_CLASSES {
            self.command_tracker
                .set(align_name(class), StyleState::Flag(false));
        }
        if outcome == CommandOutcome::Applied {
            self.command_tracker.set(action, StyleState::Flag(true));
        }
        self.emit(CallbackPayload {
            command_tracker: Some(self.command_tracker.clone()),
            range: self.selection.clone(),
            ..CallbackPayload::default()
        })?;
        Ok(outcome)
    }

    /// Wraps the selection in `style`, or in its stop class when the style
    /// is already active there.
    fn apply_style(&mut self, style: &StyleCommand, color: Option<String>) -> Result<CommandOutcome> {
        let selection = self.working_selection()?;
        self.refresh_active_styles()?;
        let stop = match self.command_tracker.get(&style.name) {
            Some(StyleState::Color(active)) => color.as_deref() == Some(active.as_str()),
            Some(StyleState::Flag(active)) => *active,
            None => false,
        };
        let class = if stop {
            style.stop_class()
        } else {
            style.class.clone()
        };
        let wrapper = self.doc.create_element_with_class("span", &class);
        if let Some(color) = color.as_deref()
            && !stop
        {
            self.doc.set_style_property(wrapper, "color", color);
        }
        let outcome = if stop {
            CommandOutcome::Removed
        } else {
            CommandOutcome::Applied
        };
        let restricted = self.selection_within_restricted();

        if selection.collapsed() {
            if restricted {
                return Ok(CommandOutcome::Rejected);
            }
            let text = self.doc.create_text("");
            self.doc.append_child(wrapper, text)?;
            let start = selection.start;
            if self.doc.class_of(start.node) == NodeClass::LineBreak {
                let parent = self
                    .doc
                    .parent(start.node)
                    .ok_or(crate::error::StructureError::Detached(start.node))?;
                self.doc.insert_before(parent, wrapper, Some(start.node))?;
            } else {
                self.doc.insert_at(start, wrapper)?;
            }
            self.set_caret(text, Position::End)?;
            debug!(%class, "style wrapper placed at caret");
            return Ok(outcome);
        }

        if restricted || self.range_touches_restricted(&selection)? {
            warn!(%class, "selection spans restricted content");
            self.selection = Some(Selection::caret(selection.end));
            return Ok(CommandOutcome::Rejected);
        }

        let (fragment, collapse) = self.doc.extract_contents(selection.start, selection.end)?;
        for node in self.doc.descendants(fragment) {
            if let Some(text) = self.doc.text(node)
                && text.contains('\t')
            {
                let stripped = text.replace('\t', "");
                self.doc.set_text(node, &stripped);
            }
        }
        let competing = self.registry.class_set(&style.class);
        for node in self.doc.descendants(fragment).into_iter().rev() {
            if matches!(self.doc.class_of(node), NodeClass::StyleSpan { .. })
                && competing.iter().any(|class| self.doc.has_class(node, class))
            {
                self.doc.unwrap(node)?;
            }
        }

        let wrappers = self.split_into_wrappers(fragment, wrapper)?;
        self.place_styled_fragment(fragment, collapse)?;

        let live: Vec<NodeId> = wrappers
            .into_iter()
            .filter(|node| self.doc.is_connected(*node))
            .collect();
        if !stop {
            for wrapper in &live {
                self.lift_out_of_competing(*wrapper, &competing)?;
            }
        }
        let (Some(first), Some(last)) = (live.first().copied(), live.last().copied()) else {
            return Ok(outcome);
        };
        self.set_selection(PositionRequest::range(
            EndpointSpec::start(first),
            EndpointSpec::end(last),
        ))?;
        for stray in [self.doc.next_sibling(last), self.doc.previous_sibling(first)]
            .into_iter()
            .flatten()
        {
            if self.doc.is_text_element(stray) && !self.doc.has_visible_text(stray) {
                self.doc.remove(stray);
            }
        }
        debug!(%class, wrappers = live.len(), "style applied to range");
        Ok(outcome)
    }

    /// Moves `wrapper` out of the outermost span of its line carrying one
    /// of `competing`. Spans in between are split around it and re-applied
    /// inside the wrapper, competing ones are dropped.
    fn lift_out_of_competing(&mut self, wrapper: NodeId, competing: &[String]) -> Result<()> {
        let is_competing = |doc: &crate::dom::Document, node: NodeId| {
            matches!(doc.class_of(node), NodeClass::StyleSpan { .. })
                && competing.iter().any(|class| doc.has_class(node, class))
        };
        let outermost = self
            .doc
            .ancestors(wrapper)
            .take_while(|node| !self.doc.class_of(*node).is_ceiling())
            .take_while(|node| !self.doc.class_of(*node).is_text_block())
            .filter(|node| is_competing(&self.doc, *node))
            .last();
        let Some(outermost) = outermost else {
            return Ok(());
        };
        while let Some(parent) = self.doc.parent(wrapper) {
            let keep = !is_competing(&self.doc, parent);
            self.hoist_over_parent(wrapper, parent, keep)?;
            if parent == outermost {
                break;
            }
        }
        trace!(?wrapper, "style lifted out of competing span");
        Ok(())
    }

    /// Replaces `parent` with `node`, leaving the siblings before and after
    /// `node` in copies of `parent`. With `keep`, a copy of `parent` also
    /// wraps the content of `node`.
    fn hoist_over_parent(&mut self, node: NodeId, parent: NodeId, keep: bool) -> Result<()> {
        let siblings = self.doc.children(parent).to_vec();
        let index = siblings
            .iter()
            .position(|child| *child == node)
            .ok_or(crate::error::StructureError::Detached(node))?;
        let before = self.doc.clone_node(parent, false);
        let after = self.doc.clone_node(parent, false);
        for child in &siblings[..index] {
            self.doc.append_child(before, *child)?;
        }
        for child in &siblings[index + 1..] {
            self.doc.append_child(after, *child)?;
        }
        if keep {
            let inner = self.doc.clone_node(parent, false);
            self.doc.move_children(node, inner)?;
            self.doc.append_child(node, inner)?;
        }
        self.doc.insert_after(parent, after)?;
        self.doc.replace_with(parent, node)?;
        let grand = self
            .doc
            .parent(node)
            .ok_or(crate::error::StructureError::Detached(node))?;
        self.doc.insert_before(grand, before, Some(node))?;
        for part in [before, after] {
            if !self.doc.has_visible_text(part) && self.doc.element_children(part).is_empty() {
                self.doc.remove(part);
            }
        }
        Ok(())
    }

    fn range_touches_restricted(&mut self, selection: &Selection) -> Result<bool> {
        let root = self.doc.root();
        let mut restricted = false;
        crawl(
            &mut self.doc,
            CrawlOptions::range(selection.start, selection.end).within(root),
            |document, node| {
                if document
                    .closest(node, |candidate| document.class_of(candidate).is_restricted())
                    .is_some()
                {
                    restricted = true;
                    return Visit::Break;
                }
                Visit::Continue
            },
        )?;
        Ok(restricted)
    }

    /// Re-assembles `fragment` so that no wrapper crosses a Block or
    /// TextBlock boundary. Returns the wrappers in document order.
    fn split_into_wrappers(&mut self, fragment: NodeId, wrapper: NodeId) -> Result<Vec<NodeId>> {
        let children = self.doc.children(fragment).to_vec();
        let mut wrappers = Vec::new();
        let mut output: Vec<NodeId> = vec![wrapper];
        let mut open = Some(wrapper);
        wrappers.push(wrapper);

        for child in children {
            let class = self.doc.class_of(child);
            if self.doc.is_element(child) && class.is_block() {
                if class.is_text_area() {
                    for line in self.doc.children(child).to_vec() {
                        if !self.doc.is_text_element(line) {
                            continue;
                        }
                        let nested = self.doc.clone_node(wrapper, false);
                        for inner in self.doc.children(line).to_vec() {
                            if self.doc.text_content(inner).is_empty() {
                                self.doc.remove(inner);
                            } else {
                                self.doc.append_child(nested, inner)?;
                            }
                        }
                        self.doc.append_child(line, nested)?;
                        wrappers.push(nested);
                    }
                    if self.doc.text_content(child).is_empty() {
                        self.doc.remove(child);
                        continue;
                    }
                }
                output.push(child);
                open = None;
            } else if self.doc.is_element(child) && class.is_text_block() {
                let nested = self.doc.clone_node(wrapper, false);
                self.doc.move_children(child, nested)?;
                let hollow = match self.doc.children(nested) {
                    [only] => {
                        self.doc.class_of(*only) != NodeClass::LineBreak
                            && self.doc.text_content(nested).is_empty()
                    }
                    _ => false,
                };
                if hollow {
                    self.doc.remove(child);
                    continue;
                }
                self.doc.append_child(child, nested)?;
                wrappers.push(nested);
                output.push(child);
                open = None;
            } else {
                let target = match open {
                    Some(target) => target,
                    None => {
                        let fresh = self.doc.clone_node(wrapper, false);
                        wrappers.push(fresh);
                        output.push(fresh);
                        open = Some(fresh);
                        fresh
                    }
                };
                self.doc.append_child(target, child)?;
            }
        }

        for node in &output {
            self.doc.append_child(fragment, *node)?;
        }
        for edge in [self.doc.first_child(fragment), self.doc.last_child(fragment)]
            .into_iter()
            .flatten()
        {
            if self.doc.is_text_element(edge) && self.doc.text_content(edge).is_empty() {
                self.doc.remove(edge);
            }
        }
        Ok(wrappers)
    }

    /// Inserts the styled fragment at `collapse`. Line segments at either end
    /// merge back into the partial lines the extraction left behind.
    fn place_styled_fragment(&mut self, fragment: NodeId, collapse: BoundaryPoint) -> Result<()> {
        if self.doc.is_element(collapse.node) {
            let siblings = self.doc.children(collapse.node).to_vec();
            let before = collapse
                .offset
                .checked_sub(1)
                .and_then(|index| siblings.get(index).copied());
            let after = siblings.get(collapse.offset).copied();

            if let (Some(first), Some(before)) = (self.doc.first_child(fragment), before)
                && self.same_line_kind(first, before)
            {
                self.doc.move_children(first, before)?;
                self.doc.remove(first);
                self.prune_empty_spans(before)?;
            }
            if let (Some(last), Some(after)) = (self.doc.last_child(fragment), after)
                && self.same_line_kind(last, after)
            {
                for child in self.doc.children(last).to_vec().into_iter().rev() {
                    self.doc.prepend_child(after, child)?;
                }
                self.doc.remove(last);
                self.prune_empty_spans(after)?;
            }
        }
        self.doc.insert_at(collapse, fragment)?;
        if let Some(line) = self.text_block_of(collapse.node) {
            self.prune_empty_spans(line)?;
        }
        Ok(())
    }

    fn same_line_kind(&self, a: NodeId, b: NodeId) -> bool {
        self.doc.class_of(a).is_text_block()
            && self.doc.class_of(b).is_text_block()
            && self.doc.tag(a) == self.doc.tag(b)
    }

    /// Drops style spans that no longer hold any content.
    fn prune_empty_spans(&mut self, line: NodeId) -> Result<()> {
        for node in self.doc.descendants(line).into_iter().rev() {
            if matches!(self.doc.class_of(node), NodeClass::StyleSpan { .. })
                && self.doc.element_children(node).is_empty()
                && self
                    .doc
                    .text_content(node)
                    .chars()
                    .all(|ch| ch == ZERO_WIDTH_SPACE)
            {
                self.doc.remove(node);
            }
        }
        Ok(())
    }

    fn insert_images(&mut self, sources: Vec<ImageSource>) -> Result<CommandOutcome> {
        if sources.is_empty() {
            return Ok(CommandOutcome::Rejected);
        }
        let mut found = Vec::new();
        let mut media_nodes = Vec::new();
        for image in sources {
            let media = self.doc.create_element_with_class("div", MEDIA_CLASS);
            self.doc.set_attribute(media, "contenteditable", "false");
            let element = self.doc.create_element("img");
            let element_id = image
                .element_id
                .unwrap_or_else(|| TrackedKind::Image.generate_id());
            self.doc.set_attribute(element, "id", &element_id);
            self.doc.set_attribute(element, "src", &image.source);
            self.doc.append_child(media, element)?;
            let mut item = TrackedItem::new(element_id, element);
            item.source = Some(image.source);
            found.push((TrackedKind::Image, item));
            media_nodes.push(media);
        }
        self.announce(found)?;
        for media in media_nodes {
            let placeholder = self.empty_line()?;
            self.splice_block(media, Some(placeholder), false, None)?;
        }
        Ok(CommandOutcome::Applied)
    }

    fn insert_custom(&mut self, spec: CustomSpec) -> Result<CommandOutcome> {
        let custom = self.doc.create_element_with_class("div", CUSTOM_CLASS);
        self.doc.set_attribute(
            custom,
            "contenteditable",
            if spec.contenteditable { "true" } else { "false" },
        );
        for (property, value) in &spec.style {
            self.doc.set_style_property(custom, property, value);
        }
        let element_id = spec
            .element_id
            .clone()
            .unwrap_or_else(|| TrackedKind::Custom.generate_id());
        self.doc.set_attribute(custom, "id", &element_id);
        self.doc.set_inner_html(custom, &spec.markup)?;
        let insert = spec.insert || self.doc.element_children(custom).is_empty();

        let mut item = TrackedItem::new(element_id, custom);
        item.style = spec.style;
        self.announce(vec![(TrackedKind::Custom, item)])?;

        if insert {
            let selection = self.working_selection()?;
            let anchor = self.doc.create_text("");
            self.doc.insert_at(selection.start, anchor)?;
            let parent = self
                .doc
                .parent(anchor)
                .ok_or(crate::error::StructureError::Detached(anchor))?;
            self.doc.insert_before(parent, custom, Some(anchor))?;
            self.set_caret(anchor, Position::End)?;
            return Ok(CommandOutcome::Applied);
        }
        let placeholder = self.empty_line()?;
        self.splice_block(custom, Some(placeholder), false, None)
    }
}
