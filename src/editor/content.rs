use std::cmp::Ordering;

use tracing::{debug, trace};

use super::crawler::text_nodes;
use super::position::{Position, Selection, after, before, edge_point, locked_ancestor};
use super::tracked::{CallbackPayload, CaretPosition};
use super::{Editor, Result};
use crate::dom::{BoundaryPoint, Document, NodeClass, NodeId, ZERO_WIDTH_SPACE, char_to_byte_idx};

/// One text run of a line.
#[derive(Clone, Copy, Debug)]
struct Run {
    node: NodeId,
    start: usize,
    len: usize,
    /// Non-editable element the run belongs to.
    locked: Option<NodeId>,
}

/// The text runs of one line, with their character offsets from the start
/// of the line.
#[derive(Clone, Debug)]
pub(crate) struct LineMap {
    pub(crate) line: NodeId,
    runs: Vec<Run>,
}

impl LineMap {
    pub(crate) fn build(document: &mut Document, line: NodeId) -> Result<Self> {
        let mut runs = Vec::new();
        let mut start = 0;
        for node in text_nodes(document, line)? {
            let len = document.node_length(node);
            runs.push(Run {
                node,
                start,
                len,
                locked: locked_ancestor(document, node, line),
            });
            start += len;
        }
        Ok(Self { line, runs })
    }

    pub(crate) fn len(&self) -> usize {
        self.runs.last().map_or(0, |run| run.start + run.len)
    }

    pub(crate) fn text(&self, document: &Document) -> String {
        self.runs
            .iter()
            .filter_map(|run| document.text(run.node))
            .collect()
    }

    /// Characters of the line that precede `point`.
    pub(crate) fn offset_of(&self, document: &Document, point: BoundaryPoint) -> usize {
        if let Some(run) = self.runs.iter().find(|run| run.node == point.node) {
            return match run.locked {
                Some(_) => run.start + run.len,
                None => run.start + point.offset.min(run.len),
            };
        }
        let mut offset = 0;
        for run in &self.runs {
            let run_end = BoundaryPoint::new(run.node, run.len);
            if document.compare_points(run_end, point) == Ordering::Greater {
                break;
            }
            offset = run.start + run.len;
        }
        offset
    }

    /// The run holding the character at `offset`.
    fn run_at(&self, offset: usize) -> Option<(Run, usize)> {
        self.runs
            .iter()
            .find(|run| offset >= run.start && offset < run.start + run.len)
            .map(|run| (*run, offset - run.start))
    }

    /// Caret point at `offset`, stepping around non-editable runs.
    pub(crate) fn point_at(&self, document: &Document, offset: usize) -> BoundaryPoint {
        let offset = offset.min(self.len());
        for run in &self.runs {
            if offset < run.start || offset > run.start + run.len {
                continue;
            }
            return match run.locked {
                None => BoundaryPoint::new(run.node, offset - run.start),
                Some(locked) if offset == run.start => before(document, locked),
                Some(locked) => after(document, locked),
            };
        }
        edge_point(document, self.line, offset > 0)
    }

    /// Start offset of the non-editable element covering `offset`.
    pub(crate) fn locked_start(&self, offset: usize) -> Option<(NodeId, usize)> {
        let (run, _) = self.run_at(offset)?;
        let locked = run.locked?;
        let start = self
            .runs
            .iter()
            .filter(|other| other.locked == Some(locked))
            .map(|other| other.start)
            .min()
            .unwrap_or(run.start);
        Some((locked, start))
    }
}

fn remove_char_from_text(text: &mut String, offset: usize) -> bool {
    let char_len = text.chars().count();
    if offset >= char_len {
        return false;
    }
    let start = char_to_byte_idx(text, offset);
    let end = char_to_byte_idx(text, offset + 1);
    if start >= end || end > text.len() {
        return false;
    }
    text.drain(start..end);
    true
}

pub(crate) fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

pub fn previous_word_boundary(text: &str, offset: usize) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let mut idx = offset.min(chars.len());
    while idx > 0 && chars[idx - 1].is_whitespace() {
        idx -= 1;
    }
    if idx > 0 && is_word_char(chars[idx - 1]) {
        while idx > 0 && is_word_char(chars[idx - 1]) {
            idx -= 1;
        }
        return idx;
    }
    while idx > 0 && !is_word_char(chars[idx - 1]) && !chars[idx - 1].is_whitespace() {
        idx -= 1;
    }
    idx
}

pub fn next_word_boundary(text: &str, offset: usize) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut idx = offset.min(len);
    if idx < len && is_word_char(chars[idx]) {
        while idx < len && is_word_char(chars[idx]) {
            idx += 1;
        }
    } else {
        while idx < len && !chars[idx].is_whitespace() && !is_word_char(chars[idx]) {
            idx += 1;
        }
    }
    while idx < len && chars[idx].is_whitespace() {
        idx += 1;
    }
    idx
}

impl Editor {
    /// Types `text` at the caret, replacing a non-collapsed selection.
    pub fn insert_text(&mut self, text: &str) -> Result<()> {
        if self.detached || !self.options.editable {
            return Ok(());
        }
        self.reconcile()?;
        self.ensure_selection()?;
        self.note_trigger_characters(text);
        self.insert_text_at_caret(text)?;
        self.finish_event()
    }

    /// Inserts plain text. Every pair of line breaks collapses into one,
    /// once and left to right, so three breaks still leave an empty line.
    /// Each remaining break starts a new line, and the lines receiving text
    /// are classified afterwards.
    pub fn paste(&mut self, text: &str) -> Result<()> {
        if self.detached || !self.options.editable {
            return Ok(());
        }
        self.reconcile()?;
        self.ensure_selection()?;
        let text = text.replace("\r\n", "\n").replace("\n\n", "\n");
        self.note_trigger_characters(&text);
        let mut lines = Vec::new();
        for (index, part) in text.split('\n').enumerate() {
            if index > 0 {
                self.split_line_at_caret()?;
            }
            if !part.is_empty() {
                self.insert_text_at_caret(part)?;
            }
            if let Some(selection) = self.selection.clone()
                && let Some(line) = self.editable_line(selection.focus())?
                && !lines.contains(&line)
            {
                lines.push(line);
            }
        }
        self.classify_pasted_lines(&lines)?;
        debug!(length = text.len(), "text pasted");
        self.finish_event()
    }

    /// Tags hashtags and urls on `lines`, keeping the caret at the same
    /// character of its line.
    fn classify_pasted_lines(&mut self, lines: &[NodeId]) -> Result<()> {
        if !(self.hashtag_flag || self.urllink_flag) {
            return Ok(());
        }
        self.hashtag_flag = false;
        self.urllink_flag = false;
        let caret = match self.selection.as_ref().map(Selection::focus) {
            Some(focus) => match self.editable_line(focus)? {
                Some(line) => {
                    let map = LineMap::build(&mut self.doc, line)?;
                    Some((line, map.offset_of(&self.doc, focus)))
                }
                None => None,
            },
            None => None,
        };
        for line in lines {
            if self.doc.is_connected(*line) {
                self.classify_text(*line)?;
            }
        }
        if let Some((line, offset)) = caret
            && self.doc.is_connected(line)
        {
            let map = LineMap::build(&mut self.doc, line)?;
            let target = map.point_at(&self.doc, offset);
            self.select_points(target, target);
        }
        Ok(())
    }

    /// Moves the caret to the text block holding `point` and makes the
    /// document consistent before the user interacts with it.
    pub fn pointer_down(&mut self, point: BoundaryPoint) -> Result<()> {
        if self.detached {
            return Ok(());
        }
        self.reconcile()?;
        let line = self.editable_line(point)?;
        let offset = match line {
            Some(line) => {
                let map = LineMap::build(&mut self.doc, line)?;
                let text = map.text(&self.doc);
                let prefix: String = text.chars().take(map.offset_of(&self.doc, point)).collect();
                Some(prefix.chars().filter(|ch| *ch != ZERO_WIDTH_SPACE).count())
            }
            None => None,
        };
        self.normalize_document()?;
        if let (Some(line), Some(offset)) = (line, offset)
            && self.doc.is_connected(line)
        {
            let map = LineMap::build(&mut self.doc, line)?;
            let target = map.point_at(&self.doc, offset);
            self.select_points(target, target);
        } else {
            self.repair_selection();
        }
        self.range_backup = self.selection.clone();
        let root = self.doc.root();
        self.classify_text(root)?;
        self.finish_event()
    }

    /// Strips zero-width anchors, drops the lines they leave empty, and
    /// merges adjacent text.
    pub(crate) fn normalize_document(&mut self) -> Result<()> {
        let root = self.doc.root();
        let runs = text_nodes(&mut self.doc, root)?;
        for run in runs {
            let Some(text) = self.doc.text(run) else {
                continue;
            };
            if !text.contains(ZERO_WIDTH_SPACE) {
                continue;
            }
            let stripped: String = text.chars().filter(|ch| *ch != ZERO_WIDTH_SPACE).collect();
            self.doc.set_text(run, &stripped);
            if !stripped.is_empty() {
                continue;
            }
            let Some(ceiling) = self.doc.nearest_ceiling(run) else {
                continue;
            };
            let holder = super::climber::climb_to_eldest_single(&mut self.doc, run, ceiling)?;
            if holder != run
                && !self.doc.has_visible_text(holder)
                && self.doc.element_children(holder).iter().all(|child| {
                    self.doc.class_of(*child) == NodeClass::LineBreak
                })
                && self.doc.last_child(root) != Some(holder)
                && self.doc.parent(holder) == Some(root)
            {
                trace!(?holder, "dropping line emptied by anchor removal");
                self.doc.remove(holder);
            }
        }
        self.doc.normalize(root);
        Ok(())
    }

    pub(crate) fn note_trigger_characters(&mut self, text: &str) {
        if text.contains('#') {
            self.hashtag_flag = true;
        }
        if text.contains([':', '/', '.']) {
            self.urllink_flag = true;
        }
    }

    /// Classifies the caret's line once a hashtag or url may have been
    /// completed. The caret lands after the last new tag.
    pub(crate) fn classify_at_caret(&mut self) -> Result<()> {
        if !(self.hashtag_flag || self.urllink_flag) {
            return Ok(());
        }
        self.hashtag_flag = false;
        self.urllink_flag = false;
        let Some(selection) = self.selection.clone() else {
            return Ok(());
        };
        let Some(line) = self.editable_line(selection.focus())? else {
            return Ok(());
        };
        if let Some(anchor) = self.classify_text(line)? {
            self.set_caret(anchor, Position::End)?;
        }
        Ok(())
    }

    /// The text block holding `point`, creating one when the point sits
    /// directly in a Ceiling.
    pub(crate) fn editable_line(&mut self, point: BoundaryPoint) -> Result<Option<NodeId>> {
        if let Some(line) = self.text_block_of(point.node) {
            return Ok(Some(line));
        }
        match self.line_of(point)? {
            Some(line) if self.doc.class_of(line).is_text_block() => Ok(Some(line)),
            _ => Ok(None),
        }
    }

    pub(crate) fn insert_text_at_caret(&mut self, text: &str) -> Result<()> {
        let selection = self.working_selection()?;
        let point = if selection.collapsed() {
            selection.start
        } else {
            self.delete_range(&selection)?
        };
        let point = self.text_point(point)?;
        let mut value = self.doc.text(point.node).unwrap_or_default().to_string();
        let byte = char_to_byte_idx(&value, point.offset);
        value.insert_str(byte, text);
        self.doc.set_text(point.node, &value);
        if let Some(parent) = self.doc.parent(point.node)
            && let Some(last) = self.doc.last_child(parent)
            && self.doc.class_of(last) == NodeClass::LineBreak
            && self.doc.has_visible_text(parent)
        {
            self.doc.remove(last);
        }
        let caret = BoundaryPoint::new(point.node, point.offset + text.chars().count());
        self.select_points(caret, caret);
        Ok(())
    }

    /// A point inside a text node at or next to `point`.
    fn text_point(&mut self, point: BoundaryPoint) -> Result<BoundaryPoint> {
        if self.doc.is_text(point.node) && self.doc.unselectable_ancestor(point.node).is_none() {
            return Ok(point);
        }
        let mut point = point;
        if let Some(locked) = self.doc.unselectable_ancestor(point.node) {
            point = after(&self.doc, locked);
        }
        if self.doc.class_of(point.node).is_ceiling() {
            let children = self.doc.children(point.node);
            let line = match children.get(point.offset).copied() {
                Some(child) if self.doc.class_of(child).is_text_block() => child,
                _ => {
                    let line = self.empty_line()?;
                    self.doc.insert_at(point, line)?;
                    line
                }
            };
            point = BoundaryPoint::new(line, 0);
        }
        let children = self.doc.children(point.node);
        if let Some(previous) = point
            .offset
            .checked_sub(1)
            .and_then(|index| children.get(index).copied())
            && self.doc.is_text(previous)
        {
            return Ok(BoundaryPoint::new(previous, self.doc.node_length(previous)));
        }
        if let Some(next) = children.get(point.offset).copied()
            && self.doc.is_text(next)
        {
            return Ok(BoundaryPoint::new(next, 0));
        }
        let text = self.doc.create_text("");
        self.doc.insert_at(point, text)?;
        Ok(BoundaryPoint::new(text, 0))
    }

    /// Deletes the selected content and joins the lines at both ends.
    pub(crate) fn delete_range(&mut self, selection: &Selection) -> Result<BoundaryPoint> {
        let collapse = self.doc.delete_contents(selection.start, selection.end)?;
        let point = match (selection.start_line, selection.end_line) {
            (Some(upper), Some(lower))
                if upper != lower
                    && self.doc.is_connected(upper)
                    && self.doc.is_connected(lower)
                    && self.doc.class_of(upper).is_text_block()
                    && self.doc.class_of(lower).is_text_block() =>
            {
                self.merge_lines(upper, lower)?
            }
            _ => collapse,
        };
        if let Some(line) = self.text_block_of(point.node) {
            self.ensure_line_break(line)?;
        }
        self.select_points(point, point);
        Ok(point)
    }

    /// Appends the content of `lower` to `upper` and removes `lower`.
    /// Returns the join point.
    pub(crate) fn merge_lines(&mut self, upper: NodeId, lower: NodeId) -> Result<BoundaryPoint> {
        if !self.doc.has_visible_text(lower)
            && self
                .doc
                .element_children(lower)
                .iter()
                .all(|child| self.doc.class_of(*child) == NodeClass::LineBreak)
        {
            self.doc.remove(lower);
            return Ok(edge_point(&self.doc, upper, true));
        }
        let point = if self.doc.has_visible_text(upper) {
            edge_point(&self.doc, upper, true)
        } else {
            self.remove_line_breaks(upper, None);
            BoundaryPoint::new(upper, self.doc.children(upper).len())
        };
        self.remove_line_breaks(lower, None);
        self.doc.move_children(lower, upper)?;
        self.doc.remove(lower);
        debug!(?upper, "lines merged");
        Ok(point)
    }

    pub(crate) fn ensure_line_break(&mut self, line: NodeId) -> Result<()> {
        if self.doc.is_connected(line)
            && self.doc.class_of(line).is_text_block()
            && !self.doc.has_visible_text(line)
            && !self
                .doc
                .descendants(line)
                .into_iter()
                .any(|node| self.doc.class_of(node) == NodeClass::LineBreak || self.doc.is_unselectable(node))
        {
            let line_break = self.doc.create_element("br");
            self.doc.append_child(line, line_break)?;
        }
        Ok(())
    }

    /// Splits the caret's line in two and moves the caret to the start of
    /// the new line. An empty last list item leaves its list instead.
    pub(crate) fn split_line_at_caret(&mut self) -> Result<()> {
        let selection = self.working_selection()?;
        let point = if selection.collapsed() {
            selection.start
        } else {
            self.delete_range(&selection)?
        };
        let point = self.text_point(point)?;
        let Some(line) = self.editable_line(point)? else {
            return Ok(());
        };

        if self.doc.class_of(line) == NodeClass::ListItem
            && !self.doc.has_visible_text(line)
            && let Some(list) = self.doc.parent(line)
            && self.doc.last_child(list) == Some(line)
        {
            let paragraph = self.empty_line()?;
            self.doc.insert_after(list, paragraph)?;
            self.doc.remove(line);
            self.set_caret(paragraph, Position::Start)?;
            debug!("empty list item left its list");
            return Ok(());
        }

        let end = BoundaryPoint::new(line, self.doc.children(line).len());
        let (fragment, _) = self.doc.extract_contents(point, end)?;
        let next = self.doc.clone_node(line, false);
        self.doc.append_child(next, fragment)?;
        self.doc.insert_after(line, next)?;
        self.ensure_line_break(line)?;
        self.ensure_line_break(next)?;
        self.set_caret(next, Position::Start)?;
        trace!(?line, ?next, "line split");
        Ok(())
    }

    /// Removes one character (or one non-editable tag) next to the caret,
    /// joining lines at their edges. Returns whether anything changed.
    pub(crate) fn delete_char(&mut self, forward: bool) -> Result<bool> {
        let selection = self.working_selection()?;
        if !selection.collapsed() {
            self.delete_range(&selection)?;
            return Ok(true);
        }
        let point = selection.start;
        let Some(line) = self.editable_line(point)? else {
            return Ok(false);
        };
        let map = LineMap::build(&mut self.doc, line)?;
        let offset = map.offset_of(&self.doc, point);

        let target = if forward {
            (offset < map.len()).then_some(offset)
        } else {
            offset.checked_sub(1)
        };
        let Some(target) = target else {
            return self.join_at_edge(line, forward);
        };

        let caret = if let Some((locked, start)) = map.locked_start(target) {
            self.doc.remove(locked);
            start
        } else {
            let Some((run, index)) = map.run_at(target) else {
                return Ok(false);
            };
            let mut value = self.doc.text(run.node).unwrap_or_default().to_string();
            remove_char_from_text(&mut value, index);
            self.doc.set_text(run.node, &value);
            target
        };
        self.ensure_line_break(line)?;
        let map = LineMap::build(&mut self.doc, line)?;
        let point = map.point_at(&self.doc, caret);
        self.select_points(point, point);
        Ok(true)
    }

    fn join_at_edge(&mut self, line: NodeId, forward: bool) -> Result<bool> {
        let root = self.doc.root();
        let sibling = if forward {
            self.doc.next_sibling(line)
        } else {
            self.doc.previous_sibling(line)
        };
        let point = match sibling {
            Some(other) if self.doc.class_of(other).is_text_block() => {
                let (upper, lower) = if forward { (line, other) } else { (other, line) };
                self.merge_lines(upper, lower)?
            }
            Some(other) if self.doc.class_of(other).is_ceiling() => {
                let lines: Vec<NodeId> = self
                    .doc
                    .descendants(other)
                    .into_iter()
                    .filter(|node| self.doc.class_of(*node).is_text_block())
                    .collect();
                let inner = if forward {
                    lines.first().copied()
                } else {
                    lines.last().copied()
                };
                let Some(inner) = inner else {
                    return Ok(false);
                };
                let (upper, lower) = if forward { (line, inner) } else { (inner, line) };
                self.merge_lines(upper, lower)?
            }
            Some(other) if self.doc.is_unselectable(other) || self.doc.class_of(other).is_block() => {
                self.doc.remove(other);
                debug!(?other, "adjacent block removed");
                return Ok(true);
            }
            Some(_) => return Ok(false),
            None => {
                let Some(parent) = self.doc.parent(line).filter(|parent| *parent != root) else {
                    return Ok(false);
                };
                if forward {
                    let Some(next) = self
                        .doc
                        .next_sibling(parent)
                        .filter(|next| self.doc.class_of(*next).is_text_block())
                    else {
                        return Ok(false);
                    };
                    self.merge_lines(line, next)?
                } else {
                    // the first line of a list or quote moves out in front of it
                    let lifted = if self.doc.class_of(line) == NodeClass::ListItem {
                        let paragraph = self.doc.create_element("p");
                        self.doc.move_children(line, paragraph)?;
                        self.doc.remove(line);
                        paragraph
                    } else {
                        line
                    };
                    let grand = self
                        .doc
                        .parent(parent)
                        .ok_or(crate::error::StructureError::Detached(parent))?;
                    self.doc.insert_before(grand, lifted, Some(parent))?;
                    self.ensure_line_break(lifted)?;
                    edge_point(&self.doc, lifted, false)
                }
            }
        };
        self.select_points(point, point);
        Ok(true)
    }

    /// Runs after anything that may have moved the selection: steps out of
    /// non-editable content, backs the selection up, and reports the
    /// styles active there.
    pub(crate) fn selection_changed(&mut self) -> Result<()> {
        if self.detached {
            return Ok(());
        }
        if let Some(selection) = self.selection.clone() {
            if !self.selection_is_live(&selection) {
                self.repair_selection();
            }
            self.step_out_of_unselectable()?;
        }
        if self.options.last_line_blank {
            self.keep_last_line_blank()?;
        }
        self.range_backup = self.selection.clone();
        self.refresh_active_styles()?;
        let carat_position = self.caret_position()?;
        self.emit(CallbackPayload {
            command_tracker: Some(self.command_tracker.clone()),
            range: self.selection.clone(),
            carat_position,
            ..CallbackPayload::default()
        })
    }

    fn step_out_of_unselectable(&mut self) -> Result<()> {
        let Some(mut selection) = self.selection.clone() else {
            return Ok(());
        };
        let mut moved = false;
        let forward = selection.direction == super::Direction::Forward;
        for point in [&mut selection.start, &mut selection.end] {
            let Some(locked) = self.doc.unselectable_ancestor(point.node) else {
                continue;
            };
            *point = if forward {
                after(&self.doc, locked)
            } else {
                before(&self.doc, locked)
            };
            moved = true;
        }
        if !moved {
            return Ok(());
        }
        // a block at the top level has no text to land in
        for point in [&mut selection.start, &mut selection.end] {
            if self.doc.class_of(point.node).is_ceiling() {
                let children = self.doc.children(point.node).to_vec();
                let target = if forward {
                    children.get(point.offset).copied()
                } else {
                    point
                        .offset
                        .checked_sub(1)
                        .and_then(|index| children.get(index).copied())
                };
                if let Some(line) = target.filter(|line| self.doc.class_of(*line).is_text_block())
                {
                    *point = edge_point(&self.doc, line, !forward);
                }
            }
        }
        if self.doc.compare_points(selection.start, selection.end) == Ordering::Greater {
            selection.end = selection.start;
        }
        trace!(start = ?selection.start, "selection stepped out of atomic content");
        self.selection = Some(selection);
        Ok(())
    }

    fn keep_last_line_blank(&mut self) -> Result<()> {
        let root = self.doc.root();
        let needs_line = match self.doc.last_child(root) {
            Some(last) => {
                self.doc.class_of(last) != NodeClass::Paragraph || self.doc.has_visible_text(last)
            }
            None => true,
        };
        if needs_line {
            let observing = self.doc.set_observing(false);
            let appended = self
                .empty_line()
                .and_then(|line| self.doc.append_child(root, line).map_err(Into::into));
            self.doc.set_observing(observing);
            appended?;
        }
        Ok(())
    }

    pub fn caret_position(&mut self) -> Result<Option<CaretPosition>> {
        let Some(selection) = self.selection.clone() else {
            return Ok(None);
        };
        let focus = selection.focus();
        let Some(line) = self.editable_line(focus)? else {
            return Ok(None);
        };
        let root = self.doc.root();
        let row = self
            .doc
            .descendants(root)
            .into_iter()
            .filter(|node| self.doc.class_of(*node).is_text_block())
            .position(|node| node == line)
            .unwrap_or(0);
        let map = LineMap::build(&mut self.doc, line)?;
        Ok(Some(CaretPosition {
            row,
            column: map.offset_of(&self.doc, focus),
        }))
    }
}
