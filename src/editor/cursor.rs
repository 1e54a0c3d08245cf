use tracing::{debug, trace};
use unicode_width::UnicodeWidthChar;

use super::climber::eldest;
use super::content::{LineMap, next_word_boundary, previous_word_boundary};
use super::position::{Direction, EndpointSpec, Position, PositionRequest, Selection};
use super::{Editor, Result};
use crate::dom::{BoundaryPoint, Document, NodeClass, NodeId, ZERO_WIDTH_SPACE};
use crate::error::StructureError;

/// Columns a tab advances when lines are measured.
pub const TAB_WIDTH: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
}

impl Key {
    fn is_navigation(self) -> bool {
        matches!(
            self,
            Key::Left
                | Key::Right
                | Key::Up
                | Key::Down
                | Key::Home
                | Key::End
                | Key::PageUp
                | Key::PageDown
        )
    }

    /// Keys that complete a hashtag or url being typed.
    fn ends_token(self) -> bool {
        matches!(
            self,
            Key::Char(' ') | Key::Enter | Key::Tab | Key::Left | Key::Right | Key::Up | Key::Down
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub shift: bool,
    /// Control or meta.
    pub ctrl: bool,
}

impl KeyInput {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            shift: false,
            ctrl: false,
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }
}

impl From<Key> for KeyInput {
    fn from(key: Key) -> Self {
        Self::new(key)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    Handled,
    /// The key was refused; the document is unchanged.
    Prevented,
    /// The editor does not take keys right now.
    Ignored,
}

/// Layout knowledge the editor cannot derive from the tree.
pub trait Geometry {
    /// Columns available to `line` before it wraps, or `None` when lines
    /// never wrap.
    fn wrap_width(&self, document: &Document, line: NodeId) -> Option<usize>;
}

/// Every line is a single visual row.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoGeometry;

impl Geometry for NoGeometry {
    fn wrap_width(&self, _document: &Document, _line: NodeId) -> Option<usize> {
        None
    }
}

pub fn char_width(ch: char) -> usize {
    if ch == '\t' {
        TAB_WIDTH
    } else {
        UnicodeWidthChar::width(ch).unwrap_or(0)
    }
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

/// Character offset of the first character that does not fit in `column`.
fn offset_for_column(text: &str, column: usize) -> usize {
    let mut width = 0;
    for (index, ch) in text.chars().enumerate() {
        let next = width + char_width(ch);
        if next > column {
            return index;
        }
        width = next;
    }
    text.chars().count()
}

impl Editor {
    pub fn handle_key(&mut self, input: impl Into<KeyInput>) -> Result<KeyOutcome> {
        self.handle_key_with(input.into(), &NoGeometry)
    }

    pub fn handle_key_with(
        &mut self,
        input: KeyInput,
        geometry: &dyn Geometry,
    ) -> Result<KeyOutcome> {
        if self.detached {
            return Ok(KeyOutcome::Ignored);
        }
        if !input.key.is_navigation() && !self.options.editable {
            return Ok(KeyOutcome::Ignored);
        }
        self.reconcile()?;
        self.ensure_selection()?;
        self.last_key = Some(input.key);
        if self.selection_within_restricted() {
            trace!(key = ?input.key, "caret inside restricted content");
            return Ok(KeyOutcome::Ignored);
        }
        if input.key.ends_token() {
            self.classify_at_caret()?;
        }

        let outcome = match input.key {
            Key::Char(ch) => {
                let mut buffer = [0; 4];
                let text = ch.encode_utf8(&mut buffer);
                self.note_trigger_characters(text);
                self.insert_text_at_caret(text)?;
                KeyOutcome::Handled
            }
            Key::Enter => self.key_enter(input)?,
            Key::Backspace => self.key_delete(false)?,
            Key::Delete => self.key_delete(true)?,
            Key::Tab => self.key_tab(input)?,
            Key::Left | Key::Right => self.key_horizontal(input)?,
            Key::Up | Key::Down => self.key_vertical(input, geometry)?,
            Key::Home | Key::End | Key::PageUp | Key::PageDown => self.key_jump(input)?,
        };
        trace!(key = ?input.key, ?outcome, "key handled");
        self.remove_sandwiched_lines();
        self.finish_event()?;
        Ok(outcome)
    }

    fn key_enter(&mut self, input: KeyInput) -> Result<KeyOutcome> {
        let selection = self.working_selection()?;
        if input.shift {
            let in_item = self
                .doc
                .closest(selection.start.node, |node| {
                    self.doc.class_of(node) == NodeClass::ListItem
                })
                .is_some();
            if !in_item {
                return Ok(KeyOutcome::Prevented);
            }
            let point = if selection.collapsed() {
                selection.start
            } else {
                self.delete_range(&selection)?
            };
            let line_break = self.doc.create_element("br");
            self.doc.insert_at(point, line_break)?;
            let anchor = self.doc.create_text("");
            self.doc.insert_after(line_break, anchor)?;
            let caret = BoundaryPoint::new(anchor, 0);
            self.select_points(caret, caret);
            return Ok(KeyOutcome::Handled);
        }

        if let Some(line) = self.editable_line(selection.start)? {
            for child in self.doc.children(line).to_vec() {
                if child != selection.start.node
                    && self
                        .doc
                        .text(child)
                        .is_some_and(|text| text.chars().all(|ch| ch == ZERO_WIDTH_SPACE))
                {
                    self.doc.remove(child);
                }
            }
        }
        if let Some(end_line) = selection.end_line
            && self.doc.is_connected(end_line)
        {
            let tabs = self
                .doc
                .text_content(end_line)
                .chars()
                .take_while(|ch| *ch == '\t')
                .count();
            if tabs > 0 {
                self.insert_tab_pending = "\t".repeat(tabs);
            }
        }
        self.split_line_at_caret()?;
        Ok(KeyOutcome::Handled)
    }

    fn key_delete(&mut self, forward: bool) -> Result<KeyOutcome> {
        self.direction = Direction::Forward;
        let selection = self.working_selection()?;
        let root = self.doc.root();
        let children = self.doc.children(root).to_vec();
        if !self.doc.has_visible_text(root)
            && children.len() <= 1
            && children
                .first()
                .is_some_and(|only| self.doc.is_text_element(*only) && selection.start_line == Some(*only))
        {
            debug!("nothing left to delete");
            return Ok(KeyOutcome::Prevented);
        }

        if selection.collapsed() && !forward {
            let point = selection.start;
            let line = self.editable_line(point)?;
            let at_line_start = match line {
                Some(line) => LineMap::build(&mut self.doc, line)?.offset_of(&self.doc, point) == 0,
                None => false,
            };
            if at_line_start && let Some(line) = line {
                if let Some(quote) = self
                    .doc
                    .closest(line, |node| self.doc.class_of(node) == NodeClass::Quote)
                    && eldest(&mut self.doc, line, quote)? == self.doc.first_child(quote).unwrap_or(line)
                {
                    let wrapper = self.doc.create_element("blockquote");
                    self.splice_block(wrapper, None, true, None)?;
                    debug!("quote removed by backspace");
                    return Ok(KeyOutcome::Handled);
                }
                let top = eldest(&mut self.doc, line, root)?;
                if let Some(previous) = self.doc.previous_sibling(top)
                    && self.doc.is_unselectable(previous)
                {
                    self.doc.remove(previous);
                    debug!(?previous, "unselectable block removed by backspace");
                    return Ok(KeyOutcome::Handled);
                }
                if children.len() == 1 && children[0] == top && top == line {
                    return Ok(KeyOutcome::Prevented);
                }
            }
        }

        if self.delete_char(forward)? {
            Ok(KeyOutcome::Handled)
        } else {
            Ok(KeyOutcome::Prevented)
        }
    }

    /// Text blocks from the selection's start line to its end line.
    fn swept_lines(&self, selection: &Selection) -> Vec<NodeId> {
        let (Some(first), Some(last)) = (selection.start_line, selection.end_line) else {
            return Vec::new();
        };
        let root = self.doc.root();
        self.doc
            .descendants(root)
            .into_iter()
            .filter(|node| self.doc.class_of(*node).is_text_block())
            .filter(|node| {
                self.doc.tree_order(first, *node) != std::cmp::Ordering::Greater
                    && (self.doc.tree_order(*node, last) != std::cmp::Ordering::Greater
                        || self.doc.contains(last, *node))
            })
            .collect()
    }

    fn key_tab(&mut self, input: KeyInput) -> Result<KeyOutcome> {
        let selection = self.working_selection()?;
        let lines = self.swept_lines(&selection);

        if !input.shift {
            if selection.collapsed() {
                self.insert_text_at_caret("\t")?;
                return Ok(KeyOutcome::Handled);
            }
            for line in &lines {
                let tab = self.doc.create_text("\t");
                self.doc.prepend_child(*line, tab)?;
            }
            if let (Some(first), Some(last)) = (lines.first(), lines.last()) {
                self.set_selection(PositionRequest::range(
                    EndpointSpec::start(*first),
                    EndpointSpec::end(*last),
                ))?;
            }
            return Ok(KeyOutcome::Handled);
        }

        let single = lines.len() == 1;
        let mut outdented = None;
        for line in lines {
            let leading = self.doc.descendants(line).into_iter().find(|node| {
                self.doc.text(*node).is_some_and(|text| !text.is_empty())
                    && self.doc.unselectable_ancestor(*node).is_none()
            });
            let Some(run) = leading else {
                continue;
            };
            let text = self.doc.text(run).unwrap_or_default();
            if let Some(rest) = text.strip_prefix('\t') {
                let rest = rest.to_string();
                self.doc.set_text(run, &rest);
                outdented = Some(run);
            }
        }
        if single
            && let Some(run) = outdented
            && let Some(mut current) = self.selection.clone()
        {
            for point in [&mut current.start, &mut current.end] {
                if point.node == run {
                    point.offset = point.offset.saturating_sub(1);
                }
            }
            self.selection = Some(current);
        }
        Ok(KeyOutcome::Handled)
    }

    /// Moves the focus endpoint to `target`, keeping the anchor when
    /// extending.
    fn move_focus(&mut self, target: BoundaryPoint, extend: bool) {
        let anchor = match (&self.selection, extend) {
            (Some(selection), true) => match selection.direction {
                Direction::Forward => selection.start,
                Direction::Backward => selection.end,
            },
            _ => target,
        };
        self.select_points(anchor, target);
    }

    /// Drops an empty or zero-width text node holding a collapsed caret and
    /// moves the caret to its neighbour.
    fn remove_zero_space(&mut self, backward: bool) -> Result<bool> {
        let Some(selection) = self.selection.clone() else {
            return Ok(false);
        };
        let node = selection.focus().node;
        let hollow = self
            .doc
            .text(node)
            .is_some_and(|text| text.chars().all(|ch| ch == ZERO_WIDTH_SPACE));
        if !selection.collapsed() || !hollow {
            return Ok(false);
        }
        let Some(parent) = self.doc.parent(node) else {
            return Ok(false);
        };
        let keeps_anchor = self
            .doc
            .children(parent)
            .iter()
            .filter(|child| **child != node)
            .all(|child| self.doc.is_unselectable(*child));
        if keeps_anchor {
            return Ok(false);
        }
        let sibling = if backward {
            self.doc.previous_sibling(node)
        } else {
            self.doc.next_sibling(node)
        };
        let index = self.doc.index_in_parent(node).unwrap_or(0);
        self.doc.remove(node);
        let target = match sibling {
            Some(sibling) if self.doc.is_text(sibling) => {
                let offset = if backward {
                    self.doc.node_length(sibling)
                } else {
                    0
                };
                BoundaryPoint::new(sibling, offset)
            }
            _ => BoundaryPoint::new(parent, index),
        };
        self.select_points(target, target);
        trace!(?node, "zero-width anchor pruned");
        Ok(true)
    }

    fn text_blocks(&self) -> Vec<NodeId> {
        let root = self.doc.root();
        self.doc
            .descendants(root)
            .into_iter()
            .filter(|node| self.doc.class_of(*node).is_text_block())
            .collect()
    }

    fn key_horizontal(&mut self, input: KeyInput) -> Result<KeyOutcome> {
        let backward = input.key == Key::Left;
        let selection = self.working_selection()?;
        if input.ctrl || (selection.collapsed() && input.shift) {
            self.direction = if backward {
                Direction::Backward
            } else {
                Direction::Forward
            };
        }
        if self.remove_zero_space(backward)? {
            return Ok(KeyOutcome::Handled);
        }
        if !selection.collapsed() && !input.shift {
            let edge = if backward {
                selection.start
            } else {
                selection.end
            };
            self.select_points(edge, edge);
            return Ok(KeyOutcome::Handled);
        }

        let focus = if selection.collapsed() {
            selection.start
        } else {
            selection.focus()
        };
        let Some(line) = self.editable_line(focus)? else {
            return Ok(KeyOutcome::Prevented);
        };
        let map = LineMap::build(&mut self.doc, line)?;
        let offset = map.offset_of(&self.doc, focus);
        let text = map.text(&self.doc);

        let target = if backward && offset == 0 {
            let blocks = self.text_blocks();
            let previous = blocks
                .iter()
                .position(|block| *block == line)
                .and_then(|index| index.checked_sub(1))
                .map(|index| blocks[index]);
            let Some(previous) = previous else {
                return Ok(KeyOutcome::Prevented);
            };
            let previous_map = LineMap::build(&mut self.doc, previous)?;
            previous_map.point_at(&self.doc, previous_map.len())
        } else if !backward && offset >= map.len() {
            let blocks = self.text_blocks();
            let next = blocks
                .iter()
                .position(|block| *block == line)
                .and_then(|index| blocks.get(index + 1).copied());
            let Some(next) = next else {
                return Ok(KeyOutcome::Prevented);
            };
            LineMap::build(&mut self.doc, next)?.point_at(&self.doc, 0)
        } else if backward {
            let step = if input.ctrl {
                previous_word_boundary(&text, offset)
            } else {
                offset - 1
            };
            let step = map.locked_start(step).map_or(step, |(_, start)| start);
            map.point_at(&self.doc, step)
        } else {
            let step = if input.ctrl {
                next_word_boundary(&text, offset)
            } else {
                offset + 1
            };
            map.point_at(&self.doc, step)
        };
        self.move_focus(target, input.shift);
        Ok(KeyOutcome::Handled)
    }

    fn key_vertical(&mut self, input: KeyInput, geometry: &dyn Geometry) -> Result<KeyOutcome> {
        let up = input.key == Key::Up;
        let selection = self.working_selection()?;
        if !selection.collapsed() && !input.shift {
            let edge = if up { selection.start } else { selection.end };
            self.select_points(edge, edge);
            return Ok(KeyOutcome::Handled);
        }
        if selection.collapsed() || selection.start_line == selection.end_line {
            self.direction = if up {
                Direction::Backward
            } else {
                Direction::Forward
            };
        }
        let focus = if selection.collapsed() {
            selection.start
        } else {
            selection.focus()
        };
        let Some(line) = self.editable_line(focus)? else {
            return Ok(KeyOutcome::Prevented);
        };
        let map = LineMap::build(&mut self.doc, line)?;
        let offset = map.offset_of(&self.doc, focus);

        // a soft-wrapped line is walked row by row first
        if let Some(width) = geometry
            .wrap_width(&self.doc, line)
            .filter(|width| *width > 0)
        {
            let text = map.text(&self.doc);
            let prefix: String = text.chars().take(offset).collect();
            let column = display_width(&prefix);
            let last_row = display_width(&text).saturating_sub(1) / width;
            let row = column / width;
            let target_column = if up && row > 0 {
                Some(column - width)
            } else if !up && row < last_row {
                Some(column + width)
            } else {
                None
            };
            if let Some(target_column) = target_column {
                let point = map.point_at(&self.doc, offset_for_column(&text, target_column));
                self.move_focus(point, input.shift);
                return Ok(KeyOutcome::Handled);
            }
        }

        let root = self.doc.root();
        let top = eldest(&mut self.doc, line, root)?;
        let in_sub_ceiling = top != line && self.doc.class_of(top).is_ceiling();
        let blocks = self.text_blocks();
        let index = blocks.iter().position(|block| *block == line);

        if in_sub_ceiling {
            let inner = index.and_then(|index| {
                if up {
                    index.checked_sub(1).map(|index| blocks[index])
                } else {
                    blocks.get(index + 1).copied()
                }
            });
            if let Some(inner) = inner.filter(|inner| self.doc.contains(top, *inner)) {
                let point = LineMap::build(&mut self.doc, inner)?.point_at(&self.doc, offset);
                self.move_focus(point, input.shift);
                return Ok(KeyOutcome::Handled);
            }
        }

        let anchor = if in_sub_ceiling { top } else { line };
        let (backward_node, forward_node) = if up {
            (self.doc.next_sibling(anchor), self.doc.previous_sibling(anchor))
        } else {
            (self.doc.previous_sibling(anchor), self.doc.next_sibling(anchor))
        };
        let leap_from = if in_sub_ceiling { Some(top) } else { forward_node };

        if let Some(block) = leap_from.filter(|node| self.doc.class_of(*node).is_block())
            && !input.shift
        {
            let leap = if up {
                self.doc.previous_sibling(block)
            } else {
                self.doc.next_sibling(block)
            };
            let target = match leap {
                Some(leap) if !self.doc.class_of(leap).is_block() => leap,
                _ => {
                    let parent = self
                        .doc
                        .parent(block)
                        .ok_or(StructureError::Detached(block))?;
                    let placeholder = self.empty_line()?;
                    let reference = if up { Some(block) } else { leap };
                    self.doc.insert_before(parent, placeholder, reference)?;
                    debug!("placeholder line created past a block");
                    placeholder
                }
            };
            let position = if up { Position::End } else { Position::Start };
            self.set_caret(target, position)?;

            let backward_is_block = backward_node.is_some_and(|node| self.doc.class_of(node).is_block());
            if self.doc.text_content(line).is_empty()
                && (backward_is_block
                    || (backward_node.is_none() && self.doc.first_child(root) == Some(line)))
            {
                self.sandwiched_lines.push(line);
            }
            return Ok(KeyOutcome::Handled);
        }

        let Some(neighbour) = forward_node else {
            return Ok(KeyOutcome::Prevented);
        };
        let neighbour_line = if self.doc.class_of(neighbour).is_text_block() {
            Some(neighbour)
        } else {
            let inner: Vec<NodeId> = self
                .doc
                .descendants(neighbour)
                .into_iter()
                .filter(|node| self.doc.class_of(*node).is_text_block())
                .collect();
            if up {
                inner.last().copied()
            } else {
                inner.first().copied()
            }
        };
        let Some(neighbour_line) = neighbour_line else {
            return Ok(KeyOutcome::Prevented);
        };
        let point = LineMap::build(&mut self.doc, neighbour_line)?.point_at(&self.doc, offset);
        self.move_focus(point, input.shift);
        Ok(KeyOutcome::Handled)
    }

    fn key_jump(&mut self, input: KeyInput) -> Result<KeyOutcome> {
        let backward = matches!(input.key, Key::Home | Key::PageUp);
        if input.shift {
            self.direction = if backward {
                Direction::Backward
            } else {
                Direction::Forward
            };
        }
        let selection = self.working_selection()?;
        let line = match input.key {
            Key::Home | Key::End => self.editable_line(selection.focus())?,
            Key::PageUp => self.text_blocks().first().copied(),
            _ => self.text_blocks().last().copied(),
        };
        let Some(line) = line else {
            return Ok(KeyOutcome::Prevented);
        };
        let map = LineMap::build(&mut self.doc, line)?;
        let target = if backward {
            map.point_at(&self.doc, 0)
        } else {
            map.point_at(&self.doc, map.len())
        };
        self.move_focus(target, input.shift);
        Ok(KeyOutcome::Handled)
    }

    /// Empty lines the caret leapt away from, sandwiched between blocks.
    fn remove_sandwiched_lines(&mut self) {
        let root = self.doc.root();
        for line in std::mem::take(&mut self.sandwiched_lines) {
            let holds_caret = self.selection.as_ref().is_some_and(|selection| {
                self.doc.contains(line, selection.start.node)
                    || self.doc.contains(line, selection.end.node)
            });
            if self.doc.is_connected(line)
                && !holds_caret
                && !self.doc.has_visible_text(line)
                && self.doc.last_child(root) != Some(line)
            {
                self.doc.remove(line);
                trace!(?line, "sandwiched line removed");
            }
        }
    }
}
