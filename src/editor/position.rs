use std::cmp::Ordering;

use serde::Serialize;
use tracing::trace;

use super::climber::eldest;
use super::crawler::text_nodes;
use super::{Editor, Result};
use crate::dom::{BoundaryPoint, Document, NodeClass, NodeId, ZERO_WIDTH_SPACE};
use crate::error::SelectionError;

/// Which endpoint moves when a selection is extended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub start: BoundaryPoint,
    pub end: BoundaryPoint,
    pub direction: Direction,
    /// Line holding the start point, set when lines were requested.
    pub start_line: Option<NodeId>,
    pub end_line: Option<NodeId>,
    /// Lines strictly between `start_line` and `end_line`.
    pub between: Vec<NodeId>,
}

impl Selection {
    pub fn caret(point: BoundaryPoint) -> Self {
        Self {
            start: point,
            end: point,
            direction: Direction::Forward,
            start_line: None,
            end_line: None,
            between: Vec::new(),
        }
    }

    pub fn collapsed(&self) -> bool {
        self.start == self.end
    }

    /// The endpoint the caret is drawn at.
    pub fn focus(&self) -> BoundaryPoint {
        match self.direction {
            Direction::Forward => self.end,
            Direction::Backward => self.start,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Reuse the node of the current selection's endpoint.
    Current,
    /// Silently abort the whole request.
    Abort,
    Node(NodeId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    /// Reuse the offset of the current selection's endpoint.
    Current,
    Start,
    End,
    Offset(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndpointSpec {
    pub target: Target,
    pub position: Position,
}

impl EndpointSpec {
    pub fn new(node: NodeId, position: Position) -> Self {
        Self {
            target: Target::Node(node),
            position,
        }
    }

    pub fn start(node: NodeId) -> Self {
        Self::new(node, Position::Start)
    }

    pub fn end(node: NodeId) -> Self {
        Self::new(node, Position::End)
    }

    pub fn offset(node: NodeId, offset: usize) -> Self {
        Self::new(node, Position::Offset(offset))
    }

    pub fn current() -> Self {
        Self {
            target: Target::Current,
            position: Position::Current,
        }
    }

    pub fn abort() -> Self {
        Self {
            target: Target::Abort,
            position: Position::Current,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionRequest {
    pub endpoints: [Option<EndpointSpec>; 2],
    /// Annotate the resulting selection with its lines.
    pub lines: bool,
}

impl PositionRequest {
    pub fn caret(spec: EndpointSpec) -> Self {
        Self {
            endpoints: [Some(spec), None],
            lines: false,
        }
    }

    pub fn range(start: EndpointSpec, end: EndpointSpec) -> Self {
        Self {
            endpoints: [Some(start), Some(end)],
            lines: false,
        }
    }

    pub fn with_lines(mut self) -> Self {
        self.lines = true;
        self
    }
}

impl Editor {
    /// Resolves `request` into concrete endpoints and makes it the active
    /// selection. Returns `None` when the request was aborted.
    pub fn set_selection(&mut self, request: PositionRequest) -> Result<Option<Selection>> {
        let [first, second] = request.endpoints;
        let Some(first) = first else {
            return Err(SelectionError::InvalidPosition("missing first endpoint".into()).into());
        };
        if first.target == Target::Abort || second.map(|spec| spec.target) == Some(Target::Abort)
        {
            return Ok(None);
        }

        let start = self.resolve_endpoint(first, false)?;
        let end = match second {
            Some(spec) => self.resolve_endpoint(spec, true)?,
            None => start,
        };

        let mut selection = Selection::caret(start);
        selection.end = end;
        selection.direction = self.direction;
        if self.doc.compare_points(start, end) == Ordering::Greater {
            selection.start = end;
            selection.end = start;
            selection.direction = Direction::Backward;
        }
        if request.lines {
            self.annotate_lines(&mut selection)?;
        }
        trace!(start = ?selection.start, end = ?selection.end, "selection resolved");
        self.selection = Some(selection.clone());
        Ok(Some(selection))
    }

    /// Places a collapsed caret.
    pub fn set_caret(&mut self, node: NodeId, position: Position) -> Result<Option<Selection>> {
        self.set_selection(PositionRequest::caret(EndpointSpec::new(node, position)))
    }

    fn resolve_endpoint(&mut self, spec: EndpointSpec, is_end: bool) -> Result<BoundaryPoint> {
        let current = self.selection.as_ref().map(|selection| {
            if is_end {
                selection.end
            } else {
                selection.start
            }
        });
        let node = match spec.target {
            Target::Node(node) => node,
            Target::Current => current.ok_or(SelectionError::NoSelection)?.node,
            Target::Abort => return Err(SelectionError::InvalidPosition("aborted".into()).into()),
        };
        if !self.doc.owns(node) || !self.doc.is_connected(node) {
            return Err(SelectionError::InvalidNode(node).into());
        }
        let point = match spec.position {
            Position::Current => {
                let offset = current.ok_or(SelectionError::NoSelection)?.offset;
                BoundaryPoint::new(node, offset.min(self.doc.node_length(node)))
            }
            Position::Start => edge_point(&self.doc, node, false),
            Position::End => edge_point(&self.doc, node, true),
            Position::Offset(offset) => self.offset_point(node, offset)?,
        };
        Ok(snap_line_break(&self.doc, point))
    }

    /// Walks the text runs below `node` until the cumulative length would
    /// exceed `offset`. An offset on a run boundary lands at the start of the
    /// next run; empty runs are never targets.
    fn offset_point(&mut self, node: NodeId, offset: usize) -> Result<BoundaryPoint> {
        if self.doc.is_text(node) {
            return Ok(BoundaryPoint::new(node, offset.min(self.doc.node_length(node))));
        }
        let runs = text_nodes(&mut self.doc, node)?;
        let mut remaining = offset;
        let mut last_editable = None;
        for run in runs {
            let length = self.doc.node_length(run);
            if length == 0 {
                continue;
            }
            let locked = locked_ancestor(&self.doc, run, node);
            if remaining < length {
                return Ok(match locked {
                    None => BoundaryPoint::new(run, remaining),
                    Some(locked) if remaining == 0 => {
                        last_editable.unwrap_or_else(|| before(&self.doc, locked))
                    }
                    Some(locked) => after(&self.doc, locked),
                });
            }
            remaining -= length;
            last_editable = match locked {
                None => Some(BoundaryPoint::new(run, length)),
                Some(locked) => Some(after(&self.doc, locked)),
            };
        }
        if let Some(point) = last_editable {
            return Ok(point);
        }
        if is_void(&self.doc, node) {
            let parent = self.doc.parent(node).ok_or(SelectionError::InvalidNode(node))?;
            let index = self.doc.index_in_parent(node).unwrap_or(0);
            return Ok(BoundaryPoint::new(parent, index));
        }
        // Text-free content such as a lone break is addressed by child index.
        let children = self.doc.children(node).len();
        if children > 0 {
            return Ok(BoundaryPoint::new(node, offset.min(children)));
        }
        let anchor = self.doc.create_text(&ZERO_WIDTH_SPACE.to_string());
        self.doc.prepend_child(node, anchor)?;
        Ok(BoundaryPoint::new(anchor, 0))
    }

    pub(crate) fn annotate_lines(&mut self, selection: &mut Selection) -> Result<()> {
        let start_line = self.line_of(selection.start)?;
        let end_line = self.line_of(selection.end)?;
        selection.between.clear();
        if let (Some(start), Some(end)) = (start_line, end_line)
            && start != end
            && self.doc.parent(start) == self.doc.parent(end)
        {
            let mut sibling = self.doc.next_sibling(start);
            while let Some(node) = sibling {
                if node == end {
                    break;
                }
                selection.between.push(node);
                sibling = self.doc.next_sibling(node);
            }
        }
        selection.start_line = start_line;
        selection.end_line = end_line;
        Ok(())
    }

    /// The child of the nearest Ceiling that holds `point`.
    pub(crate) fn line_of(&mut self, point: BoundaryPoint) -> Result<Option<NodeId>> {
        let mut node = point.node;
        if self.doc.class_of(node).is_ceiling() {
            let children = self.doc.children(node);
            match children
                .get(point.offset)
                .or_else(|| children.last())
                .copied()
            {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        let Some(ceiling) = self.doc.nearest_ceiling(node) else {
            return Ok(None);
        };
        Ok(Some(eldest(&mut self.doc, node, ceiling)?))
    }

    /// Makes the range from `anchor` to `focus` the active selection.
    pub(crate) fn select_points(&mut self, anchor: BoundaryPoint, focus: BoundaryPoint) -> Selection {
        let mut selection = Selection::caret(anchor);
        selection.end = focus;
        if self.doc.compare_points(anchor, focus) == Ordering::Greater {
            selection.start = focus;
            selection.end = anchor;
            selection.direction = Direction::Backward;
        }
        self.selection = Some(selection.clone());
        selection
    }

    /// The selection with its lines annotated, falling back to the backed-up
    /// selection when none is active.
    pub(crate) fn working_selection(&mut self) -> Result<Selection> {
        let mut selection = match self.selection.clone() {
            Some(selection) if self.selection_is_live(&selection) => selection,
            _ => {
                let backup = self.range_backup.clone().ok_or(SelectionError::NoSelection)?;
                if !self.selection_is_live(&backup) {
                    return Err(SelectionError::NoSelection.into());
                }
                self.selection = Some(backup.clone());
                backup
            }
        };
        self.annotate_lines(&mut selection)?;
        self.selection = Some(selection.clone());
        Ok(selection)
    }

    pub(crate) fn selection_is_live(&self, selection: &Selection) -> bool {
        [selection.start, selection.end].iter().all(|point| {
            self.doc.is_connected(point.node)
                && point.offset <= self.doc.node_length(point.node)
        })
    }

    /// Re-clamps a selection whose nodes moved or shrank.
    pub(crate) fn repair_selection(&mut self) {
        let Some(mut selection) = self.selection.clone() else {
            return;
        };
        for point in [&mut selection.start, &mut selection.end] {
            if !self.doc.is_connected(point.node) {
                let Some(line) = self.doc.last_child(self.doc.root()) else {
                    self.selection = None;
                    return;
                };
                *point = edge_point(&self.doc, line, true);
            }
            point.offset = point.offset.min(self.doc.node_length(point.node));
        }
        if self.doc.compare_points(selection.start, selection.end) == Ordering::Greater {
            selection.end = selection.start;
        }
        self.selection = Some(selection);
    }
}

/// Deepest first (or last) leaf boundary of `node`.
pub(crate) fn edge_point(document: &Document, node: NodeId, at_end: bool) -> BoundaryPoint {
    let mut current = node;
    loop {
        let next = if at_end {
            document.last_child(current)
        } else {
            document.first_child(current)
        };
        match next {
            Some(child) => current = child,
            None => break,
        }
    }
    if is_void(document, current)
        && let (Some(parent), Some(index)) =
            (document.parent(current), document.index_in_parent(current))
    {
        let line_break = document.class_of(current) == NodeClass::LineBreak;
        let offset = if at_end && !line_break { index + 1 } else { index };
        return BoundaryPoint::new(parent, offset);
    }
    let offset = if at_end {
        document.node_length(current)
    } else {
        0
    };
    BoundaryPoint::new(current, offset)
}

fn is_void(document: &Document, node: NodeId) -> bool {
    matches!(
        document.tag(node),
        Some("br" | "hr" | "img" | "input" | "wbr")
    )
}

pub(crate) fn before(document: &Document, node: NodeId) -> BoundaryPoint {
    match (document.parent(node), document.index_in_parent(node)) {
        (Some(parent), Some(index)) => BoundaryPoint::new(parent, index),
        _ => BoundaryPoint::new(node, 0),
    }
}

pub(crate) fn after(document: &Document, node: NodeId) -> BoundaryPoint {
    match (document.parent(node), document.index_in_parent(node)) {
        (Some(parent), Some(index)) => BoundaryPoint::new(parent, index + 1),
        _ => BoundaryPoint::new(node, document.node_length(node)),
    }
}

/// Outermost non-editable ancestor of `node` below `limit`.
pub(crate) fn locked_ancestor(document: &Document, node: NodeId, limit: NodeId) -> Option<NodeId> {
    let mut locked = None;
    for ancestor in document.ancestors(node) {
        if ancestor == limit {
            break;
        }
        if document.attribute(ancestor, "contenteditable") == Some("false") {
            locked = Some(ancestor);
        }
    }
    locked
}

/// A point addressing a line break that has siblings moves next to the
/// closest non-break sibling instead.
fn snap_line_break(document: &Document, point: BoundaryPoint) -> BoundaryPoint {
    let target = if document.is_element(point.node) {
        match document.children(point.node).get(point.offset) {
            Some(child) => *child,
            None => return point,
        }
    } else {
        point.node
    };
    let target = if document.class_of(point.node) == NodeClass::LineBreak {
        point.node
    } else {
        target
    };
    if document.class_of(target) != NodeClass::LineBreak {
        return point;
    }
    if let Some(previous) = document.previous_sibling(target)
        && document.class_of(previous) != NodeClass::LineBreak
    {
        return edge_point(document, previous, true);
    }
    if let Some(next) = document.next_sibling(target)
        && document.class_of(next) != NodeClass::LineBreak
    {
        return edge_point(document, next, false);
    }
    match (document.parent(target), document.index_in_parent(target)) {
        (Some(parent), Some(index)) if point.node == target => BoundaryPoint::new(parent, index),
        _ => point,
    }
}
