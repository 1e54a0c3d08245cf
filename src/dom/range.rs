use std::cmp::Ordering;

use serde::Serialize;

use super::{DomResult, Document, NodeId, char_to_byte_idx};
use crate::error::StructureError;

/// A `(node, offset)` pair. Offsets count characters inside text nodes and
/// children inside elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BoundaryPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl BoundaryPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

impl Document {
    pub fn compare_points(&self, a: BoundaryPoint, b: BoundaryPoint) -> Ordering {
        if a.node == b.node {
            return a.offset.cmp(&b.offset);
        }
        if self.tree_order(a.node, b.node) == Ordering::Greater {
            return self.compare_points(b, a).reverse();
        }
        if self.contains(a.node, b.node) {
            let mut child = b.node;
            while let Some(parent) = self.parent(child) {
                if parent == a.node {
                    break;
                }
                child = parent;
            }
            if self.index_in_parent(child).unwrap_or(0) < a.offset {
                return Ordering::Greater;
            }
        }
        Ordering::Less
    }

    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        std::iter::once(a)
            .chain(self.ancestors(a))
            .find(|candidate| self.contains(*candidate, b))
    }

    fn is_contained(&self, node: NodeId, start: BoundaryPoint, end: BoundaryPoint) -> bool {
        let before = BoundaryPoint::new(node, 0);
        let after = BoundaryPoint::new(node, self.node_length(node));
        self.compare_points(before, start) == Ordering::Greater
            && self.compare_points(after, end) == Ordering::Less
    }

    /// Moves everything between `start` and `end` into a new detached
    /// fragment. Partially selected ancestors are split, leaving shallow
    /// clones in the fragment. Returns the fragment and the collapsed point
    /// where the contents used to be.
    pub fn extract_contents(
        &mut self,
        start: BoundaryPoint,
        end: BoundaryPoint,
    ) -> DomResult<(NodeId, BoundaryPoint)> {
        let fragment = self.create_fragment();
        if start == end || self.compare_points(start, end) == Ordering::Greater {
            return Ok((fragment, start));
        }

        if start.node == end.node && self.is_text(start.node) {
            let text = self.text(start.node).unwrap_or_default().to_string();
            let from = char_to_byte_idx(&text, start.offset);
            let to = char_to_byte_idx(&text, end.offset);
            let clone = self.create_text(&text[from..to]);
            self.append_child(fragment, clone)?;
            self.set_text(start.node, &format!("{}{}", &text[..from], &text[to..]));
            return Ok((fragment, start));
        }

        let common = self
            .common_ancestor(start.node, end.node)
            .ok_or(StructureError::Detached(start.node))?;

        let child_of_common = |document: &Document, node: NodeId| -> NodeId {
            let mut current = node;
            while let Some(parent) = document.parent(current) {
                if parent == common {
                    break;
                }
                current = parent;
            }
            current
        };

        let first_partial = if self.contains(start.node, end.node) {
            None
        } else {
            Some(child_of_common(self, start.node))
        };
        let last_partial = if self.contains(end.node, start.node) {
            None
        } else {
            Some(child_of_common(self, end.node))
        };
        let contained: Vec<NodeId> = self
            .children(common)
            .iter()
            .copied()
            .filter(|child| self.is_contained(*child, start, end))
            .collect();

        let collapse = if self.contains(start.node, end.node) {
            start
        } else {
            let mut reference = start.node;
            while let Some(parent) = self.parent(reference) {
                if self.contains(parent, end.node) {
                    break;
                }
                reference = parent;
            }
            let parent = self
                .parent(reference)
                .ok_or(StructureError::Detached(reference))?;
            BoundaryPoint::new(parent, self.index_in_parent(reference).unwrap_or(0) + 1)
        };

        if let Some(first) = first_partial {
            if self.is_text(first) {
                let text = self.text(first).unwrap_or_default().to_string();
                let from = char_to_byte_idx(&text, start.offset);
                let clone = self.create_text(&text[from..]);
                self.append_child(fragment, clone)?;
                self.set_text(first, &text[..from]);
            } else {
                let clone = self.clone_node(first, false);
                self.append_child(fragment, clone)?;
                let limit = BoundaryPoint::new(first, self.node_length(first));
                let (inner, _) = self.extract_contents(start, limit)?;
                self.move_children(inner, clone)?;
            }
        }

        for child in contained {
            self.append_child(fragment, child)?;
        }

        if let Some(last) = last_partial {
            if self.is_text(last) {
                let text = self.text(last).unwrap_or_default().to_string();
                let to = char_to_byte_idx(&text, end.offset);
                let clone = self.create_text(&text[..to]);
                self.append_child(fragment, clone)?;
                self.set_text(last, &text[to..]);
            } else {
                let clone = self.clone_node(last, false);
                self.append_child(fragment, clone)?;
                let (inner, _) = self.extract_contents(BoundaryPoint::new(last, 0), end)?;
                self.move_children(inner, clone)?;
            }
        }

        Ok((fragment, collapse))
    }

    /// Inserts `node` (or a fragment's children) at `point`, splitting a text
    /// node when the point falls inside one.
    pub fn insert_at(&mut self, point: BoundaryPoint, node: NodeId) -> DomResult<()> {
        if self.is_text(point.node) {
            let parent = self
                .parent(point.node)
                .ok_or(StructureError::Detached(point.node))?;
            let length = self.node_length(point.node);
            if point.offset == 0 {
                return self.insert_before(parent, node, Some(point.node));
            }
            if point.offset >= length {
                let reference = self.next_sibling(point.node);
                return self.insert_before(parent, node, reference);
            }
            let remainder = self.split_text(point.node, point.offset)?;
            return self.insert_before(parent, node, Some(remainder));
        }
        let reference = self.children(point.node).get(point.offset).copied();
        self.insert_before(point.node, node, reference)
    }

    /// Deletes everything between the two points and returns the collapse
    /// point.
    pub fn delete_contents(
        &mut self,
        start: BoundaryPoint,
        end: BoundaryPoint,
    ) -> DomResult<BoundaryPoint> {
        let (_, collapse) = self.extract_contents(start, end)?;
        Ok(collapse)
    }
}
