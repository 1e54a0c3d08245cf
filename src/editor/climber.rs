use tracing::trace;

use crate::dom::{DomResult, Document, NodeClass, NodeId, ZERO_WIDTH_SPACE};
use crate::error::StructureError;

/// Per-step decision of a climb callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClimbStep {
    Continue,
    Redirect(NodeId),
    Break,
}

/// True when `node` holds at most one logical child: no non-break element
/// besides one, and no visible text next to an element.
pub fn is_single_child_parent(document: &Document, node: NodeId) -> bool {
    if document.is_text(node) {
        return false;
    }
    if document.element_children(node).is_empty() {
        return true;
    }
    let mut elements = 0;
    let mut has_text = false;
    for child in document.children(node).iter().rev() {
        if let Some(text) = document.text(*child) {
            if text
                .chars()
                .any(|ch| ch != ZERO_WIDTH_SPACE && !ch.is_whitespace())
            {
                has_text = true;
            }
        } else if document.class_of(*child) != NodeClass::LineBreak {
            elements += 1;
        }
        if (elements > 1 && !has_text) || (elements > 0 && has_text) {
            return false;
        }
    }
    true
}

/// Climbs from `node` towards `wrapper` and returns the last ancestor reached
/// below it. With `single_child` the climb stops at the first parent holding
/// more than one logical child. `step` sees every parent before the climb
/// moves there.
pub fn climb_to_eldest(
    document: &mut Document,
    node: NodeId,
    wrapper: NodeId,
    single_child: bool,
    mut step: impl FnMut(&Document, NodeId) -> ClimbStep,
) -> DomResult<NodeId> {
    if document.is_text(wrapper) {
        return Err(StructureError::NotAnElement(wrapper));
    }
    let marker = document.mark_scope(wrapper);
    let mut current = node;
    while let Some(parent) = document.parent(current) {
        if parent == wrapper || !document.within_scope(parent, marker) {
            break;
        }
        if single_child && !is_single_child_parent(document, parent) {
            break;
        }
        match step(document, parent) {
            ClimbStep::Continue => current = parent,
            ClimbStep::Redirect(next) => current = next,
            ClimbStep::Break => break,
        }
        trace!(?current, "climbed");
    }
    document.release_scope(marker);
    Ok(current)
}

/// The child of `wrapper` that contains `node`.
pub fn eldest(document: &mut Document, node: NodeId, wrapper: NodeId) -> DomResult<NodeId> {
    climb_to_eldest(document, node, wrapper, false, |_, _| ClimbStep::Continue)
}

/// Outermost equivalent representation of `node` below `wrapper`.
pub fn climb_to_eldest_single(
    document: &mut Document,
    node: NodeId,
    wrapper: NodeId,
) -> DomResult<NodeId> {
    climb_to_eldest(document, node, wrapper, true, |_, _| ClimbStep::Continue)
}
