use tracing::trace;

use super::climber::climb_to_eldest_single;
use crate::dom::{BoundaryPoint, DomResult, Document, NodeId};

/// What a crawl visitor wants to happen next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    Continue,
    /// The visited node was replaced; continue from this node instead.
    Substitute(NodeId),
    /// Stop without recording the current node.
    Break,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrawlTarget {
    Node(NodeId),
    Range {
        start: BoundaryPoint,
        end: BoundaryPoint,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct CrawlOptions {
    pub target: CrawlTarget,
    /// Climb the resolved container up to the child of this ancestor.
    pub scope: Option<NodeId>,
    pub start_from_eldest_child: bool,
    pub start_node: Option<NodeId>,
}

impl CrawlOptions {
    pub fn node(node: NodeId) -> Self {
        Self {
            target: CrawlTarget::Node(node),
            scope: None,
            start_from_eldest_child: false,
            start_node: None,
        }
    }

    pub fn range(start: BoundaryPoint, end: BoundaryPoint) -> Self {
        Self {
            target: CrawlTarget::Range { start, end },
            scope: None,
            start_from_eldest_child: false,
            start_node: None,
        }
    }

    pub fn within(mut self, scope: NodeId) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn starting_at(mut self, node: NodeId) -> Self {
        self.start_node = Some(node);
        self
    }

    pub fn from_eldest_child(mut self) -> Self {
        self.start_from_eldest_child = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrawlOutput {
    pub nodes: Vec<NodeId>,
    pub container: NodeId,
}

/// Point at which a range walk starts: the child addressed by an element
/// offset, or the text node itself.
fn node_at(document: &Document, point: BoundaryPoint, is_end: bool) -> NodeId {
    if document.is_text(point.node) {
        return point.node;
    }
    let children = document.children(point.node);
    if is_end {
        point
            .offset
            .checked_sub(1)
            .and_then(|index| children.get(index).copied())
            .unwrap_or(point.node)
    } else {
        children.get(point.offset).copied().unwrap_or(point.node)
    }
}

/// Walks the subtree below the resolved container in post-order: children
/// are visited before their parent, text nodes are visited but never
/// entered. The walk is bounded by a scope marker on the container, so it
/// stays inside even when the visitor restructures the tree.
pub fn crawl(
    document: &mut Document,
    options: CrawlOptions,
    mut visitor: impl FnMut(&mut Document, NodeId) -> Visit,
) -> DomResult<CrawlOutput> {
    let (mut container, start, end) = match options.target {
        CrawlTarget::Node(node) => (node, document.first_child(node), None),
        CrawlTarget::Range { start, end } => {
            let common = document
                .common_ancestor(start.node, end.node)
                .unwrap_or(start.node);
            (
                common,
                Some(node_at(document, start, false)),
                Some(node_at(document, end, true)),
            )
        }
    };

    if document.is_text(container) {
        container = document.parent(container).unwrap_or(container);
    }
    if let Some(scope) = options.scope {
        while container != scope {
            match document.parent(container) {
                Some(parent) if parent != scope => container = parent,
                _ => break,
            }
        }
    }

    let mut current = options.start_node.or(start);
    if current == Some(container) {
        current = document.first_child(container);
    }
    if options.start_from_eldest_child
        && let Some(node) = current
    {
        current = Some(climb_to_eldest_single(document, node, container)?);
    }

    let marker = document.mark_scope(container);
    let mut nodes = Vec::new();
    let mut descend = true;

    while let Some(node) = current {
        if !document.within_scope(node, marker) {
            break;
        }
        if descend
            && document.is_element(node)
            && let Some(first) = document.first_child(node)
        {
            current = Some(first);
            continue;
        }

        let next_before = document.next_sibling(node);
        let parent_before = document.parent(node);
        let visited = match visitor(document, node) {
            Visit::Break => {
                trace!(?node, "crawl stopped by visitor");
                break;
            }
            Visit::Continue => node,
            Visit::Substitute(substitute) => substitute,
        };

        let attached = document.parent(visited).is_some();
        if attached && document.within_scope(visited, marker) {
            nodes.push(visited);
        }
        if let Some(end) = end
            && (visited == end || (attached && document.contains(visited, end)))
        {
            break;
        }

        let (next, parent) = if attached {
            (document.next_sibling(visited), document.parent(visited))
        } else {
            (next_before, parent_before)
        };
        match next {
            Some(next) => {
                current = Some(next);
                descend = true;
            }
            None => {
                current = parent.filter(|parent| *parent != container);
                descend = false;
            }
        }
    }

    document.release_scope(marker);
    Ok(CrawlOutput { nodes, container })
}

/// Text nodes below `node` in document order.
pub fn text_nodes(document: &mut Document, node: NodeId) -> DomResult<Vec<NodeId>> {
    let output = crawl(document, CrawlOptions::node(node), |_, _| Visit::Continue)?;
    Ok(output
        .nodes
        .into_iter()
        .filter(|visited| document.is_text(*visited))
        .collect())
}
