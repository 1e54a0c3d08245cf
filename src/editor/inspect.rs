use super::Editor;
use super::styles::{ALIGN_CLASSES, StyleRegistry, align_name};
use crate::dom::{Document, NodeClass, NodeId};

/// Labels from the outermost block down to the innermost inline element
/// around the caret, e.g. `["Quote", "Paragraph", "Bold"]`.
pub fn breadcrumbs_for_node(
    document: &Document,
    registry: &StyleRegistry,
    node: NodeId,
) -> Vec<String> {
    let root = document.root();
    let mut chain: Vec<NodeId> = std::iter::once(node)
        .chain(document.ancestors(node))
        .take_while(|ancestor| *ancestor != root)
        .filter(|ancestor| document.is_element(*ancestor))
        .collect();
    chain.reverse();

    let mut labels = Vec::new();
    for element in chain {
        labels.extend(node_labels(document, registry, element));
    }
    labels
}

fn node_labels(document: &Document, registry: &StyleRegistry, node: NodeId) -> Vec<String> {
    let class = document.class_of(node);
    let label = match class {
        NodeClass::Paragraph => Some("Paragraph"),
        NodeClass::ListItem => Some("List Item"),
        NodeClass::TableCell => Some("Cell"),
        NodeClass::Quote => Some("Quote"),
        NodeClass::List { ordered: true } => Some("Numbered List"),
        NodeClass::List { ordered: false } => Some("Bullet List"),
        NodeClass::Divider => Some("Divider"),
        NodeClass::Media => Some("Image"),
        NodeClass::CustomEmbed => Some("Custom"),
        NodeClass::Hashtag => Some("Hashtag"),
        NodeClass::UrlLink => Some("Link"),
        _ => None,
    };
    let mut labels: Vec<String> = label.map(str::to_string).into_iter().collect();

    if class.is_text_block() {
        for name in document.classes(node) {
            if ALIGN_CLASSES.contains(&name.as_str()) {
                labels.push(align_name(name).to_string());
            }
        }
    }
    if matches!(class, NodeClass::StyleSpan { .. }) {
        for name in document.classes(node) {
            let Some((command, stop)) = registry.lookup_class(name) else {
                continue;
            };
            let prefix = if stop { "No " } else { "" };
            labels.push(format!("{prefix}{}", style_label(&command.name)));
        }
    }
    labels
}

fn style_label(name: &str) -> String {
    match name {
        "bold" => "Bold".to_string(),
        "italic" => "Italic".to_string(),
        "underline" => "Underline".to_string(),
        "strike" => "Strikethrough".to_string(),
        "small" => "Small".to_string(),
        "color" => "Color".to_string(),
        other => match other.strip_prefix('h') {
            Some(level) if level.parse::<u8>().is_ok() => format!("Heading {level}"),
            _ => other.to_string(),
        },
    }
}

impl Editor {
    /// Breadcrumbs for the selection focus, `None` without a selection.
    pub fn breadcrumbs(&self) -> Option<Vec<String>> {
        let selection = self.selection.as_ref()?;
        let focus = selection.focus();
        if !self.doc.is_connected(focus.node) {
            return None;
        }
        Some(breadcrumbs_for_node(&self.doc, &self.registry, focus.node))
    }
}
