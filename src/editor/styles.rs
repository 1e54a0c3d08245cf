use indexmap::IndexMap;
use serde::Serialize;

use super::crawler::{CrawlOptions, Visit, crawl};
use super::{Editor, Result};
use crate::dom::{Document, NodeClass, NodeId};
use crate::options::normalize_color;

pub const STOP_SUFFIX: &str = "_stop";
pub const ALIGN_CENTER_CLASS: &str = "_alignCenter_";
pub const ALIGN_RIGHT_CLASS: &str = "_alignRight_";
pub const ALIGN_CLASSES: [&str; 2] = [ALIGN_CENTER_CLASS, ALIGN_RIGHT_CLASS];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleProperty {
    FontSize,
    FontWeight,
    FontStyle,
    TextDecoration,
    Color,
}

impl StyleProperty {
    /// Properties that only count on text elements when sampled.
    fn requires_text_element(self) -> bool {
        matches!(self, StyleProperty::FontWeight)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StyleCommand {
    pub name: String,
    pub class: String,
    pub property: StyleProperty,
    /// Classes this one evicts when applied.
    pub counter: Vec<String>,
}

impl StyleCommand {
    pub fn new(name: &str, class: &str, property: StyleProperty, counter: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            class: class.to_string(),
            property,
            counter: counter.iter().map(|class| class.to_string()).collect(),
        }
    }

    pub fn stop_class(&self) -> String {
        format!("{}{STOP_SUFFIX}", self.class)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleRegistry {
    commands: Vec<StyleCommand>,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        use StyleProperty::*;
        let headings = ["_h1", "_h2", "_h3", "_h4", "_h5", "_h6"];
        let mut commands = Vec::new();
        for (level, class) in headings.iter().enumerate() {
            let mut counter: Vec<&str> = vec!["_small"];
            counter.extend(headings.iter().filter(|other| *other != class));
            commands.push(StyleCommand::new(
                &format!("h{}", level + 1),
                class,
                FontSize,
                &counter,
            ));
        }
        commands.push(StyleCommand::new("italic", "_i", FontStyle, &[]));
        let mut small_counter: Vec<&str> = headings.to_vec();
        small_counter.push("_b");
        commands.push(StyleCommand::new("small", "_small", FontSize, &small_counter));
        commands.push(StyleCommand::new("bold", "_b", FontWeight, &["_small"]));
        commands.push(StyleCommand::new("underline", "_u", TextDecoration, &["_del"]));
        commands.push(StyleCommand::new("strike", "_del", TextDecoration, &["_u"]));
        commands.push(StyleCommand::new("color", "_color", Color, &[]));
        Self { commands }
    }
}

impl StyleRegistry {
    pub fn get(&self, name: &str) -> Option<&StyleCommand> {
        self.commands.iter().find(|command| command.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleCommand> {
        self.commands.iter()
    }

    pub fn register(&mut self, command: StyleCommand) {
        self.commands.retain(|existing| existing.name != command.name);
        self.commands.push(command);
    }

    /// The command owning `class`, and whether `class` is its stop variant.
    pub fn lookup_class(&self, class: &str) -> Option<(&StyleCommand, bool)> {
        let (base, stop) = match class.strip_suffix(STOP_SUFFIX) {
            Some(base) => (base, true),
            None => (class, false),
        };
        self.commands
            .iter()
            .find(|command| command.class == base)
            .map(|command| (command, stop))
    }

    /// `class`, its stop twin, and its counter classes with their stop
    /// variants.
    pub fn class_set(&self, class: &str) -> Vec<String> {
        let twin = match class.strip_suffix(STOP_SUFFIX) {
            Some(base) => base.to_string(),
            None => format!("{class}{STOP_SUFFIX}"),
        };
        let mut set = vec![class.to_string(), twin];
        if let Some((command, false)) = self.lookup_class(class) {
            for counter in &command.counter {
                set.push(counter.clone());
                set.push(format!("{counter}{STOP_SUFFIX}"));
            }
        }
        set
    }
}

/// Resolved values per property; a missing entry means the document default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComputedStyle {
    values: IndexMap<StyleProperty, String>,
}

impl ComputedStyle {
    pub fn get(&self, property: StyleProperty) -> Option<&str> {
        self.values.get(&property).map(String::as_str)
    }
}

/// Cascades style classes from the root down to `node`.
pub fn computed_style(
    document: &Document,
    registry: &StyleRegistry,
    node: NodeId,
) -> ComputedStyle {
    let element = if document.is_text(node) {
        document.parent(node)
    } else {
        Some(node)
    };
    let mut style = ComputedStyle::default();
    let Some(element) = element else {
        return style;
    };
    let mut chain: Vec<NodeId> = std::iter::once(element)
        .chain(document.ancestors(element))
        .collect();
    chain.reverse();
    for ancestor in chain {
        for class in document.classes(ancestor) {
            let Some((command, stop)) = registry.lookup_class(class) else {
                continue;
            };
            if stop {
                style.values.shift_remove(&command.property);
            } else if command.property == StyleProperty::Color {
                if let Some(color) = document
                    .style(ancestor)
                    .get("color")
                    .and_then(|value| normalize_color(value))
                {
                    style.values.insert(StyleProperty::Color, color);
                }
            } else {
                style
                    .values
                    .insert(command.property, command.name.clone());
            }
        }
        if !document.has_class(ancestor, crate::dom::COLOR_CLASS)
            && document.class_of(ancestor).is_style_allowed()
            && let Some(color) = document
                .style(ancestor)
                .get("color")
                .and_then(|value| normalize_color(value))
        {
            style.values.insert(StyleProperty::Color, color);
        }
    }
    style
}

/// The value of `property` at `node` as the style tracker sees it: `None`
/// when the node shows the document default.
pub fn track_style(
    document: &Document,
    registry: &StyleRegistry,
    node: NodeId,
    property: StyleProperty,
    default_color: &str,
) -> Option<String> {
    if property.requires_text_element() && !document.is_text_element(node) {
        return None;
    }
    let style = computed_style(document, registry, node);
    let value = style.get(property)?;
    if property == StyleProperty::Color && value == default_color {
        return None;
    }
    Some(value.to_string())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StyleState {
    Flag(bool),
    Color(String),
}

/// Active style per command name, plus `quote`, `alignCenter` and
/// `alignRight`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StyleReport(IndexMap<String, StyleState>);

impl StyleReport {
    pub fn empty(registry: &StyleRegistry) -> Self {
        let mut report = IndexMap::new();
        for command in registry.iter() {
            report.insert(command.name.clone(), StyleState::Flag(false));
        }
        for extra in ["quote", "alignCenter", "alignRight"] {
            report.insert(extra.to_string(), StyleState::Flag(false));
        }
        Self(report)
    }

    pub fn get(&self, name: &str) -> Option<&StyleState> {
        self.0.get(name)
    }

    pub fn is_active(&self, name: &str) -> bool {
        match self.0.get(name) {
            Some(StyleState::Flag(flag)) => *flag,
            Some(StyleState::Color(_)) => true,
            None => false,
        }
    }

    pub fn color(&self) -> Option<&str> {
        match self.0.get("color") {
            Some(StyleState::Color(color)) => Some(color),
            _ => None,
        }
    }

    pub fn active(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, state)| !matches!(state, StyleState::Flag(false)))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub(crate) fn set(&mut self, name: &str, state: StyleState) {
        self.0.insert(name.to_string(), state);
    }
}

impl Editor {
    pub fn active_styles(&self) -> &StyleReport {
        &self.command_tracker
    }

    pub fn registry(&self) -> &StyleRegistry {
        &self.registry
    }

    /// Samples the computed style across the selection.
    pub(crate) fn refresh_active_styles(&mut self) -> Result<()> {
        self.command_tracker = self.compute_style_report()?;
        Ok(())
    }

    fn compute_style_report(&mut self) -> Result<StyleReport> {
        let mut report = StyleReport::empty(&self.registry);
        let Some(selection) = self.selection.clone() else {
            return Ok(report);
        };
        if !self.selection_is_live(&selection) || self.selection_within_restricted() {
            return Ok(report);
        }

        let root = self.doc.root();
        let mut samples: Vec<NodeId> = Vec::new();
        let mut quote = false;
        let output = crawl(
            &mut self.doc,
            CrawlOptions::range(selection.start, selection.end).within(root),
            |document, node| {
                let element = if document.is_text(node) {
                    document.parent(node)
                } else {
                    Some(node)
                };
                let Some(element) = element else {
                    return Visit::Continue;
                };
                if document
                    .closest(element, |ancestor| document.class_of(ancestor) == NodeClass::Quote)
                    .is_some()
                {
                    quote = true;
                }
                if document
                    .closest(element, |ancestor| document.class_of(ancestor).is_atomic())
                    .is_some()
                {
                    return Visit::Continue;
                }
                let single_leaf = document.children(node).len() == 1
                    && document.children(node).iter().all(|child| {
                        document.is_text(*child)
                            || document.class_of(*child) == NodeClass::LineBreak
                    });
                if document.is_text(node) {
                    samples.push(element);
                } else if document.class_of(node) == NodeClass::LineBreak {
                    if let Some(parent) = document.parent(node) {
                        samples.push(parent);
                    }
                } else if single_leaf {
                    samples.push(node);
                }
                Visit::Continue
            },
        )?;
        if output.nodes.is_empty() {
            samples.push(selection.start.node);
        }
        if document_quote(&self.doc, selection.start.node) {
            quote = true;
        }

        for sample in samples {
            self.sample_into(&mut report, sample);
        }
        if quote {
            report.set("quote", StyleState::Flag(true));
        }
        Ok(report)
    }

    fn sample_into(&self, report: &mut StyleReport, node: NodeId) {
        let element = if self.doc.is_text(node) {
            match self.doc.parent(node) {
                Some(parent) => parent,
                None => return,
            }
        } else {
            node
        };
        for class in ALIGN_CLASSES {
            if self
                .doc
                .closest(element, |ancestor| self.doc.has_class(ancestor, class))
                .is_some()
            {
                report.set(align_name(class), StyleState::Flag(true));
            }
        }
        for command in self.registry.iter() {
            let value = track_style(
                &self.doc,
                &self.registry,
                element,
                command.property,
                &self.options.default_color,
            );
            match (command.property, value) {
                (StyleProperty::Color, Some(color)) => {
                    report.set(&command.name, StyleState::Color(color));
                }
                (_, Some(value)) if value == command.name => {
                    report.set(&command.name, StyleState::Flag(true));
                }
                _ => {}
            }
        }
    }

    pub(crate) fn selection_within_restricted(&self) -> bool {
        let Some(selection) = self.selection.as_ref() else {
            return false;
        };
        [selection.start.node, selection.end.node]
            .iter()
            .any(|node| self.doc.restricted_ancestor(*node).is_some())
    }
}

fn document_quote(document: &Document, node: NodeId) -> bool {
    document
        .closest(node, |ancestor| document.class_of(ancestor) == NodeClass::Quote)
        .is_some()
}

/// `_alignCenter_` becomes `alignCenter`.
pub fn align_name(class: &str) -> &str {
    class.trim_matches('_')
}
