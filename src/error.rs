use thiserror::Error;

use crate::dom::NodeId;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Structure(#[from] StructureError),
    #[error(transparent)]
    Markup(#[from] MarkupError),
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("editor has been detached")]
    Detached,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing root element identifier")]
    MissingRootId,
    #[error("invalid color value `{0}`")]
    InvalidColor(String),
    #[error("failed to read options: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse options: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("node {0:?} is not part of the editor")]
    InvalidNode(NodeId),
    #[error("position cannot be resolved: {0}")]
    InvalidPosition(String),
    #[error("there is no active selection")]
    NoSelection,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("node {0:?} has no parent")]
    Detached(NodeId),
    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),
    #[error("node {0:?} is not a text node")]
    NotText(NodeId),
    #[error("node {node:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, node: NodeId },
    #[error("node {0:?} cannot be inserted into its own subtree")]
    HierarchyRequest(NodeId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkupError {
    #[error("unterminated markup at byte {offset}")]
    Unterminated { offset: usize },
    #[error("unterminated value for attribute `{name}` at byte {offset}")]
    UnterminatedAttribute { offset: usize, name: String },
    #[error("invalid markup structure: {0}")]
    Structure(String),
}
