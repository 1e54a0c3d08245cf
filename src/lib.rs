pub mod dom;
pub mod editor;
pub mod error;
pub mod options;
pub mod render;
pub mod theme;

pub use dom::{BoundaryPoint, Document, NodeClass, NodeId};
pub use editor::{Command, CommandOutcome, Editor, EndpointSpec, Position, PositionRequest, Selection};
pub use error::EditorError;
pub use options::EditorOptions;
