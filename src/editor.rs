use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::dom::{Document, NodeId, markup};
use crate::error::EditorError;
use crate::options::EditorOptions;

mod classifier;
mod climber;
mod commands;
mod content;
mod crawler;
mod cursor;
mod export;
mod inspect;
mod position;
mod sanitizer;
mod styles;
mod tracked;

pub use classifier::{RegexClassifier, TextClassifier, TextMatch};
pub use climber::{ClimbStep, climb_to_eldest, climb_to_eldest_single, is_single_child_parent};
pub use commands::{Command, CommandOutcome, CustomSpec, ImageSource};
pub use crawler::{CrawlOptions, CrawlOutput, CrawlTarget, Visit, crawl, text_nodes};
pub use cursor::{
    Geometry, Key, KeyInput, KeyOutcome, NoGeometry, TAB_WIDTH, char_width, display_width,
};
pub use export::{Export, TITLE_LIMIT, title_and_text};
pub use inspect::breadcrumbs_for_node;
pub use position::{Direction, EndpointSpec, Position, PositionRequest, Selection, Target};
pub use styles::{
    ALIGN_CENTER_CLASS, ALIGN_RIGHT_CLASS, ComputedStyle, StyleCommand, StyleProperty,
    StyleRegistry, StyleReport, StyleState, computed_style, track_style,
};
pub use tracked::{
    CallbackPayload, CallbackReply, CaretPosition, ClickHandler, EditorCallback, Enrichment,
    Ticket, TrackedItem, TrackedItems, TrackedKind,
};

pub type Result<T> = std::result::Result<T, EditorError>;

/// One editing session: the document tree plus everything the editor
/// remembers between events.
pub struct Editor {
    doc: Document,
    options: EditorOptions,
    registry: StyleRegistry,
    selection: Option<Selection>,
    /// Last live selection, restored when a command arrives without focus.
    range_backup: Option<Selection>,
    direction: Direction,
    last_key: Option<Key>,
    /// Leading tabs carried over to the line created by Enter.
    insert_tab_pending: String,
    command_tracker: StyleReport,
    tracked: TrackedItems,
    callback: Option<Box<dyn EditorCallback>>,
    pending_enrichment: BTreeSet<Ticket>,
    next_ticket: u64,
    classifier: Box<dyn TextClassifier>,
    /// Set when typed text may have started a hashtag or a url.
    hashtag_flag: bool,
    urllink_flag: bool,
    /// Empty lines the caret leapt over, removed once the key is handled.
    sandwiched_lines: Vec<NodeId>,
    detached: bool,
}

impl Editor {
    pub fn new(options: EditorOptions) -> Result<Self> {
        Self::build(options, None)
    }

    /// Like [`Editor::new`], but atomic content in the initial markup is
    /// announced to `callback` before it is attached.
    pub fn with_callback(
        options: EditorOptions,
        callback: impl EditorCallback + 'static,
    ) -> Result<Self> {
        Self::build(options, Some(Box::new(callback)))
    }

    fn build(options: EditorOptions, callback: Option<Box<dyn EditorCallback>>) -> Result<Self> {
        let options = options.validated()?;
        let registry = StyleRegistry::default();
        let classifier = RegexClassifier::new(options.hashtag, options.urllink);
        let mut editor = Self {
            doc: Document::new(&options.element_id),
            command_tracker: StyleReport::empty(&registry),
            registry,
            selection: None,
            range_backup: None,
            direction: Direction::Forward,
            last_key: None,
            insert_tab_pending: String::new(),
            tracked: TrackedItems::default(),
            callback,
            pending_enrichment: BTreeSet::new(),
            next_ticket: 0,
            classifier: Box::new(classifier),
            hashtag_flag: false,
            urllink_flag: false,
            sandwiched_lines: Vec::new(),
            detached: false,
            options,
        };
        let html = editor.options.html.clone();
        editor.load_html(&html)?;
        info!(root = %editor.options.element_id, "editor ready");
        Ok(editor)
    }

    pub fn set_classifier(&mut self, classifier: impl TextClassifier + 'static) {
        self.classifier = Box::new(classifier);
    }

    pub fn set_callback(&mut self, callback: impl EditorCallback + 'static) {
        self.callback = Some(Box::new(callback));
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Direct access for hosts that edit the tree themselves. Changes are
    /// journaled and repaired by the next [`Editor::reconcile`].
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn root(&self) -> NodeId {
        self.doc.root()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn html(&self) -> String {
        self.doc.inner_html(self.doc.root())
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Replaces the whole document with `html`.
    pub fn load_html(&mut self, html: &str) -> Result<()> {
        if self.detached {
            return Err(EditorError::Detached);
        }
        self.doc.set_observing(false);
        let fragment = markup::parse_fragment(&mut self.doc, html)?;
        self.announce_atomic(fragment)?;
        self.classify_text(fragment)?;

        let root = self.doc.root();
        for child in self.doc.children(root).to_vec() {
            self.doc.remove(child);
        }
        self.doc.append_child(root, fragment)?;
        self.sanitize_document()?;
        self.doc.set_observing(true);
        self.doc.take_mutations();

        self.selection = None;
        self.range_backup = None;
        if let Some(first) = self.doc.first_child(root) {
            let target = self
                .doc
                .descendants(first)
                .into_iter()
                .find(|node| self.doc.is_text(*node))
                .unwrap_or(first);
            self.set_caret(target, Position::Start)?;
        }
        self.selection_changed()?;
        debug!(length = html.len(), "markup loaded");
        Ok(())
    }

    /// Stops observing the tree. Later input events are ignored.
    pub fn detach(&mut self) {
        if self.detached {
            return;
        }
        self.doc.set_observing(false);
        self.doc.take_mutations();
        self.detached = true;
        self.pending_enrichment.clear();
        info!("editor detached");
    }

    /// Reconciles host edits, then refreshes everything that depends on the
    /// selection. Every input event ends here.
    pub(crate) fn finish_event(&mut self) -> Result<()> {
        self.reconcile()?;
        self.selection_changed()
    }

    /// Nearest line-level container of `node`.
    pub(crate) fn text_block_of(&self, node: NodeId) -> Option<NodeId> {
        self.doc
            .closest(node, |candidate| self.doc.class_of(candidate).is_text_block())
    }
}



#[cfg(test)]
#[path = "editor/traversal_tests.rs"]
mod traversal_tests;

#[cfg(test)]
#[path = "editor/sanitizer_tests.rs"]
mod sanitizer_tests;


#[cfg(test)]
#[path = "editor/command_tests.rs"]
mod command_tests;

#[cfg(test)]
#[path = "editor/cursor_tests.rs"]
mod cursor_tests;


#[cfg(test)]
#[path = "editor/tracked_tests.rs"]
mod tracked_tests;
