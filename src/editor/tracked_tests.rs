use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::dom::NodeClass;
use pretty_assertions::assert_eq;

fn hashtag_options(html: &str) -> EditorOptions {
    EditorOptions::new("editor")
        .with_html(html)
        .with_hashtags(true)
}

fn hashtag_span(editor: &Editor) -> NodeId {
    let doc = editor.document();
    doc.descendants(doc.root())
        .into_iter()
        .find(|node| doc.class_of(*node) == NodeClass::Hashtag)
        .expect("hashtag tagged")
}

/// Records every payload as JSON and answers with no enrichment.
fn recording_callback(
    log: &Rc<RefCell<Vec<serde_json::Value>>>,
) -> impl FnMut(Ticket, &CallbackPayload) -> CallbackReply + 'static {
    let log = Rc::clone(log);
    move |_: Ticket, payload: &CallbackPayload| {
        let value = serde_json::to_value(payload).expect("payload serializes");
        log.borrow_mut().push(value);
        CallbackReply::Done(Enrichment::new())
    }
}

#[test]
fn hashtags_in_loaded_text_are_tagged_and_tracked() {
    let editor = Editor::new(hashtag_options("<p>hello #rust world</p>")).expect("editor loads");
    let span = hashtag_span(&editor);
    let doc = editor.document();
    assert_eq!(doc.text_content(span), "#rust");
    assert_eq!(doc.attribute(span, "contenteditable"), Some("false"));
    assert_eq!(doc.text_content(doc.root()), "hello #rust world");

    let hashtags = editor.tracked().list(TrackedKind::Hashtag);
    assert_eq!(hashtags.len(), 1);
    assert_eq!(hashtags[0].tag.as_deref(), Some("rust"));
    assert_eq!(hashtags[0].element, span);
    assert!(hashtags[0].element_id.starts_with("hashtag_"));
}

#[test]
fn urls_are_tagged_when_enabled() {
    let options = EditorOptions::new("editor")
        .with_html("<p>see https://example.com/page now</p>")
        .with_urllinks(true);
    let editor = Editor::new(options).expect("editor loads");
    let links = editor.tracked().list(TrackedKind::Urllink);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].url.as_deref(), Some("https://example.com/page"));
    assert!(editor.tracked().list(TrackedKind::Hashtag).is_empty());
}

#[test]
fn classification_is_off_by_default() {
    let editor = Editor::new(EditorOptions::new("editor").with_html("<p>#rust</p>"))
        .expect("editor loads");
    assert_eq!(editor.html(), "<p>#rust</p>");
    assert!(editor.tracked().list(TrackedKind::Hashtag).is_empty());
}

#[test]
fn typed_hashtag_is_tagged_when_completed() {
    let mut editor = Editor::new(hashtag_options("")).expect("editor loads");
    for ch in ['#', 'r', 's'] {
        editor.handle_key(Key::Char(ch)).expect("typed");
    }
    assert!(editor.tracked().list(TrackedKind::Hashtag).is_empty());

    editor.handle_key(Key::Char(' ')).expect("typed");
    let hashtags = editor.tracked().list(TrackedKind::Hashtag);
    assert_eq!(hashtags.len(), 1);
    assert_eq!(hashtags[0].tag.as_deref(), Some("rs"));
    let root = editor.root();
    assert_eq!(editor.document().text_content(root), "#rs ");
}

#[test]
fn payloads_serialize_only_the_keys_they_carry() {
    let log = Rc::new(RefCell::new(Vec::new()));
    Editor::with_callback(
        hashtag_options("<p>hello #rust</p>"),
        recording_callback(&log),
    )
    .expect("editor loads");

    let log = log.borrow();
    let announced = log
        .iter()
        .find(|value| value.get("hashtag").is_some())
        .expect("hashtags announced");
    assert_eq!(announced["hashtag"][0]["tag"], serde_json::json!("rust"));
    assert!(
        announced["hashtag"][0]["elementId"]
            .as_str()
            .is_some_and(|id| id.starts_with("hashtag_"))
    );
    assert!(announced.get("commandTracker").is_none());

    let last = log.last().expect("selection reported");
    assert_eq!(last["caratPosition"], serde_json::json!({ "row": 0, "column": 0 }));
    assert_eq!(last["commandTracker"]["bold"], serde_json::json!(false));
    assert!(last.get("image").is_none());
}

#[test]
fn synchronous_enrichment_styles_and_binds_clicks() {
    let clicked: Rc<RefCell<Vec<Option<String>>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&clicked);
    let callback = move |_: Ticket, payload: &CallbackPayload| {
        let mut enrichment = Enrichment::new();
        for item in payload.items(TrackedKind::Hashtag).unwrap_or_default() {
            let sink = Rc::clone(&sink);
            let enriched = item
                .clone()
                .with_style("color", "#0000ff")
                .with_onclick(move |item| sink.borrow_mut().push(item.tag.clone()));
            enrichment = enrichment.with(TrackedKind::Hashtag, enriched);
        }
        CallbackReply::Done(enrichment)
    };
    let mut editor =
        Editor::with_callback(hashtag_options("<p>a #rust b</p>"), callback).expect("editor loads");

    let span = hashtag_span(&editor);
    let hashtags = editor.tracked().list(TrackedKind::Hashtag);
    assert_eq!(hashtags.len(), 1);
    assert_eq!(
        hashtags[0].style.get("color").map(String::as_str),
        Some("#0000ff")
    );
    assert_eq!(
        editor.document().attribute(span, "style"),
        Some("color: #0000ff;")
    );

    let inner = editor.document().first_child(span).expect("hashtag text");
    assert!(editor.click(inner));
    assert_eq!(*clicked.borrow(), vec![Some("rust".to_string())]);

    let root = editor.root();
    let line = editor.document().first_child(root).expect("line");
    assert!(!editor.click(line));
}

#[test]
fn deferred_enrichment_is_applied_when_resolved() {
    let tickets: Rc<RefCell<Vec<(Ticket, TrackedItem)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&tickets);
    let callback = move |ticket: Ticket, payload: &CallbackPayload| {
        if let Some(items) = payload.items(TrackedKind::Hashtag) {
            for item in items {
                sink.borrow_mut().push((ticket, item.clone()));
            }
        }
        CallbackReply::Deferred
    };
    let mut editor =
        Editor::with_callback(hashtag_options("<p>#rust</p>"), callback).expect("editor loads");
    assert_eq!(editor.pending_enrichments(), 1);

    let (ticket, item) = tickets.borrow()[0].clone();
    let enrichment = Enrichment::new().with(
        TrackedKind::Hashtag,
        item.with_style("background", "#00ff00"),
    );
    editor
        .resolve_enrichment(ticket, Ok(enrichment))
        .expect("resolves");
    assert_eq!(editor.pending_enrichments(), 0);
    let hashtags = editor.tracked().list(TrackedKind::Hashtag);
    assert_eq!(
        hashtags[0].style.get("background").map(String::as_str),
        Some("#00ff00")
    );

    // a second answer for the same ticket is dropped
    editor
        .resolve_enrichment(ticket, Ok(Enrichment::new()))
        .expect("ignored");
    assert_eq!(editor.tracked().list(TrackedKind::Hashtag).len(), 1);
}

#[test]
fn failed_enrichment_keeps_the_content() {
    let tickets: Rc<RefCell<Vec<Ticket>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&tickets);
    let callback = move |ticket: Ticket, payload: &CallbackPayload| {
        if payload.items(TrackedKind::Hashtag).is_some() {
            sink.borrow_mut().push(ticket);
        }
        CallbackReply::Deferred
    };
    let mut editor =
        Editor::with_callback(hashtag_options("<p>#rust</p>"), callback).expect("editor loads");
    let ticket = tickets.borrow()[0];
    editor
        .resolve_enrichment(ticket, Err("lookup failed".to_string()))
        .expect("failure is not an error");
    assert_eq!(editor.pending_enrichments(), 0);
    assert_eq!(editor.tracked().list(TrackedKind::Hashtag).len(), 1);
    assert_eq!(editor.document().text_content(editor.root()), "#rust");
}

#[test]
fn removed_atomic_content_is_reported() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut editor = Editor::with_callback(
        hashtag_options("<p>hello #rust</p>"),
        recording_callback(&log),
    )
    .expect("editor loads");
    let span = hashtag_span(&editor);
    editor.document_mut().remove(span);
    editor.reconcile().expect("reconciles");

    assert!(editor.tracked().list(TrackedKind::Hashtag).is_empty());
    let log = log.borrow();
    let removed = log
        .iter()
        .rev()
        .find(|value| value.get("removed").is_some())
        .expect("removal reported");
    assert_eq!(removed["removed"]["hashtag"][0]["tag"], serde_json::json!("rust"));
}

#[test]
fn detaching_drops_pending_enrichment() {
    let callback = |_: Ticket, _: &CallbackPayload| CallbackReply::Deferred;
    let mut editor =
        Editor::with_callback(hashtag_options("<p>#rust</p>"), callback).expect("editor loads");
    assert_eq!(editor.pending_enrichments(), 1);
    editor.detach();
    assert_eq!(editor.pending_enrichments(), 0);
}

#[test]
fn loaded_ids_are_kept_whatever_their_prefix() {
    let editor = Editor::new(EditorOptions::new("editor").with_html(
        "<p>a</p><div class=\"_custom_\" id=\"weather\"><p>inside</p></div><p>b</p>",
    ))
    .expect("editor loads");
    let customs = editor.tracked().list(TrackedKind::Custom);
    assert_eq!(customs.len(), 1);
    assert_eq!(customs[0].element_id, "weather");
    assert_eq!(editor.document().find_by_id("weather"), Some(customs[0].element));
}

#[test]
fn removed_widget_is_forgotten_by_node_not_id() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut editor = Editor::with_callback(
        EditorOptions::new("editor").with_html("<p>a</p>"),
        recording_callback(&log),
    )
    .expect("editor loads");
    let spec = CustomSpec {
        element_id: Some("weather".to_string()),
        markup: "<p>inside</p>".to_string(),
        ..CustomSpec::default()
    };
    editor
        .apply_command(Command::Custom(spec))
        .expect("command applies");
    assert_eq!(editor.tracked().list(TrackedKind::Custom).len(), 1);

    let widget = editor.document().find_by_id("weather").expect("widget");
    editor.document_mut().remove(widget);
    editor.reconcile().expect("reconciles");

    assert!(editor.tracked().list(TrackedKind::Custom).is_empty());
    let log = log.borrow();
    let removed = log
        .iter()
        .rev()
        .find(|value| value.get("removed").is_some())
        .expect("removal reported");
    assert_eq!(
        removed["removed"]["custom"][0]["elementId"],
        serde_json::json!("weather")
    );
}

#[test]
fn pasted_hashtags_are_tagged() {
    let mut editor = Editor::new(hashtag_options("<p>a</p>")).expect("editor loads");
    let root = editor.root();
    let line = editor.document().first_child(root).expect("line");
    editor.set_caret(line, Position::End).expect("caret");
    editor.paste(" hello #rust and more").expect("pasted");

    let hashtags = editor.tracked().list(TrackedKind::Hashtag);
    assert_eq!(hashtags.len(), 1);
    assert_eq!(hashtags[0].tag.as_deref(), Some("rust"));
    assert_eq!(editor.document().text_content(root), "a hello #rust and more");
    assert_eq!(
        editor.caret_position().expect("caret"),
        Some(CaretPosition { row: 0, column: 22 })
    );
}
