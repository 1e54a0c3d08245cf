use super::*;
use crate::dom::MEDIA_CLASS;
use pretty_assertions::assert_eq;

fn editor(html: &str) -> Editor {
    Editor::new(EditorOptions::new("editor").with_html(html)).expect("editor loads")
}

fn text_node(editor: &Editor, text: &str) -> NodeId {
    let doc = editor.document();
    doc.descendants(doc.root())
        .into_iter()
        .find(|node| doc.text(*node) == Some(text))
        .unwrap_or_else(|| panic!("no text node {text:?}"))
}

fn select_text(editor: &mut Editor, text: &str) {
    let node = text_node(editor, text);
    let length = text.chars().count();
    editor
        .set_selection(PositionRequest::range(
            EndpointSpec::offset(node, 0),
            EndpointSpec::offset(node, length),
        ))
        .expect("resolves")
        .expect("not aborted");
}

#[test]
fn parses_structural_style_and_color_verbs() {
    let editor = editor("<p>a</p>");
    assert_eq!(editor.parse_command("quote").expect("verb parses"), Command::Quote);
    assert_eq!(editor.parse_command("orderedList").expect("verb parses"), Command::OrderedList);
    assert_eq!(editor.parse_command("image").expect("verb parses"), Command::RequestImage);
    assert_eq!(
        editor.parse_command("bold").expect("verb parses"),
        Command::Style("bold".to_string())
    );
    assert_eq!(editor.parse_command("color").expect("verb parses"), Command::Color(None));
    assert_eq!(
        editor.parse_command("red").expect("verb parses"),
        Command::Color(Some("#ff0000".to_string()))
    );
    assert!(matches!(
        editor.parse_command("sparkle"),
        Err(EditorError::UnknownCommand(verb)) if verb == "sparkle"
    ));
}

#[test]
fn bold_wraps_and_unwraps_the_selection() {
    let mut editor = editor("<p>Hello</p>");
    select_text(&mut editor, "Hello");
    assert_eq!(editor.command("bold").expect("command applies"), CommandOutcome::Applied);
    assert_eq!(editor.html(), "<p><span class=\"_b\">Hello</span></p>");
    assert!(editor.active_styles().is_active("bold"));

    select_text(&mut editor, "Hello");
    assert_eq!(editor.command("bold").expect("command applies"), CommandOutcome::Removed);
    assert_eq!(editor.html(), "<p>Hello</p>");
}

#[test]
fn heading_replaces_competing_heading() {
    let mut editor = editor("<p><span class=\"_h2\">Title</span></p>");
    select_text(&mut editor, "Title");
    assert_eq!(editor.command("h1").expect("command applies"), CommandOutcome::Applied);
    assert_eq!(editor.html(), "<p><span class=\"_h1\">Title</span></p>");
}

#[test]
fn heading_on_part_of_a_heading_splits_the_old_one() {
    let mut editor = editor("<p><span class=\"_h2\">Hello world</span></p>");
    let text = text_node(&editor, "Hello world");
    editor
        .set_selection(PositionRequest::range(
            EndpointSpec::offset(text, 6),
            EndpointSpec::offset(text, 11),
        ))
        .expect("resolves")
        .expect("not aborted");

    assert_eq!(editor.command("h1").expect("command applies"), CommandOutcome::Applied);
    assert_eq!(
        editor.html(),
        "<p><span class=\"_h2\">Hello </span><span class=\"_h1\">world</span></p>"
    );
    assert!(editor.active_styles().is_active("h1"));
    assert!(!editor.active_styles().is_active("h2"));
}

#[test]
fn heading_across_lines_wraps_each_line_separately() {
    let mut editor = editor(
        "<p><span class=\"_h2\">a</span></p><p><span class=\"_h2\">b</span></p>",
    );
    let a = text_node(&editor, "a");
    let b = text_node(&editor, "b");
    editor
        .set_selection(PositionRequest::range(
            EndpointSpec::offset(a, 0),
            EndpointSpec::offset(b, 1),
        ))
        .expect("resolves")
        .expect("not aborted");

    assert_eq!(editor.command("h1").expect("command applies"), CommandOutcome::Applied);
    assert_eq!(
        editor.html(),
        "<p><span class=\"_h1\">a</span></p><p><span class=\"_h1\">b</span></p>"
    );
    assert!(editor.active_styles().is_active("h1"));
    assert!(!editor.active_styles().is_active("h2"));
}

#[test]
fn color_value_becomes_a_colored_span() {
    let mut editor = editor("<p>Hello</p>");
    select_text(&mut editor, "Hello");
    assert_eq!(editor.command("red").expect("command applies"), CommandOutcome::Applied);
    assert_eq!(
        editor.html(),
        "<p><span class=\"_color\" style=\"color: #ff0000;\">Hello</span></p>"
    );
}

#[test]
fn divider_in_empty_editor_is_flanked_by_lines() {
    let mut editor = Editor::new(EditorOptions::new("editor")).expect("editor loads");
    assert_eq!(editor.command("divider").expect("command applies"), CommandOutcome::Applied);
    assert_eq!(
        editor.html(),
        "<p><br></p><hr contenteditable=\"false\"><p><br></p>"
    );
    let root = editor.root();
    let last = editor.document().last_child(root).expect("line");
    assert_eq!(
        editor.selection().map(|selection| selection.start.node),
        Some(last)
    );
}

#[test]
fn quote_wraps_selected_lines_and_toggles_off() {
    let mut editor = editor("<p>a</p><p>b</p>");
    let a = text_node(&editor, "a");
    let b = text_node(&editor, "b");
    editor
        .set_selection(PositionRequest::range(
            EndpointSpec::offset(a, 0),
            EndpointSpec::offset(b, 1),
        ))
        .expect("resolves")
        .expect("not aborted");

    assert_eq!(editor.command("quote").expect("command applies"), CommandOutcome::Applied);
    assert_eq!(
        editor.html(),
        "<blockquote><p>a</p><p>b</p></blockquote><p><br></p>"
    );
    assert!(editor.active_styles().is_active("quote"));

    assert_eq!(editor.command("quote").expect("command applies"), CommandOutcome::Removed);
    assert_eq!(editor.html(), "<p>a</p><p>b</p><p><br></p>");
}

#[test]
fn list_is_inserted_after_the_current_line() {
    let mut editor = editor("<p>a</p>");
    assert_eq!(editor.command("unorderedList").expect("command applies"), CommandOutcome::Applied);
    assert_eq!(editor.html(), "<p>a</p><ul><li><br></li></ul><p><br></p>");
}

#[test]
fn alignment_toggles_on_every_selected_line() {
    let mut editor = editor("<p>a</p><p>b</p>");
    let a = text_node(&editor, "a");
    let b = text_node(&editor, "b");
    editor
        .set_selection(PositionRequest::range(
            EndpointSpec::offset(a, 0),
            EndpointSpec::offset(b, 1),
        ))
        .expect("resolves")
        .expect("not aborted");

    assert_eq!(editor.command("alignCenter").expect("command applies"), CommandOutcome::Applied);
    assert_eq!(
        editor.html(),
        "<p class=\"_alignCenter_\">a</p><p class=\"_alignCenter_\">b</p>"
    );
    assert!(editor.active_styles().is_active("alignCenter"));

    assert_eq!(editor.command("alignCenter").expect("command applies"), CommandOutcome::Removed);
    assert_eq!(editor.html(), "<p>a</p><p>b</p>");
}

#[test]
fn style_over_media_is_rejected() {
    let mut editor =
        editor("<p>a</p><div class=\"_media_\"><img src=\"x.png\"></div><p>b</p>");
    let before = editor.html();
    let a = text_node(&editor, "a");
    let b = text_node(&editor, "b");
    editor
        .set_selection(PositionRequest::range(
            EndpointSpec::offset(a, 0),
            EndpointSpec::offset(b, 1),
        ))
        .expect("resolves")
        .expect("not aborted");

    assert_eq!(editor.command("bold").expect("command applies"), CommandOutcome::Rejected);
    assert_eq!(editor.html(), before);
}

#[test]
fn quote_over_divider_is_rejected() {
    let mut editor = editor("<p>a</p><hr><p>b</p>");
    let before = editor.html();
    let a = text_node(&editor, "a");
    let b = text_node(&editor, "b");
    editor
        .set_selection(PositionRequest::range(
            EndpointSpec::offset(a, 0),
            EndpointSpec::offset(b, 1),
        ))
        .expect("resolves")
        .expect("not aborted");
    assert_eq!(editor.command("quote").expect("command applies"), CommandOutcome::Rejected);
    assert_eq!(editor.html(), before);
}

#[test]
fn image_request_is_left_to_the_host() {
    let mut editor = editor("<p>a</p>");
    assert_eq!(editor.command("image").expect("command applies"), CommandOutcome::ImageRequested);
    assert_eq!(editor.html(), "<p>a</p>");
}

#[test]
fn images_are_inserted_and_tracked() {
    let mut editor = editor("<p>a</p>");
    let outcome = editor.apply_command(Command::Image(vec![ImageSource::new("cat.png")]));
    assert_eq!(outcome.expect("images inserted"), CommandOutcome::Applied);

    let images = editor.tracked().list(TrackedKind::Image);
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].source.as_deref(), Some("cat.png"));

    let doc = editor.document();
    let root = doc.root();
    let media = doc.children(root)[1];
    assert!(doc.has_class(media, MEDIA_CLASS));
    assert_eq!(doc.attribute(media, "contenteditable"), Some("false"));
    assert_eq!(
        doc.first_child(media),
        Some(images[0].element)
    );
    assert_eq!(
        editor
            .apply_command(Command::Image(Vec::new()))
            .expect("command applies"),
        CommandOutcome::Rejected
    );
}

#[test]
fn custom_widget_is_spliced_and_tracked() {
    let mut editor = editor("<p>a</p>");
    let spec = CustomSpec {
        element_id: Some("custom_widget".to_string()),
        markup: "<p>inside</p>".to_string(),
        ..CustomSpec::default()
    };
    assert_eq!(
        editor
            .apply_command(Command::Custom(spec))
            .expect("command applies"),
        CommandOutcome::Applied
    );
    let customs = editor.tracked().list(TrackedKind::Custom);
    assert_eq!(customs.len(), 1);
    assert_eq!(customs[0].element_id, "custom_widget");
    let widget = editor.document().find_by_id("custom_widget").expect("widget");
    assert_eq!(editor.document().attribute(widget, "contenteditable"), Some("false"));
}

#[test]
fn detached_editor_refuses_commands() {
    let mut editor = editor("<p>a</p>");
    editor.detach();
    assert!(matches!(editor.command("bold"), Err(EditorError::Detached)));
}
