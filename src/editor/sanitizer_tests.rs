use super::*;
use pretty_assertions::assert_eq;

fn editor(html: &str) -> Editor {
    Editor::new(EditorOptions::new("editor").with_html(html)).expect("editor loads")
}

fn sanitized(html: &str) -> String {
    editor(html).html()
}

#[test]
fn empty_document_gets_a_blank_line() {
    assert_eq!(sanitized(""), "<p><br></p>");
    assert_eq!(sanitized("   \n  "), "<p><br></p>");
}

#[test]
fn loose_inline_content_is_wrapped_into_a_line() {
    assert_eq!(sanitized("Hello <b>world</b>"), "<p>Hello world</p>");
}

#[test]
fn whitespace_between_lines_is_dropped() {
    assert_eq!(sanitized("<p>a</p>\n  <p>b</p>"), "<p>a</p><p>b</p>");
}

#[test]
fn classless_inline_wrappers_are_unwrapped() {
    assert_eq!(
        sanitized("<p>a<span>b</span><em>c</em></p>"),
        "<p>abc</p>"
    );
}

#[test]
fn empty_lines_receive_a_break() {
    assert_eq!(sanitized("<p>a</p><p></p>"), "<p>a</p><p><br></p>");
}

#[test]
fn breaks_next_to_text_are_removed() {
    assert_eq!(sanitized("<p>a<br></p>"), "<p>a</p>");
}

#[test]
fn style_attributes_survive_only_where_permitted() {
    assert_eq!(sanitized("<p style=\"color: red;\">x</p>"), "<p>x</p>");
    assert_eq!(
        sanitized("<p><span class=\"_color\" style=\"color: red;\">x</span></p>"),
        "<p><span class=\"_color\" style=\"color: red;\">x</span></p>"
    );
}

#[test]
fn nested_duplicate_style_collapses() {
    assert_eq!(
        sanitized("<p><span class=\"_b\"><span class=\"_b\">x</span></span></p>"),
        "<p><span class=\"_b\">x</span></p>"
    );
}

#[test]
fn class_implied_by_parent_is_dropped() {
    assert_eq!(
        sanitized("<p><span class=\"_b\">a<span class=\"_b\">b</span></span></p>"),
        "<p><span class=\"_b\">ab</span></p>"
    );
}

#[test]
fn stop_class_without_style_to_stop_is_dropped() {
    assert_eq!(sanitized("<p><span class=\"_b_stop\">x</span></p>"), "<p>x</p>");
}

#[test]
fn competing_wrapper_gives_way_to_inner_style() {
    assert_eq!(
        sanitized("<p><span class=\"_small\"><span class=\"_h1\">x</span></span></p>"),
        "<p><span class=\"_h1\">x</span></p>"
    );
}

#[test]
fn atomic_content_is_locked() {
    let editor = editor("<p>see <span class=\"_hashtag_\">#tag</span> here</p>");
    let doc = editor.document();
    let hashtag = doc
        .descendants(doc.root())
        .into_iter()
        .find(|node| doc.class_of(*node) == crate::dom::NodeClass::Hashtag)
        .expect("hashtag kept");
    assert_eq!(doc.attribute(hashtag, "contenteditable"), Some("false"));
    assert!(
        doc.attribute(hashtag, "id")
            .is_some_and(|id| id.starts_with("hashtag"))
    );
    assert_eq!(doc.text_content(doc.root()), "see #tag here");
}

#[test]
fn blocks_at_the_edges_get_flanking_lines() {
    assert_eq!(sanitized("<hr>"), "<p><br></p><hr><p><br></p>");
    assert_eq!(
        sanitized("<p>a</p><hr><p>b</p>"),
        "<p>a</p><hr><p>b</p>"
    );
}

#[test]
fn removing_the_line_after_a_divider_restores_a_flanking_line() {
    let mut editor = editor("<p>a</p><hr><p>b</p>");
    let root = editor.root();
    let last = editor.document().last_child(root).expect("line");
    editor.document_mut().remove(last);
    editor.reconcile().expect("reconciles");
    assert_eq!(editor.html(), "<p>a</p><hr><p><br></p>");
}

#[test]
fn lone_unselectable_gets_a_text_anchor() {
    let mut editor = editor("<p>a<span class=\"_hashtag_\">#tag</span></p>");
    let root = editor.root();
    let paragraph = editor.document().children(root)[0];
    let text = editor.document().children(paragraph)[0];
    editor.document_mut().remove(text);
    editor.reconcile().expect("reconciles");

    let doc = editor.document();
    let children = doc.children(paragraph);
    assert_eq!(children.len(), 2);
    assert_eq!(doc.class_of(children[0]), crate::dom::NodeClass::Hashtag);
    assert!(doc.is_text(children[1]));
}

#[test]
fn sanitizing_twice_changes_nothing() {
    let mut editor = editor(
        "text<p><span>x</span></p><blockquote>q<p></p></blockquote><ul><li>a<br></li></ul><hr>",
    );
    let once = editor.html();
    editor.sanitize_document().expect("sanitizes");
    assert_eq!(editor.html(), once);
}

#[test]
fn loose_text_in_a_quote_becomes_a_line() {
    assert_eq!(
        sanitized("<blockquote>quoted</blockquote>"),
        "<blockquote><p>quoted</p></blockquote>"
    );
}

#[test]
fn emptied_quote_is_removed_on_reconcile() {
    let mut editor = editor("<p>a</p><blockquote><p>q</p></blockquote>");
    let root = editor.root();
    let quote = editor.document().children(root)[1];
    let inner = editor.document().first_child(quote).expect("line");
    editor.document_mut().remove(inner);
    editor.reconcile().expect("reconciles");
    assert_eq!(editor.html(), "<p>a</p>");
}

#[test]
fn emptied_root_is_refilled_on_reconcile() {
    let mut editor = editor("<p>a</p>");
    let root = editor.root();
    let only = editor.document().children(root)[0];
    editor.document_mut().remove(only);
    editor.reconcile().expect("reconciles");
    assert_eq!(editor.html(), "<p><br></p>");
}

#[test]
fn host_insertions_are_repaired_on_reconcile() {
    let mut editor = editor("<p>a</p>");
    let root = editor.root();
    let doc = editor.document_mut();
    let stray = doc.create_text("loose");
    doc.append_child(root, stray).expect("append");
    let wrapper = doc.create_element("font");
    let inner = doc.create_text("b");
    doc.append_child(wrapper, inner).expect("append");
    let first = doc.first_child(root).expect("line");
    doc.append_child(first, wrapper).expect("append");

    editor.reconcile().expect("reconciles");
    assert_eq!(editor.html(), "<p>ab</p><p>loose</p>");
}

#[test]
fn class_removal_unwraps_bare_span() {
    let mut editor = editor("<p>a<span class=\"_i\">b</span></p>");
    let doc = editor.document();
    let span = doc
        .descendants(doc.root())
        .into_iter()
        .find(|node| doc.is_tag(*node, "span"))
        .expect("span");
    editor.document_mut().remove_class(span, "_i");
    editor.reconcile().expect("reconciles");
    assert_eq!(editor.html(), "<p>ab</p>");
}
