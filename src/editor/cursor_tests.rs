use super::*;
use crate::dom::{BoundaryPoint, Document};
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

fn caret_at(editor: &mut Editor, node: NodeId, offset: usize) {
    editor
        .set_selection(PositionRequest::caret(EndpointSpec::offset(node, offset)))
        .expect("resolves")
        .expect("not aborted");
}

fn caret(editor: &Editor) -> BoundaryPoint {
    let selection = editor.selection().expect("selection");
    assert!(selection.collapsed(), "expected a caret, got {selection:?}");
    selection.start
}

fn press(editor: &mut Editor, input: impl Into<KeyInput>) -> KeyOutcome {
    editor.handle_key(input).expect("key handled")
}

struct FixedWidth(usize);

impl Geometry for FixedWidth {
    fn wrap_width(&self, _document: &Document, _line: NodeId) -> Option<usize> {
        Some(self.0)
    }
}

#[test]
fn typing_replaces_the_placeholder_break() {
    let mut editor = Editor::new(EditorOptions::new("editor")).expect("editor loads");
    assert_eq!(press(&mut editor, Key::Char('h')), KeyOutcome::Handled);
    assert_eq!(press(&mut editor, Key::Char('i')), KeyOutcome::Handled);
    assert_eq!(editor.html(), "<p>hi</p>");
    assert_eq!(
        editor.caret_position().expect("caret"),
        Some(CaretPosition { row: 0, column: 2 })
    );
}

#[test]
fn enter_splits_the_line() {
    let mut editor = editor("<p>Hello</p>");
    let hello = text_node(&editor, "Hello");
    caret_at(&mut editor, hello, 2);
    assert_eq!(press(&mut editor, Key::Enter), KeyOutcome::Handled);
    assert_eq!(editor.html(), "<p>He</p><p>llo</p>");
    let llo = text_node(&editor, "llo");
    assert_eq!(caret(&editor), BoundaryPoint::new(llo, 0));
}

#[test]
fn enter_on_empty_last_item_leaves_the_list() {
    let mut editor = editor("<ul><li>a</li><li><br></li></ul>");
    let list = editor.document().first_child(editor.root()).expect("list");
    let item = editor.document().last_child(list).expect("item");
    editor
        .set_selection(PositionRequest::caret(EndpointSpec::start(item)))
        .expect("resolves");
    press(&mut editor, Key::Enter);
    assert_eq!(editor.html(), "<ul><li>a</li></ul><p><br></p>");
}

#[test]
fn shift_enter_outside_a_list_is_prevented() {
    let mut editor = editor("<p>ab</p>");
    let ab = text_node(&editor, "ab");
    caret_at(&mut editor, ab, 1);
    assert_eq!(
        press(&mut editor, KeyInput::new(Key::Enter).with_shift()),
        KeyOutcome::Prevented
    );
    assert_eq!(editor.html(), "<p>ab</p>");
}

#[test]
fn backspace_at_line_start_merges_with_previous_line() {
    let mut editor = editor("<p>ab</p><p>cd</p>");
    let cd = text_node(&editor, "cd");
    caret_at(&mut editor, cd, 0);
    assert_eq!(press(&mut editor, Key::Backspace), KeyOutcome::Handled);
    assert_eq!(editor.html(), "<p>abcd</p>");
    assert_eq!(
        editor.caret_position().expect("caret"),
        Some(CaretPosition { row: 0, column: 2 })
    );
}

#[test]
fn backspace_in_the_only_empty_line_is_prevented() {
    let mut editor = Editor::new(EditorOptions::new("editor")).expect("editor loads");
    assert_eq!(press(&mut editor, Key::Backspace), KeyOutcome::Prevented);
    assert_eq!(editor.html(), "<p><br></p>");
}

#[test]
fn backspace_removes_a_divider_above() {
    let mut editor = editor("<p>a</p><hr><p>b</p>");
    let b = text_node(&editor, "b");
    caret_at(&mut editor, b, 0);
    assert_eq!(press(&mut editor, Key::Backspace), KeyOutcome::Handled);
    assert_eq!(editor.html(), "<p>a</p><p>b</p>");
}

#[test]
fn backspace_on_first_quoted_line_removes_the_quote() {
    let mut editor = editor("<blockquote><p>q</p></blockquote>");
    let q = text_node(&editor, "q");
    caret_at(&mut editor, q, 0);
    assert_eq!(press(&mut editor, Key::Backspace), KeyOutcome::Handled);
    assert_eq!(editor.html(), "<p>q</p>");
}

#[test]
fn delete_removes_the_next_character() {
    let mut editor = editor("<p>abc</p>");
    let abc = text_node(&editor, "abc");
    caret_at(&mut editor, abc, 1);
    assert_eq!(press(&mut editor, Key::Delete), KeyOutcome::Handled);
    assert_eq!(editor.html(), "<p>ac</p>");
    assert_eq!(caret(&editor), BoundaryPoint::new(abc, 1));
}

#[test]
fn left_at_line_start_moves_to_previous_line_end() {
    let mut editor = editor("<p>ab</p><p>cd</p>");
    let ab = text_node(&editor, "ab");
    let cd = text_node(&editor, "cd");
    caret_at(&mut editor, cd, 0);
    press(&mut editor, Key::Left);
    assert_eq!(caret(&editor), BoundaryPoint::new(ab, 2));

    caret_at(&mut editor, ab, 0);
    assert_eq!(press(&mut editor, Key::Left), KeyOutcome::Prevented);
}

#[test]
fn shift_right_extends_the_selection() {
    let mut editor = editor("<p>ab</p>");
    let ab = text_node(&editor, "ab");
    caret_at(&mut editor, ab, 0);
    press(&mut editor, KeyInput::new(Key::Right).with_shift());
    let selection = editor.selection().expect("selection");
    assert_eq!(selection.start, BoundaryPoint::new(ab, 0));
    assert_eq!(selection.end, BoundaryPoint::new(ab, 1));
    assert_eq!(selection.direction, Direction::Forward);
}

#[test]
fn ctrl_arrows_jump_by_word() {
    let mut editor = editor("<p>hello world</p>");
    let text = text_node(&editor, "hello world");
    caret_at(&mut editor, text, 0);
    press(&mut editor, KeyInput::new(Key::Right).with_ctrl());
    assert_eq!(caret(&editor), BoundaryPoint::new(text, 6));

    caret_at(&mut editor, text, 11);
    press(&mut editor, KeyInput::new(Key::Left).with_ctrl());
    assert_eq!(caret(&editor), BoundaryPoint::new(text, 6));
}

#[test]
fn vertical_moves_keep_the_column_and_clamp() {
    let mut editor = editor("<p>abcd</p><p>xy</p>");
    let abcd = text_node(&editor, "abcd");
    let xy = text_node(&editor, "xy");
    caret_at(&mut editor, abcd, 3);
    press(&mut editor, Key::Down);
    assert_eq!(caret(&editor), BoundaryPoint::new(xy, 2));
    press(&mut editor, Key::Up);
    assert_eq!(caret(&editor), BoundaryPoint::new(abcd, 2));
}

#[test]
fn down_leaps_over_a_divider() {
    let mut editor = editor("<p>a</p><hr><p>b</p>");
    let a = text_node(&editor, "a");
    let b = text_node(&editor, "b");
    caret_at(&mut editor, a, 0);
    press(&mut editor, Key::Down);
    assert_eq!(caret(&editor), BoundaryPoint::new(b, 0));
    assert_eq!(editor.html(), "<p>a</p><hr><p>b</p>");
}

#[test]
fn wrapped_lines_are_walked_row_by_row() {
    let mut editor = editor("<p>abcdefgh</p>");
    let text = text_node(&editor, "abcdefgh");
    caret_at(&mut editor, text, 1);
    let outcome = editor
        .handle_key_with(KeyInput::new(Key::Down), &FixedWidth(4))
        .expect("key handled");
    assert_eq!(outcome, KeyOutcome::Handled);
    assert_eq!(caret(&editor), BoundaryPoint::new(text, 5));
}

#[test]
fn home_and_end_reach_line_edges() {
    let mut editor = editor("<p>abc</p>");
    let abc = text_node(&editor, "abc");
    caret_at(&mut editor, abc, 1);
    press(&mut editor, Key::End);
    assert_eq!(caret(&editor), BoundaryPoint::new(abc, 3));
    press(&mut editor, Key::Home);
    assert_eq!(caret(&editor), BoundaryPoint::new(abc, 0));
}

#[test]
fn tab_indents_and_shift_tab_outdents() {
    let mut editor = editor("<p>ab</p>");
    let ab = text_node(&editor, "ab");
    caret_at(&mut editor, ab, 0);
    press(&mut editor, Key::Tab);
    assert_eq!(editor.document().text(ab), Some("\tab"));

    press(&mut editor, KeyInput::new(Key::Tab).with_shift());
    assert_eq!(editor.html(), "<p>ab</p>");
    assert_eq!(caret(&editor), BoundaryPoint::new(ab, 0));
}

#[test]
fn read_only_editor_ignores_editing_keys() {
    let mut options = EditorOptions::new("editor").with_html("<p>a</p>");
    options.editable = false;
    let mut editor = Editor::new(options).expect("editor loads");
    assert_eq!(press(&mut editor, Key::Char('x')), KeyOutcome::Ignored);
    assert_eq!(press(&mut editor, Key::End), KeyOutcome::Handled);
    assert_eq!(editor.html(), "<p>a</p>");
}

#[test]
fn detached_editor_ignores_keys() {
    let mut editor = editor("<p>a</p>");
    editor.detach();
    assert_eq!(press(&mut editor, Key::Char('x')), KeyOutcome::Ignored);
    assert_eq!(editor.html(), "<p>a</p>");
}

#[test]
fn display_width_counts_tabs_and_wide_characters() {
    assert_eq!(display_width("a\tb"), 2 + TAB_WIDTH);
    assert_eq!(display_width("日本"), 4);
    assert_eq!(char_width('\u{200B}'), 0);
}
