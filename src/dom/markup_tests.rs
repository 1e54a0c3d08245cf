use super::markup::{decode_entities, parse_fragment};
use super::*;
use crate::error::MarkupError;
use pretty_assertions::assert_eq;

fn round_trip(markup: &str) -> String {
    let mut document = Document::new("editor");
    let root = document.root();
    document
        .set_inner_html(root, markup)
        .expect("markup parses");
    document.inner_html(root)
}

#[test]
fn serializes_class_before_other_attributes() {
    assert_eq!(
        round_trip("<p id=\"a\" class=\"x  y\" data-k='v'>t</p>"),
        "<p class=\"x y\" id=\"a\" data-k=\"v\">t</p>"
    );
}

#[test]
fn void_elements_have_no_closing_tag() {
    assert_eq!(
        round_trip("<p>a<br/>b</p><hr><img src=\"x.png\">"),
        "<p>a<br>b</p><hr><img src=\"x.png\">"
    );
}

#[test]
fn escapes_text_and_attributes() {
    assert_eq!(
        round_trip("<p title=\"a &quot;b&quot;\">1 &lt; 2 &amp; 3&nbsp;</p>"),
        "<p title=\"a &quot;b&quot;\">1 &lt; 2 &amp; 3&nbsp;</p>"
    );
}

#[test]
fn skips_comments_doctype_and_scripts() {
    assert_eq!(
        round_trip("<!doctype html><!-- note --><p>a</p><script>alert('<p>')</script><style>p{}</style>"),
        "<p>a</p>"
    );
}

#[test]
fn unmatched_closing_tags_are_ignored() {
    assert_eq!(round_trip("<p>a</span>b</p>c"), "<p>ab</p>c");
    assert_eq!(round_trip("<p><span>a</p>b"), "<p><span>a</span></p>b");
}

#[test]
fn lone_angle_bracket_is_text() {
    assert_eq!(round_trip("<p>a < b</p>"), "<p>a &lt; b</p>");
}

#[test]
fn unterminated_markup_is_an_error() {
    let mut document = Document::new("editor");
    assert_eq!(
        parse_fragment(&mut document, "<p>a<!-- open"),
        Err(MarkupError::Unterminated { offset: 4 })
    );
    assert!(matches!(
        parse_fragment(&mut document, "<p class=\"open>"),
        Err(MarkupError::UnterminatedAttribute { .. })
    ));
}

#[test]
fn decodes_numeric_entities() {
    assert_eq!(decode_entities("&#65;&#x42;&unknown;&"), "AB&unknown;&");
}

#[test]
fn fragment_serializes_as_children() {
    let mut document = Document::new("editor");
    let fragment = parse_fragment(&mut document, "<p>a</p><p>b</p>").expect("parses");
    assert_eq!(document.outer_html(fragment), "<p>a</p><p>b</p>");
    assert_eq!(document.parent(fragment), None);
}
