use std::cmp::Ordering;

use super::*;
use pretty_assertions::assert_eq;

fn document_with(markup: &str) -> Document {
    let mut document = Document::new("editor");
    let root = document.root();
    document
        .set_inner_html(root, markup)
        .expect("markup parses");
    document
}

fn texts(document: &Document) -> Vec<NodeId> {
    document
        .descendants(document.root())
        .into_iter()
        .filter(|node| document.is_text(*node))
        .collect()
}

#[test]
fn compares_points_in_document_order() {
    let document = document_with("<p>ab</p><p>cd</p>");
    let root = document.root();
    let [first, second] = texts(&document)[..] else {
        panic!("two text nodes expected");
    };
    let a = BoundaryPoint::new(first, 1);
    let b = BoundaryPoint::new(second, 0);
    assert_eq!(document.compare_points(a, b), Ordering::Less);
    assert_eq!(document.compare_points(b, a), Ordering::Greater);
    assert_eq!(document.compare_points(a, a), Ordering::Equal);

    // (root, 1) sits between the two paragraphs
    let between = BoundaryPoint::new(root, 1);
    assert_eq!(document.compare_points(a, between), Ordering::Less);
    assert_eq!(document.compare_points(between, b), Ordering::Less);
}

#[test]
fn common_ancestor_is_inclusive() {
    let document = document_with("<blockquote><p>a</p><p>b</p></blockquote>");
    let nodes = texts(&document);
    let quote = document.first_child(document.root()).expect("quote");
    assert_eq!(document.common_ancestor(nodes[0], nodes[1]), Some(quote));
    assert_eq!(document.common_ancestor(quote, nodes[1]), Some(quote));
}

#[test]
fn extracts_within_one_text_node() {
    let mut document = document_with("<p>Hello</p>");
    let text = texts(&document)[0];
    let (fragment, collapse) = document
        .extract_contents(BoundaryPoint::new(text, 1), BoundaryPoint::new(text, 4))
        .expect("extract");
    assert_eq!(document.inner_html(fragment), "ell");
    assert_eq!(document.text(text), Some("Ho"));
    assert_eq!(collapse, BoundaryPoint::new(text, 1));
}

#[test]
fn extracts_across_lines_splitting_partial_ancestors() {
    let mut document = document_with("<p>abc</p><p>def</p><p>ghi</p>");
    let nodes = texts(&document);
    let root = document.root();
    let (fragment, collapse) = document
        .extract_contents(
            BoundaryPoint::new(nodes[0], 1),
            BoundaryPoint::new(nodes[2], 2),
        )
        .expect("extract");
    assert_eq!(
        document.inner_html(fragment),
        "<p>bc</p><p>def</p><p>gh</p>"
    );
    assert_eq!(document.inner_html(root), "<p>a</p><p>i</p>");
    assert_eq!(collapse, BoundaryPoint::new(root, 1));
}

#[test]
fn collapsed_range_extracts_nothing() {
    let mut document = document_with("<p>abc</p>");
    let text = texts(&document)[0];
    let point = BoundaryPoint::new(text, 2);
    let (fragment, collapse) = document.extract_contents(point, point).expect("extract");
    assert!(document.children(fragment).is_empty());
    assert_eq!(collapse, point);
    assert_eq!(document.text(text), Some("abc"));
}

#[test]
fn insert_at_splits_text() {
    let mut document = document_with("<p>abcd</p>");
    let text = texts(&document)[0];
    let paragraph = document.parent(text).expect("paragraph");
    let line_break = document.create_element("br");
    document
        .insert_at(BoundaryPoint::new(text, 2), line_break)
        .expect("insert");
    assert_eq!(document.inner_html(paragraph), "ab<br>cd");

    let start = document.create_element("hr");
    document
        .insert_at(BoundaryPoint::new(text, 0), start)
        .expect("insert");
    assert_eq!(document.first_child(paragraph), Some(start));
}

#[test]
fn insert_at_element_offset() {
    let mut document = document_with("<p>a</p><p>b</p>");
    let root = document.root();
    let divider = document.create_element("hr");
    document
        .insert_at(BoundaryPoint::new(root, 1), divider)
        .expect("insert");
    assert_eq!(document.inner_html(root), "<p>a</p><hr><p>b</p>");
}

#[test]
fn delete_contents_returns_collapse_point() {
    let mut document = document_with("<p>abc</p>");
    let text = texts(&document)[0];
    let collapse = document
        .delete_contents(BoundaryPoint::new(text, 0), BoundaryPoint::new(text, 3))
        .expect("delete");
    assert_eq!(collapse, BoundaryPoint::new(text, 0));
    assert_eq!(document.text(text), Some(""));
}
