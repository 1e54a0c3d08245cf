use super::*;
use crate::dom::BoundaryPoint;
use crate::error::StructureError;
use pretty_assertions::assert_eq;

fn document_with(markup: &str) -> Document {
    let mut document = Document::new("editor");
    let root = document.root();
    document
        .set_inner_html(root, markup)
        .expect("markup parses");
    document
}

fn node_by_text(document: &Document, text: &str) -> NodeId {
    document
        .descendants(document.root())
        .into_iter()
        .find(|node| document.text(*node) == Some(text))
        .unwrap_or_else(|| panic!("no text node {text:?}"))
}

fn node_by_tag(document: &Document, tag: &str) -> NodeId {
    document
        .descendants(document.root())
        .into_iter()
        .find(|node| document.is_tag(*node, tag))
        .unwrap_or_else(|| panic!("no <{tag}>"))
}

#[test]
fn crawl_visits_children_before_parents() {
    let mut document = document_with("<p>a<span>b</span>c</p>");
    let paragraph = node_by_tag(&document, "p");
    let [a, b, c] = ["a", "b", "c"].map(|text| node_by_text(&document, text));
    let span = node_by_tag(&document, "span");

    let output =
        crawl(&mut document, CrawlOptions::node(paragraph), |_, _| Visit::Continue).expect("crawl");
    assert_eq!(output.nodes, vec![a, b, span, c]);
    assert_eq!(output.container, paragraph);
}

#[test]
fn range_crawl_stops_at_end_node() {
    let mut document = document_with("<p>ab</p><p>cd</p><p>ef</p>");
    let root = document.root();
    let lines = document.children(root).to_vec();
    let [ab, cd, ef] = ["ab", "cd", "ef"].map(|text| node_by_text(&document, text));

    let output = crawl(
        &mut document,
        CrawlOptions::range(BoundaryPoint::new(ab, 1), BoundaryPoint::new(ef, 1)).within(root),
        |_, _| Visit::Continue,
    )
    .expect("crawl");
    assert_eq!(output.nodes, vec![ab, lines[0], cd, lines[1], ef]);
    assert_eq!(output.container, root);
}

#[test]
fn crawl_follows_substituted_nodes() {
    let mut document = document_with("<p>a<span>b</span>c</p>");
    let paragraph = node_by_tag(&document, "p");
    let mut replacement = None;

    let output = crawl(&mut document, CrawlOptions::node(paragraph), |document, node| {
        if !document.is_tag(node, "span") {
            return Visit::Continue;
        }
        let strong = document.create_element("strong");
        document.move_children(node, strong).expect("move");
        document.replace_with(node, strong).expect("replace");
        replacement = Some(strong);
        Visit::Substitute(strong)
    })
    .expect("crawl");

    let strong = replacement.expect("span replaced");
    let c = node_by_text(&document, "c");
    assert_eq!(output.nodes.len(), 4);
    assert_eq!(output.nodes[2], strong);
    assert_eq!(output.nodes[3], c);
    assert_eq!(document.inner_html(paragraph), "a<strong>b</strong>c");
}

#[test]
fn crawl_break_stops_without_recording() {
    let mut document = document_with("<p>a<span>b</span>c</p>");
    let paragraph = node_by_tag(&document, "p");
    let a = node_by_text(&document, "a");
    let output = crawl(&mut document, CrawlOptions::node(paragraph), |document, node| {
        if document.text(node) == Some("b") {
            Visit::Break
        } else {
            Visit::Continue
        }
    })
    .expect("crawl");
    assert_eq!(output.nodes, vec![a]);
}

#[test]
fn crawl_never_leaves_its_container() {
    let mut document = document_with("<p>a</p><p>b</p>");
    let first = document.first_child(document.root()).expect("line");
    let output = crawl(&mut document, CrawlOptions::node(first), |document, node| {
        // moving the visited node out of the container ends its recording
        if document.text(node) == Some("a") {
            let root = document.root();
            document.append_child(root, node).expect("move");
        }
        Visit::Continue
    })
    .expect("crawl");
    assert!(output.nodes.is_empty());
}

#[test]
fn text_nodes_lists_runs_in_order() {
    let mut document = document_with("<p>a<span>b<br>c</span></p><p>d</p>");
    let root = document.root();
    let runs = text_nodes(&mut document, root).expect("walk");
    let texts: Vec<&str> = runs
        .iter()
        .filter_map(|node| document.text(*node))
        .collect();
    assert_eq!(texts, vec!["a", "b", "c", "d"]);
}

#[test]
fn single_child_parent_ignores_breaks_and_blank_text() {
    let document = document_with(
        "<p id=\"one\"><span>a</span><br></p>\
         <p id=\"two\">a<span>b</span></p>\
         <p id=\"three\"><span>a</span><span>b</span></p>\
         <p id=\"four\">  <span>a</span></p>\
         <p id=\"five\"></p>",
    );
    let check = |id: &str| {
        let node = document.find_by_id(id).expect("line");
        is_single_child_parent(&document, node)
    };
    assert!(check("one"));
    assert!(!check("two"));
    assert!(!check("three"));
    assert!(check("four"));
    assert!(check("five"));
}

#[test]
fn climbs_to_the_child_of_the_wrapper() {
    let mut document = document_with("<blockquote><p><span>x</span>y</p></blockquote>");
    let root = document.root();
    let quote = node_by_tag(&document, "blockquote");
    let paragraph = node_by_tag(&document, "p");
    let span = node_by_tag(&document, "span");
    let x = node_by_text(&document, "x");

    assert_eq!(climber::eldest(&mut document, x, root), Ok(quote));
    assert_eq!(climber::eldest(&mut document, x, quote), Ok(paragraph));
    // the paragraph holds text next to the span
    assert_eq!(climb_to_eldest_single(&mut document, x, root), Ok(span));
}

#[test]
fn single_climb_crosses_equivalent_wrappers() {
    let mut document = document_with("<blockquote><p><span>x</span></p></blockquote>");
    let root = document.root();
    let quote = node_by_tag(&document, "blockquote");
    let x = node_by_text(&document, "x");
    assert_eq!(climb_to_eldest_single(&mut document, x, root), Ok(quote));
}

#[test]
fn climb_callback_can_redirect_and_break() {
    let mut document = document_with("<blockquote><p><span>x</span></p></blockquote>");
    let root = document.root();
    let paragraph = node_by_tag(&document, "p");
    let span = node_by_tag(&document, "span");
    let x = node_by_text(&document, "x");

    let mut seen = Vec::new();
    let reached = climb_to_eldest(&mut document, x, root, false, |_, parent| {
        seen.push(parent);
        if parent == paragraph {
            ClimbStep::Break
        } else {
            ClimbStep::Continue
        }
    })
    .expect("climb");
    assert_eq!(reached, span);
    assert_eq!(seen, vec![span, paragraph]);

    // redirecting to the paragraph skips the span level
    let reached = climb_to_eldest(&mut document, x, root, false, |document, parent| {
        if document.is_tag(parent, "span") {
            ClimbStep::Redirect(paragraph)
        } else {
            ClimbStep::Break
        }
    })
    .expect("climb");
    assert_eq!(reached, paragraph);
}

#[test]
fn climb_rejects_text_wrapper() {
    let mut document = document_with("<p>x</p>");
    let x = node_by_text(&document, "x");
    assert_eq!(
        climb_to_eldest_single(&mut document, x, x),
        Err(StructureError::NotAnElement(x))
    );
}

#[test]
fn climb_releases_its_scope_marker() {
    let mut document = document_with("<p><span>x</span></p>");
    let root = document.root();
    let x = node_by_text(&document, "x");
    climb_to_eldest_single(&mut document, x, root).expect("climb");
    let output = crawl(&mut document, CrawlOptions::node(root), |_, _| Visit::Continue)
        .expect("crawl");
    assert_eq!(output.nodes.len(), 3);
}
