use std::str::FromStr;

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

use crate::dom::{Document, NodeClass, NodeId};
use crate::editor::{
    ALIGN_CENTER_CLASS, ALIGN_RIGHT_CLASS, CaretPosition, Geometry, StyleProperty, StyleRegistry,
    TAB_WIDTH, char_width, computed_style, display_width,
};
use crate::theme::Theme;

const QUOTE_MARKER: &str = "│ ";
const BULLET_MARKER: &str = "• ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorVisualPosition {
    pub line: usize,
    pub column: u16,
}

#[derive(Debug)]
pub struct RenderResult {
    pub lines: Vec<Line<'static>>,
    pub cursor: Option<CursorVisualPosition>,
    pub total_lines: usize,
}

/// Wraps every line at the terminal width minus its quote and list
/// prefixes, the same way [`render_document`] lays it out.
#[derive(Clone, Copy, Debug)]
pub struct TerminalGeometry {
    pub width: usize,
}

impl Geometry for TerminalGeometry {
    fn wrap_width(&self, document: &Document, line: NodeId) -> Option<usize> {
        let prefix = line_prefix(document, line);
        Some(
            self.width
                .saturating_sub(display_width(&prefix.continuation))
                .max(1),
        )
    }
}

struct Prefix {
    first: String,
    continuation: String,
}

/// Quote bars and list markers in front of `line`, outermost first.
fn line_prefix(document: &Document, line: NodeId) -> Prefix {
    let root = document.root();
    let mut chain: Vec<NodeId> = std::iter::once(line)
        .chain(document.ancestors(line))
        .take_while(|node| *node != root)
        .collect();
    chain.reverse();

    let mut first = String::new();
    let mut continuation = String::new();
    for node in chain {
        match document.class_of(node) {
            NodeClass::Quote => {
                first.push_str(QUOTE_MARKER);
                continuation.push_str(QUOTE_MARKER);
            }
            NodeClass::ListItem => {
                let ordered = document
                    .parent(node)
                    .is_some_and(|list| {
                        document.class_of(list) == NodeClass::List { ordered: true }
                    });
                let marker = if ordered {
                    let number = document
                        .parent(node)
                        .map(|list| {
                            document
                                .element_children(list)
                                .iter()
                                .position(|item| *item == node)
                                .unwrap_or(0)
                        })
                        .unwrap_or(0);
                    format!("{}. ", number + 1)
                } else {
                    BULLET_MARKER.to_string()
                };
                continuation.push_str(&" ".repeat(marker.chars().count()));
                first.push_str(&marker);
            }
            _ => {}
        }
    }
    Prefix {
        first,
        continuation,
    }
}

pub fn render_document(
    document: &Document,
    registry: &StyleRegistry,
    theme: &Theme,
    width: usize,
    caret: Option<CaretPosition>,
) -> RenderResult {
    let root = document.root();
    let caret_line = caret.and_then(|caret| {
        document
            .descendants(root)
            .into_iter()
            .filter(|node| document.class_of(*node).is_text_block())
            .nth(caret.row)
            .map(|line| (line, caret.column))
    });
    let mut renderer = Renderer {
        document,
        registry,
        theme,
        width: width.max(1),
        caret_line,
        lines: Vec::new(),
        cursor: None,
    };
    for child in document.children(root).to_vec() {
        renderer.render_node(child);
    }
    let total_lines = renderer.lines.len();
    RenderResult {
        lines: renderer.lines,
        cursor: renderer.cursor,
        total_lines,
    }
}

struct Cell {
    text: String,
    style: Style,
    width: usize,
}

struct Renderer<'a> {
    document: &'a Document,
    registry: &'a StyleRegistry,
    theme: &'a Theme,
    width: usize,
    caret_line: Option<(NodeId, usize)>,
    lines: Vec<Line<'static>>,
    cursor: Option<CursorVisualPosition>,
}

impl Renderer<'_> {
    fn render_node(&mut self, node: NodeId) {
        let class = self.document.class_of(node);
        match class {
            NodeClass::Quote | NodeClass::List { .. } => {
                for child in self.document.children(node).to_vec() {
                    self.render_node(child);
                }
            }
            NodeClass::Divider => {
                let rule = "─".repeat(self.width);
                self.lines
                    .push(Line::from(Span::styled(rule, self.theme.placeholder_style())));
            }
            NodeClass::Media => {
                let source = self
                    .document
                    .descendants(node)
                    .into_iter()
                    .find_map(|child| self.document.attribute(child, "src"))
                    .unwrap_or("")
                    .to_string();
                self.push_placeholder(format!("[image {source}]"));
            }
            NodeClass::CustomEmbed => {
                let text = self.document.text_content(node);
                self.push_placeholder(format!("[{}]", text.trim()));
            }
            _ if class.is_text_block() => self.render_line(node),
            _ => {}
        }
    }

    fn push_placeholder(&mut self, label: String) {
        self.lines
            .push(Line::from(Span::styled(label, self.theme.placeholder_style())));
    }

    fn cells(&self, line: NodeId) -> Vec<Cell> {
        let mut cells = Vec::new();
        for node in self.document.descendants(line) {
            let Some(text) = self.document.text(node) else {
                continue;
            };
            let style = self.text_style(node);
            for ch in text.chars() {
                let shown = if ch == '\t' {
                    " ".repeat(TAB_WIDTH)
                } else {
                    ch.to_string()
                };
                cells.push(Cell {
                    text: shown,
                    style,
                    width: char_width(ch),
                });
            }
        }
        cells
    }

    fn text_style(&self, node: NodeId) -> Style {
        let computed = computed_style(self.document, self.registry, node);
        let mut style = self.theme.text_style();
        if computed.get(StyleProperty::FontWeight).is_some() {
            style = style.add_modifier(Modifier::BOLD);
        }
        if computed.get(StyleProperty::FontStyle).is_some() {
            style = style.add_modifier(Modifier::ITALIC);
        }
        match computed.get(StyleProperty::TextDecoration) {
            Some("underline") => style = style.add_modifier(Modifier::UNDERLINED),
            Some("strike") => style = style.add_modifier(Modifier::CROSSED_OUT),
            _ => {}
        }
        match computed.get(StyleProperty::FontSize) {
            Some("small") => style = style.add_modifier(Modifier::DIM),
            Some(_) => style = style.add_modifier(Modifier::BOLD),
            None => {}
        }
        if let Some(color) = computed
            .get(StyleProperty::Color)
            .and_then(|value| Color::from_str(value).ok())
        {
            style = style.fg(color);
        }
        let tagged = self.document.closest(node, |ancestor| {
            matches!(
                self.document.class_of(ancestor),
                NodeClass::Hashtag | NodeClass::UrlLink
            )
        });
        if tagged.is_some() {
            style = style.patch(self.theme.link_style());
        }
        style
    }

    fn render_line(&mut self, line: NodeId) {
        let prefix = line_prefix(self.document, line);
        let available = self
            .width
            .saturating_sub(display_width(&prefix.continuation))
            .max(1);
        let cells = self.cells(line);

        // rows of cell indices, hard-wrapped by display width
        let mut rows: Vec<Vec<usize>> = vec![Vec::new()];
        let mut row_width = 0;
        let mut positions = Vec::with_capacity(cells.len() + 1);
        for (index, cell) in cells.iter().enumerate() {
            if row_width + cell.width > available && row_width > 0 {
                rows.push(Vec::new());
                row_width = 0;
            }
            positions.push((rows.len() - 1, row_width));
            if let Some(row) = rows.last_mut() {
                row.push(index);
            }
            row_width += cell.width;
        }
        if row_width >= available {
            rows.push(Vec::new());
            row_width = 0;
        }
        positions.push((rows.len() - 1, row_width));

        let alignment = if self.document.has_class(line, ALIGN_CENTER_CLASS) {
            Some(2)
        } else if self.document.has_class(line, ALIGN_RIGHT_CLASS) {
            Some(1)
        } else {
            None
        };

        let first_row = self.lines.len();
        let mut pads = Vec::with_capacity(rows.len());
        for (row_index, row) in rows.iter().enumerate() {
            let lead = if row_index == 0 {
                &prefix.first
            } else {
                &prefix.continuation
            };
            let used: usize = row.iter().map(|index| cells[*index].width).sum();
            let pad = match alignment {
                Some(divisor) => available.saturating_sub(used) / divisor,
                None => 0,
            };
            pads.push(pad);

            let mut spans = Vec::new();
            if !lead.is_empty() {
                let style = if lead.contains(QUOTE_MARKER) {
                    self.theme.quote_style()
                } else {
                    self.theme.marker_style()
                };
                spans.push(Span::styled(lead.clone(), style));
            }
            if pad > 0 {
                spans.push(Span::raw(" ".repeat(pad)));
            }
            for index in row {
                let cell = &cells[*index];
                spans.push(Span::styled(cell.text.clone(), cell.style));
            }
            self.lines.push(Line::from(spans));
        }

        if let Some((caret_line, column)) = self.caret_line
            && caret_line == line
        {
            let (row, offset) = positions[column.min(cells.len())];
            let lead = if row == 0 {
                &prefix.first
            } else {
                &prefix.continuation
            };
            let column = display_width(lead) + pads[row] + offset;
            self.cursor = Some(CursorVisualPosition {
                line: first_row + row,
                column: u16::try_from(column).unwrap_or(u16::MAX),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{Editor, NoGeometry};
    use crate::options::EditorOptions;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect()
    }

    fn editor(html: &str) -> Editor {
        Editor::new(EditorOptions::new("editor").with_html(html)).expect("editor loads")
    }

    #[test]
    fn renders_lists_and_quotes_with_prefixes() {
        let editor = editor(
            "<ul><li>one</li><li>two</li></ul><blockquote><p>quoted</p></blockquote><hr>",
        );
        let result = render_document(
            editor.document(),
            editor.registry(),
            &Theme::default(),
            20,
            None,
        );
        let lines = plain(&result.lines);
        assert!(lines.contains(&"• one".to_string()));
        assert!(lines.contains(&"• two".to_string()));
        assert!(lines.contains(&"│ quoted".to_string()));
        assert!(lines.iter().any(|line| line.starts_with('─')));
    }

    #[test]
    fn wraps_long_lines_and_places_cursor_on_wrapped_row() {
        let editor = editor("<p>abcdefghij</p>");
        let caret = CaretPosition { row: 0, column: 7 };
        let result = render_document(
            editor.document(),
            editor.registry(),
            &Theme::default(),
            4,
            Some(caret),
        );
        assert_eq!(plain(&result.lines), vec!["abcd", "efgh", "ij"]);
        assert_eq!(result.cursor, Some(CursorVisualPosition { line: 1, column: 3 }));
    }

    #[test]
    fn geometry_subtracts_list_marker() {
        let editor = editor("<ol><li>item</li></ol>");
        let doc = editor.document();
        let item = doc
            .descendants(doc.root())
            .into_iter()
            .find(|node| doc.is_tag(*node, "li"))
            .expect("list item");
        assert_eq!(TerminalGeometry { width: 10 }.wrap_width(doc, item), Some(7));
        assert_eq!(NoGeometry.wrap_width(doc, item), None);
    }
}
