//! A lenient reader and writer for the HTML subset the editor stores.

use super::{Document, FRAGMENT_TAG, NodeId, NodeKind};
use crate::error::MarkupError;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Skipped entirely, contents included.
const RAW_ELEMENTS: &[&str] = &["script", "style"];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Parses `markup` into a detached fragment owned by `document`.
pub fn parse_fragment(document: &mut Document, markup: &str) -> Result<NodeId, MarkupError> {
    let fragment = document.create_fragment();
    let mut parser = Parser {
        input: markup,
        position: 0,
        stack: vec![fragment],
    };
    parser.run(document)?;
    Ok(fragment)
}

struct Parser<'a> {
    input: &'a str,
    position: usize,
    stack: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn current(&self) -> NodeId {
        self.stack[self.stack.len() - 1]
    }

    fn run(&mut self, document: &mut Document) -> Result<(), MarkupError> {
        while self.position < self.input.len() {
            let rest = self.rest();
            if let Some(comment) = rest.strip_prefix("<!--") {
                let end = comment
                    .find("-->")
                    .ok_or(MarkupError::Unterminated { offset: self.position })?;
                self.position += 4 + end + 3;
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                let end = rest
                    .find('>')
                    .ok_or(MarkupError::Unterminated { offset: self.position })?;
                self.position += end + 1;
            } else if rest.starts_with("</") {
                self.close_tag(document)?;
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|ch: char| ch.is_ascii_alphabetic())
            {
                self.open_tag(document)?;
            } else {
                let skip = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                let end = rest[skip..]
                    .find('<')
                    .map(|idx| idx + skip)
                    .unwrap_or(rest.len());
                let text = decode_entities(&rest[..end]);
                self.position += end;
                let node = document.create_text(&text);
                append(document, self.current(), node)?;
            }
        }
        Ok(())
    }

    fn close_tag(&mut self, document: &Document) -> Result<(), MarkupError> {
        let start = self.position;
        let end = self
            .rest()
            .find('>')
            .ok_or(MarkupError::Unterminated { offset: start })?;
        let name = self.rest()[2..end].trim().to_ascii_lowercase();
        self.position += end + 1;
        if let Some(depth) = self
            .stack
            .iter()
            .rposition(|node| document.tag(*node) == Some(name.as_str()))
            && depth > 0
        {
            self.stack.truncate(depth);
        }
        Ok(())
    }

    fn open_tag(&mut self, document: &mut Document) -> Result<(), MarkupError> {
        let start = self.position;
        let bytes = self.input.as_bytes();
        let mut cursor = self.position + 1;
        while cursor < bytes.len()
            && !bytes[cursor].is_ascii_whitespace()
            && bytes[cursor] != b'>'
            && bytes[cursor] != b'/'
        {
            cursor += 1;
        }
        let name = self.input[self.position + 1..cursor].to_ascii_lowercase();
        let mut attributes: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;

        loop {
            while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
            if cursor >= bytes.len() {
                return Err(MarkupError::Unterminated { offset: start });
            }
            match bytes[cursor] {
                b'>' => {
                    cursor += 1;
                    break;
                }
                b'/' => {
                    self_closing = true;
                    cursor += 1;
                }
                _ => {
                    let name_start = cursor;
                    while cursor < bytes.len()
                        && !bytes[cursor].is_ascii_whitespace()
                        && !matches!(bytes[cursor], b'=' | b'>' | b'/')
                    {
                        cursor += 1;
                    }
                    let attribute = self.input[name_start..cursor].to_ascii_lowercase();
                    while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
                        cursor += 1;
                    }
                    let mut value = String::new();
                    if cursor < bytes.len() && bytes[cursor] == b'=' {
                        cursor += 1;
                        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
                            cursor += 1;
                        }
                        if cursor >= bytes.len() {
                            return Err(MarkupError::Unterminated { offset: start });
                        }
                        if bytes[cursor] == b'"' || bytes[cursor] == b'\'' {
                            let quote = bytes[cursor] as char;
                            let value_start = cursor + 1;
                            let close = self.input[value_start..].find(quote).ok_or(
                                MarkupError::UnterminatedAttribute {
                                    offset: name_start,
                                    name: attribute.clone(),
                                },
                            )?;
                            value = decode_entities(&self.input[value_start..value_start + close]);
                            cursor = value_start + close + 1;
                        } else {
                            let value_start = cursor;
                            while cursor < bytes.len()
                                && !bytes[cursor].is_ascii_whitespace()
                                && bytes[cursor] != b'>'
                            {
                                cursor += 1;
                            }
                            value = decode_entities(&self.input[value_start..cursor]);
                        }
                    }
                    if !attribute.is_empty() {
                        attributes.push((attribute, value));
                    }
                }
            }
        }
        self.position = cursor;

        if RAW_ELEMENTS.contains(&name.as_str()) {
            let closing = format!("</{name}");
            let lowered = self.rest().to_ascii_lowercase();
            let end = lowered.find(&closing).unwrap_or(lowered.len());
            self.position += end;
            if let Some(close) = self.rest().find('>') {
                self.position += close + 1;
            }
            return Ok(());
        }

        let element = document.create_element(&name);
        for (attribute, value) in attributes {
            document.set_attribute(element, &attribute, &value);
        }
        append(document, self.current(), element)?;
        if !self_closing && !is_void(&name) {
            self.stack.push(element);
        }
        Ok(())
    }
}

fn append(document: &mut Document, parent: NodeId, child: NodeId) -> Result<(), MarkupError> {
    document
        .append_child(parent, child)
        .map_err(|err| MarkupError::Structure(err.to_string()))
}

pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(idx) = rest.find('&') {
        output.push_str(&rest[..idx]);
        rest = &rest[idx..];
        let Some(end) = rest[1..].find(';').map(|end| end + 1).filter(|end| *end <= 10) else {
            output.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" | "#39" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => {
                if let Some(hex) = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                {
                    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
                } else if let Some(decimal) = entity.strip_prefix('#') {
                    decimal.parse::<u32>().ok().and_then(char::from_u32)
                } else {
                    None
                }
            }
        };
        match decoded {
            Some(ch) => {
                output.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                output.push('&');
                rest = &rest[1..];
            }
        }
    }
    output.push_str(rest);
    output
}

fn escape_text(text: &str, output: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '\u{a0}' => output.push_str("&nbsp;"),
            _ => output.push(ch),
        }
    }
}

fn escape_attribute(value: &str, output: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '"' => output.push_str("&quot;"),
            _ => output.push(ch),
        }
    }
}

/// Serializes the children of `id`.
pub fn inner_html(document: &Document, id: NodeId) -> String {
    let mut output = String::new();
    for child in document.children(id) {
        write_node(document, *child, &mut output);
    }
    output
}

/// Serializes `id` itself. Fragments serialize as their children.
pub fn outer_html(document: &Document, id: NodeId) -> String {
    let mut output = String::new();
    write_node(document, id, &mut output);
    output
}

fn write_node(document: &Document, id: NodeId, output: &mut String) {
    match document.kind(id) {
        NodeKind::Text(text) => escape_text(text, output),
        NodeKind::Element(data) => {
            if data.tag == FRAGMENT_TAG {
                for child in document.children(id) {
                    write_node(document, *child, output);
                }
                return;
            }
            output.push('<');
            output.push_str(&data.tag);
            if document.has_class_attribute(id) {
                output.push_str(" class=\"");
                escape_attribute(&document.classes(id).join(" "), output);
                output.push('"');
            }
            for (name, value) in document.attributes(id) {
                output.push(' ');
                output.push_str(name);
                output.push_str("=\"");
                escape_attribute(value, output);
                output.push('"');
            }
            output.push('>');
            if is_void(&data.tag) {
                return;
            }
            for child in document.children(id) {
                write_node(document, *child, output);
            }
            output.push_str("</");
            output.push_str(&data.tag);
            output.push('>');
        }
    }
}

impl Document {
    /// Replaces the children of `parent` with parsed `markup`.
    pub fn set_inner_html(&mut self, parent: NodeId, markup: &str) -> Result<(), MarkupError> {
        let fragment = parse_fragment(self, markup)?;
        for child in self.children(parent).to_vec() {
            self.remove(child);
        }
        self.append_child(parent, fragment)
            .map_err(|err| MarkupError::Structure(err.to_string()))
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        inner_html(self, id)
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        outer_html(self, id)
    }
}
