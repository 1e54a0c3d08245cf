use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tdoc::{InlineStyle, Paragraph, Span};
use tracing::debug;

use super::styles::{StyleProperty, computed_style};
use super::tracked::TrackedItem;
use super::{Editor, Result};
use crate::dom::{NodeClass, NodeId, ZERO_WIDTH_SPACE};

/// Longest title taken from the first sentence; the rest moves to `text`.
pub const TITLE_LIMIT: usize = 200;

/// Dotted words such as `example.com/a.b` that must not end a sentence.
static DOTTED_WORD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[^\s^.]{2,}[^\s]+[.][^\s^.]{2,}").ok());

static RUNS_OF_SPACE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s\s+").ok());

/// Snapshot of the document handed to the host when saving.
#[derive(Clone, Debug, Serialize)]
pub struct Export {
    pub html: String,
    pub title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashtag: Option<Vec<TrackedItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urllink: Option<Vec<TrackedItem>>,
    pub image: Vec<TrackedItem>,
    pub custom: Vec<TrackedItem>,
}

impl Editor {
    pub fn export(&mut self) -> Result<Export> {
        self.reconcile()?;
        self.normalize_document()?;
        self.sync_image_sources();

        let root = self.doc.root();
        let lines: Vec<String> = self
            .doc
            .element_children(root)
            .into_iter()
            .map(|child| self.doc.text_content(child).replace(ZERO_WIDTH_SPACE, ""))
            .collect();
        let (title, text) = title_and_text(&lines);

        let export = Export {
            html: self.html(),
            title,
            text,
            hashtag: self
                .options
                .hashtag
                .then(|| self.tracked.hashtag.clone()),
            urllink: self
                .options
                .urllink
                .then(|| self.tracked.urllink.clone()),
            image: self.tracked.image.clone(),
            custom: self.tracked.custom.clone(),
        };
        debug!(title = %export.title, html = export.html.len(), "document exported");
        Ok(export)
    }

    /// Points every tracked image element at the source the host last
    /// reported for it.
    fn sync_image_sources(&mut self) {
        let updates: Vec<(NodeId, String)> = self
            .tracked
            .image
            .iter()
            .filter_map(|item| {
                let source = item.source.clone()?;
                let image = if self.doc.is_tag(item.element, "img") {
                    item.element
                } else {
                    self.doc
                        .descendants(item.element)
                        .into_iter()
                        .find(|node| self.doc.is_tag(*node, "img"))?
                };
                (self.doc.attribute(image, "src") != Some(source.as_str()))
                    .then_some((image, source))
            })
            .collect();
        for (image, source) in updates {
            self.doc.set_attribute(image, "src", &source);
        }
    }

    /// Converts the document into a `tdoc` document so it can be written as
    /// FTML or Markdown.
    pub fn to_tdoc(&self) -> tdoc::Document {
        let root = self.doc.root();
        let paragraphs = self
            .doc
            .element_children(root)
            .into_iter()
            .filter_map(|child| self.block_to_paragraph(child))
            .collect();
        tdoc::Document::new().with_paragraphs(paragraphs)
    }

    fn block_to_paragraph(&self, node: NodeId) -> Option<Paragraph> {
        match self.doc.class_of(node) {
            NodeClass::Quote => {
                let children = self
                    .doc
                    .element_children(node)
                    .into_iter()
                    .filter_map(|child| self.block_to_paragraph(child))
                    .collect();
                Some(Paragraph::new_quote().with_children(children))
            }
            NodeClass::List { ordered } => {
                let entries = self
                    .doc
                    .element_children(node)
                    .into_iter()
                    .map(|item| vec![self.line_to_paragraph(item)])
                    .collect::<Vec<_>>();
                let list = if ordered {
                    Paragraph::new_ordered_list()
                } else {
                    Paragraph::new_unordered_list()
                };
                Some(list.with_entries(entries))
            }
            NodeClass::Media => {
                let image = self
                    .doc
                    .descendants(node)
                    .into_iter()
                    .find(|child| self.doc.is_tag(*child, "img"))?;
                let source = self.doc.attribute(image, "src")?.to_string();
                let mut link = Span::new_text(&source);
                link.style = InlineStyle::Link;
                link.link_target = Some(source);
                Some(Paragraph::new_text().with_content(vec![link]))
            }
            NodeClass::Divider => None,
            NodeClass::CustomEmbed => {
                let text = self.doc.text_content(node);
                (!text.trim().is_empty())
                    .then(|| Paragraph::new_text().with_content(vec![Span::new_text(&text)]))
            }
            _ => Some(self.line_to_paragraph(node)),
        }
    }

    fn line_to_paragraph(&self, line: NodeId) -> Paragraph {
        let mut heading = None;
        let mut content = Vec::new();
        for node in self.doc.descendants(line) {
            let Some(text) = self.doc.text(node) else {
                continue;
            };
            let text = text.replace(ZERO_WIDTH_SPACE, "");
            if text.is_empty() {
                continue;
            }
            let style = computed_style(&self.doc, &self.registry, node);
            if heading.is_none() {
                heading = style.get(StyleProperty::FontSize).map(str::to_string);
            }
            content.push(self.styled_span(node, text, &style));
        }

        let paragraph = match heading.as_deref() {
            Some("h1") => Paragraph::new_header1(),
            Some("h2") => Paragraph::new_header2(),
            Some("h3") => Paragraph::new_header3(),
            _ => Paragraph::new_text(),
        };
        paragraph.with_content(content)
    }

    /// One text run as a span, nesting a span per inline style it carries.
    fn styled_span(&self, node: NodeId, text: String, style: &super::ComputedStyle) -> Span {
        let mut styles = Vec::new();
        let link = self
            .doc
            .closest(node, |ancestor| self.doc.class_of(ancestor) == NodeClass::UrlLink);
        if link.is_some() {
            styles.push(InlineStyle::Link);
        }
        if style.get(StyleProperty::FontWeight).is_some() {
            styles.push(InlineStyle::Bold);
        }
        if style.get(StyleProperty::FontStyle).is_some() {
            styles.push(InlineStyle::Italic);
        }
        match style.get(StyleProperty::TextDecoration) {
            Some("underline") => styles.push(InlineStyle::Underline),
            Some("strike") => styles.push(InlineStyle::Strike),
            _ => {}
        }
        if style.get(StyleProperty::Color).is_some() {
            styles.push(InlineStyle::Highlight);
        }

        let mut span = Span::new_text(&text);
        let Some(innermost) = styles.pop() else {
            return span;
        };
        span.style = innermost;
        if innermost == InlineStyle::Link {
            span.link_target = Some(text.trim().to_string());
        }
        for outer in styles.into_iter().rev() {
            let mut wrapper = Span::new_text("");
            wrapper.style = outer;
            if outer == InlineStyle::Link {
                wrapper.link_target = Some(text.trim().to_string());
            }
            wrapper.children = vec![span];
            span = wrapper;
        }
        span
    }
}

/// The title is the first sentence of the first non-empty line; everything
/// else is body text. Dotted words like urls never end a sentence.
pub fn title_and_text(lines: &[String]) -> (String, String) {
    let mut title = String::new();
    let mut text = String::new();
    for line in lines.iter().filter(|line| !line.is_empty()) {
        if !title.is_empty() {
            text.push_str(line);
            text.push('\n');
            continue;
        }

        let words: Vec<&str> = DOTTED_WORD
            .as_ref()
            .map(|regex| {
                regex
                    .find_iter(line)
                    .map(|found| found.as_str().trim_end_matches('.'))
                    .collect()
            })
            .unwrap_or_default();
        let mut protected = line.clone();
        for (index, word) in words.iter().enumerate() {
            protected = protected.replacen(word, &format!("[url]{index}[/url]"), 1);
        }
        let sentences: Vec<String> = protected
            .split('.')
            .map(|sentence| {
                let mut sentence = sentence.to_string();
                for (index, word) in words.iter().enumerate() {
                    sentence = sentence.replacen(&format!("[url]{index}[/url]"), word, 1);
                }
                sentence
            })
            .collect();

        let first = sentences.first().cloned().unwrap_or_default();
        if first.chars().count() > TITLE_LIMIT {
            let overflow: String = first.chars().skip(TITLE_LIMIT).collect();
            text.push_str(&overflow);
            text.push('.');
            title = first.chars().take(TITLE_LIMIT).collect();
        } else {
            title = first;
        }
        let rest = sentences.get(1..).unwrap_or_default().join(".");
        match RUNS_OF_SPACE.as_ref() {
            Some(regex) => text.push_str(&regex.replace_all(&rest, " ")),
            None => text.push_str(&rest),
        }
        text.push(' ');
    }
    (title.trim().to_string(), text.trim().to_string())
}
