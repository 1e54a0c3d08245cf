use serde::Serialize;

pub const MEDIA_CLASS: &str = "_media_";
pub const CUSTOM_CLASS: &str = "_custom_";
pub const HASHTAG_CLASS: &str = "_hashtag_";
pub const URLLINK_CLASS: &str = "_urllink_";
pub const COLOR_CLASS: &str = "_color";

/// Semantic role of a node, derived from its tag and classes whenever either
/// changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum NodeClass {
    Root,
    Paragraph,
    ListItem,
    TableCell,
    Quote,
    List { ordered: bool },
    Divider,
    Media,
    CustomEmbed,
    Hashtag,
    UrlLink,
    StyleSpan { colored: bool },
    LineBreak,
    Fragment,
    /// Any other element (images, tables, anchors...).
    Inline,
    PlainText,
}

impl NodeClass {
    pub(crate) fn derive(tag: &str, classes: &[String], is_root: bool) -> Self {
        if is_root {
            return NodeClass::Root;
        }
        let has = |name: &str| classes.iter().any(|class| class == name);
        if has(MEDIA_CLASS) {
            return NodeClass::Media;
        }
        if has(CUSTOM_CLASS) {
            return NodeClass::CustomEmbed;
        }
        if has(HASHTAG_CLASS) {
            return NodeClass::Hashtag;
        }
        if has(URLLINK_CLASS) {
            return NodeClass::UrlLink;
        }
        match tag {
            "p" => NodeClass::Paragraph,
            "li" => NodeClass::ListItem,
            "td" | "th" => NodeClass::TableCell,
            "blockquote" => NodeClass::Quote,
            "ul" => NodeClass::List { ordered: false },
            "ol" => NodeClass::List { ordered: true },
            "hr" => NodeClass::Divider,
            "br" => NodeClass::LineBreak,
            "span" => NodeClass::StyleSpan {
                colored: has(COLOR_CLASS),
            },
            super::FRAGMENT_TAG => NodeClass::Fragment,
            _ => NodeClass::Inline,
        }
    }

    pub fn is_block(self) -> bool {
        matches!(
            self,
            NodeClass::Divider
                | NodeClass::Quote
                | NodeClass::List { .. }
                | NodeClass::Media
                | NodeClass::CustomEmbed
        )
    }

    pub fn is_text_block(self) -> bool {
        matches!(
            self,
            NodeClass::Paragraph | NodeClass::ListItem | NodeClass::TableCell
        )
    }

    pub fn is_ceiling(self) -> bool {
        matches!(
            self,
            NodeClass::List { .. } | NodeClass::Quote | NodeClass::Root | NodeClass::TableCell
        )
    }

    pub fn is_restricted(self) -> bool {
        matches!(self, NodeClass::Media | NodeClass::CustomEmbed)
    }

    pub fn is_unselectable(self) -> bool {
        matches!(
            self,
            NodeClass::Media
                | NodeClass::CustomEmbed
                | NodeClass::Hashtag
                | NodeClass::UrlLink
                | NodeClass::Divider
        )
    }

    pub fn is_style_allowed(self) -> bool {
        matches!(
            self,
            NodeClass::StyleSpan { colored: true }
                | NodeClass::Root
                | NodeClass::Hashtag
                | NodeClass::UrlLink
                | NodeClass::TableCell
        )
    }

    pub fn is_special_text(self) -> bool {
        matches!(self, NodeClass::Hashtag | NodeClass::UrlLink)
    }

    /// Containers whose lines are themselves text elements.
    pub fn is_text_area(self) -> bool {
        matches!(self, NodeClass::Quote | NodeClass::ListItem)
    }

    pub fn is_text_element(self) -> bool {
        self.is_text_block() || matches!(self, NodeClass::StyleSpan { .. })
    }

    pub fn is_atomic(self) -> bool {
        self.is_restricted() || self.is_special_text()
    }
}
