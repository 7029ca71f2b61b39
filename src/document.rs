// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Typed tree model for Atlassian rich-text content.
//!
//! Jira and Confluence exchange rich text as ADF (Atlassian Document Format),
//! a recursive JSON tree of typed nodes. This module decodes that JSON into
//! a [`Node`] tree once, so the renderers never have to re-inspect raw JSON,
//! and encodes a tree back into ADF for write requests.
//!
//! Decoding is forgiving: wrong JSON types, missing keys and out-of-range
//! attribute values map to safe defaults instead of errors. Unknown node
//! kinds are kept as [`Node::Unknown`] along with their children.
//!
//! # Example
//!
//! ```
//! use atl::document::{Mark, Node};
//!
//! let adf = serde_json::json!({
//!     "type": "doc",
//!     "version": 1,
//!     "content": [{
//!         "type": "paragraph",
//!         "content": [{ "type": "text", "text": "Hi", "marks": [{ "type": "strong" }] }]
//!     }]
//! });
//!
//! let doc = Node::from_value(&adf).unwrap();
//! let Node::Document(blocks) = &doc else { panic!("expected a document") };
//! assert_eq!(
//!     blocks[0],
//!     Node::Paragraph(vec![Node::text("Hi", vec![Mark::Strong])])
//! );
//! ```

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A single node of a rich-text document.
///
/// Block kinds hold their children directly; inline kinds are leaves.
/// Children order is significant and preserved through every conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// The document root (`doc`).
    Document(Vec<Node>),
    /// A paragraph of inline content.
    Paragraph(Vec<Node>),
    /// A heading with a level in `1..=6`.
    Heading {
        /// Heading level, always clamped to `1..=6`.
        level: u8,
        /// Inline content.
        content: Vec<Node>,
    },
    /// An unordered list of [`Node::ListItem`]s.
    BulletList(Vec<Node>),
    /// An ordered list of [`Node::ListItem`]s.
    OrderedList {
        /// Number of the first item.
        order: u64,
        /// The list items.
        items: Vec<Node>,
    },
    /// A list entry holding block content.
    ListItem(Vec<Node>),
    /// A preformatted code block.
    CodeBlock {
        /// Language hint from the fence info string, informational only.
        language: Option<String>,
        /// Raw text content.
        content: Vec<Node>,
    },
    /// A block quotation.
    Blockquote(Vec<Node>),
    /// A horizontal rule.
    Rule,
    /// A table of [`Node::TableRow`]s.
    Table(Vec<Node>),
    /// A row of header or body cells.
    TableRow(Vec<Node>),
    /// A header cell holding block content.
    TableHeader(Vec<Node>),
    /// A body cell holding block content.
    TableCell(Vec<Node>),
    /// A callout box (`info`, `note`, `warning`, `error`, `success`).
    Panel {
        /// The panel flavour as sent by the server.
        panel_type: String,
        /// Block content.
        content: Vec<Node>,
    },
    /// A run of text with formatting marks.
    Text {
        /// The text payload.
        text: String,
        /// Marks applied in order, innermost first.
        marks: Vec<Mark>,
    },
    /// A forced line break.
    HardBreak,
    /// A user mention.
    Mention {
        /// Account id of the mentioned user, if present.
        id: Option<String>,
        /// Display text.
        text: String,
    },
    /// An emoji, rendered by short name (e.g. `:smile:`).
    Emoji {
        /// Short name as sent by the server, colons included.
        short_name: String,
    },
    /// An inline smart link.
    InlineCard {
        /// Link target.
        url: String,
    },
    /// A block-level smart link.
    BlockCard {
        /// Link target.
        url: String,
    },
    /// A date chip holding a millisecond timestamp.
    Date {
        /// Milliseconds since the Unix epoch, as sent by the server.
        timestamp: String,
    },
    /// A node kind this crate does not know about.
    ///
    /// Keeps the children so their text still renders.
    Unknown {
        /// The unrecognized `type` tag.
        kind: String,
        /// Child nodes, if any.
        content: Vec<Node>,
    },
}

/// An inline formatting annotation attached to a [`Node::Text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mark {
    /// Bold.
    Strong,
    /// Italic (`em` on the wire).
    Em,
    /// Inline code.
    Code,
    /// Strikethrough.
    Strike,
    /// Hyperlink.
    Link {
        /// Link target.
        href: String,
    },
    /// A mark this crate does not know about, by wire name.
    Unknown(String),
}

impl Mark {
    /// Returns the ADF wire name of this mark.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Strong => "strong",
            Self::Em => "em",
            Self::Code => "code",
            Self::Strike => "strike",
            Self::Link { .. } => "link",
            Self::Unknown(name) => name,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let name = get_str(value, &["type"])?;
        Some(match name {
            "strong" => Self::Strong,
            "em" | "emphasis" => Self::Em,
            "code" => Self::Code,
            "strike" => Self::Strike,
            "link" => Self::Link {
                href: get_string(value, &["attrs", "href"]).unwrap_or_default(),
            },
            other => Self::Unknown(other.to_owned()),
        })
    }
}

impl Serialize for Mark {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.name())?;
        if let Self::Link { href } = self {
            map.serialize_entry("attrs", &json!({ "href": href }))?;
        }
        map.end()
    }
}

impl Node {
    /// Creates a text node.
    #[must_use]
    pub fn text(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Self::Text {
            text: text.into(),
            marks,
        }
    }

    /// Returns the ADF `type` tag of this node.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Document(_) => "doc",
            Self::Paragraph(_) => "paragraph",
            Self::Heading { .. } => "heading",
            Self::BulletList(_) => "bulletList",
            Self::OrderedList { .. } => "orderedList",
            Self::ListItem(_) => "listItem",
            Self::CodeBlock { .. } => "codeBlock",
            Self::Blockquote(_) => "blockquote",
            Self::Rule => "rule",
            Self::Table(_) => "table",
            Self::TableRow(_) => "tableRow",
            Self::TableHeader(_) => "tableHeader",
            Self::TableCell(_) => "tableCell",
            Self::Panel { .. } => "panel",
            Self::Text { .. } => "text",
            Self::HardBreak => "hardBreak",
            Self::Mention { .. } => "mention",
            Self::Emoji { .. } => "emoji",
            Self::InlineCard { .. } => "inlineCard",
            Self::BlockCard { .. } => "blockCard",
            Self::Date { .. } => "date",
            Self::Unknown { kind, .. } => kind,
        }
    }

    /// Returns the child nodes of a container kind, or `None` for leaves.
    #[must_use]
    pub fn children(&self) -> Option<&[Self]> {
        match self {
            Self::Document(content)
            | Self::Paragraph(content)
            | Self::Heading { content, .. }
            | Self::BulletList(content)
            | Self::OrderedList { items: content, .. }
            | Self::ListItem(content)
            | Self::CodeBlock { content, .. }
            | Self::Blockquote(content)
            | Self::Table(content)
            | Self::TableRow(content)
            | Self::TableHeader(content)
            | Self::TableCell(content)
            | Self::Panel { content, .. }
            | Self::Unknown { content, .. } => Some(content),
            Self::Rule
            | Self::Text { .. }
            | Self::HardBreak
            | Self::Mention { .. }
            | Self::Emoji { .. }
            | Self::InlineCard { .. }
            | Self::BlockCard { .. }
            | Self::Date { .. } => None,
        }
    }

    /// Returns the `attrs` object this node carries in ADF, if any.
    fn attrs(&self) -> Option<Value> {
        match self {
            Self::Heading { level, .. } => Some(json!({ "level": level })),
            Self::OrderedList { order, .. } if *order != 1 => Some(json!({ "order": order })),
            Self::CodeBlock {
                language: Some(language),
                ..
            } => Some(json!({ "language": language })),
            Self::Panel { panel_type, .. } => Some(json!({ "panelType": panel_type })),
            Self::Mention { id, text } => Some(match id {
                Some(id) => json!({ "id": id, "text": text }),
                None => json!({ "text": text }),
            }),
            Self::Emoji { short_name } => Some(json!({ "shortName": short_name })),
            Self::InlineCard { url } | Self::BlockCard { url } => Some(json!({ "url": url })),
            Self::Date { timestamp } => Some(json!({ "timestamp": timestamp })),
            _ => None,
        }
    }

    /// Concatenates every text payload in the tree, without formatting.
    #[must_use]
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Self::Text { text, .. } | Self::Mention { text, .. } => out.push_str(text),
            Self::Emoji { short_name } => out.push_str(short_name),
            Self::InlineCard { url } | Self::BlockCard { url } => out.push_str(url),
            _ => {
                for child in self.children().unwrap_or_default() {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Decodes an ADF JSON value into a typed tree.
    ///
    /// Returns `None` only when `value` is not a JSON object. Everything
    /// below the root degrades to defaults: non-object children are
    /// skipped, missing strings become empty, and unknown `type` tags
    /// become [`Node::Unknown`].
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object()?;

        let kind = get_str(value, &["type"]).unwrap_or_default();
        let attr = |key: &str| get_string(value, &["attrs", key]).unwrap_or_default();

        Some(match kind {
            "doc" => Self::Document(children(value)),
            "paragraph" => Self::Paragraph(children(value)),
            "heading" => Self::Heading {
                level: heading_level(value),
                content: children(value),
            },
            "bulletList" => Self::BulletList(children(value)),
            "orderedList" => Self::OrderedList {
                order: value
                    .get("attrs")
                    .and_then(|a| a.get("order"))
                    .and_then(Value::as_u64)
                    .unwrap_or(1),
                items: children(value),
            },
            "listItem" => Self::ListItem(children(value)),
            "codeBlock" => Self::CodeBlock {
                language: get_string(value, &["attrs", "language"]),
                content: children(value),
            },
            "blockquote" => Self::Blockquote(children(value)),
            "rule" => Self::Rule,
            "table" => Self::Table(children(value)),
            "tableRow" => Self::TableRow(children(value)),
            "tableHeader" => Self::TableHeader(children(value)),
            "tableCell" => Self::TableCell(children(value)),
            "panel" => Self::Panel {
                panel_type: attr("panelType"),
                content: children(value),
            },
            "text" => Self::Text {
                text: get_string(value, &["text"]).unwrap_or_default(),
                marks: marks(value),
            },
            "hardBreak" => Self::HardBreak,
            "mention" => Self::Mention {
                id: get_string(value, &["attrs", "id"]),
                text: attr("text"),
            },
            "emoji" => Self::Emoji {
                short_name: attr("shortName"),
            },
            "inlineCard" => Self::InlineCard { url: attr("url") },
            "blockCard" => Self::BlockCard { url: attr("url") },
            "date" => Self::Date {
                timestamp: date_timestamp(value),
            },
            other => {
                log::trace!("keeping unknown ADF node kind {other:?}");
                Self::Unknown {
                    kind: other.to_owned(),
                    content: children(value),
                }
            }
        })
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("expected an ADF node object"))
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.kind())?;
        if matches!(self, Self::Document(_)) {
            map.serialize_entry("version", &1)?;
        }
        if let Some(attrs) = self.attrs() {
            map.serialize_entry("attrs", &attrs)?;
        }
        if let Self::Text { text, marks } = self {
            map.serialize_entry("text", text)?;
            if !marks.is_empty() {
                map.serialize_entry("marks", marks)?;
            }
        }
        if let Some(content) = self.children() {
            map.serialize_entry("content", content)?;
        }
        map.end()
    }
}

/// Decodes the `content` array, skipping anything that is not an object.
fn children(value: &Value) -> Vec<Node> {
    value
        .get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Node::from_value)
        .collect()
}

fn marks(value: &Value) -> Vec<Mark> {
    value
        .get("marks")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Mark::from_value)
        .collect()
}

/// Reads `attrs.level`, accepting integers, floats and numeric strings.
///
/// Missing or non-numeric levels become 1; everything else is clamped to
/// `1..=6`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn heading_level(value: &Value) -> u8 {
    let level = match value.get("attrs").and_then(|a| a.get("level")) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    level.map_or(1, |l| l.clamp(1, 6) as u8)
}

/// The timestamp is a string on the wire, but some producers send a number.
fn date_timestamp(value: &Value) -> String {
    match value.get("attrs").and_then(|a| a.get("timestamp")) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Navigates a JSON path and returns the string value at the end.
fn get_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str()
}

/// Like [`get_str`] but returns an owned `String`.
fn get_string(value: &Value, path: &[&str]) -> Option<String> {
    get_str(value, path).map(str::to_owned)
}
