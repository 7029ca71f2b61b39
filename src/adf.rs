// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Plain-text rendering of ADF documents.
//!
//! Jira returns issue descriptions and comment bodies as ADF JSON. This
//! module turns them into indented, markdown-flavoured text for the
//! terminal: headings get `#` prefixes, marks become `**`/`*`/`` ` ``/`~~`
//! wrappers, lists get `•` or `1.` markers and panels get a `[TYPE]` label.
//!
//! Rendering never fails. Absent or non-object input renders as an empty
//! string, and unknown node kinds render their children.
//!
//! # Example
//!
//! ```
//! use atl::adf::render_text;
//!
//! let adf = serde_json::json!({
//!     "type": "doc",
//!     "version": 1,
//!     "content": [
//!         { "type": "heading", "attrs": { "level": 2 },
//!           "content": [{ "type": "text", "text": "Steps" }] },
//!         { "type": "orderedList", "content": [
//!             { "type": "listItem", "content": [
//!                 { "type": "paragraph", "content": [{ "type": "text", "text": "Build" }] }
//!             ]}
//!         ]}
//!     ]
//! });
//!
//! assert_eq!(render_text(&adf), "## Steps\n1. Build");
//! ```

use crate::document::{Mark, Node};
use chrono::DateTime;
use serde_json::Value;

const BULLET: &str = "•";

/// Renders an ADF JSON value as plain text.
///
/// Returns an empty string for `null` or any non-object value.
#[must_use]
pub fn render_text(adf: &Value) -> String {
    Node::from_value(adf).map_or_else(String::new, |node| render_node(&node))
}

/// Renders an already decoded tree as plain text.
///
/// The result is trimmed of leading and trailing whitespace.
#[must_use]
pub fn render_node(node: &Node) -> String {
    let mut out = String::new();
    render(&mut out, node, 0);
    out.trim().to_owned()
}

fn render(out: &mut String, node: &Node, indent: usize) {
    match node {
        Node::Paragraph(content) => {
            pad(out, indent);
            render_all(out, content, indent);
            out.push('\n');
        }
        Node::Heading { level, content } => {
            out.push('\n');
            pad(out, indent);
            out.push_str(&"#".repeat(usize::from(*level)));
            out.push(' ');
            render_all(out, content, indent);
            out.push('\n');
        }
        Node::Text { text, marks } => out.push_str(&apply_marks(text, marks)),
        Node::BulletList(items) => {
            for item in items {
                render_list_item(out, item, indent, BULLET);
            }
            out.push('\n');
        }
        Node::OrderedList { order, items } => {
            for (offset, item) in (0_u64..).zip(items) {
                let number = order.saturating_add(offset);
                render_list_item(out, item, indent, &format!("{number}."));
            }
            out.push('\n');
        }
        Node::CodeBlock { content, .. } => {
            out.push('\n');
            pad(out, indent);
            out.push_str("```\n");
            out.push_str(&code_text(content));
            if !out.ends_with('\n') {
                out.push('\n');
            }
            pad(out, indent);
            out.push_str("```\n");
        }
        Node::Blockquote(content) => {
            for child in content {
                pad(out, indent);
                out.push_str("> ");
                render(out, child, 0);
            }
        }
        Node::HardBreak => out.push('\n'),
        Node::Rule => {
            out.push('\n');
            pad(out, indent);
            out.push_str("---\n");
        }
        Node::Mention { text, .. } => {
            out.push('@');
            out.push_str(text);
        }
        Node::Emoji { short_name } => out.push_str(short_name),
        Node::InlineCard { url } | Node::BlockCard { url } => out.push_str(url),
        Node::Date { timestamp } => out.push_str(&format_date(timestamp)),
        Node::Panel {
            panel_type,
            content,
        } => {
            out.push('\n');
            pad(out, indent);
            out.push('[');
            out.push_str(&panel_type.to_uppercase());
            out.push_str("]\n");
            render_all(out, content, indent + 2);
            out.push('\n');
        }
        Node::TableRow(cells) => {
            pad(out, indent);
            for cell in cells {
                out.push_str(&cell_text(cell));
                out.push_str(" | ");
            }
            out.push('\n');
        }
        Node::Unknown { kind, content } => {
            log::debug!("rendering children of unknown node kind {kind:?}");
            render_all(out, content, indent);
        }
        Node::Document(content)
        | Node::Table(content)
        | Node::ListItem(content)
        | Node::TableHeader(content)
        | Node::TableCell(content) => render_all(out, content, indent),
    }
}

fn render_all(out: &mut String, nodes: &[Node], indent: usize) {
    for node in nodes {
        render(out, node, indent);
    }
}

/// Renders one list entry on its own line behind `marker`.
///
/// A leading paragraph sits on the marker line; any further blocks start on
/// fresh lines indented by two more spaces.
fn render_list_item(out: &mut String, item: &Node, indent: usize, marker: &str) {
    let content = match item {
        Node::ListItem(content) => content.as_slice(),
        other => std::slice::from_ref(other),
    };

    pad(out, indent);
    out.push_str(marker);
    out.push(' ');

    let rest = match content.split_first() {
        Some((Node::Paragraph(inlines), rest)) => {
            render_all(out, inlines, indent);
            rest
        }
        _ => content,
    };

    for child in rest {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        render(out, child, indent + 2);
    }

    while out.ends_with("\n\n") {
        out.pop();
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Wraps `text` in each mark's delimiters, in order.
fn apply_marks(text: &str, marks: &[Mark]) -> String {
    marks
        .iter()
        .fold(text.to_owned(), |formatted, mark| match mark {
            Mark::Strong => format!("**{formatted}**"),
            Mark::Em => format!("*{formatted}*"),
            Mark::Code => format!("`{formatted}`"),
            Mark::Strike => format!("~~{formatted}~~"),
            Mark::Link { href } if !href.is_empty() && href != text => {
                format!("{formatted} ({href})")
            }
            Mark::Link { .. } | Mark::Unknown(_) => formatted,
        })
}

/// Raw code block text; marks are not applied inside code.
fn code_text(content: &[Node]) -> String {
    content
        .iter()
        .map(|node| match node {
            Node::HardBreak => "\n".to_owned(),
            other => other.plain_text(),
        })
        .collect()
}

/// Renders a table cell's blocks on a single line.
fn cell_text(cell: &Node) -> String {
    let mut rendered = String::new();
    render(&mut rendered, cell, 0);
    rendered
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_date(timestamp: &str) -> String {
    timestamp
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map_or_else(
            || timestamp.to_owned(),
            |dt| dt.format("%Y-%m-%d").to_string(),
        )
}

fn pad(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat_n(' ', indent));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(content: Value) -> Value {
        json!({ "type": "doc", "version": 1, "content": content })
    }

    fn text(t: &str) -> Value {
        json!({ "type": "text", "text": t })
    }

    fn para(t: &str) -> Value {
        json!({ "type": "paragraph", "content": [text(t)] })
    }

    fn item(t: &str) -> Value {
        json!({ "type": "listItem", "content": [para(t)] })
    }

    #[test]
    fn renders_nothing_for_null_and_non_objects() {
        assert_eq!(render_text(&Value::Null), "");
        assert_eq!(render_text(&json!("a string")), "");
        assert_eq!(render_text(&json!(12)), "");
        assert_eq!(render_text(&json!([para("x")])), "");
    }

    #[test]
    fn renders_empty_document() {
        assert_eq!(render_text(&doc(json!([]))), "");
        assert_eq!(render_text(&json!({ "type": "doc" })), "");
    }

    #[test]
    fn renders_paragraphs_on_separate_lines() {
        let adf = doc(json!([para("First"), para("Second")]));
        assert_eq!(render_text(&adf), "First\nSecond");
    }

    #[test]
    fn renders_every_heading_level() {
        for level in 1..=6 {
            let adf = doc(json!([{
                "type": "heading",
                "attrs": { "level": level },
                "content": [text("T")]
            }]));
            let expected = format!("{} T", "#".repeat(level));
            assert!(
                render_text(&adf).contains(&expected),
                "level {level} should render {expected:?}"
            );
        }
    }

    #[test]
    fn heading_without_level_renders_as_level_one() {
        let adf = doc(json!([{ "type": "heading", "content": [text("Title")] }]));
        assert_eq!(render_text(&adf), "# Title");
    }

    #[test]
    fn applies_each_mark() {
        let cases = [
            ("strong", "**x**"),
            ("em", "*x*"),
            ("code", "`x`"),
            ("strike", "~~x~~"),
        ];
        for (mark, expected) in cases {
            let adf = doc(json!([{
                "type": "paragraph",
                "content": [{ "type": "text", "text": "x", "marks": [{ "type": mark }] }]
            }]));
            assert_eq!(render_text(&adf), expected, "mark {mark}");
        }
    }

    #[test]
    fn composes_marks_in_order() {
        let adf = doc(json!([{
            "type": "paragraph",
            "content": [{
                "type": "text",
                "text": "x",
                "marks": [{ "type": "strong" }, { "type": "em" }]
            }]
        }]));
        assert_eq!(render_text(&adf), "***x***");

        let adf = doc(json!([{
            "type": "paragraph",
            "content": [{
                "type": "text",
                "text": "x",
                "marks": [{ "type": "code" }, { "type": "strike" }]
            }]
        }]));
        assert_eq!(render_text(&adf), "~~`x`~~");
    }

    #[test]
    fn renders_link_target_after_text() {
        let adf = doc(json!([{
            "type": "paragraph",
            "content": [
                { "type": "text", "text": "docs", "marks": [{ "type": "link", "attrs": { "href": "https://d.test" } }] },
                text(" and "),
                { "type": "text", "text": "https://d.test", "marks": [{ "type": "link", "attrs": { "href": "https://d.test" } }] }
            ]
        }]));
        assert_eq!(
            render_text(&adf),
            "docs (https://d.test) and https://d.test"
        );
    }

    #[test]
    fn renders_bullet_list() {
        let adf = doc(json!([{ "type": "bulletList", "content": [item("A"), item("B")] }]));
        assert_eq!(render_text(&adf), "• A\n• B");
    }

    #[test]
    fn numbers_ordered_list_items() {
        let adf = doc(json!([{
            "type": "orderedList",
            "content": [item("one"), item("two"), item("three")]
        }]));
        let output = render_text(&adf);

        assert_eq!(output, "1. one\n2. two\n3. three");
        let first = output.find("1.").unwrap();
        let second = output.find("2.").unwrap();
        let third = output.find("3.").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn ordered_list_honours_start_number() {
        let adf = doc(json!([{
            "type": "orderedList",
            "attrs": { "order": 5 },
            "content": [item("five"), item("six")]
        }]));
        assert_eq!(render_text(&adf), "5. five\n6. six");
    }

    #[test]
    fn nested_list_starts_on_new_line() {
        let adf = doc(json!([{
            "type": "bulletList",
            "content": [
                {
                    "type": "listItem",
                    "content": [
                        para("outer"),
                        { "type": "bulletList", "content": [item("inner")] }
                    ]
                },
                item("next")
            ]
        }]));
        assert_eq!(render_text(&adf), "• outer\n  • inner\n• next");
    }

    #[test]
    fn renders_code_block_raw() {
        let adf = doc(json!([
            para("before"),
            {
                "type": "codeBlock",
                "attrs": { "language": "rust" },
                "content": [{ "type": "text", "text": "fn main() {}", "marks": [{ "type": "strong" }] }]
            }
        ]));
        assert_eq!(render_text(&adf), "before\n\n```\nfn main() {}\n```");
    }

    #[test]
    fn renders_blockquote_marker() {
        let adf = doc(json!([{ "type": "blockquote", "content": [para("quoted")] }]));
        assert_eq!(render_text(&adf), "> quoted");
    }

    #[test]
    fn renders_hard_break_and_rule() {
        let adf = doc(json!([
            { "type": "paragraph", "content": [text("a"), { "type": "hardBreak" }, text("b")] },
            { "type": "rule" },
            para("c")
        ]));
        assert_eq!(render_text(&adf), "a\nb\n\n---\nc");
    }

    #[test]
    fn renders_inline_leaves() {
        let adf = doc(json!([{
            "type": "paragraph",
            "content": [
                { "type": "mention", "attrs": { "id": "1", "text": "Ada" } },
                text(" "),
                { "type": "mention", "attrs": { "id": "2", "text": "@Grace" } },
                text(" "),
                { "type": "emoji", "attrs": { "shortName": ":smile:" } },
                text(" "),
                { "type": "inlineCard", "attrs": { "url": "https://jira.test/browse/X-1" } }
            ]
        }]));
        assert_eq!(
            render_text(&adf),
            "@Ada @@Grace :smile: https://jira.test/browse/X-1"
        );
    }

    #[test]
    fn renders_block_card_url() {
        let adf = doc(json!([{ "type": "blockCard", "attrs": { "url": "https://c.test" } }]));
        assert_eq!(render_text(&adf), "https://c.test");
    }

    #[test]
    fn renders_date_as_calendar_day() {
        let adf = doc(json!([{
            "type": "paragraph",
            "content": [{ "type": "date", "attrs": { "timestamp": "1733356800000" } }]
        }]));
        assert_eq!(render_text(&adf), "2024-12-05");

        let adf = doc(json!([{
            "type": "paragraph",
            "content": [{ "type": "date", "attrs": { "timestamp": "soon" } }]
        }]));
        assert_eq!(render_text(&adf), "soon");
    }

    #[test]
    fn renders_panel_with_label_and_indent() {
        let adf = doc(json!([
            { "type": "panel", "attrs": { "panelType": "warning" }, "content": [para("Careful")] },
            para("after")
        ]));
        assert_eq!(render_text(&adf), "[WARNING]\n  Careful\n\nafter");
    }

    #[test]
    fn renders_table_rows_with_separators() {
        let cell = |kind: &str, t: &str| json!({ "type": kind, "content": [para(t)] });
        let adf = doc(json!([
            {
                "type": "table",
                "content": [
                    { "type": "tableRow", "content": [cell("tableHeader", "Name"), cell("tableHeader", "Age")] },
                    { "type": "tableRow", "content": [cell("tableCell", "Ada"), cell("tableCell", "36")] }
                ]
            },
            para("after")
        ]));
        let output = render_text(&adf);

        // Every cell, the last included, is followed by the full separator.
        assert_eq!(output, "Name | Age | \nAda | 36 | \nafter");
        for line in output.lines() {
            assert!(line.contains('|'));
        }
    }

    #[test]
    fn unknown_node_renders_children() {
        let adf = doc(json!([{
            "type": "futureNode",
            "content": [
                { "type": "anotherFutureNode", "content": [para("still here")] }
            ]
        }]));
        assert_eq!(render_text(&adf), "still here");
    }

    #[test]
    fn tolerates_malformed_fields() {
        let adf = doc(json!([
            { "type": "paragraph", "content": [{ "type": "text" }, { "type": "text", "text": 5 }] },
            { "type": "mention" },
            { "type": "panel" },
            { "type": "orderedList", "content": [para("not an item")] },
            "stray",
            { "no": "type" }
        ]));
        assert_eq!(render_text(&adf), "@\n[]\n\n1. not an item");
    }
}
