// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Markdown to ADF compilation.
//!
//! Jira's write APIs only accept rich text as ADF. This module parses the
//! Markdown a user passes on the command line with `pulldown-cmark` and
//! folds the event stream into a [`Node`] tree, which serializes to the
//! ADF JSON that goes into `fields.description` or a comment body.
//!
//! Supported constructs: ATX headings, paragraphs, `**strong**`, `*em*`,
//! `` `code` ``, `~~strike~~`, bullet and ordered lists, fenced and
//! indented code blocks, blockquotes, links and images (as text with a
//! `link` mark), thematic breaks, hard breaks and pipe tables. Raw HTML is
//! kept as literal text.
//!
//! Compilation never fails. The worst case is a document holding the input
//! as a single paragraph.
//!
//! # Example
//!
//! ```
//! use atl::markdown::to_adf;
//!
//! let adf = to_adf("# Title\n\nSome **bold** text");
//!
//! assert_eq!(adf["type"], "doc");
//! assert_eq!(adf["content"][0]["type"], "heading");
//! assert_eq!(adf["content"][1]["content"][1]["marks"][0]["type"], "strong");
//! ```

use crate::document::{Mark, Node};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde_json::{Value, json};

/// Deepest block nesting kept in the tree. Blocks opened below this depth
/// have their content spliced into the enclosing block.
///
/// Each block level costs two levels of JSON nesting, so the compiled ADF
/// stays within `serde_json`'s default recursion limit of 128.
const MAX_NESTING: usize = 50;

/// A block that is still receiving content.
#[derive(Debug)]
enum Frame {
    Document,
    Paragraph,
    Heading(u8),
    BlockQuote,
    CodeBlock { language: Option<String>, text: String },
    HtmlBlock(String),
    List(Option<u64>),
    Item,
    Table,
    TableHead,
    TableRow,
    TableCell { header: bool },
    /// A construct with no ADF counterpart; its content is spliced into the
    /// parent when it closes.
    Transparent,
}

#[derive(Debug)]
struct Open {
    frame: Frame,
    blocks: Vec<Node>,
    inlines: Vec<Node>,
}

impl Open {
    const fn new(frame: Frame) -> Self {
        Self {
            frame,
            blocks: Vec::new(),
            inlines: Vec::new(),
        }
    }

    /// Wraps pending inline content in a paragraph.
    fn flush_inlines(&mut self) {
        if !self.inlines.is_empty() {
            let inlines = std::mem::take(&mut self.inlines);
            self.blocks.push(Node::Paragraph(inlines));
        }
    }

    fn into_blocks(mut self) -> Vec<Node> {
        self.flush_inlines();
        self.blocks
    }

    /// Like [`Open::into_blocks`], but never empty; ADF requires list items
    /// and table cells to hold at least one block.
    fn into_nonempty_blocks(self) -> Vec<Node> {
        let mut blocks = self.into_blocks();
        if blocks.is_empty() {
            blocks.push(Node::Paragraph(Vec::new()));
        }
        blocks
    }
}

/// Folds `pulldown-cmark` events into a [`Node`] tree.
struct Builder {
    stack: Vec<Open>,
    /// Active inline marks, outermost first.
    marks: Vec<Mark>,
}

impl Builder {
    fn new() -> Self {
        Self {
            stack: vec![Open::new(Frame::Document)],
            marks: Vec::new(),
        }
    }

    fn top(&mut self) -> &mut Open {
        // The document frame is never popped, so the stack is never empty.
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                let mut marks = vec![Mark::Code];
                marks.extend(self.current_marks());
                self.push_inline(Node::text(&*code, marks));
            }
            Event::Html(html) | Event::InlineHtml(html) => self.text(&html),
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.push_inline(Node::HardBreak),
            Event::Rule => self.push_block(Node::Rule),
            Event::FootnoteReference(label) => self.text(&format!("[^{label}]")),
            Event::InlineMath(math) | Event::DisplayMath(math) => self.text(&math),
            Event::TaskListMarker(checked) => self.text(if checked { "[x] " } else { "[ ] " }),
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let frame = match tag {
            Tag::Paragraph => Frame::Paragraph,
            Tag::Heading { level, .. } => Frame::Heading(heading_level(level)),
            Tag::BlockQuote(_) => Frame::BlockQuote,
            Tag::CodeBlock(kind) => Frame::CodeBlock {
                language: match kind {
                    CodeBlockKind::Fenced(info) => info.split_whitespace().next().map(str::to_owned),
                    CodeBlockKind::Indented => None,
                },
                text: String::new(),
            },
            Tag::HtmlBlock => Frame::HtmlBlock(String::new()),
            Tag::List(start) => Frame::List(start),
            Tag::Item => Frame::Item,
            Tag::Table(_) => Frame::Table,
            Tag::TableHead => Frame::TableHead,
            Tag::TableRow => Frame::TableRow,
            Tag::TableCell => Frame::TableCell {
                header: matches!(self.top().frame, Frame::TableHead),
            },
            Tag::Emphasis => return self.marks.push(Mark::Em),
            Tag::Strong => return self.marks.push(Mark::Strong),
            Tag::Strikethrough => return self.marks.push(Mark::Strike),
            Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. } => {
                return self.marks.push(Mark::Link {
                    href: dest_url.to_string(),
                });
            }
            _ => Frame::Transparent,
        };
        let frame = if self.stack.len() > MAX_NESTING {
            Frame::Transparent
        } else {
            frame
        };
        self.stack.push(Open::new(frame));
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Emphasis
            | TagEnd::Strong
            | TagEnd::Strikethrough
            | TagEnd::Link
            | TagEnd::Image => {
                self.marks.pop();
            }
            _ => self.close(),
        }
    }

    /// Pops the innermost frame and hands its node to the parent.
    fn close(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(open) = self.stack.pop() else {
            return;
        };

        match open.frame {
            Frame::Paragraph => self.push_block(Node::Paragraph(open.inlines)),
            Frame::Heading(level) => self.push_block(Node::Heading {
                level,
                content: open.inlines,
            }),
            Frame::BlockQuote => self.push_block(Node::Blockquote(open.into_blocks())),
            Frame::CodeBlock { language, text } => {
                let text = text.strip_suffix('\n').unwrap_or(&text);
                let content = if text.is_empty() {
                    Vec::new()
                } else {
                    vec![Node::text(text, Vec::new())]
                };
                self.push_block(Node::CodeBlock { language, content });
            }
            Frame::HtmlBlock(raw) => {
                let raw = raw.trim_end();
                if !raw.is_empty() {
                    self.push_block(Node::Paragraph(vec![Node::text(raw, Vec::new())]));
                }
            }
            Frame::List(None) => self.push_block(Node::BulletList(open.into_blocks())),
            Frame::List(Some(order)) => self.push_block(Node::OrderedList {
                order,
                items: open.into_blocks(),
            }),
            Frame::Item => self.push_block(Node::ListItem(open.into_nonempty_blocks())),
            Frame::Table => self.push_block(Node::Table(open.into_blocks())),
            Frame::TableHead | Frame::TableRow => {
                self.push_block(Node::TableRow(open.into_blocks()));
            }
            Frame::TableCell { header } => {
                let content = open.into_nonempty_blocks();
                self.push_block(if header {
                    Node::TableHeader(content)
                } else {
                    Node::TableCell(content)
                });
            }
            Frame::Transparent | Frame::Document => {
                for block in open.blocks {
                    self.push_block(block);
                }
                for inline in open.inlines {
                    self.push_inline(inline);
                }
            }
        }
    }

    fn text(&mut self, text: &str) {
        match &mut self.top().frame {
            Frame::CodeBlock { text: buffer, .. } | Frame::HtmlBlock(buffer) => {
                buffer.push_str(text);
            }
            _ => {
                let marks = self.current_marks();
                self.push_inline(Node::text(text, marks));
            }
        }
    }

    /// Marks for a new text run, innermost first.
    fn current_marks(&self) -> Vec<Mark> {
        self.marks.iter().rev().cloned().collect()
    }

    /// Appends inline content, merging it into the previous text run when
    /// both carry the same marks.
    fn push_inline(&mut self, node: Node) {
        let inlines = &mut self.top().inlines;
        if let (
            Some(Node::Text {
                text: previous,
                marks: previous_marks,
            }),
            Node::Text { text, marks },
        ) = (inlines.last_mut(), &node)
            && previous_marks == marks
        {
            previous.push_str(text);
            return;
        }
        inlines.push(node);
    }

    fn push_block(&mut self, node: Node) {
        let top = self.top();
        top.flush_inlines();
        top.blocks.push(node);
    }

    fn finish(mut self) -> Node {
        while self.stack.len() > 1 {
            self.close();
        }
        let blocks = self
            .stack
            .pop()
            .map(Open::into_blocks)
            .unwrap_or_default();
        Node::Document(blocks)
    }
}

const fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Parses Markdown into a document tree.
///
/// Input that yields no blocks at all (for example a lone link reference
/// definition) becomes a single paragraph holding the raw text, so user
/// input is never silently dropped.
#[must_use]
pub fn parse(markdown: &str) -> Node {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let mut builder = Builder::new();
    for event in Parser::new_ext(markdown, options) {
        builder.event(event);
    }

    match builder.finish() {
        Node::Document(blocks) if blocks.is_empty() && !markdown.trim().is_empty() => {
            log::debug!("markdown produced no blocks, keeping it as plain text");
            Node::Document(vec![Node::Paragraph(vec![Node::text(
                markdown.trim(),
                Vec::new(),
            )])])
        }
        document => document,
    }
}

/// Compiles Markdown into an ADF document ready for a Jira request body.
///
/// The result is always an object with `"type": "doc"`, `"version": 1` and
/// a `content` array, which is empty for empty input.
#[must_use]
pub fn to_adf(markdown: &str) -> Value {
    let document = parse(markdown);
    serde_json::to_value(&document).unwrap_or_else(|err| {
        log::warn!("failed to encode ADF, sending raw text: {err}");
        json!({
            "type": "doc",
            "version": 1,
            "content": [{
                "type": "paragraph",
                "content": [{ "type": "text", "text": markdown }]
            }]
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adf;

    fn blocks(markdown: &str) -> Vec<Node> {
        match parse(markdown) {
            Node::Document(blocks) => blocks,
            other => panic!("Expected Document, got {other:?}"),
        }
    }

    fn plain(text: &str) -> Node {
        Node::text(text, Vec::new())
    }

    fn para(text: &str) -> Node {
        Node::Paragraph(vec![plain(text)])
    }

    #[test]
    fn empty_input_gives_empty_document() {
        let adf = to_adf("");

        assert_eq!(adf["type"], "doc");
        assert_eq!(adf["version"], 1);
        assert_eq!(adf["content"], json!([]));
    }

    #[test]
    fn whitespace_only_input_gives_empty_document() {
        assert!(blocks("   \n\n  ").is_empty());
    }

    #[test]
    fn parses_headings_with_levels() {
        for level in 1..=6_u8 {
            let markdown = format!("{} Title", "#".repeat(usize::from(level)));
            assert_eq!(
                blocks(&markdown),
                vec![Node::Heading {
                    level,
                    content: vec![plain("Title")]
                }]
            );
        }
    }

    #[test]
    fn splits_paragraphs_on_blank_lines() {
        assert_eq!(
            blocks("first line\nstill first\n\nsecond"),
            vec![para("first line still first"), para("second")]
        );
    }

    #[test]
    fn parses_inline_marks() {
        assert_eq!(
            blocks("a **b** *c* `d` ~~e~~"),
            vec![Node::Paragraph(vec![
                plain("a "),
                Node::text("b", vec![Mark::Strong]),
                plain(" "),
                Node::text("c", vec![Mark::Em]),
                plain(" "),
                Node::text("d", vec![Mark::Code]),
                plain(" "),
                Node::text("e", vec![Mark::Strike]),
            ])]
        );
    }

    #[test]
    fn nested_marks_list_innermost_first() {
        assert_eq!(
            blocks("***both*** and **`code`**"),
            vec![Node::Paragraph(vec![
                Node::text("both", vec![Mark::Strong, Mark::Em]),
                plain(" and "),
                Node::text("code", vec![Mark::Code, Mark::Strong]),
            ])]
        );
    }

    #[test]
    fn parses_bullet_lists() {
        let expected = vec![Node::BulletList(vec![
            Node::ListItem(vec![para("one")]),
            Node::ListItem(vec![para("two")]),
        ])];

        assert_eq!(blocks("- one\n- two"), expected);
        assert_eq!(blocks("* one\n* two"), expected);
    }

    #[test]
    fn parses_ordered_lists_with_start() {
        assert_eq!(
            blocks("1. one\n2. two"),
            vec![Node::OrderedList {
                order: 1,
                items: vec![
                    Node::ListItem(vec![para("one")]),
                    Node::ListItem(vec![para("two")]),
                ]
            }]
        );

        match &blocks("3. three")[0] {
            Node::OrderedList { order, .. } => assert_eq!(*order, 3),
            other => panic!("Expected OrderedList, got {other:?}"),
        }
    }

    #[test]
    fn nests_lists_inside_items() {
        assert_eq!(
            blocks("- outer\n  - inner"),
            vec![Node::BulletList(vec![Node::ListItem(vec![
                para("outer"),
                Node::BulletList(vec![Node::ListItem(vec![para("inner")])]),
            ])])]
        );
    }

    #[test]
    fn empty_list_item_gets_empty_paragraph() {
        assert_eq!(
            blocks("-\n- x"),
            vec![Node::BulletList(vec![
                Node::ListItem(vec![Node::Paragraph(vec![])]),
                Node::ListItem(vec![para("x")]),
            ])]
        );
    }

    #[test]
    fn parses_fenced_code_block() {
        assert_eq!(
            blocks("```rust ignore\nfn main() {}\nlet x = 1;\n```"),
            vec![Node::CodeBlock {
                language: Some("rust".into()),
                content: vec![plain("fn main() {}\nlet x = 1;")]
            }]
        );
        assert_eq!(
            blocks("```\n```"),
            vec![Node::CodeBlock {
                language: None,
                content: vec![]
            }]
        );
    }

    #[test]
    fn code_block_keeps_markdown_literal() {
        assert_eq!(
            blocks("```\n**not bold**\n```"),
            vec![Node::CodeBlock {
                language: None,
                content: vec![plain("**not bold**")]
            }]
        );
    }

    #[test]
    fn parses_blockquote() {
        assert_eq!(
            blocks("> quoted"),
            vec![Node::Blockquote(vec![para("quoted")])]
        );
    }

    #[test]
    fn links_carry_text_and_target() {
        let adf = to_adf("See [the docs](https://example.com/docs).");
        let text = adf["content"][0]["content"][1].clone();

        assert_eq!(text["text"], "the docs");
        assert_eq!(text["marks"][0]["type"], "link");
        assert_eq!(text["marks"][0]["attrs"]["href"], "https://example.com/docs");
    }

    #[test]
    fn images_become_linked_alt_text() {
        assert_eq!(
            blocks("![diagram](https://x.test/d.png)"),
            vec![Node::Paragraph(vec![Node::text(
                "diagram",
                vec![Mark::Link {
                    href: "https://x.test/d.png".into()
                }]
            )])]
        );
    }

    #[test]
    fn parses_rule_and_hard_break() {
        assert_eq!(
            blocks("a  \nb\n\n---\n\nc"),
            vec![
                Node::Paragraph(vec![plain("a"), Node::HardBreak, plain("b")]),
                Node::Rule,
                para("c"),
            ]
        );
    }

    #[test]
    fn parses_pipe_tables() {
        assert_eq!(
            blocks("| Name | Age |\n| --- | --- |\n| Ada | 36 |"),
            vec![Node::Table(vec![
                Node::TableRow(vec![
                    Node::TableHeader(vec![para("Name")]),
                    Node::TableHeader(vec![para("Age")]),
                ]),
                Node::TableRow(vec![
                    Node::TableCell(vec![para("Ada")]),
                    Node::TableCell(vec![para("36")]),
                ]),
            ])]
        );
    }

    #[test]
    fn keeps_raw_html_as_text() {
        assert_eq!(blocks("<div>hi</div>"), vec![para("<div>hi</div>")]);
    }

    #[test]
    fn input_without_blocks_degrades_to_paragraph() {
        assert_eq!(
            blocks("[ref]: https://example.com"),
            vec![para("[ref]: https://example.com")]
        );
    }

    #[test]
    fn unbalanced_markup_never_panics() {
        for markdown in ["**open", "> > > deep", "```\nunterminated", "- [", "|a|\n|-|"] {
            let adf = to_adf(markdown);
            assert_eq!(adf["type"], "doc");
            assert!(adf["content"].is_array());
        }
    }

    fn depth(node: &Node) -> usize {
        1 + node
            .children()
            .map_or(0, |children| children.iter().map(depth).max().unwrap_or(0))
    }

    #[test]
    fn deep_nesting_is_capped() {
        for markdown in ["> ".repeat(5000) + "x", "- ".repeat(3000) + "x"] {
            let tree = parse(&markdown);
            assert_eq!(tree.plain_text(), "x");
            assert!(depth(&tree) <= MAX_NESTING + 3, "depth {}", depth(&tree));

            let adf = to_adf(&markdown);
            assert!(adf::render_text(&adf).ends_with('x'));
        }
    }

    #[test]
    fn nesting_below_the_cap_is_kept() {
        let tree = parse(&("> ".repeat(10) + "x"));
        // doc, ten quotes, paragraph, text
        assert_eq!(depth(&tree), 13);
    }

    #[test]
    fn heading_survives_round_trip() {
        let adf = to_adf("# Title");
        assert!(adf::render_text(&adf).contains("# Title"));
    }

    #[test]
    fn document_survives_round_trip() {
        let markdown = "## Plan\n\n1. **Build** it\n2. Ship `v1`\n\n> done\n\n```\nmake\n```";
        let output = adf::render_text(&to_adf(markdown));

        assert_eq!(
            output,
            "## Plan\n1. **Build** it\n2. Ship `v1`\n\n> done\n\n```\nmake\n```"
        );
    }
}
