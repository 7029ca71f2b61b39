// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Plain-text rendering of Confluence storage-format HTML.
//!
//! Confluence returns page bodies (`body.storage.value`) as an XHTML
//! dialect. This is not an HTML parser: the body goes through a fixed,
//! ordered list of pattern rewrites, each seeing the output of the ones
//! before it. Headings, paragraphs, lists, code, emphasis, links, images,
//! tables and blockquotes get markdown-flavoured markers; every other tag
//! is dropped with its text kept. Entities are decoded only after all tags
//! are gone, so a literal `&lt;` can never be mistaken for a tag.
//!
//! Ordered lists are not numbered here, unlike the ADF renderer; every
//! list item gets a `•` marker.
//!
//! # Example
//!
//! ```
//! use atl::storage::render_text;
//!
//! let html = "<h2>Notes</h2><ul><li><strong>Ship</strong> it</li></ul>";
//! assert_eq!(render_text(html), "## Notes\n\n• **Ship** it");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

/// A single rewrite: every match of `pattern` becomes `replacement`.
struct Rule {
    pattern: Regex,
    replacement: String,
}

impl Rule {
    fn new(pattern: &str, replacement: impl Into<String>) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("valid storage rewrite regex"),
            replacement: replacement.into(),
        }
    }

    fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, self.replacement.as_str())
            .into_owned()
    }
}

/// Opening tag `name` with optional attributes, but not a longer tag name
/// that merely starts with `name` (`<p>` must not match `<pre>`).
fn open(name: &str) -> String {
    format!(r"<{name}(?:\s[^>]*)?>")
}

fn close(name: &str) -> String {
    format!("</{name}>")
}

/// Non-greedy element with its content captured as group 1.
fn element(name: &str) -> String {
    format!("{}(.*?){}", open(name), close(name))
}

/// The tag rewrites, in application order.
static TAG_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    let mut rules = Vec::new();

    for level in 1..=6 {
        let tag = format!("h{level}");
        rules.push(Rule::new(&open(&tag), format!("\n{} ", "#".repeat(level))));
        rules.push(Rule::new(&close(&tag), "\n"));
    }

    rules.extend([
        Rule::new(&open("p"), "\n"),
        Rule::new(&close("p"), "\n"),
        Rule::new(r"<br(?:\s[^>]*)?/?>", "\n"),
        Rule::new(&open("li"), "\n• "),
        Rule::new(&close("li"), ""),
        Rule::new(&open("ul"), "\n"),
        Rule::new(&close("ul"), "\n"),
        Rule::new(&open("ol"), "\n"),
        Rule::new(&close("ol"), "\n"),
        // Code blocks may span lines.
        Rule::new(
            &format!("(?s){}{}{}", open("pre"), element("code"), close("pre")),
            "\n```\n${1}\n```\n",
        ),
        Rule::new(&format!("(?s){}", element("pre")), "\n```\n${1}\n```\n"),
        Rule::new(&element("code"), "`${1}`"),
        Rule::new(&element("strong"), "**${1}**"),
        Rule::new(&element("b"), "**${1}**"),
        Rule::new(&element("em"), "*${1}*"),
        Rule::new(&element("i"), "*${1}*"),
        Rule::new(r#"<a\s[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#, "${2} (${1})"),
        Rule::new(r#"<img\s[^>]*alt="([^"]*)"[^>]*>"#, "[Image: ${1}]"),
        Rule::new(r#"<img\s[^>]*src="([^"]*)"[^>]*>"#, "[Image: ${1}]"),
        Rule::new(&open("table"), "\n"),
        Rule::new(&close("table"), "\n"),
        Rule::new(&open("tr"), ""),
        Rule::new(&close("tr"), "\n"),
        Rule::new(&open("th"), "| "),
        Rule::new(&close("th"), " "),
        Rule::new(&open("td"), "| "),
        Rule::new(&close("td"), " "),
        Rule::new(&open("div"), "\n"),
        Rule::new(&close("div"), "\n"),
        Rule::new(&open("span"), ""),
        Rule::new(&close("span"), ""),
        Rule::new(&open("blockquote"), "\n> "),
        Rule::new(&close("blockquote"), "\n"),
        // Anything still looking like a tag goes, text stays.
        Rule::new(r"<[^>]+>", ""),
    ]);

    rules
});

/// Entities decoded after tag removal. `&amp;` comes last so `&amp;lt;`
/// decodes to the literal `&lt;`.
const ENTITIES: [(&str, &str); 6] = [
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&nbsp;", " "),
    ("&amp;", "&"),
];

static BLANK_LINES: Lazy<Rule> = Lazy::new(|| Rule::new(r"\n\s*\n\s*\n+", "\n\n"));
static HORIZONTAL_SPACE: Lazy<Rule> = Lazy::new(|| Rule::new(r"[ \t]+", " "));

/// Renders Confluence storage HTML as plain text.
///
/// Empty input gives empty output; malformed markup is rewritten as far as
/// the patterns reach and never causes an error.
#[must_use]
pub fn render_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let mut text = TAG_RULES
        .iter()
        .fold(html.to_owned(), |text, rule| rule.apply(&text));

    for (entity, decoded) in ENTITIES {
        text = text.replace(entity, decoded);
    }

    let text = HORIZONTAL_SPACE.apply(&BLANK_LINES.apply(&text));
    text.trim().to_owned()
}
