// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Rich-text conversion for the `atl` Jira and Confluence client.
//!
//! Atlassian Cloud stores rich text in two shapes: Jira uses ADF
//! (Atlassian Document Format), a JSON node tree, and Confluence pages use
//! an XHTML "storage format". This crate converts between those and the
//! two formats people actually type and read in a terminal:
//!
//! 1. ADF → plain text, for showing issue descriptions and comments
//! 2. Storage HTML → plain text, for showing Confluence pages
//! 3. Markdown → ADF, for creating and editing issues
//!
//! All conversions are pure functions that never fail: malformed input
//! degrades to the closest sensible output.
//!
//! # Example
//!
//! ```
//! use atl::{adf, markdown, storage};
//!
//! let description = markdown::to_adf("# Bug\n\nIt **crashes**.");
//! assert_eq!(adf::render_text(&description), "# Bug\nIt **crashes**.");
//!
//! let page = storage::render_text("<p>Hello <em>world</em></p>");
//! assert_eq!(page, "Hello *world*");
//! ```
//!
//! # Modules
//!
//! - [`document`]: typed ADF node tree with forgiving decoding
//! - [`adf`]: ADF to plain-text rendering
//! - [`storage`]: Confluence storage HTML to plain-text rendering
//! - [`markdown`]: Markdown to ADF compilation
//! - [`config`]: stored accounts and defaults

#![deny(missing_docs)]

pub mod adf;
pub mod config;
pub mod document;
pub mod markdown;
pub mod storage;
