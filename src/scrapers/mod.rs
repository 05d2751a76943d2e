//! Listing and article scrapers for Tech in Asia.
//!
//! Scraping follows the same two-phase pattern the rest of the crate is
//! built around:
//!
//! 1. **Listing**: scroll the category page and turn article cards into
//!    [`ArticleRecord`](crate::models::ArticleRecord)s ([`listing`], using
//!    [`parser`] for each card)
//! 2. **Content**: visit each article and pull the full body text
//!    ([`content`])
//!
//! # Fallback chains
//!
//! The site's markup is generated client-side and its class names change
//! often, so every field is read through an ordered list of strategies and
//! the first one that yields a value wins:
//!
//! | Stage | Strategies |
//! |-------|------------|
//! | Card | `article.post-card` → `article` → `div` with card/article/post class |
//! | Title | `h3.post-title` → `h3` → first link text |
//! | Image | `div.post-image img` → any `img` → inline `background-image` |
//! | Body | site selectors → configured selectors → all `<p>` → in-page script |

use crate::utils::collapse_whitespace;
use scraper::{ElementRef, Node};

pub mod content;
pub mod listing;
pub mod parser;

const SKIPPED_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// Elements that start a new line of text when rendered.
const BLOCK_TAGS: [&str; 22] = [
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "li", "p", "section", "tr",
];

/// Visible text of an element with whitespace collapsed.
///
/// Text nodes are concatenated as they appear, so inline markup such as
/// `<a>` or `<b>` adds no spacing of its own. Block-level children are
/// separated by a space. Text inside `<script>`, `<style>` and `<noscript>`
/// is ignored.
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if !SKIPPED_TAGS.contains(&el.name()) => {
                let block = BLOCK_TAGS.contains(&el.name());
                if block {
                    out.push(' ');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}
