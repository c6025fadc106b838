//! Visible-text extraction.
//!
//! The browser's only job here is to serialize the `body` subtree into a
//! minimal node tree (tag, computed visibility, text, children); everything
//! else — which subtrees count, how structure becomes spacing, whitespace
//! normalization — is a plain recursive walk over that tree on the Rust
//! side, where it can be tested without a browser.

use std::sync::Arc;

use headless_chrome::Tab;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::{RenderError, Result};

/// Serializes the `body` subtree. Children of hidden elements are pruned in
/// the page to keep the payload small; the walk re-checks visibility anyway.
const SNAPSHOT_JS: &str = r#"
(() => {
    const snapshot = (node) => {
        if (node.nodeType === Node.TEXT_NODE) {
            return { tag: '#text', visible: true, text: node.textContent, children: [] };
        }
        if (node.nodeType !== Node.ELEMENT_NODE) {
            return null;
        }
        const style = window.getComputedStyle(node);
        const visible = style.display !== 'none' && style.visibility !== 'hidden';
        const children = [];
        if (visible) {
            for (const child of node.childNodes) {
                const snapped = snapshot(child);
                if (snapped) {
                    children.push(snapped);
                }
            }
        }
        return { tag: node.tagName.toLowerCase(), visible, children };
    };
    return JSON.stringify(snapshot(document.body));
})()
"#;

/// One DOM node as seen by the text extractor. Text nodes use the `#text`
/// pseudo-tag and carry their content; elements carry tag, visibility and
/// children.
#[derive(Debug, Clone, Deserialize)]
pub struct TextNode {
    pub tag: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<TextNode>,
}

fn default_visible() -> bool {
    true
}

/// Capture the node tree for the current document's body.
pub fn capture_snapshot(tab: &Arc<Tab>) -> Result<TextNode> {
    let result = tab.evaluate(SNAPSHOT_JS, false)?;
    let raw = result
        .value
        .as_ref()
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            RenderError::Browser(anyhow::anyhow!("document body snapshot returned no data"))
        })?;
    serde_json::from_str(raw).map_err(|e| {
        RenderError::Browser(anyhow::anyhow!("malformed body snapshot: {e}"))
    })
}

/// Reconstruct human-readable text from a node tree: depth-first, hidden
/// subtrees dropped, block-level structure preserved as newlines and list
/// items bulleted, then whitespace-normalized.
pub fn extract_visible_text(root: &TextNode) -> String {
    normalize(&walk(root))
}

fn walk(node: &TextNode) -> String {
    if node.tag == "#text" {
        return match node.text.as_deref() {
            Some(content) => format!("{} ", content.trim()),
            None => String::new(),
        };
    }

    // Hidden elements contribute nothing, descendants included.
    if !node.visible {
        return String::new();
    }
    if matches!(node.tag.as_str(), "script" | "style" | "noscript") {
        return String::new();
    }

    let mut text = String::new();
    for child in &node.children {
        text.push_str(&walk(child));
    }

    match node.tag.as_str() {
        "p" | "div" | "section" | "article" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            format!("\n{}\n", text.trim())
        }
        "br" => "\n".to_string(),
        "li" => format!("• {}\n", text.trim()),
        _ => text,
    }
}

/// Collapse every whitespace run containing a newline into a single newline,
/// every remaining horizontal run into a single space, and trim the ends.
fn normalize(raw: &str) -> String {
    static NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\n\s*").unwrap());
    static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

    let collapsed = NEWLINE_RUNS.replace_all(raw, "\n");
    let collapsed = SPACE_RUNS.replace_all(&collapsed, " ");
    collapsed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(content: &str) -> TextNode {
        TextNode {
            tag: "#text".into(),
            visible: true,
            text: Some(content.into()),
            children: vec![],
        }
    }

    fn element(tag: &str, children: Vec<TextNode>) -> TextNode {
        TextNode {
            tag: tag.into(),
            visible: true,
            text: None,
            children,
        }
    }

    fn hidden(tag: &str, children: Vec<TextNode>) -> TextNode {
        TextNode {
            tag: tag.into(),
            visible: false,
            text: None,
            children,
        }
    }

    #[test]
    fn paragraph_break_and_list_item_structure() {
        // <body><p>Hello</p><br><ul><li>One</li></ul></body>
        let body = element(
            "body",
            vec![
                element("p", vec![text("Hello")]),
                element("br", vec![]),
                element("ul", vec![element("li", vec![text("One")])]),
            ],
        );
        assert_eq!(extract_visible_text(&body), "Hello\n• One");
    }

    #[test]
    fn hidden_subtrees_contribute_nothing() {
        let body = element(
            "body",
            vec![
                element("p", vec![text("shown")]),
                hidden(
                    "div",
                    vec![element("p", vec![text("never rendered")])],
                ),
            ],
        );
        assert_eq!(extract_visible_text(&body), "shown");
    }

    #[test]
    fn script_style_and_noscript_are_skipped() {
        let body = element(
            "body",
            vec![
                element("script", vec![text("var x = 1;")]),
                element("style", vec![text(".a { color: red }")]),
                element("noscript", vec![text("enable js")]),
                element("p", vec![text("real content")]),
            ],
        );
        assert_eq!(extract_visible_text(&body), "real content");
    }

    #[test]
    fn br_discards_accumulated_children_text() {
        let body = element(
            "body",
            vec![
                text("before"),
                element("br", vec![text("swallowed")]),
                text("after"),
            ],
        );
        assert_eq!(extract_visible_text(&body), "before\nafter");
    }

    #[test]
    fn inline_elements_concatenate_with_spacing() {
        let body = element(
            "body",
            vec![element(
                "p",
                vec![
                    text("first"),
                    element("span", vec![text("second")]),
                    text("third"),
                ],
            )],
        );
        assert_eq!(extract_visible_text(&body), "first second third");
    }

    #[test]
    fn blank_lines_between_blocks_collapse_to_one_newline() {
        let body = element(
            "body",
            vec![
                element("h1", vec![text("Title")]),
                element("div", vec![text("  spaced   out  ")]),
                element("p", vec![text("tail")]),
            ],
        );
        assert_eq!(extract_visible_text(&body), "Title\nspaced out\ntail");
    }

    #[test]
    fn snapshot_shape_deserializes_from_page_json() {
        let raw = r##"{
            "tag": "body",
            "visible": true,
            "children": [
                { "tag": "#text", "visible": true, "text": "hi", "children": [] },
                { "tag": "div", "visible": false, "children": [] }
            ]
        }"##;
        let node: TextNode = serde_json::from_str(raw).unwrap();
        assert_eq!(node.tag, "body");
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[0].text.as_deref(), Some("hi"));
        assert!(!node.children[1].visible);
        assert_eq!(extract_visible_text(&node), "hi");
    }
}
