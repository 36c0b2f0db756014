//! Structured rich text as stored by the CMS

use serde::{Deserialize, Serialize};

/// An ordered list of rich-text nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RichText(pub Vec<RichTextNode>);

/// A single block-level node (paragraph, heading, list item, image, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichTextNode {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub spans: Vec<Span>,

    /// Image source or embed URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Inline formatting over a character range of a node's text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RichText {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Plain text of all nodes, one node per line
    pub fn as_text(&self) -> String {
        self.0
            .iter()
            .map(|node| node.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render to HTML. Consecutive list items share one `<ul>`/`<ol>`.
    pub fn as_html(&self) -> String {
        let mut html = String::new();
        let mut open_list: Option<&'static str> = None;

        for node in &self.0 {
            let list = match node.kind.as_str() {
                "list-item" => Some("ul"),
                "o-list-item" => Some("ol"),
                _ => None,
            };

            if open_list != list {
                if let Some(tag) = open_list {
                    html.push_str(&format!("</{}>", tag));
                }
                if let Some(tag) = list {
                    html.push_str(&format!("<{}>", tag));
                }
                open_list = list;
            }

            html.push_str(&render_node(node));
        }

        if let Some(tag) = open_list {
            html.push_str(&format!("</{}>", tag));
        }

        html
    }
}

fn render_node(node: &RichTextNode) -> String {
    let inner = || render_spans(&node.text, &node.spans);
    match node.kind.as_str() {
        "paragraph" => format!("<p>{}</p>", inner()),
        "preformatted" => format!("<pre>{}</pre>", inner()),
        "list-item" | "o-list-item" => format!("<li>{}</li>", inner()),
        "image" => format!(
            r#"<p class="block-img"><img src="{}" alt="{}" /></p>"#,
            attr(node.url.as_deref().unwrap_or_default()),
            attr(node.alt.as_deref().unwrap_or_default())
        ),
        "embed" => format!(
            r#"<div data-oembed="{}"></div>"#,
            attr(node.url.as_deref().unwrap_or_default())
        ),
        kind => match kind.strip_prefix("heading") {
            Some(level @ ("1" | "2" | "3" | "4" | "5" | "6")) => {
                format!("<h{level}>{}</h{level}>", inner())
            }
            _ => {
                tracing::debug!("Unknown rich text node type: {}", kind);
                format!("<p>{}</p>", inner())
            }
        },
    }
}

/// Apply spans to text. Spans are character ranges. When a span ends while
/// a later one is still open, the later one is closed with it and reopened,
/// so every tag covers exactly its own range and the output stays well formed.
fn render_spans(text: &str, spans: &[Span]) -> String {
    let chars: Vec<char> = text.chars().collect();

    let mut pending: Vec<&Span> = spans
        .iter()
        .filter(|s| s.start < s.end && s.end <= chars.len())
        .collect();
    pending.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut out = String::new();
    let mut open: Vec<&Span> = Vec::new();
    let mut next = 0;
    let mut buf = [0u8; 4];

    for (i, c) in chars.iter().enumerate() {
        if let Some(depth) = open.iter().position(|span| span.end <= i) {
            let closed = open.split_off(depth);
            for span in closed.iter().rev() {
                out.push_str(close_tag(span));
            }
            for span in closed.into_iter().filter(|span| span.end > i) {
                out.push_str(&open_tag(span));
                open.push(span);
            }
        }
        while next < pending.len() && pending[next].start == i {
            out.push_str(&open_tag(pending[next]));
            open.push(pending[next]);
            next += 1;
        }

        if *c == '\n' {
            out.push_str("<br />");
        } else {
            html_escape::encode_text_to_string(c.encode_utf8(&mut buf), &mut out);
        }
    }

    while let Some(top) = open.pop() {
        out.push_str(close_tag(top));
    }

    out
}

fn open_tag(span: &Span) -> String {
    let data = |key: &str| {
        span.data
            .as_ref()
            .and_then(|d| d.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    match span.kind.as_str() {
        "strong" => "<strong>".to_string(),
        "em" => "<em>".to_string(),
        "hyperlink" => format!(r#"<a href="{}">"#, attr(&data("url"))),
        "label" => format!(r#"<span class="{}">"#, attr(&data("label"))),
        _ => "<span>".to_string(),
    }
}

fn close_tag(span: &Span) -> &'static str {
    match span.kind.as_str() {
        "strong" => "</strong>",
        "em" => "</em>",
        "hyperlink" => "</a>",
        _ => "</span>",
    }
}

fn attr(value: &str) -> String {
    html_escape::encode_double_quoted_attribute(value).into_owned()
}
