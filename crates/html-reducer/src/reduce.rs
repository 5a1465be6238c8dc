//! Markup reduction: drop noise nodes, prune attributes, normalize text.

use ego_tree::NodeRef;
use scraper::node::Element;
use scraper::{Html, Node};

/// Tags removed wholesale, subtree included.
const DROPPED_TAGS: &[&str] = &[
    "script", "style", "meta", "link", "noscript", "template", "svg", "iframe",
];

/// Attribute allow-list, in stable output order. `class` is truncated to its
/// first three tokens; `aria-*` attributes pass as a family.
const KEPT_ATTRS: &[&str] = &[
    "id",
    "class",
    "data-testid",
    "data-test",
    "data-cy",
    "role",
    "name",
    "type",
    "placeholder",
    "value",
    "href",
    "action",
    "method",
    "for",
];

/// Tags serialized without a closing tag.
const VOID_TAGS: &[&str] = &["input", "br", "hr", "img", "area", "base", "col", "wbr"];

/// Reduce a raw capture to compact, test-relevant markup.
///
/// Idempotent: reducing already-reduced markup is a no-op.
pub fn simplify(raw: &str) -> String {
    let document = Html::parse_document(raw);
    let mut out = String::with_capacity(raw.len() / 4);
    serialize_node(document.tree.root(), &mut out);
    out.trim().to_string()
}

fn serialize_node(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Document | Node::Fragment => {
            for child in node.children() {
                serialize_node(child, out);
            }
        }
        Node::Element(element) => {
            let tag = element.name().to_ascii_lowercase();
            if DROPPED_TAGS.contains(&tag.as_str()) || is_hidden(element) {
                return;
            }

            out.push('<');
            out.push_str(&tag);
            write_attributes(element, out);

            if VOID_TAGS.contains(&tag.as_str()) {
                out.push_str("/>");
                return;
            }
            out.push('>');

            for child in node.children() {
                serialize_node(child, out);
            }

            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
        Node::Text(text) => {
            let normalized = normalize_whitespace(text);
            if !normalized.is_empty() {
                if !out.is_empty() && !out.ends_with('>') && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push_str(&escape_text(&normalized));
            }
        }
        // Comments, doctype and processing instructions carry no test signal.
        Node::Comment(_) | Node::Doctype(_) | Node::ProcessingInstruction(_) => {}
    }
}

fn write_attributes(element: &Element, out: &mut String) {
    for &name in KEPT_ATTRS {
        if let Some(value) = element.attr(name) {
            let value = if name == "class" {
                truncate_class(value)
            } else {
                normalize_whitespace(value)
            };
            push_attr(out, name, &value);
        }
    }

    // aria-* family, sorted for stable output.
    let mut aria: Vec<(&str, &str)> = element
        .attrs()
        .filter(|(name, _)| name.starts_with("aria-"))
        .collect();
    aria.sort_by_key(|(name, _)| *name);
    for (name, value) in aria {
        push_attr(out, name, &normalize_whitespace(value));
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&value.replace('&', "&amp;").replace('"', "&quot;"));
    out.push('"');
}

/// Whether the element is hidden via attribute or inline style.
pub(crate) fn is_hidden(element: &Element) -> bool {
    if element.attr("hidden").is_some() {
        return true;
    }
    if element.name().eq_ignore_ascii_case("input")
        && element
            .attr("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
    {
        return true;
    }
    if let Some(style) = element.attr("style") {
        let style: String = style
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if style.contains("display:none") || style.contains("visibility:hidden") {
            return true;
        }
    }
    false
}

/// Keep the first three class tokens; long utility-class lists add noise
/// without adding signal.
fn truncate_class(class: &str) -> String {
    class
        .split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_style_and_comments() {
        let raw = r#"<html><head><script>evil()</script><style>.x{}</style>
            <meta charset="utf-8"><title>App</title></head>
            <body><!-- nav --><p>Hello</p></body></html>"#;
        let reduced = simplify(raw);
        assert!(!reduced.contains("script"));
        assert!(!reduced.contains(".x{}"));
        assert!(!reduced.contains("meta"));
        assert!(!reduced.contains("nav"));
        assert!(reduced.contains("<title>App</title>"));
        assert!(reduced.contains("Hello"));
    }

    #[test]
    fn drops_hidden_nodes() {
        let raw = r#"<body>
            <div hidden>secret</div>
            <div style="display: none">also secret</div>
            <div style="visibility:hidden">still secret</div>
            <div>visible</div>
        </body>"#;
        let reduced = simplify(raw);
        assert!(!reduced.contains("secret"));
        assert!(reduced.contains("visible"));
    }

    #[test]
    fn prunes_attributes_to_allow_list() {
        let raw = r#"<button id="go" data-reactid="42" onclick="x()"
            style="color:red" data-testid="submit" aria-label="Go">Go</button>"#;
        let reduced = simplify(raw);
        assert!(reduced.contains(r#"id="go""#));
        assert!(reduced.contains(r#"data-testid="submit""#));
        assert!(reduced.contains(r#"aria-label="Go""#));
        assert!(!reduced.contains("reactid"));
        assert!(!reduced.contains("onclick"));
        assert!(!reduced.contains("style="));
    }

    #[test]
    fn truncates_class_to_three_tokens() {
        let raw = r#"<div class="a b c d e f">x</div>"#;
        let reduced = simplify(raw);
        assert!(reduced.contains(r#"class="a b c""#));
        assert!(!reduced.contains(" d e f"));
    }

    #[test]
    fn simplify_is_idempotent() {
        let raw = r#"<html><body>
            <form action="/login" method="post" class="a b c d">
                <input type="email" name="email" placeholder="Email" data-junk="1">
                <button type="submit" data-testid="login-submit">  Sign
                    in </button>
            </form>
            <p>Terms &amp; conditions</p>
            <script>track()</script>
        </body></html>"#;
        let once = simplify(raw);
        let twice = simplify(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn tolerates_malformed_markup() {
        let raw = "<div><p>unclosed <span>nested <b>deep</div> trailing";
        let reduced = simplify(raw);
        assert!(reduced.contains("unclosed"));
        assert!(reduced.contains("deep"));
    }

    #[test]
    fn empty_input_is_fine() {
        assert_eq!(simplify(""), "<html><head></head><body></body></html>");
    }
}
