//! Interactive element extraction and selector derivation.

use questline_core_types::InteractiveElement;
use ego_tree::NodeRef;
use scraper::node::Element;
use scraper::{Html, Node};

use crate::reduce::is_hidden;

const TEST_ID_ATTRS: &[&str] = &["data-testid", "data-test", "data-cy"];

/// Extract every interactive element from a raw capture.
///
/// An element is interactive when it is a native control or it carries
/// `role="button"` or an inline event-handler attribute. Hidden nodes (and
/// everything under them) are never returned.
pub fn extract_interactive_elements(raw: &str) -> Vec<InteractiveElement> {
    let document = Html::parse_document(raw);
    let mut found = Vec::new();
    collect(document.tree.root(), &mut found);
    found
}

fn collect(node: NodeRef<'_, Node>, found: &mut Vec<InteractiveElement>) {
    if let Node::Element(element) = node.value() {
        if is_hidden(element) {
            // Hidden subtrees are invisible to the operator; prune them whole.
            return;
        }
        if is_interactive(element) {
            found.push(build_element(element, &node));
        }
    }
    for child in node.children() {
        collect(child, found);
    }
}

fn is_interactive(element: &Element) -> bool {
    match element.name().to_ascii_lowercase().as_str() {
        "a" => element.attr("href").is_some(),
        "button" | "select" | "textarea" | "form" => true,
        "input" => true, // type=hidden is already pruned by the hidden check
        _ => {
            element
                .attr("role")
                .is_some_and(|r| r.eq_ignore_ascii_case("button"))
                || element.attrs().any(|(name, _)| name.starts_with("on"))
        }
    }
}

fn build_element(element: &Element, node: &NodeRef<'_, Node>) -> InteractiveElement {
    let tag = element.name().to_ascii_lowercase();
    let test_id = TEST_ID_ATTRS
        .iter()
        .find_map(|attr| element.attr(attr))
        .map(str::to_string);

    let mut out = InteractiveElement {
        tag: tag.clone(),
        id: element.attr("id").map(str::to_string),
        class: element.attr("class").map(str::to_string),
        test_id,
        aria_label: element.attr("aria-label").map(str::to_string),
        href: element.attr("href").map(str::to_string),
        selector: String::new(),
    };
    out.selector = derive_selector(&out, element, node);
    out
}

/// Selector priority: test-id > id > tag+type+aria-label > tag+leading-text.
fn derive_selector(
    el: &InteractiveElement,
    element: &Element,
    node: &NodeRef<'_, Node>,
) -> String {
    if let Some(test_id) = &el.test_id {
        let attr = TEST_ID_ATTRS
            .iter()
            .find(|a| element.attr(a).is_some())
            .unwrap_or(&"data-testid");
        return format!("[{attr}=\"{test_id}\"]");
    }
    if let Some(id) = &el.id {
        if !id.is_empty() {
            return format!("#{id}");
        }
    }

    let type_attr = element.attr("type");
    if type_attr.is_some() || el.aria_label.is_some() {
        let mut selector = el.tag.clone();
        if let Some(ty) = type_attr {
            selector.push_str(&format!("[type=\"{ty}\"]"));
        }
        if let Some(label) = &el.aria_label {
            selector.push_str(&format!("[aria-label=\"{label}\"]"));
        }
        return selector;
    }

    match leading_text(node) {
        Some(text) => format!("{}:text(\"{}\")", el.tag, text),
        None => el.tag.clone(),
    }
}

/// First few words of the element's own text, used as a last-resort anchor.
fn leading_text(node: &NodeRef<'_, Node>) -> Option<String> {
    let mut words = Vec::new();
    for child in node.descendants() {
        if let Node::Text(text) = child.value() {
            words.extend(text.split_whitespace().map(str::to_string));
            if words.len() >= 4 {
                break;
            }
        }
    }
    if words.is_empty() {
        None
    } else {
        words.truncate(4);
        Some(words.join(" "))
    }
}
