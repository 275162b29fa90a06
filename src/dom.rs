//! Rendered-text helpers over a parsed DOM snapshot.
//!
//! The browser hands us `outerHTML`; these helpers approximate what `innerText` would have
//! produced for an element: script/style content and hidden subtrees are skipped, whitespace
//! inside a run of inline content collapses to one space, and block-level elements start a new line.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node, Selector};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "head", "svg"];

const BLOCK: &[&str] = &[
	"address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4",
	"h5", "h6", "header", "hr", "label", "legend", "li", "main", "nav", "ol", "option", "p", "pre", "section", "table", "tr", "ul",
];

/// Text of `element` as a reader would see it, lines trimmed and blank lines removed
pub fn inner_text(element: ElementRef<'_>) -> String {
	let mut raw = String::new();
	collect(element, &mut raw);
	raw.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>().join("\n")
}

fn collect(element: ElementRef<'_>, out: &mut String) {
	let name = element.value().name();
	if SKIPPED.contains(&name) {
		return;
	}
	// form controls carry their state in attributes, not text
	if matches!(name, "input" | "textarea" | "select") || is_hidden(element) {
		return;
	}
	let block = BLOCK.contains(&name);
	if block {
		out.push('\n');
	}
	for child in element.children() {
		match child.value() {
			Node::Text(text) => {
				let collapsed = WHITESPACE.replace_all(text, " ");
				if collapsed.trim().is_empty() {
					if !out.ends_with([' ', '\n']) && !out.is_empty() {
						out.push(' ');
					}
				} else {
					out.push_str(&collapsed);
				}
			}
			Node::Element(_) =>
				if let Some(child) = ElementRef::wrap(child) {
					collect(child, out);
				},
			_ => {}
		}
	}
	if block {
		out.push('\n');
	}
}

/// Hidden by markup alone: the `hidden` attribute, `aria-hidden="true"`, or an inline style
/// setting `display: none` or `visibility: hidden`. Stylesheet rules are not evaluated.
pub fn is_hidden(element: ElementRef<'_>) -> bool {
	let el = element.value();
	if el.attr("hidden").is_some() || el.attr("aria-hidden").is_some_and(|v| v.trim().eq_ignore_ascii_case("true")) {
		return true;
	}
	let Some(style) = el.attr("style") else {
		return false;
	};
	style.split(';').any(|decl| {
		let Some((prop, value)) = decl.split_once(':') else {
			return false;
		};
		let value = value.trim().to_ascii_lowercase();
		let value = value.trim_end_matches("!important").trim();
		match prop.trim().to_ascii_lowercase().as_str() {
			"display" => value == "none",
			"visibility" => value == "hidden" || value == "collapse",
			_ => false,
		}
	})
}

/// Lowercase for matching. Drops the combining dot `İ` lowercases into, so "GİRİŞ" matches "giriş".
pub fn fold(text: &str) -> String {
	text.to_lowercase().replace('\u{307}', "")
}

/// Parses a CSS selector, reporting invalid ones as a plain message
pub fn parse_selector(css: &str) -> Result<Selector, String> {
	Selector::parse(css).map_err(|e| format!("invalid selector {css:?}: {e}"))
}

/// True if any of the element's ancestors is in `kept`
pub fn has_ancestor_in<'a>(element: ElementRef<'a>, kept: &[ElementRef<'a>]) -> bool {
	element.ancestors().filter_map(ElementRef::wrap).any(|a| kept.contains(&a))
}
