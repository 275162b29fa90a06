//! Pulling the book text out of one rendered reader page.
//!
//! Reader sites vary a lot in markup, so extraction is two-tiered: an ordered list of
//! structural selectors (site-specific containers first, generic `article`/`main` last), and if
//! none of them yields enough text, the whole body split into lines.

use scraper::{ElementRef, Html};

use crate::{
	browser::RenderedDocument,
	dom::{fold, has_ancestor_in, inner_text, parse_selector},
};

/// Content containers, most site-specific first
pub const READER_SELECTORS: &[&str] = &[
	"div.zkitap-content",
	"div.zkitap-page",
	"div.book-page",
	"div.page-text",
	"div[class*='zkitap']",
	"div[class*='book']",
	"div[class*='page']",
	"article",
	"main",
	"div.content",
];

/// Case-insensitive markers of navigation and boilerplate text
pub const NOISE_MARKERS: &[&str] = &["menü", "menu", "giriş", "kayıt", "login", "register", "anasayfa", "home", "copyright"];

/// Result of trying one selector
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StrategyOutcome {
	Matched(String),
	/// Something matched, but the kept text stayed under the minimum
	TooShort { chars: usize },
	NoMatch,
	Invalid(String),
}

#[derive(Clone, Debug)]
pub struct ContentExtractor {
	selectors: Vec<String>,
	noise: Vec<String>,
	/// A selected block must be longer than this to be kept
	min_block_chars: usize,
	/// A body line must be longer than this to be kept
	min_line_chars: usize,
	/// Combined selector text needed before the body fallback is skipped
	min_content_chars: usize,
}

impl Default for ContentExtractor {
	fn default() -> Self {
		Self {
			selectors: READER_SELECTORS.iter().map(|s| s.to_string()).collect(),
			noise: NOISE_MARKERS.iter().map(|s| fold(s)).collect(),
			min_block_chars: 100,
			min_line_chars: 20,
			min_content_chars: 100,
		}
	}
}

impl ContentExtractor {
	/// Extracted page text; empty if nothing usable was found
	pub fn extract(&self, doc: &RenderedDocument) -> String {
		let html = doc.parse();
		for selector in &self.selectors {
			match self.try_selector(&html, selector) {
				StrategyOutcome::Matched(text) => {
					tracing::trace!(selector = %selector, chars = text.chars().count(), "selector matched");
					return text;
				}
				StrategyOutcome::Invalid(reason) => tracing::warn!("{reason}"),
				outcome => tracing::trace!(selector = %selector, ?outcome, "selector skipped"),
			}
		}
		tracing::debug!(address = %doc.address, "no content container matched, falling back to body lines");
		self.body_lines(&html)
	}

	/// Collects the text of every node matching `css`, keeping long, noise-free blocks.
	///
	/// A node nested inside an already kept node is skipped, so wrappers matched by the same
	/// selector do not duplicate their children.
	pub fn try_selector(&self, html: &Html, css: &str) -> StrategyOutcome {
		let selector = match parse_selector(css) {
			Ok(s) => s,
			Err(e) => return StrategyOutcome::Invalid(e),
		};

		let mut matched_any = false;
		let mut kept: Vec<ElementRef<'_>> = Vec::new();
		let mut blocks: Vec<String> = Vec::new();
		for element in html.select(&selector) {
			matched_any = true;
			if has_ancestor_in(element, &kept) {
				continue;
			}
			let text = inner_text(element);
			if text.chars().count() > self.min_block_chars && !self.is_noise(&text) {
				kept.push(element);
				blocks.push(text);
			}
		}

		if !matched_any {
			return StrategyOutcome::NoMatch;
		}
		let combined = blocks.join("\n");
		let chars = combined.chars().count();
		if chars >= self.min_content_chars && !blocks.is_empty() {
			StrategyOutcome::Matched(combined)
		} else {
			StrategyOutcome::TooShort { chars }
		}
	}

	/// Fallback: body text line by line, dropping short and noisy lines
	pub fn body_lines(&self, html: &Html) -> String {
		let Ok(body) = parse_selector("body") else {
			return String::new();
		};
		let Some(body) = html.select(&body).next() else {
			return String::new();
		};
		inner_text(body)
			.lines()
			.map(str::trim)
			.filter(|line| line.chars().count() > self.min_line_chars && !self.is_noise(line))
			.collect::<Vec<_>>()
			.join("\n")
	}

	fn is_noise(&self, text: &str) -> bool {
		let folded = fold(text);
		self.noise.iter().any(|marker| folded.contains(marker.as_str()))
	}
}
