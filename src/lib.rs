use std::fmt;

use derive_new::new;
use serde::{Deserialize, Serialize};

pub mod book;
pub mod browser;
pub mod config;
pub mod dom;
pub mod error;
pub mod extract;
pub mod filler;
pub mod input;
pub mod matcher;
pub mod oracle;
pub mod runner;
pub mod video;
pub mod walker;

/// Returns true if the address is an absolute http(s) address
pub fn is_web_address(address: &str) -> bool {
	let lower = address.trim_start().to_ascii_lowercase();
	lower.starts_with("http://") || lower.starts_with("https://")
}

/// Prepends `https://` to addresses given without a scheme
pub fn ensure_scheme(address: &str) -> String {
	let address = address.trim();
	if is_web_address(address) { address.to_string() } else { format!("https://{address}") }
}

/// The reference text every answer is grounded on
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BookDocument {
	source: String,
	raw_text: String,
	page_count: Option<u32>,
}

impl BookDocument {
	pub fn new(source: impl Into<String>, raw_text: impl Into<String>, page_count: Option<u32>) -> Self {
		Self {
			source: source.into(),
			raw_text: raw_text.into(),
			page_count,
		}
	}

	/// Path or address the text was read from
	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn raw_text(&self) -> &str {
		&self.raw_text
	}

	/// Number of logical pages accepted by the web walker, `None` for local files
	pub fn page_count(&self) -> Option<u32> {
		self.page_count
	}

	pub fn char_count(&self) -> usize {
		self.raw_text.chars().count()
	}

	/// Leading slice of the text holding at most `max_chars` characters
	pub fn grounding_context(&self, max_chars: usize) -> &str {
		truncate_chars(&self.raw_text, max_chars)
	}
}

/// Cuts `text` after `max_chars` characters, never splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((byte_idx, _)) => &text[..byte_idx],
		None => text,
	}
}

/// One logical page as seen by the walker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedPage {
	/// Logical page index, starting at 1
	pub index: u32,
	pub text: String,
	/// Text equals the previously accepted page
	pub duplicate_of_previous: bool,
	/// Text is too short to count as content
	pub empty: bool,
}

/// Kind of answer-capable element
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FieldKind {
	TextInput,
	TextArea,
	Select { multiple: bool },
}

/// An option of a `<select>` element
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, new)]
pub struct SelectOption {
	/// The value attribute
	pub value: String,
	/// The display text
	pub text: String,
}

/// Handle to one answer-capable element on the quiz page
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FieldRef {
	/// Document-order position among all answer-capable elements
	pub index: usize,
	pub kind: FieldKind,
	/// The element's name attribute, if any
	pub name: Option<String>,
	/// Options for select elements, empty otherwise
	#[serde(default)]
	pub options: Vec<SelectOption>,
}

/// A quiz prompt paired with the element its answer goes into
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QuizQuestion {
	/// Discovery order on the page, starting at 0
	pub ordinal: usize,
	pub prompt: String,
	pub field: Option<FieldRef>,
}

impl QuizQuestion {
	/// Placeholder prompt for a field whose question text could not be found
	pub fn placeholder_prompt(ordinal: usize) -> String {
		format!("Question {}", ordinal + 1)
	}

	pub fn is_select(&self) -> bool {
		matches!(self.field.as_ref().map(|f| &f.kind), Some(FieldKind::Select { .. }))
	}
}

impl fmt::Display for QuizQuestion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{}", self.prompt)?;
		match &self.field {
			Some(FieldRef { kind: FieldKind::Select { .. }, options, .. }) => {
				let available: Vec<&str> = options.iter().filter(|o| !o.value.is_empty()).map(|o| o.text.as_str()).collect();
				writeln!(f, "[___]  (options: {})", available.join(", "))?;
			}
			Some(_) => writeln!(f, "[____________________]")?,
			None => writeln!(f, "(no answer field)")?,
		}
		Ok(())
	}
}

/// Answer produced for the question with the same ordinal
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct QuizAnswer {
	pub ordinal: usize,
	pub text: String,
}
