//! Walking the logical pages of a web book reader.
//!
//! Reader sites address page N as `<base>#p=N` and never say how many pages there are, so the
//! walker keeps advancing until one of its termination signals fires: a page repeating the
//! previous one (past the grace period), a run of empty or failing pages, or the hard page cap.

use color_eyre::Result;
use v_utils::log;

use crate::{
	BookDocument, ExtractedPage,
	browser::BrowserSession,
	config::{Delays, WalkLimits},
	error::QuizError,
	extract::ContentExtractor,
};

/// Base address of the book: any fragment stripped, trailing slash ensured
pub fn base_address(address: &str) -> String {
	let base = address.trim().split('#').next().unwrap_or_default();
	if base.ends_with('/') { base.to_string() } else { format!("{base}/") }
}

/// Address of logical page `page`
pub fn page_address(base: &str, page: u32) -> String {
	format!("{base}#p={page}")
}

/// Header placed before every accepted page in the book text
pub fn page_marker(page: u32) -> String {
	format!("\n--- Page {page} ---\n")
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WalkState {
	Loading(u32),
	Extracting(u32),
	Advancing(u32),
	Terminated(Termination),
}

/// Why the walk ended
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Termination {
	/// The page repeated the previous one after the grace period
	StableDuplicate { page: u32 },
	/// Too many empty pages in a row; likely past the last page
	EndOfBook { page: u32 },
	/// Too many failing pages in a row
	TooManyErrors { page: u32 },
	PageCap,
}

/// Classification of one extracted page
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PageOutcome {
	Accepted(String),
	Duplicate,
	Empty,
	Error(String),
}

/// Raw result of a walk, before the length check
#[derive(Clone, Debug)]
pub struct WalkOutcome {
	pub text: String,
	pub pages_accepted: u32,
	pub termination: Termination,
}

impl WalkOutcome {
	/// Fails with [`QuizError::ExtractionInsufficient`] when the text is too short to be a book
	pub fn into_book(self, source: &str, min_chars: usize) -> Result<BookDocument> {
		let chars = self.text.chars().count();
		if chars < min_chars {
			return Err(QuizError::ExtractionInsufficient { chars, min: min_chars }.into());
		}
		Ok(BookDocument::new(source, self.text, Some(self.pages_accepted)))
	}
}

/// Classifies extracted text against the previously accepted page
pub fn classify(page: u32, text: String, previous: Option<&str>, min_page_chars: usize) -> ExtractedPage {
	let empty = text.chars().count() <= min_page_chars;
	let duplicate_of_previous = !empty && previous == Some(text.as_str());
	ExtractedPage {
		index: page,
		text,
		duplicate_of_previous,
		empty,
	}
}

pub struct PaginationWalker<'a, S> {
	session: &'a mut S,
	extractor: &'a ContentExtractor,
	limits: WalkLimits,
	delays: Delays,
}

impl<'a, S: BrowserSession> PaginationWalker<'a, S> {
	pub fn new(session: &'a mut S, extractor: &'a ContentExtractor, limits: WalkLimits, delays: Delays) -> Self {
		Self {
			session,
			extractor,
			limits,
			delays,
		}
	}

	/// Reads pages starting at 1 until a termination signal fires
	pub async fn walk(&mut self, address: &str) -> WalkOutcome {
		let base = base_address(address);
		tracing::info!(%base, "reading book pages");

		let mut text = String::new();
		let mut previous: Option<String> = None;
		let mut pages_accepted = 0;
		let mut misses = 0;
		let mut state = WalkState::Loading(1);

		let termination = loop {
			state = match state {
				WalkState::Loading(page) if page > self.limits.max_pages => WalkState::Terminated(Termination::PageCap),
				WalkState::Loading(page) => match self.load(&base, page).await {
					Ok(()) => WalkState::Extracting(page),
					Err(e) => self.on_error(page, e.to_string(), &mut misses),
				},
				WalkState::Extracting(page) => {
					let outcome = match self.session.rendered_state().await {
						Ok(doc) => {
							let extracted = classify(page, self.extractor.extract(&doc), previous.as_deref(), self.limits.min_page_chars);
							outcome_of(extracted)
						}
						Err(e) => PageOutcome::Error(e.to_string()),
					};
					match outcome {
						PageOutcome::Accepted(page_text) => {
							log!("Page {} read ({} characters)", page, page_text.chars().count());
							text.push_str(&page_marker(page));
							text.push_str(&page_text);
							text.push('\n');
							previous = Some(page_text);
							pages_accepted += 1;
							misses = 0;
							WalkState::Advancing(page)
						}
						PageOutcome::Duplicate if page > self.limits.duplicate_grace_pages => {
							log!("Reached the last page (page {})", page - 1);
							WalkState::Terminated(Termination::StableDuplicate { page })
						}
						PageOutcome::Duplicate => {
							tracing::debug!(page, "page repeats the previous one within the grace period, skipped");
							WalkState::Advancing(page)
						}
						PageOutcome::Empty => {
							misses += 1;
							tracing::debug!(page, misses, "page has no content");
							if misses >= self.limits.max_consecutive_misses {
								log!("{} consecutive pages without content, end of book reached", misses);
								WalkState::Terminated(Termination::EndOfBook { page })
							} else {
								WalkState::Advancing(page)
							}
						}
						PageOutcome::Error(reason) => self.on_error(page, reason, &mut misses),
					}
				}
				WalkState::Advancing(page) => {
					if page % 20 == 0 {
						log!("{} pages read, continuing...", page);
					}
					WalkState::Loading(page + 1)
				}
				WalkState::Terminated(termination) => break termination,
			};
		};

		tracing::info!(pages_accepted, chars = text.chars().count(), ?termination, "book walk finished");
		WalkOutcome {
			text,
			pages_accepted,
			termination,
		}
	}

	async fn load(&mut self, base: &str, page: u32) -> Result<()> {
		self.session.navigate(&page_address(base, page)).await?;
		let settle = if page == 1 { self.delays.first_page } else { self.delays.page };
		tokio::time::sleep(settle).await;
		Ok(())
	}

	/// A failing page counts towards the same streak as an empty one
	fn on_error(&self, page: u32, reason: String, misses: &mut u32) -> WalkState {
		*misses += 1;
		tracing::warn!(misses, "{}", QuizError::TransientPage { page, reason });
		if *misses >= self.limits.max_consecutive_misses {
			log!("{} consecutive failing pages, stopping", misses);
			WalkState::Terminated(Termination::TooManyErrors { page })
		} else {
			WalkState::Advancing(page)
		}
	}
}

fn outcome_of(page: ExtractedPage) -> PageOutcome {
	if page.empty {
		PageOutcome::Empty
	} else if page.duplicate_of_previous {
		PageOutcome::Duplicate
	} else {
		PageOutcome::Accepted(page.text)
	}
}
