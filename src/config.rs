use std::time::Duration;

use v_utils::macros::{MyConfigPrimitives, Settings};

#[derive(Clone, Debug, Default, MyConfigPrimitives, Settings)]
pub struct AppConfig {
	/// Run with visible browser window (non-headless mode)
	#[serde(default)]
	pub visible: bool,
	/// Submit the quiz form without asking for confirmation
	#[serde(default)]
	pub auto_submit: bool,
	/// Wait for Enter after the quiz page is loaded, before looking for questions (default: true)
	#[serde(default = "default_true")]
	pub pause_before_matching: bool,
	/// Persist rendered quiz pages to the state dir for debugging
	#[serde(default)]
	pub save_pages: bool,
	/// Hard cap on logical pages read from a web book (default: 1000)
	#[serde(default = "default_max_pages")]
	pub max_pages: u32,
	/// A repeated page ends the book only after this page index (default: 3)
	#[serde(default = "default_duplicate_grace_pages")]
	pub duplicate_grace_pages: u32,
	/// Consecutive empty or failed pages before the book is considered finished (default: 3)
	#[serde(default = "default_max_consecutive_misses")]
	pub max_consecutive_misses: u32,
	/// Minimum characters for a page to count as content (default: 100)
	#[serde(default = "default_min_page_chars")]
	pub min_page_chars: u32,
	/// Minimum characters for a web book to be usable (default: 500)
	#[serde(default = "default_min_book_chars")]
	pub min_book_chars: u32,
	/// Characters of book text sent along with every question (default: 8000)
	#[serde(default = "default_context_chars")]
	pub context_chars: u32,
	/// Settle delay after the first book page is opened (default: 4000)
	#[serde(default = "default_first_page_settle_ms")]
	pub first_page_settle_ms: u64,
	/// Settle delay after every other navigation (default: 3000)
	#[serde(default = "default_page_settle_ms")]
	pub page_settle_ms: u64,
	/// Settle delay after writing a field (default: 500)
	#[serde(default = "default_field_settle_ms")]
	pub field_settle_ms: u64,
	/// Settle delay after clicking submit (default: 2000)
	#[serde(default = "default_submit_settle_ms")]
	pub submit_settle_ms: u64,
	/// Number of attempts for one answer request (default: 3)
	#[serde(default = "default_api_retries")]
	pub api_retries: u32,
	/// Base delay in ms between answer retries, multiplied by attempt number (default: 1000)
	#[serde(default = "default_api_retry_delay_ms")]
	pub api_retry_delay_ms: u64,
}

fn default_true() -> bool {
	true
}

fn default_max_pages() -> u32 {
	1000
}

fn default_duplicate_grace_pages() -> u32 {
	3
}

fn default_max_consecutive_misses() -> u32 {
	3
}

fn default_min_page_chars() -> u32 {
	100
}

fn default_min_book_chars() -> u32 {
	500
}

fn default_context_chars() -> u32 {
	8000
}

fn default_first_page_settle_ms() -> u64 {
	4000
}

fn default_page_settle_ms() -> u64 {
	3000
}

fn default_field_settle_ms() -> u64 {
	500
}

fn default_submit_settle_ms() -> u64 {
	2000
}

fn default_api_retries() -> u32 {
	3
}

fn default_api_retry_delay_ms() -> u64 {
	1000
}

/// Termination thresholds of the pagination walker
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WalkLimits {
	pub max_pages: u32,
	pub duplicate_grace_pages: u32,
	pub max_consecutive_misses: u32,
	pub min_page_chars: usize,
	pub min_book_chars: usize,
}

impl Default for WalkLimits {
	fn default() -> Self {
		Self {
			max_pages: default_max_pages(),
			duplicate_grace_pages: default_duplicate_grace_pages(),
			max_consecutive_misses: default_max_consecutive_misses(),
			min_page_chars: default_min_page_chars() as usize,
			min_book_chars: default_min_book_chars() as usize,
		}
	}
}

/// Fixed waits inserted after browser actions
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Delays {
	pub first_page: Duration,
	pub page: Duration,
	pub field: Duration,
	pub submit: Duration,
}

impl Delays {
	/// No waiting at all, for sessions that render synchronously
	pub const NONE: Delays = Delays {
		first_page: Duration::ZERO,
		page: Duration::ZERO,
		field: Duration::ZERO,
		submit: Duration::ZERO,
	};
}

impl Default for Delays {
	fn default() -> Self {
		Self {
			first_page: Duration::from_millis(default_first_page_settle_ms()),
			page: Duration::from_millis(default_page_settle_ms()),
			field: Duration::from_millis(default_field_settle_ms()),
			submit: Duration::from_millis(default_submit_settle_ms()),
		}
	}
}

impl AppConfig {
	pub fn walk_limits(&self) -> WalkLimits {
		WalkLimits {
			max_pages: self.max_pages,
			duplicate_grace_pages: self.duplicate_grace_pages,
			max_consecutive_misses: self.max_consecutive_misses.max(1),
			min_page_chars: self.min_page_chars as usize,
			min_book_chars: self.min_book_chars as usize,
		}
	}

	pub fn delays(&self) -> Delays {
		Delays {
			first_page: Duration::from_millis(self.first_page_settle_ms),
			page: Duration::from_millis(self.page_settle_ms),
			field: Duration::from_millis(self.field_settle_ms),
			submit: Duration::from_millis(self.submit_settle_ms),
		}
	}

	pub fn context_chars(&self) -> usize {
		self.context_chars as usize
	}

	/// Retry schedule for answer requests
	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy {
			attempts: self.api_retries.max(1),
			base_delay: Duration::from_millis(self.api_retry_delay_ms),
		}
	}
}

/// Linear backoff: attempt `n` waits `n * base_delay` before the next try
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
	pub attempts: u32,
	pub base_delay: Duration,
}

impl RetryPolicy {
	pub fn delay_after(&self, attempt: u32) -> Duration {
		self.base_delay * attempt
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			attempts: default_api_retries(),
			base_delay: Duration::from_millis(default_api_retry_delay_ms()),
		}
	}
}
