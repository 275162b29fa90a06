use std::path::PathBuf;

/// Failures the run distinguishes between.
///
/// Fatal variants abort the current run. The others describe a single page, question or field
/// and never leave that item.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
	#[error("book file not found: {}", .0.display())]
	SourceNotFound(PathBuf),

	#[error("unsupported book format: {0:?} (expected .pdf, .txt or an http(s) address)")]
	UnsupportedFormat(String),

	#[error("book content is insufficient ({chars} characters, need at least {min}); the site structure may differ from the supported reader layout")]
	ExtractionInsufficient { chars: usize, min: usize },

	#[error("page {page} could not be read: {reason}")]
	TransientPage { page: u32, reason: String },

	#[error("answer service failed: {0}")]
	Oracle(String),

	#[error("could not fill field for question {}: {reason}", .ordinal + 1)]
	FieldFill { ordinal: usize, reason: String },

	#[error("browser teardown failed: {0}")]
	Teardown(String),

	#[error("interrupted by user")]
	Interrupted,

	#[error("video cannot be read: {0}")]
	VideoUnavailable(String),

	#[error("not enough transcript text ({chars} characters); the video has no usable captions or description")]
	TranscriptInsufficient { chars: usize },
}

impl QuizError {
	/// Whether the error ends the phase it occurred in
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			Self::SourceNotFound(_) | Self::UnsupportedFormat(_) | Self::ExtractionInsufficient { .. } | Self::Interrupted | Self::VideoUnavailable(_) | Self::TranscriptInsufficient { .. }
		)
	}
}
