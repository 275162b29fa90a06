use std::path::{Path, PathBuf};

use color_eyre::{Result, eyre::eyre};
use v_utils::log;

use crate::{
	BookDocument,
	browser::BrowserSession,
	config::{Delays, WalkLimits},
	error::QuizError,
	extract::ContentExtractor,
	is_web_address,
	walker::PaginationWalker,
};

/// Where the book comes from
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BookSource {
	/// Paginated online reader
	Web(String),
	Pdf(PathBuf),
	Text(PathBuf),
}

impl BookSource {
	/// Classifies a user-supplied address without touching the network.
	///
	/// The extension is checked before the file's existence, so an unsupported format is reported
	/// as such even when the path is also wrong.
	pub fn classify(address: &str) -> Result<Self, QuizError> {
		let address = address.trim();
		if is_web_address(address) {
			return Ok(Self::Web(address.to_string()));
		}

		let path = Path::new(address);
		let ext = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).unwrap_or_default();
		let source = match ext.as_str() {
			"pdf" => Self::Pdf(path.to_path_buf()),
			"txt" => Self::Text(path.to_path_buf()),
			"" => return Err(QuizError::UnsupportedFormat("(no extension)".into())),
			other => return Err(QuizError::UnsupportedFormat(format!(".{other}"))),
		};

		if !path.exists() {
			return Err(QuizError::SourceNotFound(path.to_path_buf()));
		}
		Ok(source)
	}

	pub fn is_web(&self) -> bool {
		matches!(self, Self::Web(_))
	}

	pub fn display(&self) -> String {
		match self {
			Self::Web(address) => address.clone(),
			Self::Pdf(path) | Self::Text(path) => path.display().to_string(),
		}
	}
}

/// Reads a local book. Text files are returned exactly as stored.
pub async fn read_local(source: &BookSource) -> Result<BookDocument> {
	match source {
		BookSource::Text(path) => {
			let text = tokio::fs::read_to_string(path).await.map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
			Ok(BookDocument::new(path.display().to_string(), text, None))
		}
		BookSource::Pdf(path) => {
			let owned = path.clone();
			let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
				.await?
				.map_err(|e| eyre!("Failed to extract text from {}: {}", path.display(), e))?;
			Ok(BookDocument::new(path.display().to_string(), text, None))
		}
		BookSource::Web(address) => Err(eyre!("{} is a web address, not a local file", address)),
	}
}

/// Reads a book from a paginated web reader, failing if too little text came out
pub async fn read_web<S: BrowserSession>(session: &mut S, address: &str, limits: WalkLimits, delays: Delays) -> Result<BookDocument> {
	let extractor = ContentExtractor::default();
	let outcome = PaginationWalker::new(session, &extractor, limits, delays).walk(address).await;
	let book = outcome.into_book(address, limits.min_book_chars)?;
	log!("Read {} pages ({} characters)", book.page_count().unwrap_or_default(), book.char_count());
	Ok(book)
}

/// Reads the book from whichever source it lives in
pub async fn read<S: BrowserSession>(session: &mut S, source: &BookSource, limits: WalkLimits, delays: Delays) -> Result<BookDocument> {
	match source {
		BookSource::Web(address) => read_web(session, address, limits, delays).await,
		local => read_local(local).await,
	}
}
