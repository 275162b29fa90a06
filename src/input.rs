use std::collections::VecDeque;

use color_eyre::{Result, eyre::eyre};
use v_utils::log;

/// Source of operator answers
#[allow(async_fn_in_trait)]
pub trait InputProvider {
	/// One line of free text
	async fn line(&mut self, prompt: &str) -> Result<String>;

	async fn confirm(&mut self, prompt: &str) -> Result<bool> {
		Ok(is_affirmative(&self.line(prompt).await?))
	}

	/// Blocks until the operator acknowledges
	async fn pause(&mut self, prompt: &str) -> Result<()> {
		self.line(prompt).await.map(drop)
	}
}

/// Accepts English and Turkish yes
pub fn is_affirmative(answer: &str) -> bool {
	matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "e" | "evet")
}

/// Reads from the terminal
#[derive(Clone, Copy, Debug, Default)]
pub struct Interactive;

impl InputProvider for Interactive {
	async fn line(&mut self, prompt: &str) -> Result<String> {
		let prompt = prompt.to_string();
		let answer = tokio::task::spawn_blocking(move || dialoguer::Input::<String>::new().with_prompt(prompt).allow_empty(true).interact_text())
			.await?
			.map_err(|e| eyre!("Failed to read input: {}", e))?;
		Ok(answer.trim().to_string())
	}

	async fn confirm(&mut self, prompt: &str) -> Result<bool> {
		Ok(v_utils::io::confirm(prompt).await)
	}
}

/// Hands out canned values in order, then defers to `fallback`
#[derive(Clone, Debug)]
pub struct Scripted<F> {
	values: VecDeque<String>,
	fallback: F,
}

impl Scripted<Exhausted> {
	pub fn new<I, S>(values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>, {
		Self::with_fallback(values, Exhausted)
	}
}

impl<F> Scripted<F> {
	pub fn with_fallback<I, S>(values: I, fallback: F) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>, {
		Self {
			values: values.into_iter().map(Into::into).collect(),
			fallback,
		}
	}
}

impl<F: InputProvider> InputProvider for Scripted<F> {
	async fn line(&mut self, prompt: &str) -> Result<String> {
		match self.values.pop_front() {
			Some(value) => {
				log!("{}: {}", prompt, value);
				Ok(value)
			}
			None => self.fallback.line(prompt).await,
		}
	}

	async fn confirm(&mut self, prompt: &str) -> Result<bool> {
		if self.values.is_empty() {
			return self.fallback.confirm(prompt).await;
		}
		Ok(is_affirmative(&self.line(prompt).await?))
	}
}

/// Fallback that refuses every request
#[derive(Clone, Copy, Debug, Default)]
pub struct Exhausted;

impl InputProvider for Exhausted {
	async fn line(&mut self, prompt: &str) -> Result<String> {
		Err(eyre!("No scripted input left for {:?}", prompt))
	}
}
