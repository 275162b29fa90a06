use ask_llm::{Client as LlmClient, Conversation, Model, Role};
use color_eyre::{Result, eyre::bail};

use crate::{BookDocument, QuizAnswer, QuizQuestion, config::RetryPolicy, error::QuizError};

/// What the model is told to reply when the book does not cover the question
pub const NOT_IN_BOOK: &str = "This information is not in the book.";

/// Answers a question using only the supplied book text
#[allow(async_fn_in_trait)]
pub trait Oracle {
	async fn solve(&self, book_context: &str, question: &str) -> Result<String>;
}

/// Oracle backed by the hosted LLM
#[derive(Clone, Debug, Default)]
pub struct LlmOracle;

impl Oracle for LlmOracle {
	async fn solve(&self, book_context: &str, question: &str) -> Result<String> {
		complete(LlmClient::new().model(Model::Medium).max_tokens(500), grounded_prompt(book_context, question)).await
	}
}

/// One-shot request through `client`. An empty reply is an error.
pub async fn complete(client: LlmClient, prompt: String) -> Result<String> {
	let mut conv = Conversation::new();
	conv.add(Role::User, prompt);

	let response = client.conversation(&conv).await?;
	tracing::debug!("LLM raw response: {}", response.text);

	let answer = response.text.trim();
	if answer.is_empty() {
		bail!("LLM returned an empty answer");
	}
	Ok(answer.to_string())
}

pub fn grounded_prompt(book_context: &str, question: &str) -> String {
	format!(
		r#"You are an assistant for a book quiz. Read the book content below and answer the question using only information from the book.
If the book does not contain the answer, reply exactly: {NOT_IN_BOOK}

BOOK CONTENT:
{book_context}

QUESTION:
{question}

ANSWER (short and precise):"#
	)
}

/// Asks the oracle about one question, with the book cut to `context_chars` characters.
///
/// Failed attempts are retried per `retry`; only the last failure is returned.
pub async fn answer_question<O: Oracle>(oracle: &O, book: &BookDocument, question: &QuizQuestion, context_chars: usize, retry: RetryPolicy) -> Result<QuizAnswer, QuizError> {
	let context = book.grounding_context(context_chars);
	let mut last_error = String::new();

	for attempt in 1..=retry.attempts {
		match oracle.solve(context, &question.prompt).await {
			Ok(text) => return Ok(QuizAnswer::new(question.ordinal, text)),
			Err(e) => {
				last_error = e.to_string();
				if attempt < retry.attempts {
					tracing::warn!(ordinal = question.ordinal, "answer attempt {attempt}/{} failed: {e}", retry.attempts);
					tokio::time::sleep(retry.delay_after(attempt)).await;
				}
			}
		}
	}
	Err(QuizError::Oracle(last_error))
}
