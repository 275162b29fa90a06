use std::time::Duration;

use v_utils::{elog, log};

use crate::{
	FieldKind, FieldRef, QuizAnswer, QuizQuestion, SelectOption,
	browser::{BrowserSession, ClickTarget},
	dom::fold,
	error::QuizError,
};

/// Submit controls, most specific first
pub const SUBMIT_STRATEGIES: &[ClickTarget] = &[
	ClickTarget::Css(r#"button[type="submit"]"#),
	ClickTarget::Css(r#"input[type="submit"]"#),
	ClickTarget::ButtonText("Gönder"),
	ClickTarget::ButtonText("Submit"),
];

/// What actually gets written into a field
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldValue {
	Text(String),
	/// Value attribute of the option to select
	Option(String),
}

/// Turns an answer into something the field accepts.
///
/// Text fields take the answer verbatim. Select fields need one of their options: an exact
/// (case-insensitive) match on text or value wins. Otherwise the option whose words appear as a
/// whole-word run in the answer (or that contains the whole answer) is taken, longest first, so a
/// one-letter option never matches a letter inside some unrelated word.
pub fn resolve_value(field: &FieldRef, answer: &str) -> Result<FieldValue, String> {
	match field.kind {
		FieldKind::TextInput | FieldKind::TextArea => Ok(FieldValue::Text(answer.to_string())),
		FieldKind::Select { .. } => match_option(&field.options, answer).map(|o| FieldValue::Option(o.value.clone())).ok_or_else(|| {
			let available: Vec<&str> = field.options.iter().map(|o| o.text.as_str()).collect();
			format!("no option matches {answer:?} (options: {})", available.join(", "))
		}),
	}
}

fn match_option<'a>(options: &'a [SelectOption], answer: &str) -> Option<&'a SelectOption> {
	let folded = fold(answer.trim());
	if folded.is_empty() {
		return None;
	}
	let candidates = || options.iter().filter(|o| !o.value.is_empty() && !o.text.trim().is_empty());

	if let Some(exact) = candidates().find(|o| fold(o.text.trim()) == folded || fold(&o.value) == folded) {
		return Some(exact);
	}

	let answer_words = words(&folded);
	candidates()
		.filter(|o| {
			let folded_option = fold(&o.text);
			let option_words = words(&folded_option);
			contains_run(&answer_words, &option_words) || contains_run(&option_words, &answer_words)
		})
		.max_by_key(|o| o.text.trim().chars().count())
}

fn words(text: &str) -> Vec<&str> {
	text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect()
}

/// Whether `needle` occurs in `haystack` as consecutive words
fn contains_run(haystack: &[&str], needle: &[&str]) -> bool {
	!needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}

/// Clears the question's field, writes the answer and waits `settle` for client-side handlers
pub async fn fill<S: BrowserSession>(session: &S, question: &QuizQuestion, answer: &QuizAnswer, settle: Duration) -> Result<(), QuizError> {
	debug_assert_eq!(question.ordinal, answer.ordinal);
	let fail = |reason: String| QuizError::FieldFill {
		ordinal: question.ordinal,
		reason,
	};

	let field = question.field.as_ref().ok_or_else(|| fail("question has no answer field".into()))?;
	let value = resolve_value(field, &answer.text).map_err(fail)?;
	session.write_field(field, &value).await.map_err(|e| fail(e.to_string()))?;
	tracing::debug!(ordinal = question.ordinal, field = field.index, "answer written");

	tokio::time::sleep(settle).await;
	Ok(())
}

/// Clicks the first submit control found. Returns whether anything was clicked.
///
/// Failures are reported, never propagated.
pub async fn submit<S: BrowserSession>(session: &S, settle: Duration) -> bool {
	for target in SUBMIT_STRATEGIES {
		match session.click(target).await {
			Ok(true) => {
				log!("Form submitted via {:?}", target);
				tokio::time::sleep(settle).await;
				return true;
			}
			Ok(false) => tracing::debug!(?target, "submit control not present"),
			Err(e) => tracing::warn!(?target, "submit click failed: {e}"),
		}
	}
	elog!("Could not find a submit button; submit the form manually.");
	false
}
