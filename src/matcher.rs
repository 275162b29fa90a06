//! Pairing quiz prompts with answer fields.
//!
//! Quiz markup rarely offers a reliable list of question nodes, but every answer field is an
//! unambiguous anchor. So discovery is input-centric: each answer-capable element becomes one
//! [`QuizQuestion`], and its prompt is looked up around it. When nothing usable is found the
//! question gets a placeholder prompt rather than being dropped.

use scraper::{ElementRef, Html};

use crate::{
	FieldKind, FieldRef, QuizQuestion, SelectOption,
	browser::{ANSWER_FIELD_SELECTOR, RenderedDocument},
	dom::{inner_text, parse_selector},
};

/// Class fragments marking the container that holds one question
pub const QUESTION_CONTAINER_MARKERS: &[&str] = &["question", "form-group"];

/// Elements inside a question container that may carry the prompt, first in document order wins
const PROMPT_CANDIDATES: &str = "label, p, div, span";

/// One question per answer field, ordinals in document order
pub fn match_questions(doc: &RenderedDocument) -> Vec<QuizQuestion> {
	let html = doc.parse();
	let questions = match_in(&html);
	let placeholders = questions.iter().filter(|q| q.prompt == QuizQuestion::placeholder_prompt(q.ordinal)).count();
	tracing::info!(fields = questions.len(), placeholders, "matched answer fields");
	questions
}

fn match_in(html: &Html) -> Vec<QuizQuestion> {
	let fields = match parse_selector(ANSWER_FIELD_SELECTOR) {
		Ok(s) => s,
		Err(e) => {
			tracing::error!("{e}");
			return Vec::new();
		}
	};

	html.select(&fields)
		.enumerate()
		.map(|(ordinal, element)| {
			let prompt = prompt_for(element).unwrap_or_else(|| QuizQuestion::placeholder_prompt(ordinal));
			QuizQuestion {
				ordinal,
				prompt,
				field: Some(field_ref(ordinal, element)),
			}
		})
		.collect()
}

/// Text of the first prompt-like element inside the field's nearest question container
fn prompt_for(field: ElementRef<'_>) -> Option<String> {
	let container = question_container(field)?;
	let candidates = parse_selector(PROMPT_CANDIDATES).ok()?;
	container.select(&candidates).map(inner_text).find(|text| !text.is_empty())
}

fn question_container(field: ElementRef<'_>) -> Option<ElementRef<'_>> {
	field.ancestors().filter_map(ElementRef::wrap).find(|ancestor| {
		ancestor
			.value()
			.attr("class")
			.is_some_and(|class| QUESTION_CONTAINER_MARKERS.iter().any(|marker| class.contains(marker)))
	})
}

fn field_ref(index: usize, element: ElementRef<'_>) -> FieldRef {
	let el = element.value();
	let kind = match el.name() {
		"textarea" => FieldKind::TextArea,
		"select" => FieldKind::Select { multiple: el.attr("multiple").is_some() },
		_ => FieldKind::TextInput,
	};
	let options = match kind {
		FieldKind::Select { .. } => select_options(element),
		_ => Vec::new(),
	};
	FieldRef {
		index,
		kind,
		name: el.attr("name").map(str::to_string),
		options,
	}
}

fn select_options(select: ElementRef<'_>) -> Vec<SelectOption> {
	let Ok(option) = parse_selector("option") else {
		return Vec::new();
	};
	select
		.select(&option)
		.map(|o| {
			let text = o.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ");
			// an option without a value attribute submits its text
			let value = o.value().attr("value").map(str::to_string).unwrap_or_else(|| text.clone());
			SelectOption::new(value, text)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn questions(body: &str) -> Vec<QuizQuestion> {
		match_questions(&RenderedDocument::new("https://quiz.example", format!("<html><body><form>{body}</form></body></html>")))
	}

	#[test]
	fn one_question_per_field_in_document_order() {
		let qs = questions(
			r#"
			<div class="question"><label>Peygamberimiz nerede doğdu?</label><input type="text" name="q1"></div>
			<div class="form-group"><p>Hicret hangi şehre yapıldı?</p><textarea name="q2"></textarea></div>
			<input name="loose">
			<input type="hidden" name="token" value="x">
			<input type="checkbox" name="agree">
			"#,
		);

		assert_eq!(qs.iter().map(|q| q.ordinal).collect::<Vec<_>>(), vec![0, 1, 2]);
		assert_eq!(qs[0].prompt, "Peygamberimiz nerede doğdu?");
		assert_eq!(qs[1].prompt, "Hicret hangi şehre yapıldı?");
		assert_eq!(qs[2].prompt, "Question 3");
		assert!(qs.iter().all(|q| !q.prompt.is_empty()));

		let fields: Vec<_> = qs.iter().map(|q| q.field.clone().unwrap()).collect();
		assert_eq!(fields[0].kind, FieldKind::TextInput);
		assert_eq!(fields[0].name.as_deref(), Some("q1"));
		assert_eq!(fields[1].kind, FieldKind::TextArea);
		assert_eq!(fields.iter().map(|f| f.index).collect::<Vec<_>>(), vec![0, 1, 2]);
	}

	#[test]
	fn nearest_container_is_used() {
		let qs = questions(
			r#"
			<div class="questions-list">
				<span>Bütün sorular</span>
				<div class="form-group question-3"><span></span><span>Bedir savaşı hangi yıl oldu?</span><input type="text"></div>
			</div>
			"#,
		);
		assert_eq!(qs.len(), 1);
		assert_eq!(qs[0].prompt, "Bedir savaşı hangi yıl oldu?");
	}

	#[test]
	fn container_without_text_falls_back_to_placeholder() {
		let qs = questions(r#"<div class="question"><span>  </span><input type="text"></div><div><label>Not in a container</label><input type="text"></div>"#);
		assert_eq!(qs[0].prompt, "Question 1");
		assert_eq!(qs[1].prompt, "Question 2");
	}

	#[test]
	fn selects_carry_their_options() {
		let qs = questions(
			r#"<div class="question"><label>İlk vahiy nerede geldi?</label>
			<select name="q9"><option value="">Seçiniz</option><option value="hira">Hira   Mağarası</option><option>Sevr</option></select></div>"#,
		);
		let field = qs[0].field.as_ref().unwrap();
		assert_eq!(field.kind, FieldKind::Select { multiple: false });
		assert_eq!(field.options, vec![
			SelectOption::new("".into(), "Seçiniz".into()),
			SelectOption::new("hira".into(), "Hira Mağarası".into()),
			SelectOption::new("Sevr".into(), "Sevr".into()),
		]);
		assert!(qs[0].is_select());
		assert_eq!(qs[0].prompt, "İlk vahiy nerede geldi?");
	}

	#[test]
	fn page_without_fields_has_no_questions() {
		assert!(questions("<p>Yarışma henüz başlamadı.</p>").is_empty());
	}
}
