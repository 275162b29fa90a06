//! Run orchestration: quiz passes with guaranteed browser teardown, and video mood runs

use std::fmt;
#[cfg(feature = "xdg")]
use std::path::PathBuf;

use color_eyre::{Result, eyre::eyre};
#[cfg(feature = "xdg")]
use v_utils::xdg_state_dir;
use v_utils::{elog, log};

#[cfg(feature = "xdg")]
use crate::browser::RenderedDocument;
use crate::{
	BookDocument, QuizQuestion,
	book::{self, BookSource},
	browser::BrowserSession,
	config::AppConfig,
	ensure_scheme,
	error::QuizError,
	filler,
	input::InputProvider,
	matcher,
	oracle::{self, Oracle},
	video::{self, MoodModel, PolarityScorer, TranscriptSource, VideoAnalysis},
};

pub const BOOK_PROMPT: &str = "Book address or file path (.pdf, .txt or reader URL)";
pub const QUIZ_PROMPT: &str = "Quiz page address";
pub const VIDEO_PROMPT: &str = "YouTube video address";

/// What a run works on
#[derive(Clone, Debug)]
pub struct Targets {
	pub book: BookSource,
	pub quiz: String,
}

/// Asks for the book and quiz addresses. The book source is classified right away, so a missing
/// file or unsupported format fails before any browser work starts.
pub async fn ask_targets<I: InputProvider>(inputs: &mut I) -> Result<Targets> {
	let book = inputs.line(BOOK_PROMPT).await?;
	if book.trim().is_empty() {
		return Err(eyre!("No book path or address given"));
	}
	let book = BookSource::classify(&book)?;

	let quiz = inputs.line(QUIZ_PROMPT).await?;
	if quiz.trim().is_empty() {
		return Err(eyre!("No quiz address given"));
	}
	Ok(Targets { book, quiz: ensure_scheme(&quiz) })
}

/// Mood analysis of one video. The address is asked for when `address` is `None`; the LLM
/// reading runs when `ai` is set or the operator asks for it.
pub async fn run_video<I, T, P, M>(inputs: &mut I, source: &T, scorer: &P, model: &M, address: Option<String>, ai: bool) -> Result<VideoAnalysis>
where
	I: InputProvider,
	T: TranscriptSource,
	P: PolarityScorer,
	M: MoodModel, {
	let address = match address {
		Some(address) => address,
		None => inputs.line(VIDEO_PROMPT).await?,
	};
	let address = address.trim();
	if !video::is_video_address(address) {
		return Err(eyre!("Not a YouTube address: {address:?}"));
	}
	let address = ensure_scheme(address);

	let ai = ai || inputs.confirm("Also ask the LLM for a mood reading?").await?;
	log!("Analysing {}...", address);
	video::analyze_video(source, scorer, ai.then_some(model), &address).await
}

/// Counters for one quiz pass
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QuizReport {
	pub discovered: usize,
	pub answered: usize,
	pub filled: usize,
	/// Questions the answer service gave up on
	pub skipped: usize,
	pub submitted: bool,
}

impl fmt::Display for QuizReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} field(s) found, {} answered, {} filled, {} skipped, form {}",
			self.discovered,
			self.answered,
			self.filled,
			self.skipped,
			if self.submitted { "submitted" } else { "not submitted" }
		)
	}
}

/// Runs `work` on the session and closes the session afterwards, whether `work` succeeded,
/// failed or was interrupted with Ctrl+C. An interrupt surfaces as [`QuizError::Interrupted`].
pub async fn with_session<S: BrowserSession, T>(session: &mut S, work: impl AsyncFnOnce(&mut S) -> Result<T>) -> Result<T> {
	let ctrl_c = async {
		if tokio::signal::ctrl_c().await.is_err() {
			// no signal support: never interrupt
			std::future::pending::<()>().await;
		}
	};
	with_session_until(session, ctrl_c, work).await
}

/// [`with_session`] with `interrupt` in place of Ctrl+C
pub async fn with_session_until<S: BrowserSession, T>(session: &mut S, interrupt: impl Future<Output = ()>, work: impl AsyncFnOnce(&mut S) -> Result<T>) -> Result<T> {
	let outcome = tokio::select! {
		result = work(&mut *session) => result,
		() = interrupt => Err(QuizError::Interrupted.into()),
	};
	session.close().await;
	log!("Browser closed.");
	outcome
}

/// Full pass: read the book, then solve the quiz with it
pub async fn run<S: BrowserSession, I: InputProvider, O: Oracle>(session: &mut S, inputs: &mut I, oracle: &O, targets: &Targets, config: &AppConfig) -> Result<QuizReport> {
	log!("Reading book from {}...", targets.book.display());
	let book = book::read(session, &targets.book, config.walk_limits(), config.delays()).await?;
	log!("Book read from {} ({} characters)", book.source(), book.char_count());

	solve_quiz(session, inputs, oracle, &book, &targets.quiz, config).await
}

/// Answers every field on the quiz page from the book and offers to submit.
///
/// A question the oracle cannot answer, or a field that cannot be written, is logged and
/// skipped; the remaining questions are still processed.
pub async fn solve_quiz<S: BrowserSession, I: InputProvider, O: Oracle>(
	session: &mut S,
	inputs: &mut I,
	oracle: &O,
	book: &BookDocument,
	quiz: &str,
	config: &AppConfig,
) -> Result<QuizReport> {
	let delays = config.delays();
	let mut report = QuizReport::default();

	log!("Navigating to {}...", quiz);
	session.navigate(quiz).await?;
	tokio::time::sleep(delays.page).await;

	if config.pause_before_matching {
		inputs.pause("Page loaded. Check it, then press Enter to look for questions").await?;
	}

	let doc = session.rendered_state().await?;
	#[cfg(feature = "xdg")]
	if config.save_pages {
		let session_id = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
		if let Err(e) = save_page_html(&doc, &session_id) {
			elog!("Failed to save quiz page HTML: {e}");
		}
	}

	let questions = matcher::match_questions(&doc);
	report.discovered = questions.len();
	if questions.is_empty() {
		elog!("No answer fields found on the page. Check that the quiz is open.");
		return Ok(report);
	}
	log!("{} answer field(s) found", questions.len());

	for question in &questions {
		show_question(question);

		let answer = match oracle::answer_question(oracle, book, question, config.context_chars(), config.retry_policy()).await {
			Ok(answer) => answer,
			Err(e) => {
				elog!("Question {}: {}", question.ordinal + 1, e);
				report.skipped += 1;
				continue;
			}
		};
		report.answered += 1;
		log!("Answer: {}", answer.text);

		match filler::fill(&*session, question, &answer, delays.field).await {
			Ok(()) => report.filled += 1,
			Err(e) => elog!("{e}"),
		}
	}

	let submit = if config.auto_submit {
		true
	} else {
		inputs.confirm(&format!("Submit the form ({} of {} fields filled)?", report.filled, report.discovered)).await?
	};
	if submit {
		report.submitted = filler::submit(&*session, delays.submit).await;
	} else {
		log!("Form not submitted; you can review it in the browser.");
	}

	log!("{}", report);
	Ok(report)
}

fn show_question(question: &QuizQuestion) {
	let header = format!("--- Question {} ---", question.ordinal + 1);
	tracing::info!("{}", header);
	eprintln!("{}", header);
	eprint!("{}", question);
}

/// Saves a rendered page to the state dir for debugging, labelled by its address
#[cfg(feature = "xdg")]
pub fn save_page_html(doc: &RenderedDocument, session_id: &str) -> Result<PathBuf> {
	let html_dir = xdg_state_dir!("persist_htmls").join(session_id);
	std::fs::create_dir_all(&html_dir).map_err(|e| eyre!("Failed to create HTML dir: {}", e))?;

	let label = doc.address.replace("https://", "").replace("http://", "");
	let safe_label: String = label.chars().map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect();
	let timestamp = chrono::Utc::now().timestamp();

	let filepath = html_dir.join(format!("{timestamp}_{safe_label}.html"));
	std::fs::write(&filepath, &doc.html).map_err(|e| eyre!("Failed to write HTML file: {}", e))?;

	log!("Saved page HTML to: {}", filepath.display());
	Ok(filepath)
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;

	use color_eyre::eyre::bail;

	use super::*;
	use crate::{
		browser::{ClickTarget, testing::FakeSession},
		filler::FieldValue,
		input::Scripted,
		video::{CaptionTrack, Lexicon, Mood, TranscriptOrigin, VideoInfo},
	};

	const QUIZ: &str = "https://quiz.example/yarisma";

	/// Answers from a fixed table keyed by prompt; unknown prompts fail
	struct TableOracle(Vec<(&'static str, &'static str)>, RefCell<usize>);

	impl Oracle for TableOracle {
		async fn solve(&self, _book_context: &str, question: &str) -> Result<String> {
			*self.1.borrow_mut() += 1;
			match self.0.iter().find(|(q, _)| *q == question) {
				Some((_, a)) => Ok(a.to_string()),
				None => bail!("service unavailable"),
			}
		}
	}

	fn config() -> AppConfig {
		AppConfig {
			pause_before_matching: false,
			max_pages: 1000,
			duplicate_grace_pages: 3,
			max_consecutive_misses: 3,
			min_page_chars: 100,
			min_book_chars: 500,
			context_chars: 8000,
			api_retries: 1,
			..AppConfig::default()
		}
	}

	fn quiz_page() -> String {
		r#"<html><body><form>
			<div class="question"><label>Peygamberimiz nerede doğdu?</label><input type="text" name="q1"></div>
			<div class="question"><label>Zor soru</label><input type="text" name="q2"></div>
			<div class="form-group"><label>Hicret nereye yapıldı?</label><select name="q3"><option value="">Seçiniz</option><option value="m">Medine</option></select></div>
			<button type="submit">Gönder</button>
		</form></body></html>"#
			.to_string()
	}

	fn book() -> BookDocument {
		BookDocument::new("kitap.txt", "Peygamberimiz Mekke'de doğdu. Hicret Medine'ye yapıldı.", None)
	}

	fn oracle() -> TableOracle {
		TableOracle(vec![("Peygamberimiz nerede doğdu?", "Mekke"), ("Hicret nereye yapıldı?", "Medine")], RefCell::new(0))
	}

	#[tokio::test]
	async fn failing_question_does_not_stop_the_rest() {
		let mut session = FakeSession::new().page(QUIZ, quiz_page()).clickable(ClickTarget::Css(r#"button[type="submit"]"#));
		let mut inputs = Scripted::new(["e"]);
		let oracle = oracle();

		let report = solve_quiz(&mut session, &mut inputs, &oracle, &book(), QUIZ, &config()).await.unwrap();

		assert_eq!(report, QuizReport {
			discovered: 3,
			answered: 2,
			filled: 2,
			skipped: 1,
			submitted: true,
		});
		assert_eq!(session.writes.borrow().as_slice(), &[(0, FieldValue::Text("Mekke".into())), (2, FieldValue::Option("m".into()))]);
		assert_eq!(*oracle.1.borrow(), 3);
	}

	#[tokio::test]
	async fn declined_submit_leaves_form_alone() {
		let mut session = FakeSession::new().page(QUIZ, quiz_page()).clickable(ClickTarget::Css(r#"button[type="submit"]"#)).failing_field(0);
		let mut inputs = Scripted::new(["h"]);

		let report = solve_quiz(&mut session, &mut inputs, &oracle(), &book(), QUIZ, &config()).await.unwrap();

		assert_eq!(report.filled, 1);
		assert!(!report.submitted);
		assert!(session.clicks.borrow().is_empty());
	}

	#[tokio::test]
	async fn empty_quiz_page_reports_nothing_found() {
		let mut session = FakeSession::new().page(QUIZ, "<html><body><p>Yarışma kapalı</p></body></html>");
		let mut inputs = Scripted::new(Vec::<String>::new());

		let report = solve_quiz(&mut session, &mut inputs, &oracle(), &book(), QUIZ, &config()).await.unwrap();

		assert_eq!(report, QuizReport::default());
	}

	#[tokio::test]
	async fn targets_are_validated_before_browsing() {
		let mut inputs = Scripted::new(["kitap.docx", "quiz.example"]);
		let err = ask_targets(&mut inputs).await.unwrap_err();
		assert!(err.to_string().contains("unsupported book format"));

		let mut inputs = Scripted::new(["https://reader.example/kitap/#p=4", "quiz.example/yarisma"]);
		let targets = ask_targets(&mut inputs).await.unwrap();
		assert!(targets.book.is_web());
		assert_eq!(targets.quiz, "https://quiz.example/yarisma");
	}

	#[tokio::test]
	async fn session_is_closed_on_every_path() {
		let mut session = FakeSession::new();
		let visited = with_session(&mut session, async |session: &mut FakeSession| {
			session.navigate("quiz.example").await?;
			Ok(session.visited.clone())
		})
		.await
		.unwrap();
		assert_eq!(visited, vec!["https://quiz.example".to_string()]);
		assert_eq!(session.closed, 1);

		let mut session = FakeSession::new();
		let result: Result<()> = with_session(&mut session, async |_: &mut FakeSession| Err(eyre!("reading failed"))).await;
		assert!(result.is_err());
		assert_eq!(session.closed, 1);
	}

	#[tokio::test]
	async fn interrupt_closes_session_and_reports_interrupted() {
		let mut session = FakeSession::new();
		let result: Result<()> = with_session_until(&mut session, std::future::ready(()), async |_: &mut FakeSession| std::future::pending().await).await;

		let err = result.unwrap_err();
		assert!(matches!(err.downcast_ref::<QuizError>(), Some(QuizError::Interrupted)));
		assert_eq!(session.closed, 1);
	}

	/// One Turkish caption track, whatever the address
	struct OneTrack;

	impl TranscriptSource for OneTrack {
		async fn video_info(&self, _address: &str) -> Result<VideoInfo> {
			let track = CaptionTrack {
				url: Some("https://captions.example/tr".into()),
				ext: Some("vtt".into()),
			};
			Ok(VideoInfo {
				title: Some("Güzel bir gün".into()),
				subtitles: Some([("tr".to_string(), vec![track])].into()),
				..VideoInfo::default()
			})
		}

		async fn fetch_track(&self, _url: &str) -> Result<String> {
			Ok("WEBVTT\n\n00:00:00.000 --> 00:00:04.000\nBugün çok mutluyum, harika bir gün geçirdik hep birlikte.\n".into())
		}
	}

	struct CountingModel(RefCell<usize>);

	impl MoodModel for CountingModel {
		async fn read_mood(&self, _prompt: String) -> Result<String> {
			*self.0.borrow_mut() += 1;
			Ok("Mood: joyful\nSentiment: positive\nIntensity: 9\nSummary: upbeat".into())
		}
	}

	#[tokio::test]
	async fn video_address_is_asked_and_ai_can_be_declined() {
		let mut inputs = Scripted::new(["youtu.be/abc", "h"]);
		let model = CountingModel(RefCell::new(0));

		let analysis = run_video(&mut inputs, &OneTrack, &Lexicon::default(), &model, None, false).await.unwrap();

		assert_eq!(analysis.sentiment.mood, Mood::Happy);
		assert_eq!(analysis.transcript.origin, TranscriptOrigin::Captions {
			language: "tr".into(),
			automatic: false
		});
		assert!(analysis.ai.is_none());
		assert_eq!(*model.0.borrow(), 0);
	}

	#[tokio::test]
	async fn ai_flag_skips_the_question() {
		let mut inputs = Scripted::new(Vec::<String>::new());
		let model = CountingModel(RefCell::new(0));

		let analysis = run_video(&mut inputs, &OneTrack, &Lexicon::default(), &model, Some("https://www.youtube.com/watch?v=abc".into()), true).await.unwrap();

		assert_eq!(analysis.ai.map(|ai| ai.intensity), Some(9));
		assert_eq!(*model.0.borrow(), 1);
	}

	#[tokio::test]
	async fn other_video_sites_are_rejected() {
		let mut inputs = Scripted::new(Vec::<String>::new());
		let model = CountingModel(RefCell::new(0));
		let err = run_video(&mut inputs, &OneTrack, &Lexicon::default(), &model, Some("https://vimeo.com/1".into()), true).await.unwrap_err();
		assert!(err.to_string().contains("Not a YouTube address"));
	}

	#[tokio::test]
	async fn full_run_reads_local_book_then_answers() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("kitap.txt");
		std::fs::write(&file, book().raw_text()).unwrap();
		let targets = Targets {
			book: BookSource::classify(file.to_str().unwrap()).unwrap(),
			quiz: QUIZ.into(),
		};
		let mut session = FakeSession::new().page(QUIZ, quiz_page());
		let mut inputs = Scripted::new(["h"]);

		let report = run(&mut session, &mut inputs, &oracle(), &targets, &config()).await.unwrap();

		assert_eq!(report.filled, 2);
		assert_eq!(session.visited, vec![QUIZ.to_string()]);
	}
}
