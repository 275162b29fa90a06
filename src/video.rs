//! Mood of a video, judged from what is said in it.
//!
//! The transcript comes from the video's caption tracks: languages are tried `tr`, `en`, then
//! the rest in sorted order, manual captions before automatic ones within a language. Videos
//! without usable captions fall back to their title and cleaned description. The text is then
//! scored on a polarity scale and banded into a [`Mood`]; an LLM reading of the opening
//! [`MOOD_CONTEXT_CHARS`] characters can be added on request.

use std::{
	collections::{BTreeMap, BTreeSet},
	fmt,
	sync::LazyLock,
	time::Duration,
};

use ask_llm::{Client as LlmClient, Model};
use color_eyre::{Result, eyre::eyre};
use regex::Regex;
use serde::Deserialize;
use v_utils::{elog, log};

use crate::{
	dom::fold,
	error::QuizError,
	oracle::{self, LlmOracle},
	truncate_chars,
};

/// Caption languages tried before all others, in this order
pub const PRIORITY_LANGUAGES: &[&str] = &["tr", "en"];

/// Characters of transcript the LLM mood reading sees
pub const MOOD_CONTEXT_CHARS: usize = 3000;

/// A caption track must yield more than this to be used as the transcript
const MIN_CAPTION_CHARS: usize = 50;
/// Cleaned track text at or under this is treated as unparsable
const MIN_TRACK_TEXT_CHARS: usize = 20;
/// Below this the transcript is too thin to score
const MIN_TRANSCRIPT_CHARS: usize = 20;
const DESCRIPTION_CHARS: usize = 3000;

static VTT_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex"));
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"http\S+|www\.\S+").expect("static regex"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+@\S+").expect("static regex"));
static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("static regex"));

pub fn is_video_address(address: &str) -> bool {
	let lower = address.to_lowercase();
	lower.contains("youtube.com") || lower.contains("youtu.be")
}

/// One downloadable caption file
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CaptionTrack {
	pub url: Option<String>,
	/// File format, e.g. `json3` or `vtt`
	pub ext: Option<String>,
}

/// The parts of a video's metadata the transcript is built from
#[derive(Clone, Debug, Default, Deserialize)]
pub struct VideoInfo {
	pub title: Option<String>,
	pub description: Option<String>,
	/// Uploaded captions per language
	pub subtitles: Option<BTreeMap<String, Vec<CaptionTrack>>>,
	/// Speech-recognition captions per language
	pub automatic_captions: Option<BTreeMap<String, Vec<CaptionTrack>>>,
}

impl VideoInfo {
	fn tracks(&self, language: &str, automatic: bool) -> &[CaptionTrack] {
		let map = if automatic { &self.automatic_captions } else { &self.subtitles };
		map.as_ref().and_then(|m| m.get(language)).map(Vec::as_slice).unwrap_or_default()
	}

	fn languages(&self, automatic: bool) -> impl Iterator<Item = &str> {
		let map = if automatic { &self.automatic_captions } else { &self.subtitles };
		map.iter().flat_map(|m| m.keys().map(String::as_str))
	}
}

/// Where video metadata and caption files come from
#[allow(async_fn_in_trait)]
pub trait TranscriptSource {
	async fn video_info(&self, address: &str) -> Result<VideoInfo>;

	/// Raw caption file at `url`
	async fn fetch_track(&self, url: &str) -> Result<String>;
}

/// Metadata through the `yt-dlp` executable, caption files over HTTP
#[derive(Clone, Debug)]
pub struct YtDlp {
	binary: String,
	http: reqwest::Client,
}

impl YtDlp {
	pub fn new() -> Result<Self> {
		let http = reqwest::Client::builder()
			.timeout(Duration::from_secs(10))
			.build()
			.map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;
		Ok(Self { binary: "yt-dlp".into(), http })
	}
}

impl TranscriptSource for YtDlp {
	async fn video_info(&self, address: &str) -> Result<VideoInfo> {
		let output = tokio::process::Command::new(&self.binary)
			.args(["--dump-single-json", "--skip-download", "--no-playlist", "--no-warnings"])
			.arg(address)
			.output()
			.await
			.map_err(|e| eyre!("Failed to run {} (is it installed?): {}", self.binary, e))?;
		if !output.status.success() {
			return Err(access_problem(&String::from_utf8_lossy(&output.stderr)).into());
		}
		serde_json::from_slice(&output.stdout).map_err(|e| eyre!("Failed to parse video metadata: {}", e))
	}

	async fn fetch_track(&self, url: &str) -> Result<String> {
		let response = self.http.get(url).send().await?.error_for_status()?;
		Ok(response.text().await?)
	}
}

/// Turns a metadata failure into the reason an operator can act on
pub fn access_problem(stderr: &str) -> QuizError {
	let lower = stderr.to_lowercase();
	let reason = if lower.contains("private") {
		"the video is private".to_string()
	} else if lower.contains("unavailable") {
		"the video is unavailable or was removed".to_string()
	} else if lower.contains("sign in") || lower.contains("age-restricted") {
		"the video is age-restricted or needs sign-in".to_string()
	} else {
		truncate_chars(stderr.trim(), 200).to_string()
	};
	QuizError::VideoUnavailable(reason)
}

/// Caption languages to try: the priority languages that exist, then every other one sorted
pub fn language_order(info: &VideoInfo) -> Vec<String> {
	let available: BTreeSet<&str> = info.languages(false).chain(info.languages(true)).collect();
	PRIORITY_LANGUAGES
		.iter()
		.copied()
		.filter(|lang| available.contains(lang))
		.chain(available.iter().copied().filter(|lang| !PRIORITY_LANGUAGES.contains(lang)))
		.map(str::to_string)
		.collect()
}

/// Readable formats first; otherwise whatever comes first
fn preferred_track(tracks: &[CaptionTrack]) -> Option<&str> {
	let with_url = || tracks.iter().filter_map(|t| t.url.as_deref().map(|url| (t.ext.as_deref(), url)));
	with_url()
		.find(|(ext, _)| *ext == Some("json3"))
		.or_else(|| with_url().find(|(ext, _)| *ext == Some("vtt")))
		.or_else(|| with_url().next())
		.map(|(_, url)| url)
}

#[derive(Deserialize)]
struct Json3 {
	#[serde(default)]
	events: Vec<Json3Event>,
}

#[derive(Deserialize)]
struct Json3Event {
	#[serde(default)]
	segs: Vec<Json3Segment>,
}

#[derive(Deserialize)]
struct Json3Segment {
	utf8: Option<String>,
}

/// Plain text of a caption file, json3 or WebVTT. `None` if too little text came out.
pub fn caption_text(raw: &str) -> Option<String> {
	let looks_json = raw.trim_start().starts_with('{') || raw.contains("wireMagic") || raw.contains("\"events\"");
	if looks_json {
		match serde_json::from_str::<Json3>(raw) {
			Ok(doc) => {
				let text = doc
					.events
					.iter()
					.flat_map(|e| &e.segs)
					.filter_map(|s| s.utf8.as_deref())
					.map(|t| t.replace(">>", "").replace("<<", "").trim().to_string())
					.filter(|t| !t.is_empty())
					.collect::<Vec<_>>()
					.join(" ");
				if text.chars().count() > MIN_TRACK_TEXT_CHARS {
					return Some(text);
				}
			}
			Err(e) => tracing::debug!("caption file is not json3 ({e}), reading it as WebVTT"),
		}
	}

	let mut lines: Vec<String> = Vec::new();
	for line in raw.lines().map(str::trim) {
		let cue_header = line.is_empty()
			|| line.chars().all(|c| c.is_ascii_digit())
			|| line.contains("-->")
			|| line.starts_with("WEBVTT")
			|| line.starts_with("NOTE")
			|| line.starts_with("Kind:")
			|| line.starts_with("Language:");
		if cue_header {
			continue;
		}
		let line = VTT_TAG.replace_all(line, "").replace(">>", "").replace("<<", "");
		let line = line.trim();
		// rolling automatic captions repeat the previous cue
		if line.chars().count() > 1 && lines.last().map(String::as_str) != Some(line) {
			lines.push(line.to_string());
		}
	}
	let text = lines.join(" ");
	(text.chars().count() > MIN_TRACK_TEXT_CHARS).then_some(text)
}

/// Description with links, hashtags, e-mail addresses and short lines removed
pub fn description_text(description: &str) -> String {
	truncate_chars(description, DESCRIPTION_CHARS)
		.lines()
		.map(str::trim)
		.filter(|line| line.chars().count() > 10 && !line.starts_with("http") && !line.starts_with('#'))
		.map(|line| {
			let line = LINK.replace_all(line, "");
			EMAIL.replace_all(&line, "").trim().to_string()
		})
		.filter(|line| line.chars().count() > 10)
		.collect::<Vec<_>>()
		.join(" ")
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TranscriptOrigin {
	Captions { language: String, automatic: bool },
	/// Title and description, for videos without usable captions
	Description,
}

#[derive(Clone, Debug)]
pub struct Transcript {
	pub text: String,
	pub origin: TranscriptOrigin,
}

/// Builds the transcript of the video at `address`
pub async fn fetch_transcript<T: TranscriptSource>(source: &T, address: &str) -> Result<Transcript> {
	log!("Reading video metadata...");
	let info = source.video_info(address).await?;
	let languages = language_order(&info);
	tracing::info!(?languages, "caption languages");

	for language in &languages {
		for automatic in [false, true] {
			let Some(url) = preferred_track(info.tracks(language, automatic)) else {
				continue;
			};
			log!("Trying {} {} captions...", language, if automatic { "automatic" } else { "manual" });
			let text = match source.fetch_track(url).await {
				Ok(raw) => caption_text(&raw),
				Err(e) => {
					tracing::warn!(%language, automatic, "caption download failed: {e}");
					None
				}
			};
			match text {
				Some(text) if text.chars().count() > MIN_CAPTION_CHARS => {
					log!("Transcript read ({} characters)", text.chars().count());
					return Ok(Transcript {
						text,
						origin: TranscriptOrigin::Captions {
							language: language.clone(),
							automatic,
						},
					});
				}
				_ => tracing::debug!(%language, automatic, "caption track unusable"),
			}
		}
	}

	elog!("No usable captions found, falling back to title and description.");
	let mut text = info.title.clone().unwrap_or_default();
	let description = description_text(info.description.as_deref().unwrap_or_default());
	if description.chars().count() > 50 {
		text.push_str("\n\n");
		text.push_str(&description);
	}
	let chars = text.chars().count();
	if chars > 200 {
		log!("Using title and description ({} characters)", chars);
	} else if chars > MIN_TRANSCRIPT_CHARS {
		elog!("Only the title is usable ({} characters); the analysis will be very limited.", chars);
	}
	Ok(Transcript {
		text,
		origin: TranscriptOrigin::Description,
	})
}

/// Polarity in `-1.0..=1.0`, subjectivity in `0.0..=1.0`
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Polarity {
	pub polarity: f64,
	pub subjectivity: f64,
}

pub trait PolarityScorer {
	fn score(&self, text: &str) -> Polarity;
}

/// Word-list scorer for Turkish and English.
///
/// Entries are stems matched against word prefixes, so inflected Turkish forms ("mutluyum",
/// "üzüldük") hit their stem. An intensifier before a word scales it by 1.3; a negator right
/// before or after flips it at half strength.
#[derive(Clone, Debug)]
pub struct Lexicon {
	/// (stem, polarity, subjectivity)
	entries: Vec<(&'static str, f64, f64)>,
	negators: &'static [&'static str],
	intensifiers: &'static [&'static str],
}

impl Default for Lexicon {
	fn default() -> Self {
		Self {
			entries: vec![
				("mutlu", 0.8, 1.0),
				("sevin", 0.7, 0.8),
				("neşe", 0.8, 0.9),
				("güzel", 0.7, 0.9),
				("harika", 0.9, 1.0),
				("muhteşem", 1.0, 1.0),
				("mükemmel", 1.0, 1.0),
				("iyi", 0.5, 0.6),
				("sevgi", 0.6, 0.7),
				("seviyor", 0.5, 0.6),
				("başarı", 0.6, 0.5),
				("umut", 0.5, 0.6),
				("keyif", 0.6, 0.8),
				("eğlen", 0.6, 0.8),
				("teşekkür", 0.4, 0.4),
				("üzgün", -0.7, 1.0),
				("üzül", -0.6, 0.9),
				("hüzün", -0.6, 0.9),
				("hüzn", -0.6, 0.9),
				("kötü", -0.7, 0.7),
				("berbat", -1.0, 1.0),
				("kork", -0.6, 0.8),
				("kızgın", -0.7, 0.9),
				("öfke", -0.8, 0.9),
				("sinir", -0.6, 0.9),
				("nefret", -0.9, 1.0),
				("acı", -0.6, 0.7),
				("ağla", -0.6, 0.8),
				("yalnız", -0.4, 0.6),
				("maalesef", -0.4, 0.5),
				("happy", 0.8, 1.0),
				("glad", 0.5, 1.0),
				("love", 0.5, 0.6),
				("good", 0.7, 0.6),
				("great", 0.8, 0.75),
				("wonderful", 1.0, 1.0),
				("amazing", 0.6, 0.9),
				("awesome", 1.0, 1.0),
				("beautiful", 0.85, 1.0),
				("excellent", 1.0, 1.0),
				("sad", -0.5, 1.0),
				("bad", -0.7, 0.67),
				("terrible", -1.0, 1.0),
				("awful", -1.0, 1.0),
				("horrible", -1.0, 1.0),
				("worst", -1.0, 1.0),
				("angry", -0.5, 1.0),
				("hate", -0.8, 0.9),
				("fear", -0.5, 0.7),
				("lonely", -0.4, 0.6),
			],
			negators: &["değil", "hiç", "not", "never", "no"],
			intensifiers: &["çok", "pek", "oldukça", "gerçekten", "very", "really", "extremely", "so"],
		}
	}
}

impl Lexicon {
	fn lookup(&self, word: &str) -> Option<(f64, f64)> {
		self.entries
			.iter()
			.filter(|(stem, ..)| word.starts_with(stem))
			.max_by_key(|(stem, ..)| stem.len())
			.map(|&(_, polarity, subjectivity)| (polarity, subjectivity))
	}
}

impl PolarityScorer for Lexicon {
	fn score(&self, text: &str) -> Polarity {
		let folded = fold(text);
		let words: Vec<&str> = folded.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();

		let mut hits: Vec<(f64, f64)> = Vec::new();
		for (i, word) in words.iter().enumerate() {
			let Some((mut polarity, mut subjectivity)) = self.lookup(word) else {
				continue;
			};
			let before = i.checked_sub(1).map(|j| words[j]);
			let after = words.get(i + 1).copied();
			if before.is_some_and(|w| self.intensifiers.contains(&w)) {
				polarity = (polarity * 1.3).clamp(-1.0, 1.0);
				subjectivity = (subjectivity * 1.3).min(1.0);
			}
			if [before, after].into_iter().flatten().any(|w| self.negators.contains(&w)) {
				polarity *= -0.5;
			}
			hits.push((polarity, subjectivity));
		}

		if hits.is_empty() {
			return Polarity::default();
		}
		let n = hits.len() as f64;
		Polarity {
			polarity: (hits.iter().map(|h| h.0).sum::<f64>() / n).clamp(-1.0, 1.0),
			subjectivity: (hits.iter().map(|h| h.1).sum::<f64>() / n).clamp(0.0, 1.0),
		}
	}
}

/// Polarity band
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mood {
	Happy,
	Good,
	Neutral,
	Sad,
	VerySad,
}

impl Mood {
	pub fn from_polarity(polarity: f64) -> Self {
		match polarity {
			p if p > 0.3 => Self::Happy,
			p if p > 0.1 => Self::Good,
			p if p > -0.1 => Self::Neutral,
			p if p > -0.3 => Self::Sad,
			_ => Self::VerySad,
		}
	}

	pub fn sentiment(self) -> &'static str {
		match self {
			Self::Happy => "positive",
			Self::Good => "slightly positive",
			Self::Neutral => "neutral",
			Self::Sad => "slightly negative",
			Self::VerySad => "negative",
		}
	}
}

impl fmt::Display for Mood {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			Self::Happy => "Happy",
			Self::Good => "Good",
			Self::Neutral => "Neutral",
			Self::Sad => "Sad",
			Self::VerySad => "Very sad / angry",
		};
		write!(f, "{label}")
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SentimentReport {
	pub mood: Mood,
	pub polarity: f64,
	pub subjectivity: f64,
	/// Polarity mapped onto 0–100, one decimal
	pub positivity_percent: f64,
}

pub fn score_sentiment<P: PolarityScorer>(scorer: &P, text: &str) -> SentimentReport {
	let Polarity { polarity, subjectivity } = scorer.score(text);
	SentimentReport {
		mood: Mood::from_polarity(polarity),
		polarity,
		subjectivity,
		positivity_percent: ((polarity + 1.0) * 500.0).round() / 10.0,
	}
}

/// Free-form mood reading by a language model
#[allow(async_fn_in_trait)]
pub trait MoodModel {
	async fn read_mood(&self, prompt: String) -> Result<String>;
}

impl MoodModel for LlmOracle {
	async fn read_mood(&self, prompt: String) -> Result<String> {
		oracle::complete(LlmClient::new().model(Model::Medium).max_tokens(200), prompt).await
	}
}

pub fn mood_prompt(excerpt: &str) -> String {
	format!(
		r#"You are a sentiment analyst. Read the text below (a video transcript, possibly Turkish) and determine:
1. Mood (happy, sad, angry, neutral, fearful, surprised, ...)
2. Overall sentiment (positive, negative, neutral)
3. Intensity (1-10)
4. A short explanation

TEXT:
{excerpt}

Reply in exactly this format:
Mood: [mood]
Sentiment: [positive/negative/neutral]
Intensity: [1-10]
Summary: [short explanation]"#
	)
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AiMood {
	pub mood: String,
	pub sentiment: String,
	/// 1 to 10
	pub intensity: u8,
	pub summary: String,
}

/// Reads the `Key: value` lines of a mood reply. Missing keys keep their defaults; the summary
/// defaults to the whole reply.
pub fn parse_ai_mood(reply: &str) -> AiMood {
	let mut mood = AiMood {
		mood: "Unknown".into(),
		sentiment: "Unknown".into(),
		intensity: 5,
		summary: reply.trim().to_string(),
	};
	for line in reply.lines() {
		let Some((key, value)) = line.split_once(':') else {
			continue;
		};
		let key = key.trim_matches(|c: char| c == '*' || c == '-' || c.is_whitespace()).to_lowercase();
		let value = value.trim_matches(|c: char| c == '*' || c.is_whitespace()).to_string();
		match key.as_str() {
			"mood" => mood.mood = value,
			"sentiment" => mood.sentiment = value,
			"intensity" =>
				if let Some(n) = NUMBER.find(&value).and_then(|m| m.as_str().parse::<u8>().ok()) {
					mood.intensity = n.clamp(1, 10);
				},
			"summary" => mood.summary = value,
			_ => {}
		}
	}
	mood
}

pub async fn analyze_mood_ai<M: MoodModel>(model: &M, transcript: &str) -> Result<AiMood> {
	log!("Asking the LLM for a mood reading...");
	let reply = model.read_mood(mood_prompt(truncate_chars(transcript, MOOD_CONTEXT_CHARS))).await?;
	Ok(parse_ai_mood(&reply))
}

#[derive(Clone, Debug)]
pub struct VideoAnalysis {
	pub transcript: Transcript,
	pub sentiment: SentimentReport,
	pub ai: Option<AiMood>,
}

/// Transcript, polarity score and, when `model` is given, the LLM reading.
///
/// A failed LLM reading is reported and left out; it does not fail the analysis.
pub async fn analyze_video<T: TranscriptSource, P: PolarityScorer, M: MoodModel>(source: &T, scorer: &P, model: Option<&M>, address: &str) -> Result<VideoAnalysis> {
	let transcript = fetch_transcript(source, address).await?;
	let chars = transcript.text.chars().count();
	if chars < MIN_TRANSCRIPT_CHARS {
		return Err(QuizError::TranscriptInsufficient { chars }.into());
	}

	let sentiment = score_sentiment(scorer, &transcript.text);
	tracing::info!(polarity = sentiment.polarity, mood = %sentiment.mood, "transcript scored");

	let ai = match model {
		Some(model) => match analyze_mood_ai(model, &transcript.text).await {
			Ok(mood) => Some(mood),
			Err(e) => {
				elog!("AI mood analysis failed: {e}");
				None
			}
		},
		None => None,
	};
	Ok(VideoAnalysis { transcript, sentiment, ai })
}

impl fmt::Display for VideoAnalysis {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = &self.sentiment;
		writeln!(f, "Mood: {}", s.mood)?;
		writeln!(f, "Sentiment: {}", s.mood.sentiment())?;
		writeln!(f, "Positivity: {:.1}%", s.positivity_percent)?;
		writeln!(f, "Subjectivity: {:.2}", s.subjectivity)?;
		if let Some(ai) = &self.ai {
			writeln!(f, "\nAI reading:")?;
			writeln!(f, "  Mood: {}", ai.mood)?;
			writeln!(f, "  Sentiment: {}", ai.sentiment)?;
			writeln!(f, "  Intensity: {}/10", ai.intensity)?;
			writeln!(f, "  Summary: {}", ai.summary)?;
		}

		let text = &self.transcript.text;
		let chars = text.chars().count();
		let source = match &self.transcript.origin {
			TranscriptOrigin::Captions { language, automatic: false } => format!("{language} captions"),
			TranscriptOrigin::Captions { language, automatic: true } => format!("{language} automatic captions"),
			TranscriptOrigin::Description => "title and description".to_string(),
		};
		writeln!(f, "\nTranscript ({chars} characters, from {source}):")?;
		writeln!(f, "{}", truncate_chars(text, 4000))?;
		if chars > 4000 {
			writeln!(f, "... ({} more characters)", chars - 4000)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::{cell::RefCell, collections::HashMap};

	use color_eyre::eyre::bail;

	use super::*;

	#[derive(Default)]
	struct FakeSource {
		info: VideoInfo,
		files: HashMap<String, String>,
		fetched: RefCell<Vec<String>>,
	}

	impl FakeSource {
		fn track(mut self, automatic: bool, language: &str, url: &str, body: &str) -> Self {
			let map = if automatic { &mut self.info.automatic_captions } else { &mut self.info.subtitles };
			map.get_or_insert_with(BTreeMap::new).entry(language.to_string()).or_default().push(CaptionTrack {
				url: Some(url.to_string()),
				ext: Some("vtt".into()),
			});
			self.files.insert(url.to_string(), body.to_string());
			self
		}
	}

	impl TranscriptSource for FakeSource {
		async fn video_info(&self, _address: &str) -> Result<VideoInfo> {
			Ok(self.info.clone())
		}

		async fn fetch_track(&self, url: &str) -> Result<String> {
			self.fetched.borrow_mut().push(url.to_string());
			match self.files.get(url) {
				Some(body) => Ok(body.clone()),
				None => bail!("404 for {url}"),
			}
		}
	}

	/// Replies with a fixed text and remembers the prompt
	struct CannedModel {
		reply: Option<&'static str>,
		prompts: RefCell<Vec<String>>,
	}

	impl MoodModel for CannedModel {
		async fn read_mood(&self, prompt: String) -> Result<String> {
			self.prompts.borrow_mut().push(prompt);
			match self.reply {
				Some(reply) => Ok(reply.to_string()),
				None => bail!("rate limited"),
			}
		}
	}

	fn vtt(lines: &[&str]) -> String {
		let mut out = "WEBVTT\nKind: captions\nLanguage: tr\n\n".to_string();
		for (i, line) in lines.iter().enumerate() {
			out.push_str(&format!("{}\n00:00:0{}.000 --> 00:00:0{}.000\n{}\n\n", i + 1, i, i + 1, line));
		}
		out
	}

	const LONG_TR: &str = "Bugün sizlerle çok güzel bir konuyu konuşacağız, hepinize hoş geldiniz diyorum.";

	#[test]
	fn languages_are_tried_in_a_fixed_order() {
		let source = FakeSource::default()
			.track(false, "de", "u1", "")
			.track(false, "tr", "u2", "")
			.track(true, "fr", "u3", "")
			.track(true, "en", "u4", "")
			.track(true, "ar", "u5", "");
		assert_eq!(language_order(&source.info), vec!["tr", "en", "ar", "de", "fr"]);
		assert!(language_order(&VideoInfo::default()).is_empty());
	}

	#[tokio::test]
	async fn turkish_automatic_beats_english_manual() {
		let source = FakeSource::default().track(false, "en", "en-manual", &vtt(&["An English transcript long enough to be used here."])).track(
			true,
			"tr",
			"tr-auto",
			&vtt(&[LONG_TR]),
		);

		let transcript = fetch_transcript(&source, "https://youtu.be/x").await.unwrap();

		assert_eq!(transcript.text, LONG_TR);
		assert_eq!(transcript.origin, TranscriptOrigin::Captions {
			language: "tr".into(),
			automatic: true
		});
		assert_eq!(source.fetched.borrow().as_slice(), &["tr-auto".to_string()]);
	}

	#[tokio::test]
	async fn manual_is_tried_first_and_short_tracks_fall_through() {
		let source = FakeSource::default()
			.track(false, "tr", "tr-manual", &vtt(&["Kısa altyazı metni burada"]))
			.track(true, "tr", "tr-auto", &vtt(&[LONG_TR]));

		let transcript = fetch_transcript(&source, "https://youtu.be/x").await.unwrap();

		assert_eq!(source.fetched.borrow().as_slice(), &["tr-manual".to_string(), "tr-auto".to_string()]);
		assert_eq!(transcript.origin, TranscriptOrigin::Captions {
			language: "tr".into(),
			automatic: true
		});
	}

	#[test]
	fn json3_captions_are_flattened() {
		let raw = r#"{"wireMagic":"pb3","events":[{"tStartMs":0},{"segs":[{"utf8":">> Merhaba"},{"utf8":" arkadaşlar"}]},{"segs":[{"utf8":"\n"}]},{"segs":[{"utf8":"bugün kitap okuyoruz"}]}]}"#;
		assert_eq!(caption_text(raw).unwrap(), "Merhaba arkadaşlar bugün kitap okuyoruz");
	}

	#[test]
	fn vtt_cues_are_cleaned() {
		let raw = vtt(&["<c>Merhaba</c> <00:00:01.500><c>arkadaşlar</c>", "Merhaba arkadaşlar", "bugün kitap okuyoruz"]);
		assert_eq!(caption_text(&raw).unwrap(), "Merhaba arkadaşlar bugün kitap okuyoruz");
		assert_eq!(caption_text("WEBVTT\n\n1\n00:00:00.000 --> 00:00:01.000\nkısa\n"), None);
	}

	#[tokio::test]
	async fn description_is_used_without_captions() {
		let source = FakeSource {
			info: VideoInfo {
				title: Some("Kitap okumanın faydaları".into()),
				description: Some(
					"https://example.com/kanal\n#kitap #okuma\nBu videoda kitap okumanın zihne faydalarını anlatıyorum.\nİletişim: yazar@example.com adresine yazın lütfen\nkısa\nDaha fazlası için www.example.com sitesine bakabilirsiniz"
						.into(),
				),
				..VideoInfo::default()
			},
			..FakeSource::default()
		};

		let transcript = fetch_transcript(&source, "https://youtu.be/x").await.unwrap();

		assert_eq!(transcript.origin, TranscriptOrigin::Description);
		assert!(transcript.text.starts_with("Kitap okumanın faydaları\n\nBu videoda kitap okumanın"));
		assert!(!transcript.text.contains('@'));
		assert!(!transcript.text.contains("http"));
		assert!(!transcript.text.contains("www."));
		assert!(!transcript.text.contains("#kitap"));
	}

	#[tokio::test]
	async fn thin_video_is_insufficient() {
		let source = FakeSource {
			info: VideoInfo {
				title: Some("Vlog".into()),
				..VideoInfo::default()
			},
			..FakeSource::default()
		};

		let err = analyze_video::<_, _, CannedModel>(&source, &Lexicon::default(), None, "https://youtu.be/x").await.unwrap_err();

		assert!(matches!(err.downcast_ref::<QuizError>(), Some(QuizError::TranscriptInsufficient { chars: 4 })));
	}

	#[test]
	fn polarity_bands() {
		assert_eq!(Mood::from_polarity(0.31), Mood::Happy);
		assert_eq!(Mood::from_polarity(0.3), Mood::Good);
		assert_eq!(Mood::from_polarity(0.1), Mood::Neutral);
		assert_eq!(Mood::from_polarity(0.0), Mood::Neutral);
		assert_eq!(Mood::from_polarity(-0.1), Mood::Sad);
		assert_eq!(Mood::from_polarity(-0.3), Mood::VerySad);
	}

	#[test]
	fn positivity_is_a_percentage() {
		struct Fixed(f64);
		impl PolarityScorer for Fixed {
			fn score(&self, _text: &str) -> Polarity {
				Polarity {
					polarity: self.0,
					subjectivity: 0.5,
				}
			}
		}
		assert_eq!(score_sentiment(&Fixed(-1.0), "").positivity_percent, 0.0);
		assert_eq!(score_sentiment(&Fixed(1.0), "").positivity_percent, 100.0);
		assert_eq!(score_sentiment(&Fixed(0.25), "").positivity_percent, 62.5);
	}

	#[test]
	fn lexicon_reads_turkish_inflections_and_negation() {
		let lexicon = Lexicon::default();
		assert_eq!(score_sentiment(&lexicon, "Bugün çok mutluyum, harika bir gün!").mood, Mood::Happy);
		assert_eq!(score_sentiment(&lexicon, "Çok üzgünüm ve kızgınım").mood, Mood::VerySad);
		assert_eq!(score_sentiment(&lexicon, "Bu film iyi değil").mood, Mood::Sad);
		assert_eq!(lexicon.score("Masa ve sandalye"), Polarity::default());
	}

	#[test]
	fn ai_reply_is_parsed_leniently() {
		let mood = parse_ai_mood("**Mood:** Hopeful\nSentiment: positive\nIntensity: 8/10\nSummary: The speaker is upbeat.");
		assert_eq!(mood, AiMood {
			mood: "Hopeful".into(),
			sentiment: "positive".into(),
			intensity: 8,
			summary: "The speaker is upbeat.".into(),
		});

		let fallback = parse_ai_mood("I cannot tell.");
		assert_eq!(fallback.mood, "Unknown");
		assert_eq!(fallback.intensity, 5);
		assert_eq!(fallback.summary, "I cannot tell.");
	}

	#[tokio::test]
	async fn ai_reading_sees_a_bounded_excerpt() {
		let long = format!("{LONG_TR} {}", "ş".repeat(5000));
		let source = FakeSource::default().track(false, "tr", "tr", &vtt(&[&long]));
		let model = CannedModel {
			reply: Some("Mood: calm\nSentiment: neutral\nIntensity: 3\nSummary: calm talk"),
			prompts: RefCell::new(Vec::new()),
		};

		let analysis = analyze_video(&source, &Lexicon::default(), Some(&model), "https://youtu.be/x").await.unwrap();

		assert_eq!(analysis.ai.unwrap().intensity, 3);
		let prompt = &model.prompts.borrow()[0];
		assert!(prompt.contains(LONG_TR));
		assert!(prompt.chars().filter(|&c| c == 'ş').count() < MOOD_CONTEXT_CHARS);
	}

	#[tokio::test]
	async fn failed_ai_reading_keeps_the_score() {
		let source = FakeSource::default().track(false, "tr", "tr", &vtt(&[LONG_TR]));
		let model = CannedModel {
			reply: None,
			prompts: RefCell::new(Vec::new()),
		};

		let analysis = analyze_video(&source, &Lexicon::default(), Some(&model), "https://youtu.be/x").await.unwrap();

		assert!(analysis.ai.is_none());
		assert_eq!(analysis.sentiment.mood, Mood::Happy);
		assert!(analysis.to_string().contains("from tr captions"));
	}

	#[test]
	fn metadata_failures_name_the_reason() {
		let reason = |stderr: &str| match access_problem(stderr) {
			QuizError::VideoUnavailable(reason) => reason,
			other => panic!("unexpected {other:?}"),
		};
		assert_eq!(reason("ERROR: [youtube] abc: Private video. Sign in if you've been granted access"), "the video is private");
		assert_eq!(reason("ERROR: [youtube] abc: Video unavailable"), "the video is unavailable or was removed");
		assert_eq!(reason("ERROR: Sign in to confirm your age"), "the video is age-restricted or needs sign-in");
		assert!(is_video_address("https://www.YouTube.com/watch?v=abc"));
		assert!(!is_video_address("https://vimeo.com/1"));
	}
}
