use book_quiz::{
	browser::ChromeSession,
	config::{AppConfig, SettingsFlags},
	error::QuizError,
	input::{InputProvider, Interactive, Scripted},
	oracle::LlmOracle,
	runner,
	video::{Lexicon, YtDlp},
};
use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::eyre};
use tracing_subscriber::EnvFilter;
use v_utils::{elog, log};

#[derive(Debug, Parser)]
#[command(name = "book_quiz")]
#[command(about = "Reads a book and fills a web quiz with answers grounded on it", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Command>,

	/// Book to read: a .pdf or .txt path, or a web reader address. Asked for when omitted.
	#[arg(short, long)]
	book: Option<String>,

	/// Quiz page address. Asked for when omitted.
	#[arg(short, long)]
	quiz: Option<String>,

	#[command(flatten)]
	settings: SettingsFlags,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Judge the mood of a YouTube video from its captions
	Video {
		/// Video address. Asked for when omitted.
		url: Option<String>,
		/// Also ask the LLM for a mood reading, without asking first
		#[arg(long)]
		ai: bool,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	init_tracing();

	let cli = Cli::parse();

	if let Some(Command::Video { url, ai }) = cli.command {
		log!("Video mood analysis");
		let source = YtDlp::new()?;
		let analysis = exit_on_fatal(runner::run_video(&mut Interactive, &source, &Lexicon::default(), &LlmOracle, url, ai).await)?;
		println!("{analysis}");
		return Ok(());
	}

	let config = AppConfig::try_build(cli.settings).map_err(|e| eyre!("Failed to load config: {e}"))?;

	log!("Book quiz assistant");
	log!("Visible mode: {}", config.visible);

	// Flags answer the prompts they cover, in prompt order; the rest go to the terminal
	let mut inputs = match (cli.book, cli.quiz) {
		(Some(book), Some(quiz)) => Scripted::with_fallback(vec![book, quiz], Interactive),
		(Some(book), None) => Scripted::with_fallback(vec![book], Interactive),
		(None, Some(quiz)) => {
			let book = Interactive.line(runner::BOOK_PROMPT).await?;
			Scripted::with_fallback(vec![book, quiz], Interactive)
		}
		(None, None) => Scripted::with_fallback(Vec::<String>::new(), Interactive),
	};

	let targets = exit_on_fatal(runner::ask_targets(&mut inputs).await)?;

	let mut session = ChromeSession::launch(config.visible).await?;
	let report = runner::with_session(&mut session, async |session: &mut ChromeSession| runner::run(session, &mut inputs, &LlmOracle, &targets, &config).await).await;
	let report = exit_on_fatal(report)?;

	log!("Done: {}", report);
	Ok(())
}

/// Ends the process on errors that need no backtrace: an interrupt (after teardown, a terminal
/// read may still be blocking a worker thread) or a fatal [`QuizError`]. Anything else is returned.
fn exit_on_fatal<T>(result: Result<T>) -> Result<T> {
	if let Err(e) = &result {
		if let Some(code) = exit_code(e) {
			elog!("{e}");
			std::process::exit(code);
		}
	}
	result
}

fn exit_code(e: &color_eyre::Report) -> Option<i32> {
	match e.downcast_ref::<QuizError>() {
		Some(QuizError::Interrupted) => Some(130),
		Some(fatal) if fatal.is_fatal() => Some(1),
		_ => None,
	}
}

fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}
