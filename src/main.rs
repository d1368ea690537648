use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use voxdeck::catalog::Catalog;
use voxdeck::config::{Config, DEFAULT_CONFIG_PATH};
use voxdeck::detect::LanguageDetector;
use voxdeck::executor::ConsoleExecutor;
use voxdeck::language::Language;
use voxdeck::logger::DecisionLogger;
use voxdeck::matcher::CommandMatcher;
use voxdeck::session::{DispatchEvent, Session};
use voxdeck::speech::LineSource;

#[derive(Parser)]
#[command(name = "voxdeck", version, about = "Voice command dispatch for presentations")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Dispatch transcripts read from stdin, one per line (default)
    Run,
    /// Match a single transcript and print the result
    Match {
        text: String,
        /// Language code; detected when omitted
        #[arg(long)]
        language: Option<String>,
    },
    /// Detect the language of each transcript
    Detect {
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Print decision log statistics as JSON
    Stats,
    /// Export high-confidence decisions as a training set
    Export {
        /// Minimum confidence; defaults to training.export_threshold
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long, default_value = "training_export.json")]
        output: PathBuf,
    },
}

const EVENT_POLL: Duration = Duration::from_millis(100);

#[hotpath::main]
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config),
        Command::Match { text, language } => match_once(&config, &text, language.as_deref()),
        Command::Detect { texts } => detect(&config, &texts),
        Command::Stats => stats(&config),
        Command::Export { threshold, output } => {
            export(&config, threshold.unwrap_or(config.training.export_threshold), &output)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn run(config: Config) -> Result<()> {
    let confidence = config.speech.confidence;
    let (event_tx, event_rx) = flume::unbounded::<DispatchEvent>();
    let mut session = Session::new(config)
        .context("Failed to start session")?
        .with_events(event_tx);

    let handle = session.handle();
    ctrlc::set_handler(move || handle.cancel()).context("Failed to install Ctrl+C handler")?;

    thread::Builder::new()
        .name("event-printer".into())
        .spawn(move || print_events(event_rx))
        .context("Failed to spawn event printer")?;

    eprintln!("Listening for commands on stdin. Ctrl+C to stop.\n");
    let mut executor = ConsoleExecutor::stdout();
    let report = session.run(LineSource::stdin(confidence), &mut executor)?;

    // Let the printer drain before the summary
    thread::sleep(EVENT_POLL);
    println!("{}", report.summary());
    Ok(())
}

fn print_events(event_rx: flume::Receiver<DispatchEvent>) {
    loop {
        match event_rx.recv_timeout(EVENT_POLL) {
            Ok(DispatchEvent::Matched { text, language, result }) => {
                let command = result.command.map(|c| c.to_string()).unwrap_or_default();
                println!(
                    "[{}] {} -> {} ({}, {})",
                    language, text, command, result.method, result.score
                );
            }
            Ok(DispatchEvent::Unrecognized { text, language }) => {
                println!("[{}] {} -> not recognized", language, text);
            }
            Ok(DispatchEvent::Unintelligible) => println!("(unintelligible)"),
            Ok(DispatchEvent::LogFailed(e)) => eprintln!("Decision log failed: {}", e),
            Ok(_) => {}
            Err(flume::RecvTimeoutError::Timeout) => {}
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn match_once(config: &Config, text: &str, language: Option<&str>) -> Result<()> {
    let language = match language {
        Some(code) => code.parse::<Language>()?,
        None => {
            let detector =
                LanguageDetector::new(config.language.supported.clone(), config.language.primary);
            let (lang, confidence) = detector.detect(text);
            eprintln!("Detected {} ({:.2})", lang.name(), confidence);
            lang
        }
    };

    let catalog = Catalog::builtin().with_extra_triggers(&config.matching.extra_triggers);
    let matcher = CommandMatcher::new(
        catalog,
        &config.language.supported,
        config.matching.fuzzy_threshold,
    )
    .context("Failed to compile command patterns")?;
    let result = matcher.match_text(&text.to_lowercase(), language);
    if !result.is_match() {
        eprintln!("No command matched for {}", language.name());
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn detect(config: &Config, texts: &[String]) -> Result<()> {
    let mut detector =
        LanguageDetector::new(config.language.supported.clone(), config.language.primary);
    if config.language.parallel {
        detector = detector.with_workers(config.language.workers)?;
    }
    for (text, (lang, confidence)) in texts.iter().zip(detector.detect_batch(texts)) {
        println!("{:<6} {:.2}  {}", lang.speech_tag(), confidence, text);
    }
    Ok(())
}

fn stats(config: &Config) -> Result<()> {
    let logger = DecisionLogger::open(&config.training.data_dir).with_context(|| {
        format!("Failed to open decision log in {}", config.training.data_dir.display())
    })?;
    println!("{}", serde_json::to_string_pretty(&logger.statistics())?);
    Ok(())
}

fn export(config: &Config, threshold: f32, output: &Path) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        bail!("Threshold must be between 0 and 1, got {}", threshold);
    }
    let logger = DecisionLogger::open(&config.training.data_dir).with_context(|| {
        format!("Failed to open decision log in {}", config.training.data_dir.display())
    })?;
    let document = logger
        .export_to(output, threshold)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Exported {} examples (confidence >= {:.2}) to {}",
        document.metadata.total_examples,
        threshold,
        output.display()
    );
    Ok(())
}
