//! Dispatch session - buffer, detector, matcher, logger and executor wired together
//!
//! A speech producer thread feeds the input buffer; the calling thread drains
//! it and acts on every resolved command. All counters live on the session
//! and are only touched by the consumer, so the final report covers every
//! item handled before a shutdown.

use crate::buffer::InputBuffer;
use crate::catalog::{Catalog, CommandId};
use crate::config::Config;
use crate::detect::LanguageDetector;
use crate::error::{DispatchError, Result};
use crate::executor::{ExecutionOutcome, Executor};
use crate::language::Language;
use crate::logger::{DecisionLogger, Statistics, TrainingRecord};
use crate::matcher::{CommandMatcher, MatchMethod, MatchResult};
use crate::speech::{Recognition, SpeechSource};
use crate::state::{DispatchHandle, DispatchState};
use crate::stats::{self, PerfSummary, Sample, SharedStats};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Progress notifications for a front end
#[derive(Clone, Debug)]
pub enum DispatchEvent {
    State(DispatchState),
    Unintelligible,
    Unrecognized {
        text: String,
        language: Language,
    },
    Matched {
        text: String,
        language: Language,
        result: MatchResult,
    },
    Executed {
        command: CommandId,
        parameter: Option<String>,
        outcome: ExecutionOutcome,
    },
    LogFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    ExitCommand,
    Cancelled,
    SourceExhausted,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub exit_reason: ExitReason,
    pub total: u64,
    pub recognized: u64,
    pub unrecognized: u64,
    pub unintelligible: u64,
    pub fuzzy_rescues: u64,
    pub executed_ok: u64,
    pub executed_failed: u64,
    pub logged: u64,
    pub log_failures: u64,
    pub evictions: u64,
    pub discarded: usize,
    pub by_language: BTreeMap<Language, u64>,
    pub execution: PerfSummary,
    pub logger: Option<Statistics>,
}

impl SessionReport {
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Session ended ({:?}): {} processed, {} recognized, {} unrecognized, {} unintelligible\n",
            self.exit_reason, self.total, self.recognized, self.unrecognized, self.unintelligible
        );
        out.push_str(&format!(
            "  executed ok={} failed={} fuzzy rescues={}\n",
            self.executed_ok, self.executed_failed, self.fuzzy_rescues
        ));
        out.push_str(&format!(
            "  logged={} log failures={} evicted={} discarded={}\n",
            self.logged, self.log_failures, self.evictions, self.discarded
        ));
        for (lang, count) in &self.by_language {
            out.push_str(&format!("  {}: {}\n", lang.name(), count));
        }
        out.push_str(&self.execution.summary());
        if let Some(stats) = &self.logger {
            out.push_str(&stats.summary());
        }
        out
    }
}

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    recognized: u64,
    unrecognized: u64,
    fuzzy_rescues: u64,
    executed_ok: u64,
    executed_failed: u64,
    logged: u64,
    log_failures: u64,
    by_language: BTreeMap<Language, u64>,
}

enum Flow {
    Continue,
    Exit,
}

pub struct Session {
    config: Config,
    matcher: CommandMatcher,
    detector: LanguageDetector,
    buffer: Arc<InputBuffer<Recognition>>,
    logger: Option<DecisionLogger>,
    exec_stats: SharedStats,
    handle: DispatchHandle,
    event_tx: Option<flume::Sender<DispatchEvent>>,
    counters: Counters,
}

impl Session {
    /// Build every component from a validated config
    pub fn new(config: Config) -> Result<Self> {
        let catalog = Catalog::builtin().with_extra_triggers(&config.matching.extra_triggers);
        let matcher = CommandMatcher::new(
            catalog,
            &config.language.supported,
            config.matching.fuzzy_threshold,
        )?;

        let mut detector =
            LanguageDetector::new(config.language.supported.clone(), config.language.primary);
        if config.language.parallel {
            detector = detector.with_workers(config.language.workers)?;
        }

        let logger = if config.training.enabled {
            Some(DecisionLogger::open(&config.training.data_dir)?)
        } else {
            None
        };

        let buffer = Arc::new(InputBuffer::new(
            config.buffer.capacity,
            Duration::from_millis(config.buffer.debounce_ms),
        ));

        tracing::info!(
            "Session ready: {} languages, primary {}, fuzzy threshold {}, buffer {} (debounce {:?}), training {}",
            detector.supported().len(),
            detector.primary().name(),
            matcher.fuzzy_threshold(),
            buffer.capacity(),
            buffer.debounce(),
            if logger.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            config,
            matcher,
            detector,
            buffer,
            logger,
            exec_stats: stats::new_shared(),
            handle: DispatchHandle::new(),
            event_tx: None,
            counters: Counters::default(),
        })
    }

    /// Replace the language detector
    pub fn with_detector(mut self, detector: LanguageDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Replace the decision logger; `None` disables logging
    pub fn with_logger(mut self, logger: Option<DecisionLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_events(mut self, event_tx: flume::Sender<DispatchEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> DispatchState {
        self.handle.state()
    }

    pub fn matcher(&self) -> &CommandMatcher {
        &self.matcher
    }

    pub fn detector(&self) -> &LanguageDetector {
        &self.detector
    }

    pub fn logger(&self) -> Option<&DecisionLogger> {
        self.logger.as_ref()
    }

    pub fn buffer(&self) -> &Arc<InputBuffer<Recognition>> {
        &self.buffer
    }

    /// Run the dispatch loop until exit, cancellation or end of input
    pub fn run<S, E>(&mut self, source: S, executor: &mut E) -> std::result::Result<SessionReport, DispatchError>
    where
        S: SpeechSource + 'static,
        E: Executor + ?Sized,
    {
        if self.state() != DispatchState::Idle {
            return Err(DispatchError::AlreadyStarted);
        }
        if !source.is_available() {
            tracing::error!("Speech input is not available, not starting");
            self.set_state(DispatchState::Stopped);
            return Err(DispatchError::SpeechUnavailable);
        }

        let unintelligible = Arc::new(AtomicU64::new(0));
        let producer = spawn_producer(
            source,
            Arc::clone(&self.buffer),
            self.handle.clone(),
            Arc::clone(&unintelligible),
            self.event_tx.clone(),
        )?;
        self.set_state(DispatchState::Running);

        let poll = Duration::from_millis(self.config.buffer.poll_interval_ms);
        let exit_reason = loop {
            if self.handle.is_cancel_requested() {
                break ExitReason::Cancelled;
            }
            match self.buffer.wait_next(poll) {
                Some(recognition) => {
                    if let Flow::Exit = self.process(recognition, executor) {
                        break ExitReason::ExitCommand;
                    }
                }
                None => {
                    if producer.is_finished() && self.buffer.is_empty() {
                        break ExitReason::SourceExhausted;
                    }
                }
            }
        };

        self.set_state(DispatchState::ShuttingDown);
        // Stop the producer at its next utterance; it may be blocked on input
        self.handle.cancel();
        let discarded = self.buffer.flush();
        if producer.is_finished() {
            let _ = producer.join();
        }

        let report = SessionReport {
            exit_reason,
            total: self.counters.total,
            recognized: self.counters.recognized,
            unrecognized: self.counters.unrecognized,
            unintelligible: unintelligible.load(Ordering::SeqCst),
            fuzzy_rescues: self.counters.fuzzy_rescues,
            executed_ok: self.counters.executed_ok,
            executed_failed: self.counters.executed_failed,
            logged: self.counters.logged,
            log_failures: self.counters.log_failures,
            evictions: self.buffer.evictions(),
            discarded,
            by_language: self.counters.by_language.clone(),
            execution: self.exec_stats.lock().perf(),
            logger: self.logger.as_ref().map(DecisionLogger::statistics),
        };

        tracing::info!("{}", report.summary().trim_end());
        self.set_state(DispatchState::Stopped);
        Ok(report)
    }

    fn process<E: Executor + ?Sized>(&mut self, recognition: Recognition, executor: &mut E) -> Flow {
        let Some(text) = recognition.text else {
            return Flow::Continue;
        };
        let started = Instant::now();
        self.counters.total += 1;

        let language = if self.config.language.auto_detect {
            let (language, confidence) = self.detector.detect(&text);
            tracing::debug!("Detected {} ({:.2}) for {:?}", language.name(), confidence, text);
            language
        } else {
            self.config.language.primary
        };
        *self.counters.by_language.entry(language).or_insert(0) += 1;

        let result = self.matcher.match_text(&text, language);
        let Some(command) = result.command else {
            self.counters.unrecognized += 1;
            tracing::info!("Unrecognized [{}]: {}", language, text);
            self.emit(DispatchEvent::Unrecognized { text, language });
            return Flow::Continue;
        };

        self.counters.recognized += 1;
        if result.method == MatchMethod::Fuzzy {
            self.counters.fuzzy_rescues += 1;
        }
        tracing::info!(
            "Matched {} via {} (score {}) [{}]: {}",
            command,
            result.method,
            result.score,
            language,
            text
        );

        let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.log_decision(&text, command, language, &recognition.source, recognition.confidence, response_time_ms);

        let parameter = result.parameter.clone();
        self.emit(DispatchEvent::Matched {
            text,
            language,
            result,
        });

        if command == CommandId::ExitProgram {
            tracing::info!("Exit command received, shutting down");
            return Flow::Exit;
        }

        let outcome = executor.execute(command, parameter.as_deref());
        self.exec_stats.lock().record(Sample::from_outcome(command, &outcome));

        if outcome.success {
            self.counters.executed_ok += 1;
        } else {
            self.counters.executed_failed += 1;
            tracing::warn!("Execution of {} failed", command);
        }
        self.emit(DispatchEvent::Executed {
            command,
            parameter,
            outcome,
        });
        Flow::Continue
    }

    /// Best effort; a storage failure never stops the dispatch
    fn log_decision(
        &mut self,
        text: &str,
        command: CommandId,
        language: Language,
        source: &str,
        confidence: f32,
        response_time_ms: f64,
    ) {
        if confidence < self.config.training.log_confidence_threshold {
            return;
        }
        let Some(logger) = self.logger.as_mut() else {
            return;
        };

        let record = TrainingRecord::new(
            text,
            command,
            confidence,
            language,
            source,
            response_time_ms,
            &self.config.training.user_id,
        );
        match logger.log(&record) {
            Ok(()) => self.counters.logged += 1,
            Err(e) => {
                self.counters.log_failures += 1;
                tracing::warn!("Failed to log decision: {}", e);
                self.emit(DispatchEvent::LogFailed(e.to_string()));
            }
        }
    }

    fn set_state(&self, state: DispatchState) {
        tracing::debug!("Dispatch state -> {}", state);
        self.handle.set_state(state);
        self.emit(DispatchEvent::State(state));
    }

    fn emit(&self, event: DispatchEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

fn spawn_producer<S: SpeechSource + 'static>(
    mut source: S,
    buffer: Arc<InputBuffer<Recognition>>,
    handle: DispatchHandle,
    unintelligible: Arc<AtomicU64>,
    event_tx: Option<flume::Sender<DispatchEvent>>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("speech-producer".into())
        .spawn(move || {
            while !handle.is_cancel_requested() {
                let Some(recognition) = source.recognize() else {
                    tracing::debug!("Speech source exhausted");
                    break;
                };
                if recognition.text.is_none() {
                    unintelligible.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!("Unintelligible audio from {}", recognition.source);
                    if let Some(tx) = &event_tx {
                        let _ = tx.send(DispatchEvent::Unintelligible);
                    }
                    continue;
                }
                let priority = recognition.priority;
                buffer.add_input(recognition, priority);
            }
        })
}
