//! End-to-end dispatch runs with scripted speech and a recording executor

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use voxdeck::catalog::CommandId;
use voxdeck::config::Config;
use voxdeck::error::{DispatchError, LoggerError};
use voxdeck::executor::{ExecutionOutcome, Executor};
use voxdeck::logger::{DecisionLogger, RecordStore, TrainingRecord};
use voxdeck::session::{DispatchEvent, ExitReason, Session};
use voxdeck::speech::{Recognition, ScriptedSource, SpeechSource};
use voxdeck::state::DispatchState;

#[derive(Default, Clone)]
struct RecordingExecutor {
    calls: Arc<Mutex<Vec<(CommandId, Option<String>)>>>,
    fail: Option<CommandId>,
}

impl Executor for RecordingExecutor {
    fn execute(&mut self, command: CommandId, parameter: Option<&str>) -> ExecutionOutcome {
        self.calls.lock().push((command, parameter.map(String::from)));
        ExecutionOutcome {
            success: self.fail != Some(command),
            elapsed_ms: 0.5,
        }
    }
}

/// Emits the same utterance forever, slowly
struct Chatter;

impl SpeechSource for Chatter {
    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&mut self) -> Option<Recognition> {
        thread::sleep(Duration::from_millis(10));
        Some(Recognition::heard("next", 0.9, "chatter"))
    }
}

/// Store whose disk is always full
struct FailingStore;

impl RecordStore for FailingStore {
    fn upsert(&mut self, _record: &TrainingRecord) -> Result<(), LoggerError> {
        Err(LoggerError::Io(std::io::Error::other("disk full")))
    }

    fn records(&self) -> Vec<&TrainingRecord> {
        Vec::new()
    }

    fn size_bytes(&self) -> u64 {
        0
    }
}

fn config(data_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.language.auto_detect = false;
    config.language.parallel = false;
    config.buffer.debounce_ms = 0;
    config.buffer.poll_interval_ms = 20;
    config.training.data_dir = data_dir.to_path_buf();
    config
}

fn heard(text: &str, confidence: f32) -> Recognition {
    Recognition::heard(text, confidence, "scripted")
}

#[test]
fn test_exit_command_stops_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(config(dir.path())).unwrap();
    let mut executor = RecordingExecutor::default();

    let report = session
        .run(
            ScriptedSource::new([
                heard("next", 0.9),
                Recognition::unintelligible("scripted"),
                heard("go to the previus one", 0.9),
                heard("terminate program", 0.9),
                heard("black screen", 0.9),
            ]),
            &mut executor,
        )
        .unwrap();

    assert_eq!(report.exit_reason, ExitReason::ExitCommand);
    assert_eq!(report.recognized, 3);
    assert_eq!(report.fuzzy_rescues, 1);
    assert_eq!(report.unintelligible, 1);
    assert_eq!(report.executed_ok, 2);
    assert_eq!(
        *executor.calls.lock(),
        vec![(CommandId::NextSlide, None), (CommandId::PrevSlide, None)]
    );
    assert_eq!(session.state(), DispatchState::Stopped);
}

#[test]
fn test_unavailable_speech_never_runs() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, rx) = flume::unbounded();
    let mut session = Session::new(config(dir.path())).unwrap().with_events(tx);
    let mut executor = RecordingExecutor::default();

    let result = session.run(ScriptedSource::unavailable(), &mut executor);
    assert!(matches!(result, Err(DispatchError::SpeechUnavailable)));
    assert_eq!(session.state(), DispatchState::Stopped);

    let states: Vec<DispatchState> = rx
        .try_iter()
        .filter_map(|e| match e {
            DispatchEvent::State(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![DispatchState::Stopped]);
}

#[test]
fn test_decisions_are_logged_above_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(config(dir.path())).unwrap();
    let mut executor = RecordingExecutor::default();

    let report = session
        .run(
            ScriptedSource::new([
                heard("next", 0.9),
                heard("go back", 0.5),
                heard("slide 3", 0.8),
                heard("what time is lunch", 0.99),
            ]),
            &mut executor,
        )
        .unwrap();

    assert_eq!(report.exit_reason, ExitReason::SourceExhausted);
    assert_eq!(report.recognized, 3);
    assert_eq!(report.unrecognized, 1);
    assert_eq!(report.logged, 2);
    assert_eq!(report.execution.total_executions, 3);
    drop(session);

    let logger = DecisionLogger::open(dir.path()).unwrap();
    let stats = logger.statistics();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.by_command.get("jump_slide"), Some(&1));

    let export = logger.export(0.85);
    assert_eq!(export.training_examples.len(), 1);
    assert_eq!(export.training_examples[0].label, "next_slide");
}

#[test]
fn test_failed_execution_is_counted() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(config(dir.path())).unwrap().with_logger(None);
    let mut executor = RecordingExecutor {
        fail: Some(CommandId::Blackout),
        ..Default::default()
    };

    let report = session
        .run(
            ScriptedSource::new([heard("black screen", 0.9), heard("next", 0.9)]),
            &mut executor,
        )
        .unwrap();

    assert_eq!(report.executed_failed, 1);
    assert_eq!(report.executed_ok, 1);
    assert_eq!(report.logged, 0);
    assert!(report.logger.is_none());
    assert!((report.execution.success_rate - 0.5).abs() < 1e-9);
    assert!((report.execution.avg_ms - 0.5).abs() < 1e-6);
}

#[test]
fn test_log_failure_does_not_stop_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, rx) = flume::unbounded();
    let mut session = Session::new(config(dir.path()))
        .unwrap()
        .with_logger(Some(DecisionLogger::new(Box::new(FailingStore))))
        .with_events(tx);
    let mut executor = RecordingExecutor::default();

    let report = session
        .run(ScriptedSource::new([heard("next", 0.9)]), &mut executor)
        .unwrap();

    assert_eq!(report.executed_ok, 1);
    assert_eq!(report.log_failures, 1);
    assert_eq!(report.logged, 0);
    assert_eq!(*executor.calls.lock(), vec![(CommandId::NextSlide, None)]);

    let failures: Vec<String> = rx
        .try_iter()
        .filter_map(|e| match e {
            DispatchEvent::LogFailed(msg) => Some(msg),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("disk full"));
}

#[test]
fn test_cancel_stops_within_poll_interval() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.buffer.debounce_ms = 30;
    let mut session = Session::new(cfg).unwrap().with_logger(None);
    let handle = session.handle();
    let mut executor = RecordingExecutor::default();

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        handle.cancel();
        Instant::now()
    });

    let report = session.run(Chatter, &mut executor).unwrap();
    let finished = Instant::now();
    let cancelled_at = canceller.join().unwrap();

    assert_eq!(report.exit_reason, ExitReason::Cancelled);
    assert!(finished.duration_since(cancelled_at) < Duration::from_millis(200));
    assert!(report.total >= 1);
    assert_eq!(report.total, executor.calls.lock().len() as u64);
    assert_eq!(report.executed_ok, report.total);
}
