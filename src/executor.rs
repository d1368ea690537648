//! Executor - turns a resolved command into presentation key strokes
//!
//! The command set is closed, so the key plan is a single exhaustive match.
//! Executors never fail loudly: a bad argument or a failed key stroke is
//! reported as `success = false`.

use crate::catalog::CommandId;
use std::fmt;
use std::io::Write;
use std::time::Instant;

/// A single key stroke or typed character run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Press(&'static str),
    Type(String),
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Press(key) => write!(f, "[{}]", key),
            KeyAction::Type(text) => write!(f, "\"{}\"", text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub elapsed_ms: f64,
}

/// Performs a resolved command against the presentation
pub trait Executor {
    fn execute(&mut self, command: CommandId, parameter: Option<&str>) -> ExecutionOutcome;
}

/// Key plan for a command, `None` when the argument is unusable
pub fn plan(command: CommandId, parameter: Option<&str>) -> Option<Vec<KeyAction>> {
    let keys = match command {
        CommandId::NextSlide => vec![KeyAction::Press("right")],
        CommandId::PrevSlide => vec![KeyAction::Press("left")],
        CommandId::JumpSlide => {
            let slide: u32 = parameter?.trim().parse().ok()?;
            if slide == 0 {
                return None;
            }
            vec![KeyAction::Type(slide.to_string()), KeyAction::Press("enter")]
        }
        CommandId::StartShow => vec![KeyAction::Press("f5")],
        CommandId::EndShow => vec![KeyAction::Press("esc")],
        CommandId::Blackout => vec![KeyAction::Press("b")],
        CommandId::ZoomIn => vec![KeyAction::Press("ctrl+plus")],
        CommandId::PenTool => vec![KeyAction::Press("ctrl+p")],
        // Handled by the dispatch loop, nothing to send
        CommandId::ExitProgram => Vec::new(),
    };
    Some(keys)
}

/// Writes the planned key strokes to a sink instead of a real keyboard
pub struct ConsoleExecutor<W: Write> {
    out: W,
}

impl ConsoleExecutor<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleExecutor<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Executor for ConsoleExecutor<W> {
    fn execute(&mut self, command: CommandId, parameter: Option<&str>) -> ExecutionOutcome {
        let start = Instant::now();

        let success = match plan(command, parameter) {
            Some(keys) => {
                let strokes: Vec<String> = keys.iter().map(ToString::to_string).collect();
                match writeln!(self.out, "keys {:<12} {}", command, strokes.join(" ")) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!("Failed to send keys for {}: {}", command, e);
                        false
                    }
                }
            }
            None => {
                tracing::warn!("Invalid argument for {}: {:?}", command, parameter);
                false
            }
        };

        ExecutionOutcome {
            success,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }
}
