//! Speech sources - where transcripts come from
//!
//! The recognizer itself is out of process; a source only hands over what it
//! heard, one utterance at a time.

use std::collections::VecDeque;
use std::io::{self, BufRead};

/// One utterance from the recognizer
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    /// `None` when the audio was unintelligible
    pub text: Option<String>,
    pub confidence: f32,
    pub source: String,
    pub priority: i32,
}

impl Recognition {
    pub fn heard(text: impl Into<String>, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            confidence,
            source: source.into(),
            priority: 0,
        }
    }

    pub fn unintelligible(source: impl Into<String>) -> Self {
        Self {
            text: None,
            confidence: 0.0,
            source: source.into(),
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

pub trait SpeechSource: Send {
    /// Checked once before the dispatch loop starts
    fn is_available(&self) -> bool;

    /// Next utterance; `None` once the stream is exhausted
    fn recognize(&mut self) -> Option<Recognition>;
}

/// Typed transcripts, one per line; a blank line counts as unintelligible
pub struct LineSource<R: BufRead + Send> {
    reader: R,
    confidence: f32,
}

impl LineSource<io::BufReader<io::Stdin>> {
    pub fn stdin(confidence: f32) -> Self {
        Self::new(io::BufReader::new(io::stdin()), confidence)
    }
}

impl<R: BufRead + Send> LineSource<R> {
    pub fn new(reader: R, confidence: f32) -> Self {
        Self { reader, confidence }
    }
}

impl<R: BufRead + Send> SpeechSource for LineSource<R> {
    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&mut self) -> Option<Recognition> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                let text = line.trim().to_lowercase();
                if text.is_empty() {
                    Some(Recognition::unintelligible("typed"))
                } else {
                    Some(Recognition::heard(text, self.confidence, "typed"))
                }
            }
            Err(e) => {
                tracing::error!("Failed to read transcript: {}", e);
                None
            }
        }
    }
}

/// Fixed list of utterances, for tests and demos
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    script: VecDeque<Recognition>,
    available: bool,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Recognition>) -> Self {
        Self {
            script: script.into_iter().collect(),
            available: true,
        }
    }

    /// A source whose recognizer never came up
    pub fn unavailable() -> Self {
        Self {
            script: VecDeque::new(),
            available: false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl SpeechSource for ScriptedSource {
    fn is_available(&self) -> bool {
        self.available
    }

    fn recognize(&mut self) -> Option<Recognition> {
        self.script.pop_front()
    }
}
