//! Command matcher - regex stage first, fuzzy fallback second
//!
//! Patterns are compiled once for the supported languages and then only read,
//! so a `CommandMatcher` can be shared between threads without locking.

use crate::catalog::{Catalog, CommandId};
use crate::error::CatalogError;
use crate::fuzzy::partial_ratio;
use crate::language::Language;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// How a command was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchMethod {
    Regex,
    Fuzzy,
    None,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMethod::Regex => write!(f, "Regex"),
            MatchMethod::Fuzzy => write!(f, "Fuzzy"),
            MatchMethod::None => write!(f, "None"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub command: Option<CommandId>,
    pub parameter: Option<String>,
    pub score: u8,
    pub method: MatchMethod,
}

impl MatchResult {
    pub fn rejected() -> Self {
        Self {
            command: None,
            parameter: None,
            score: 0,
            method: MatchMethod::None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.command.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub regex: Regex,
    pub command: CommandId,
    pub language: Language,
    /// Pattern captures a trailing integer argument
    pub is_parametric: bool,
}

pub struct CommandMatcher {
    catalog: Catalog,
    patterns: Vec<CompiledPattern>,
    parametric: HashSet<CommandId>,
    fuzzy_threshold: u8,
}

impl CommandMatcher {
    /// Compile every trigger of `catalog` for the given languages
    pub fn new(
        catalog: Catalog,
        languages: &[Language],
        fuzzy_threshold: u8,
    ) -> Result<Self, CatalogError> {
        let mut patterns = Vec::new();
        let mut parametric = HashSet::new();

        for spec in catalog.commands() {
            for &language in languages {
                for pattern in catalog.patterns(spec.id, language) {
                    let compiled = compile(spec.id, language, pattern)?;
                    if compiled.is_parametric {
                        parametric.insert(spec.id);
                    }
                    patterns.push(compiled);
                }
            }
        }

        tracing::debug!(
            "Compiled {} patterns for {} languages",
            patterns.len(),
            languages.len()
        );

        Ok(Self {
            catalog,
            patterns,
            parametric,
            fuzzy_threshold: fuzzy_threshold.min(100),
        })
    }

    pub fn fuzzy_threshold(&self) -> u8 {
        self.fuzzy_threshold
    }

    pub fn set_fuzzy_threshold(&mut self, threshold: u8) {
        self.fuzzy_threshold = threshold.min(100);
    }

    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    /// Commands that take an integer argument and are never fuzzy-matched
    pub fn is_parametric(&self, command: CommandId) -> bool {
        self.parametric.contains(&command)
    }

    #[hotpath::measure]
    pub fn match_text(&self, text: &str, language: Language) -> MatchResult {
        if let Some(result) = self.match_regex(text, language) {
            return result;
        }
        self.match_fuzzy(text, language)
    }

    fn match_regex(&self, text: &str, language: Language) -> Option<MatchResult> {
        self.patterns
            .iter()
            .filter(|p| p.language == language)
            .find_map(|p| {
                let captures = p.regex.captures(text)?;
                let parameter = if p.is_parametric {
                    captures.get(1).map(|m| m.as_str().to_string())
                } else {
                    None
                };
                Some(MatchResult {
                    command: Some(p.command),
                    parameter,
                    score: 100,
                    method: MatchMethod::Regex,
                })
            })
    }

    fn match_fuzzy(&self, text: &str, language: Language) -> MatchResult {
        let text = text.to_lowercase();
        let mut best: Option<(CommandId, u8)> = None;

        for spec in self.catalog.commands() {
            if self.is_parametric(spec.id) || !spec.triggers.contains_key(&language) {
                continue;
            }
            let Some(anchor) = spec.anchor.as_deref() else {
                continue;
            };
            let score = partial_ratio(&anchor.to_lowercase(), &text);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((spec.id, score));
            }
        }

        match best {
            Some((command, score)) if score > 0 && score >= self.fuzzy_threshold => MatchResult {
                command: Some(command),
                parameter: None,
                score,
                method: MatchMethod::Fuzzy,
            },
            _ => MatchResult::rejected(),
        }
    }
}

fn compile(command: CommandId, language: Language, pattern: &str) -> Result<CompiledPattern, CatalogError> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| CatalogError::InvalidPattern {
            command: command.to_string(),
            pattern: pattern.to_string(),
            source,
        })?;

    // captures_len counts the implicit whole-match group
    let groups = regex.captures_len() - 1;
    if groups > 1 {
        return Err(CatalogError::TooManyGroups {
            command: command.to_string(),
            pattern: pattern.to_string(),
            groups,
        });
    }

    Ok(CompiledPattern {
        regex,
        command,
        language,
        is_parametric: groups == 1,
    })
}
