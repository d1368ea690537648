//! Command catalog - per-language trigger patterns and fuzzy anchors
//!
//! Commands are listed in priority order. Within a command, triggers for a
//! language are tried in the order they are registered here, followed by any
//! extra triggers from the config file.

use crate::config::ExtraTrigger;
use crate::error::ConfigError;
use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Presentation actions the recognizer can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandId {
    NextSlide,
    PrevSlide,
    JumpSlide,
    StartShow,
    EndShow,
    Blackout,
    ZoomIn,
    PenTool,
    ExitProgram,
}

impl CommandId {
    pub const ALL: [CommandId; 9] = [
        CommandId::NextSlide,
        CommandId::PrevSlide,
        CommandId::JumpSlide,
        CommandId::StartShow,
        CommandId::EndShow,
        CommandId::Blackout,
        CommandId::ZoomIn,
        CommandId::PenTool,
        CommandId::ExitProgram,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandId::NextSlide => "next_slide",
            CommandId::PrevSlide => "prev_slide",
            CommandId::JumpSlide => "jump_slide",
            CommandId::StartShow => "start_show",
            CommandId::EndShow => "end_show",
            CommandId::Blackout => "blackout",
            CommandId::ZoomIn => "zoom_in",
            CommandId::PenTool => "pen_tool",
            CommandId::ExitProgram => "exit_program",
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CommandId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        CommandId::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or(ConfigError::UnknownCommand(s))
    }
}

/// Triggers and fuzzy anchor for a single command
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub id: CommandId,
    pub triggers: BTreeMap<Language, Vec<String>>,
    /// Canonical phrase for the fuzzy stage, `None` for exact-only commands
    pub anchor: Option<String>,
}

impl CommandSpec {
    fn new(id: CommandId, anchor: Option<&str>, triggers: &[(Language, &[&str])]) -> Self {
        Self {
            id,
            triggers: triggers
                .iter()
                .map(|(lang, patterns)| (*lang, patterns.iter().map(|p| p.to_string()).collect()))
                .collect(),
            anchor: anchor.map(String::from),
        }
    }
}

/// Immutable registry of command specs, in priority order
#[derive(Debug, Clone)]
pub struct Catalog {
    commands: Vec<CommandSpec>,
}

impl Catalog {
    pub fn new(commands: Vec<CommandSpec>) -> Self {
        Self { commands }
    }

    /// Ordered trigger patterns for a command in a language, empty if undefined
    pub fn patterns(&self, command: CommandId, language: Language) -> &[String] {
        self.spec(command)
            .and_then(|spec| spec.triggers.get(&language))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn anchor(&self, command: CommandId) -> Option<&str> {
        self.spec(command).and_then(|spec| spec.anchor.as_deref())
    }

    pub fn spec(&self, command: CommandId) -> Option<&CommandSpec> {
        self.commands.iter().find(|spec| spec.id == command)
    }

    pub fn commands(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.iter()
    }

    /// Append user triggers after the built-in ones
    pub fn with_extra_triggers(mut self, extra: &[ExtraTrigger]) -> Self {
        for trigger in extra {
            match self.commands.iter_mut().find(|spec| spec.id == trigger.command) {
                Some(spec) => spec
                    .triggers
                    .entry(trigger.language)
                    .or_default()
                    .push(trigger.pattern.clone()),
                None => self.commands.push(CommandSpec {
                    id: trigger.command,
                    triggers: BTreeMap::from([(trigger.language, vec![trigger.pattern.clone()])]),
                    anchor: None,
                }),
            }
        }
        self
    }

    /// Default presentation-control catalog
    pub fn builtin() -> Self {
        use Language::*;

        Self::new(vec![
            CommandSpec::new(
                CommandId::NextSlide,
                Some("next"),
                &[
                    (English, &["next", "forward", "advance", "go right", "next slide"]),
                    (Spanish, &["siguiente", "adelante", "próxima", "ir a la derecha"]),
                    (French, &["suivant", "avancer", "aller à droite", "prochaine diapo"]),
                    (German, &["nächst", "vorwärts", "nach rechts", "nächste folie"]),
                    (Italian, &["prossimo", "avanti", "successivo", "prossima diapositiva"]),
                    (Portuguese, &["próximo", "avançar", "seguinte", "próximo slide"]),
                    (Chinese, &["下一张", "下一个", "向前"]),
                    (Japanese, &["次へ", "進む", "次のスライド"]),
                ],
            ),
            CommandSpec::new(
                CommandId::PrevSlide,
                Some("previous"),
                &[
                    (English, &["previous", "back", "go back", "return", "last slide"]),
                    (Spanish, &["anterior", "atrás", "volver", "diapositiva anterior"]),
                    (French, &["précédent", "retour", "aller à gauche", "diapo précédente"]),
                    (German, &["zurück", "vorherig", "nach links", "vorherige folie"]),
                    (Italian, &["precedente", "indietro", "tornare", "diapositiva precedente"]),
                    (Portuguese, &["anterior", "voltar", "slide anterior", "para trás"]),
                    (Chinese, &["上一张", "上一个", "向后"]),
                    (Japanese, &["戻る", "前へ", "前のスライド"]),
                ],
            ),
            CommandSpec::new(
                CommandId::JumpSlide,
                None,
                &[
                    (English, &[r"(?:jump to|go to|slide|page)\s*([0-9]+)", r"number\s*([0-9]+)"]),
                    (Spanish, &[r"(?:salta a|ve a|diapositiva|página)\s*([0-9]+)"]),
                    (French, &[r"(?:aller à|diapo)\s*([0-9]+)", r"numéro\s*([0-9]+)"]),
                    (German, &[r"(?:gehe zu|folie|seite)\s*([0-9]+)"]),
                    (Italian, &[r"(?:vai a|diapositiva)\s*([0-9]+)"]),
                    (Portuguese, &[r"(?:ir para|slide|página)\s*([0-9]+)"]),
                    (Chinese, &[r"(?:跳到|转到|幻灯片)\s*([0-9]+)"]),
                    (Japanese, &[r"(?:スライド|ページ)\s*([0-9]+)"]),
                ],
            ),
            CommandSpec::new(
                CommandId::StartShow,
                Some("start"),
                &[
                    (English, &["start presentation", "begin show", "present now"]),
                    (Spanish, &["comenzar presentación", "iniciar show", "presentar ahora"]),
                    (French, &["commencer présentation", "débuter diaporama"]),
                    (German, &["präsentation starten", "show beginnen"]),
                    (Italian, &["inizia presentazione", "avvia spettacolo"]),
                    (Portuguese, &["iniciar apresentação", "começar show"]),
                    (Chinese, &["开始演示", "开始放映"]),
                    (Japanese, &["プレゼンテーション開始", "スライドショー開始"]),
                ],
            ),
            CommandSpec::new(
                CommandId::EndShow,
                Some("end"),
                &[
                    (English, &["stop presentation", "end show", "exit show", "close powerpoint"]),
                    (Spanish, &["detener presentación", "finalizar show", "cerrar powerpoint"]),
                    (French, &["arrêter présentation", "quitter diaporama"]),
                    (German, &["präsentation beenden", "show beenden"]),
                    (Italian, &["ferma presentazione", "termina spettacolo"]),
                    (Portuguese, &["parar apresentação", "sair do show"]),
                    (Chinese, &["停止演示", "退出幻灯片"]),
                    (Japanese, &["プレゼンテーション終了", "スライドショー終了"]),
                ],
            ),
            CommandSpec::new(
                CommandId::Blackout,
                Some("black"),
                &[
                    (English, &["black screen", "darken", "turn off"]),
                    (Spanish, &["pantalla negra", "oscurecer", "apagar"]),
                    (French, &["écran noir", "assombrir"]),
                    (German, &["schwarzer bildschirm", "verdunkeln"]),
                    (Italian, &["schermo nero", "scurire"]),
                    (Portuguese, &["tela preta", "escurecer"]),
                    (Chinese, &["黑屏", "关闭"]),
                    (Japanese, &["黒い画面", "暗くする"]),
                ],
            ),
            CommandSpec::new(
                CommandId::ZoomIn,
                Some("zoom"),
                &[
                    (English, &["zoom in", "magnify", "enlarge"]),
                    (Spanish, &["zoom in", "ampliar", "agrandar"]),
                    (French, &["zoom avant", "agrandir"]),
                    (German, &["zoom ein", "vergrößern"]),
                    (Italian, &["zoom in", "ingrandire"]),
                    (Portuguese, &["zoom in", "ampliar"]),
                    (Chinese, &["放大", "缩放"]),
                    (Japanese, &["ズームイン", "拡大"]),
                ],
            ),
            CommandSpec::new(
                CommandId::PenTool,
                Some("pen"),
                &[
                    (English, &["pen tool", "draw", "annotation"]),
                    (Spanish, &["herramienta pluma", "dibujar"]),
                    (French, &["outil stylo", "dessiner"]),
                    (German, &["stiftwerkzeug", "zeichnen"]),
                    (Italian, &["strumento penna", "disegnare"]),
                    (Portuguese, &["ferramenta caneta", "desenhar"]),
                    (Chinese, &["笔工具", "绘制"]),
                    (Japanese, &["ペンツール", "描画"]),
                ],
            ),
            CommandSpec::new(
                CommandId::ExitProgram,
                Some("exit"),
                &[
                    (English, &["terminate program", "kill system", "shutdown voice"]),
                    (Spanish, &["terminar programa", "apagar sistema"]),
                    (French, &["terminer programme", "arrêter système"]),
                    (German, &["programm beenden", "system herunterfahren"]),
                    (Italian, &["termina programma", "spegni sistema"]),
                    (Portuguese, &["encerrar programa", "desligar sistema"]),
                    (Chinese, &["退出程序", "关闭系统"]),
                    (Japanese, &["プログラム終了", "システム終了"]),
                ],
            ),
        ])
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
