//! Output seam between the engine and whatever renders it.
//!
//! The engine only ever emits "line + semantic color tag". Rendering, box
//! drawing and menu layout live outside. The capture mode exists for the
//! input gateway: a grouped participant's turn is resolved with capture on,
//! then the buffered lines are rewritten to third person and broadcast.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Semantic color tags. The renderer decides what they look like.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
pub enum ColorTag {
    /// Plain narration
    #[default]
    Normal,
    /// Damage dealt by the party
    PlayerHit,
    /// Damage taken by the party
    EnemyHit,
    /// Healing and restoration
    Heal,
    /// Status effects landing or expiring
    Status,
    /// Boss dialogue and phase beats
    Boss,
    /// Loot, gold and experience
    Reward,
    /// Warnings (low HP, failed escapes)
    Warning,
    /// System/log lines (defaulted actions, no-ops)
    System,
}

/// A single emitted line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub tag: ColorTag,
    pub text: String,
}

/// Sink for combat output.
///
/// `begin_capture`/`end_capture` bracket a scoped capture: while active,
/// lines go to the capture buffer instead of the live sink. Captures do not
/// nest; a second `begin_capture` restarts the buffer.
pub trait CombatOutput {
    /// Emit one line with a semantic tag.
    fn line(&mut self, tag: ColorTag, text: &str);

    /// Start buffering lines instead of emitting them.
    fn begin_capture(&mut self);

    /// Stop buffering and return everything captured since `begin_capture`.
    fn end_capture(&mut self) -> Vec<OutputLine>;

    /// Blank spacer line.
    fn blank(&mut self) {
        self.line(ColorTag::Normal, "");
    }
}

/// Sink that records every line. Used by tests and by the gateway's
/// capture-and-broadcast path.
#[derive(Debug, Default)]
pub struct BufferSink {
    pub lines: Vec<OutputLine>,
    capture: Option<Vec<OutputLine>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All live (non-captured) text joined with newlines.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True if any live line contains the fragment.
    pub fn contains(&self, fragment: &str) -> bool {
        self.lines.iter().any(|l| l.text.contains(fragment))
    }
}

impl CombatOutput for BufferSink {
    fn line(&mut self, tag: ColorTag, text: &str) {
        let line = OutputLine {
            tag,
            text: text.to_string(),
        };
        match &mut self.capture {
            Some(buf) => buf.push(line),
            None => self.lines.push(line),
        }
    }

    fn begin_capture(&mut self) {
        self.capture = Some(Vec::new());
    }

    fn end_capture(&mut self) -> Vec<OutputLine> {
        self.capture.take().unwrap_or_default()
    }
}

/// Sink that drops everything. Used by the headless resolver.
#[derive(Debug, Default)]
pub struct NullSink {
    capturing: bool,
}

impl CombatOutput for NullSink {
    fn line(&mut self, _tag: ColorTag, _text: &str) {}

    fn begin_capture(&mut self) {
        self.capturing = true;
    }

    fn end_capture(&mut self) -> Vec<OutputLine> {
        self.capturing = false;
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_records_lines() {
        let mut sink = BufferSink::new();
        sink.line(ColorTag::PlayerHit, "You hit the troll.");
        sink.line(ColorTag::Reward, "You find 12 gold.");
        assert_eq!(sink.lines.len(), 2);
        assert!(sink.contains("troll"));
    }

    #[test]
    fn test_capture_diverts_lines() {
        let mut sink = BufferSink::new();
        sink.line(ColorTag::Normal, "before");
        sink.begin_capture();
        sink.line(ColorTag::PlayerHit, "You strike.");
        sink.line(ColorTag::Heal, "You feel better.");
        let captured = sink.end_capture();

        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].text, "You strike.");
        // Live output only has the line from before the capture.
        assert_eq!(sink.lines.len(), 1);
        assert_eq!(sink.lines[0].text, "before");
    }

    #[test]
    fn test_end_capture_without_begin_is_empty() {
        let mut sink = BufferSink::new();
        assert!(sink.end_capture().is_empty());
    }

    #[test]
    fn test_lines_after_capture_go_live() {
        let mut sink = BufferSink::new();
        sink.begin_capture();
        sink.line(ColorTag::Normal, "hidden");
        let _ = sink.end_capture();
        sink.line(ColorTag::Normal, "visible");
        assert_eq!(sink.lines.len(), 1);
        assert_eq!(sink.lines[0].text, "visible");
    }
}
