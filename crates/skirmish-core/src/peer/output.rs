//! Private per-robot output stream.

use serde::{Deserialize, Serialize};

/// Most lines a robot may write in one round.
pub const MAX_OUTPUT_LINES: usize = 1000;

/// Bounded text output owned by one robot.
///
/// Holds the robot's own printed lines plus `SYSTEM:` notices from the
/// engine. Once full, further lines are counted and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotOutput {
    lines: Vec<String>,
    dropped: usize,
}

impl RobotOutput {
    /// Creates an empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line unless the stream is full.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() < MAX_OUTPUT_LINES {
            self.lines.push(line.into());
        } else {
            self.dropped += 1;
        }
    }

    /// Appends a `SYSTEM:` line.
    pub fn system(&mut self, message: impl AsRef<str>) {
        self.push(format!("SYSTEM: {}", message.as_ref()));
    }

    /// Lines written so far.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines discarded because the stream was full.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Returns `true` if any line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }

    /// Empties the stream for a new round.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.dropped = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_bounded() {
        let mut out = RobotOutput::new();
        for i in 0..MAX_OUTPUT_LINES + 5 {
            out.push(format!("line {i}"));
        }
        assert_eq!(out.lines().len(), MAX_OUTPUT_LINES);
        assert_eq!(out.dropped(), 5);
        out.clear();
        assert!(out.lines().is_empty());
        assert_eq!(out.dropped(), 0);
    }

    #[test]
    fn system_lines_are_prefixed() {
        let mut out = RobotOutput::new();
        out.system("Robot disabled");
        assert_eq!(out.lines(), ["SYSTEM: Robot disabled"]);
        assert!(out.contains("disabled"));
    }
}
