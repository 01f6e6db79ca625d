//! Scripted pointer input.
//!
//! A script is a JSON-lines file; each line is a pointer event with a
//! millisecond offset from the start of the session:
//!
//! ```text
//! {"at_ms": 0, "type": "down", "position": {"x": 10, "y": 10}}
//! {"at_ms": 20, "type": "move", "position": {"x": 40, "y": 25}}
//! {"at_ms": 40, "type": "up"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::fs;
use std::path::Path;
use std::time::Duration;

use inkshare_core::PointerEvent;
use serde::{Deserialize, Serialize};

use crate::app::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: PointerEvent,
}

impl ScriptStep {
    pub fn offset(&self) -> Duration {
        Duration::from_millis(self.at_ms)
    }
}

/// Pointer events ordered by offset, consumed as session time advances.
#[derive(Debug, Clone, Default)]
pub struct PointerScript {
    steps: Vec<ScriptStep>,
    next: usize,
}

impl PointerScript {
    pub fn parse(text: &str) -> Result<Self, AppError> {
        let mut steps = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let step: ScriptStep = serde_json::from_str(line).map_err(|source| AppError::Script {
                line: index + 1,
                source,
            })?;
            steps.push(step);
        }
        // Stable, so events sharing an offset keep file order.
        steps.sort_by_key(|s| s.at_ms);
        Ok(Self { steps, next: 0 })
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).map_err(|source| AppError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let script = Self::parse(&text)?;
        log::info!("Loaded {} pointer events from {}", script.len(), path.display());
        Ok(script)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// True once every step has been taken.
    pub fn is_finished(&self) -> bool {
        self.next >= self.steps.len()
    }

    /// Take the steps whose offset is at or before `elapsed`.
    pub fn take_due(&mut self, elapsed: Duration) -> Vec<ScriptStep> {
        let start = self.next;
        while self.next < self.steps.len() && self.steps[self.next].offset() <= elapsed {
            self.next += 1;
        }
        self.steps[start..self.next].to_vec()
    }
}
