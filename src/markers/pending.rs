// src/markers/pending.rs

use crate::error::MarkerError;
use crate::markers::{MarkerId, MarkerRegistry};

/// A start time captured but not yet paired with an end.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum PendingStart {
    #[default]
    Idle,
    Pending(f64),
}

/// What the mark-start toggle did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Toggle {
    Started(f64),
    Cancelled(f64),
}

impl PendingStart {
    /// Mark start when idle, cancel when a start is pending.
    pub fn toggle(&mut self, position: f64) -> Toggle {
        match *self {
            PendingStart::Idle => {
                *self = PendingStart::Pending(position);
                Toggle::Started(position)
            }
            PendingStart::Pending(start) => {
                *self = PendingStart::Idle;
                Toggle::Cancelled(start)
            }
        }
    }

    /// Pairs the pending start with `end` and commits it to `registry`.
    ///
    /// On a rejected range the pending start stays in place so the user can
    /// keep listening and try again.
    pub fn commit(
        &mut self,
        end: f64,
        registry: &mut MarkerRegistry,
    ) -> Result<MarkerId, MarkerError> {
        let PendingStart::Pending(start) = *self else {
            return Err(MarkerError::NoPendingStart);
        };

        let id = registry.add_marker(start, end)?;
        *self = PendingStart::Idle;
        Ok(id)
    }

    pub fn reset(&mut self) {
        *self = PendingStart::Idle;
    }

    pub fn start(&self) -> Option<f64> {
        match self {
            PendingStart::Idle => None,
            PendingStart::Pending(start) => Some(*start),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, PendingStart::Pending(_))
    }

    /// Label for the toggle control in the current state.
    pub fn toggle_label(&self) -> &'static str {
        match self {
            PendingStart::Idle => "Mark start",
            PendingStart::Pending(_) => "Cancel mark",
        }
    }

    /// Pending start as shown on screen; `0.00s` when idle.
    pub fn display(&self) -> String {
        format!("{:.2}s", self.start().unwrap_or(0.0))
    }
}
