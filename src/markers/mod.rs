// src/markers/mod.rs

pub mod pending;

pub use pending::PendingStart;

use serde::Serialize;
use std::fmt;

use crate::error::MarkerError;

/// Identifier for a marker. Allocated once, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MarkerId(pub u64);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A tagged segment of the loaded audio, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Marker {
    pub id: MarkerId,
    pub start: f64,
    pub end: f64,
}

impl Marker {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Row text for the marker list, e.g. `2.00s - 5.00s`.
    pub fn label(&self) -> String {
        format!("{:.2}s - {:.2}s", self.start, self.end)
    }
}

/// Ordered collection of committed markers.
///
/// Every marker in the registry satisfies `end > start`. Ids keep counting
/// across [`MarkerRegistry::clear`] so a stale id can never hit a new marker.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    markers: Vec<Marker>,
    last_id: u64,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_marker(&mut self, start: f64, end: f64) -> Result<MarkerId, MarkerError> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
            return Err(MarkerError::InvalidRange { start, end });
        }

        self.last_id += 1;
        let id = MarkerId(self.last_id);
        self.markers.push(Marker { id, start, end });
        Ok(id)
    }

    /// Removes the marker if present. Returns whether anything was removed.
    pub fn delete_marker(&mut self, id: MarkerId) -> bool {
        let before = self.markers.len();
        self.markers.retain(|m| m.id != id);
        self.markers.len() != before
    }

    pub fn find_marker(&self, id: MarkerId) -> Option<Marker> {
        self.markers.iter().find(|m| m.id == id).copied()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }

    /// Owned snapshot in insertion order.
    pub fn list(&self) -> Vec<Marker> {
        self.markers.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}
