// src/playback/mod.rs

//! Bounded playback: play one marker's range and stop at its end.
//!
//! The controller never owns the transport. Callers hand it in on every call,
//! and feed it position updates at whatever cadence the host produces them.

#[cfg(test)]
pub(crate) mod mock;

use anyhow::Result;
use log::debug;
use std::time::Duration;

use crate::markers::{Marker, MarkerId};

/// The shared playback cursor.
pub trait Transport {
    fn position(&self) -> Duration;
    fn seek(&mut self, pos: Duration) -> Result<()>;
    fn play(&mut self);
    fn pause(&mut self);
    fn is_playing(&self) -> bool;
}

/// Token for one armed end-boundary watch.
///
/// Arming a new watch invalidates every handle issued before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchHandle {
    generation: u64,
}

#[derive(Clone, Copy, Debug)]
struct Watch {
    handle: WatchHandle,
    marker: MarkerId,
    end: f64,
}

#[derive(Debug, Default)]
pub struct BoundedPlayback {
    generation: u64,
    armed: Option<Watch>,
}

impl BoundedPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeks to `marker.start`, resumes, and arms a watch for `marker.end`.
    /// Any previously armed watch is disarmed first.
    pub fn play_marker(
        &mut self,
        marker: &Marker,
        transport: &mut dyn Transport,
    ) -> Result<WatchHandle> {
        self.cancel();

        transport.seek(Duration::from_secs_f64(marker.start))?;
        transport.play();

        self.generation += 1;
        let handle = WatchHandle {
            generation: self.generation,
        };
        self.armed = Some(Watch {
            handle,
            marker: marker.id,
            end: marker.end,
        });
        debug!(
            "armed watch {} for marker {} ({})",
            handle.generation,
            marker.id,
            marker.label()
        );
        Ok(handle)
    }

    /// Position update. Pauses and disarms once the armed end is reached.
    /// Returns the marker whose boundary fired.
    pub fn on_time_update(&mut self, transport: &mut dyn Transport) -> Option<MarkerId> {
        let watch = self.armed?;

        if transport.position().as_secs_f64() < watch.end {
            return None;
        }

        transport.pause();
        self.armed = None;
        debug!("marker {} reached its end at {:.2}s", watch.marker, watch.end);
        Some(watch.marker)
    }

    /// Disarms without touching the transport.
    pub fn cancel(&mut self) {
        if let Some(watch) = self.armed.take() {
            debug!("disarmed watch {}", watch.handle.generation);
        }
    }

    pub fn is_current(&self, handle: WatchHandle) -> bool {
        self.armed.is_some_and(|w| w.handle == handle)
    }

    /// The marker and end boundary currently being watched.
    pub fn armed(&self) -> Option<(MarkerId, f64)> {
        self.armed.map(|w| (w.marker, w.end))
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockTransport, Op};
    use super::*;

    fn marker(id: u64, start: f64, end: f64) -> Marker {
        Marker {
            id: MarkerId(id),
            start,
            end,
        }
    }

    #[test]
    fn test_play_marker_seeks_plays_and_stops_at_end() {
        let mut t = MockTransport::default();
        let mut pb = BoundedPlayback::new();
        let m = marker(1, 10.0, 12.0);

        pb.play_marker(&m, &mut t).unwrap();
        assert_eq!(t.ops, vec![Op::Seek(10.0), Op::Play]);
        assert_eq!(t.position_secs(), 10.0);
        assert!(t.is_playing());

        t.set_position(11.0);
        assert_eq!(pb.on_time_update(&mut t), None);
        assert!(t.is_playing());

        // Coarse updates overshoot the exact end.
        t.set_position(12.2);
        assert_eq!(pb.on_time_update(&mut t), Some(MarkerId(1)));
        assert!(!t.is_playing());
        assert_eq!(pb.armed(), None);

        // Disarmed: further updates read nothing and pause nothing.
        let reads = t.position_reads();
        t.play();
        t.set_position(15.0);
        assert_eq!(pb.on_time_update(&mut t), None);
        assert_eq!(t.position_reads(), reads);
        assert!(t.is_playing());
    }

    #[test]
    fn test_exact_end_triggers_pause() {
        let mut t = MockTransport::default();
        let mut pb = BoundedPlayback::new();

        pb.play_marker(&marker(1, 1.0, 2.0), &mut t).unwrap();
        t.set_position(2.0);
        assert_eq!(pb.on_time_update(&mut t), Some(MarkerId(1)));
        assert!(!t.is_playing());
    }

    #[test]
    fn test_newer_request_replaces_older_watch() {
        let mut t = MockTransport::default();
        let mut pb = BoundedPlayback::new();
        let a = marker(1, 0.0, 3.0);
        let b = marker(2, 5.0, 9.0);

        let ha = pb.play_marker(&a, &mut t).unwrap();
        let hb = pb.play_marker(&b, &mut t).unwrap();
        assert!(!pb.is_current(ha));
        assert!(pb.is_current(hb));

        // Past A's end but before B's: A's watch must not fire.
        t.set_position(6.0);
        assert_eq!(pb.on_time_update(&mut t), None);
        assert!(t.is_playing());

        t.set_position(9.1);
        assert_eq!(pb.on_time_update(&mut t), Some(MarkerId(2)));
        assert_eq!(t.ops.iter().filter(|op| **op == Op::Pause).count(), 1);
    }

    #[test]
    fn test_cancel_leaves_transport_alone() {
        let mut t = MockTransport::default();
        let mut pb = BoundedPlayback::new();
        let h = pb.play_marker(&marker(1, 0.0, 1.0), &mut t).unwrap();

        pb.cancel();
        assert!(!pb.is_current(h));

        t.set_position(5.0);
        assert_eq!(pb.on_time_update(&mut t), None);
        assert!(t.is_playing());
    }

    #[test]
    fn test_failed_seek_arms_nothing() {
        let mut t = MockTransport::default();
        t.fail_seek = true;
        let mut pb = BoundedPlayback::new();

        assert!(pb.play_marker(&marker(1, 0.0, 1.0), &mut t).is_err());
        assert_eq!(pb.armed(), None);
        assert!(!t.is_playing());
    }
}
