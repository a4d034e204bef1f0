// src/session/mod.rs

//! One marking session over one loaded audio source.

use anyhow::Result;
use log::{debug, info};

use crate::error::MarkerError;
use crate::markers::pending::Toggle;
use crate::markers::{Marker, MarkerId, MarkerRegistry, PendingStart};
use crate::playback::{BoundedPlayback, Transport, WatchHandle};

/// Owns all marking state: the committed markers, the pending start and
/// the bounded playback watch.
#[derive(Debug, Default)]
pub struct MarkerSession {
    registry: MarkerRegistry,
    pending: PendingStart,
    playback: BoundedPlayback,
    source: Option<String>,
}

impl MarkerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new audio source replaces the old one. Markers of the previous
    /// source are meaningless for it, so everything is reset.
    pub fn source_loaded(&mut self, source: impl Into<String>) {
        let source = source.into();
        info!(
            "loaded {source}, dropping {} marker(s)",
            self.registry.len()
        );
        self.registry.clear();
        self.pending.reset();
        self.playback.cancel();
        self.source = Some(source);
    }

    /// Mark start when idle, cancel the pending start otherwise.
    pub fn toggle_mark_start(&mut self, transport: &dyn Transport) -> Toggle {
        let position = transport.position().as_secs_f64();
        let toggle = self.pending.toggle(position);
        debug!("mark start toggle: {toggle:?}");
        toggle
    }

    pub fn mark_end(&mut self, transport: &dyn Transport) -> Result<MarkerId, MarkerError> {
        let end = transport.position().as_secs_f64();
        let id = self.pending.commit(end, &mut self.registry)?;
        info!("added marker {id} ending at {end:.2}s");
        Ok(id)
    }

    pub fn delete_marker(&mut self, id: MarkerId) -> bool {
        let removed = self.registry.delete_marker(id);
        if removed {
            info!("deleted marker {id}");
        }
        removed
    }

    /// Plays one marker's range. Unknown ids are ignored.
    pub fn play_marker(
        &mut self,
        id: MarkerId,
        transport: &mut dyn Transport,
    ) -> Result<Option<WatchHandle>> {
        let Some(marker) = self.registry.find_marker(id) else {
            debug!("play requested for missing marker {id}");
            return Ok(None);
        };
        let handle = self.playback.play_marker(&marker, transport)?;
        Ok(Some(handle))
    }

    /// Forward a playback-position update to the armed watch.
    pub fn on_time_update(&mut self, transport: &mut dyn Transport) -> Option<MarkerId> {
        self.playback.on_time_update(transport)
    }

    pub fn markers(&self) -> &MarkerRegistry {
        &self.registry
    }

    pub fn list(&self) -> Vec<Marker> {
        self.registry.list()
    }

    pub fn pending(&self) -> PendingStart {
        self.pending
    }

    pub fn playback(&self) -> &BoundedPlayback {
        &self.playback
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::mock::MockTransport;

    fn mark(session: &mut MarkerSession, t: &mut MockTransport, start: f64, end: f64) -> MarkerId {
        t.set_position(start);
        session.toggle_mark_start(&*t);
        t.set_position(end);
        session.mark_end(&*t).unwrap()
    }

    #[test]
    fn test_mark_start_then_valid_end() {
        let mut s = MarkerSession::new();
        let mut t = MockTransport::default();

        t.set_position(2.0);
        assert_eq!(s.toggle_mark_start(&t), Toggle::Started(2.0));
        t.set_position(5.0);
        let id = s.mark_end(&t).unwrap();

        let list = s.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
        assert_eq!((list[0].start, list[0].end), (2.0, 5.0));
        assert_eq!(s.pending(), PendingStart::Idle);
    }

    #[test]
    fn test_mark_end_before_start_is_rejected() {
        let mut s = MarkerSession::new();
        let mut t = MockTransport::default();

        t.set_position(2.0);
        s.toggle_mark_start(&t);
        t.set_position(1.5);

        assert!(matches!(
            s.mark_end(&t),
            Err(MarkerError::InvalidRange { .. })
        ));
        assert_eq!(s.pending(), PendingStart::Pending(2.0));
        assert!(s.markers().is_empty());
    }

    #[test]
    fn test_toggle_twice_cancels() {
        let mut s = MarkerSession::new();
        let mut t = MockTransport::default();

        t.set_position(4.0);
        s.toggle_mark_start(&t);
        t.set_position(6.0);
        assert_eq!(s.toggle_mark_start(&t), Toggle::Cancelled(4.0));

        assert_eq!(s.mark_end(&t), Err(MarkerError::NoPendingStart));
        assert!(s.markers().is_empty());
    }

    #[test]
    fn test_play_marker_pauses_at_end() {
        let mut s = MarkerSession::new();
        let mut t = MockTransport::default();
        let id = mark(&mut s, &mut t, 10.0, 12.0);
        t.set_position(30.0);

        assert!(s.play_marker(id, &mut t).unwrap().is_some());
        assert_eq!(t.position_secs(), 10.0);
        assert!(t.is_playing());

        t.set_position(11.95);
        assert_eq!(s.on_time_update(&mut t), None);
        t.set_position(12.04);
        assert_eq!(s.on_time_update(&mut t), Some(id));
        assert!(!t.is_playing());
    }

    #[test]
    fn test_second_play_cancels_first_watch() {
        let mut s = MarkerSession::new();
        let mut t = MockTransport::default();
        let a = mark(&mut s, &mut t, 1.0, 2.0);
        let b = mark(&mut s, &mut t, 3.0, 8.0);

        s.play_marker(a, &mut t).unwrap();
        s.play_marker(b, &mut t).unwrap();

        t.set_position(4.0);
        assert_eq!(s.on_time_update(&mut t), None);
        assert!(t.is_playing());

        t.set_position(8.0);
        assert_eq!(s.on_time_update(&mut t), Some(b));
    }

    #[test]
    fn test_missing_ids_are_noops() {
        let mut s = MarkerSession::new();
        let mut t = MockTransport::default();
        let id = mark(&mut s, &mut t, 0.0, 1.0);
        let before = s.list();

        assert!(!s.delete_marker(MarkerId(99)));
        assert_eq!(s.list(), before);

        assert!(s.delete_marker(id));
        assert!(!s.delete_marker(id));

        t.ops.clear();
        assert_eq!(s.play_marker(id, &mut t).unwrap(), None);
        assert!(t.ops.is_empty());
    }

    #[test]
    fn test_loading_source_clears_everything() {
        let mut s = MarkerSession::new();
        let mut t = MockTransport::default();
        let id = mark(&mut s, &mut t, 1.0, 3.0);
        s.play_marker(id, &mut t).unwrap();
        t.set_position(5.0);
        s.toggle_mark_start(&t);

        s.source_loaded("other.wav");

        assert!(s.markers().is_empty());
        assert_eq!(s.pending(), PendingStart::Idle);
        assert_eq!(s.playback().armed(), None);
        assert_eq!(s.source(), Some("other.wav"));

        // The old watch is gone; nothing pauses the new source.
        t.set_position(10.0);
        assert_eq!(s.on_time_update(&mut t), None);
        assert!(t.is_playing());

        // Ids keep counting past the cleared markers.
        let next = mark(&mut s, &mut t, 0.0, 1.0);
        assert!(next > id);
    }
}
