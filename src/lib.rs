// src/lib.rs

pub mod audio;
pub mod config;
pub mod decoder;
pub mod error;
pub mod marker_controller;
pub mod markers;
pub mod playback;
mod player;
pub mod session;

pub use error::MarkerError;
pub use markers::{Marker, MarkerId, MarkerRegistry, PendingStart};
pub use playback::{BoundedPlayback, Transport, WatchHandle};
pub use player::{probe_source, AudioPlayer, SourceInfo};
pub use session::MarkerSession;
