// src/playback/mock.rs

use anyhow::{bail, Result};
use std::cell::Cell;
use std::time::Duration;

use super::Transport;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Op {
    Seek(f64),
    Play,
    Pause,
}

/// In-memory transport that records every control call.
#[derive(Debug, Default)]
pub struct MockTransport {
    position: Duration,
    playing: bool,
    reads: Cell<usize>,
    pub fail_seek: bool,
    pub ops: Vec<Op>,
}

impl MockTransport {
    pub fn set_position(&mut self, secs: f64) {
        self.position = Duration::from_secs_f64(secs);
    }

    pub fn position_secs(&self) -> f64 {
        self.position.as_secs_f64()
    }

    pub fn position_reads(&self) -> usize {
        self.reads.get()
    }
}

impl Transport for MockTransport {
    fn position(&self) -> Duration {
        self.reads.set(self.reads.get() + 1);
        self.position
    }

    fn seek(&mut self, pos: Duration) -> Result<()> {
        if self.fail_seek {
            bail!("seek rejected");
        }
        self.position = pos;
        self.ops.push(Op::Seek(pos.as_secs_f64()));
        Ok(())
    }

    fn play(&mut self) {
        self.playing = true;
        self.ops.push(Op::Play);
    }

    fn pause(&mut self) {
        self.playing = false;
        self.ops.push(Op::Pause);
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}
