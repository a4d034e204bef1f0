// src/decoder/output.rs

use ringbuf::traits::Producer as RbProducer;
use std::time::Duration;

use crate::decoder::control::FlushSync;

/// Pushes `data` into the ring, fading in the first `post_seek_fade_samples`.
///
/// Blocks while the ring is full. Gives up as soon as a flush is requested and
/// returns `false`; the rest of the block belongs to the old position.
pub fn push_with_fade<P: RbProducer<Item = f32>>(
    producer: &mut P,
    data: &[f32],
    post_seek_fade_samples: &mut usize,
    flush: &FlushSync,
) -> bool {
    let fade_len = (*post_seek_fade_samples).min(data.len());

    for (i, &sample) in data.iter().enumerate() {
        let s = if i < fade_len {
            sample * (i as f32 / fade_len as f32)
        } else {
            sample
        };

        loop {
            if flush.is_pending() {
                *post_seek_fade_samples -= fade_len.min(i);
                return false;
            }
            if producer.try_push(s).is_ok() {
                break;
            }
            std::thread::park_timeout(Duration::from_micros(200));
        }
    }

    *post_seek_fade_samples -= fade_len;
    true
}
