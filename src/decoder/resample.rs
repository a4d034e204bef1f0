// src/decoder/resample.rs

use anyhow::Result;
use rubato::{
    calculate_cutoff, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use crate::decoder::dsp;

/// `None` when the source already runs at the device rate.
pub fn build_resampler(
    src_rate: u32,
    dst_rate: u32,
    channels: usize,
) -> Result<Option<SincFixedIn<f32>>> {
    if src_rate == dst_rate {
        return Ok(None);
    }
    let ratio = dst_rate as f64 / src_rate as f64;
    let sinc_len = 256usize;
    let window = WindowFunction::BlackmanHarris2;
    let f_cutoff = calculate_cutoff(sinc_len, window);
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window,
    };
    let chunk_size = 1024;
    let r = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, channels)?;
    Ok(Some(r))
}

/// Resamples one full input chunk if enough frames are staged.
pub fn try_process_exact(
    resampler: &mut SincFixedIn<f32>,
    stage_planar: &mut [Vec<f32>],
) -> Option<Vec<Vec<f32>>> {
    let need = resampler.input_frames_next();
    if dsp::planar_len(stage_planar) < need {
        return None;
    }
    let in_block = dsp::take_from_planar(stage_planar, need);
    resampler.process(&in_block, None).ok()
}

/// Resamples whatever is left at end of stream, then the filter tail.
pub fn flush(
    resampler: &mut SincFixedIn<f32>,
    stage_planar: &mut [Vec<f32>],
) -> Result<Vec<Vec<Vec<f32>>>> {
    let mut blocks = Vec::new();

    let have = dsp::planar_len(stage_planar);
    if have > 0 {
        let rest = dsp::take_from_planar(stage_planar, have);
        blocks.push(resampler.process_partial(Some(rest.as_slice()), None)?);
    }

    let tail = resampler.process_partial::<Vec<f32>>(None, None)?;
    if tail.first().is_some_and(|lane| !lane.is_empty()) {
        blocks.push(tail);
    }

    Ok(blocks)
}
