// src/config.rs

use clap::Parser;
use std::time::Duration;

pub const DEFAULT_AUDIO: &str = "./englishaudio.mp3";

#[derive(Parser, Clone, Debug)]
#[command(name = "marker", version, about = "Mark, replay and delete segments of an audio file")]
pub struct Cli {
    /// Audio file to open
    pub file: Option<String>,

    /// Loaded at startup when no file is given. A missing file is not an error.
    #[arg(long, default_value = DEFAULT_AUDIO)]
    pub default_audio: String,

    /// How often the playback position is sampled, in milliseconds
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(10..=1000))]
    pub tick_ms: u64,

    /// Seconds to jump with the left/right keys
    #[arg(long, default_value_t = 5.0, value_parser = parse_seek_step)]
    pub seek_step: f64,

    /// Print the marker list as JSON on exit
    #[arg(long, default_value_t = false)]
    pub dump_markers: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<String>,
}

fn parse_seek_step(raw: &str) -> Result<f64, String> {
    let step: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if step.is_finite() && step > 0.0 {
        Ok(step)
    } else {
        Err(format!("expected a positive number of seconds, got {raw}"))
    }
}

/// Where the first audio source comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartupSource {
    /// Given by the user; failures are reported.
    Explicit(String),
    /// Best effort; failures are only logged.
    Default(String),
}

impl Cli {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn startup_source(&self) -> StartupSource {
        match &self.file {
            Some(path) => StartupSource::Explicit(path.clone()),
            None => StartupSource::Default(self.default_audio.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["marker"]).unwrap();
        assert_eq!(cli.tick(), Duration::from_millis(50));
        assert_eq!(cli.seek_step, 5.0);
        assert!(!cli.dump_markers);
        assert_eq!(
            cli.startup_source(),
            StartupSource::Default(DEFAULT_AUDIO.to_string())
        );
    }

    #[test]
    fn test_explicit_file_and_flags() {
        let cli = Cli::try_parse_from([
            "marker",
            "song.flac",
            "--tick-ms",
            "20",
            "--seek-step",
            "2.5",
            "--dump-markers",
        ])
        .unwrap();

        assert_eq!(cli.startup_source(), StartupSource::Explicit("song.flac".to_string()));
        assert_eq!(cli.tick_ms, 20);
        assert_eq!(cli.seek_step, 2.5);
        assert!(cli.dump_markers);
    }

    #[test]
    fn test_tick_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["marker", "--tick-ms", "0"]).is_err());
        assert!(Cli::try_parse_from(["marker", "--tick-ms", "5000"]).is_err());
    }

    #[test]
    fn test_seek_step_must_be_positive_and_finite() {
        for bad in ["inf", "-inf", "NaN", "0", "-2", "1e400"] {
            assert!(
                Cli::try_parse_from(["marker", "--seek-step", bad]).is_err(),
                "accepted --seek-step {bad}"
            );
        }
        let cli = Cli::try_parse_from(["marker", "--seek-step", "0.5"]).unwrap();
        assert_eq!(cli.seek_step, 0.5);
    }
}
