// src/main.rs

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::fs::File;
use std::time::Duration;

use segment_marker::config::{Cli, StartupSource};
use segment_marker::marker_controller::{ControllerSettings, MarkerController};

fn init_logging(cli: &Cli) -> Result<(), anyhow::Error> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level));
    if let Some(path) = &cli.log_file {
        let file = File::create(path).with_context(|| format!("creating log file {path}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn run(controller: &mut MarkerController, tick: Duration) -> Result<(), anyhow::Error> {
    // Initial draw
    controller.run_tick()?;

    while !controller.should_quit() {
        // Wait at most one tick for input; each pass is one position update.
        if event::poll(tick)? {
            if let Event::Key(ev) = event::read()? {
                if ev.kind == KeyEventKind::Press {
                    controller.handle_key(ev.code, ev.modifiers);
                }
            }
        }

        controller.run_tick()?;
    }
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let mut controller = MarkerController::new(ControllerSettings {
        seek_step: cli.seek_step,
    });

    match cli.startup_source() {
        StartupSource::Explicit(path) => controller.load_source(&path)?,
        StartupSource::Default(path) => controller.load_default(&path),
    }

    enable_raw_mode()?;
    print!("\x1b[2J");
    let result = run(&mut controller, cli.tick());
    disable_raw_mode()?;
    println!("\n🛑 Exiting.");

    if cli.dump_markers {
        println!("{}", serde_json::to_string_pretty(&controller.session().list())?);
    }

    result
}
