mod project_io;

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::unbounded;

use groovebox_engine::audio::AudioOutput;
use groovebox_engine::clock::WallClock;
use groovebox_engine::playhead::playhead_channel;
use groovebox_engine::samples::{SampleStore, SilentSampleStore, WavSampleStore};
use groovebox_engine::{Engine, EngineCommand, EngineState};

const USAGE: &str = "usage: groovebox_host [project.json] [--bars N] [--loop START END]

Plays an arrangement document (or the built-in demo groove) and prints the
playhead. Stops at the end of the arrangement, or after N bars with --bars.";

struct Options {
    project_path: Option<String>,
    max_bars: Option<u32>,
    loop_region: Option<(u32, u32)>,
}

fn parse_args() -> Result<Option<Options>> {
    let mut options = Options {
        project_path: None,
        max_bars: None,
        loop_region: None,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bars" => {
                let value = args.next().context("--bars needs a value")?;
                options.max_bars = Some(value.parse().context("--bars expects a bar count")?);
            }
            "--loop" => {
                let start = args.next().context("--loop needs START and END bars")?;
                let end = args.next().context("--loop needs START and END bars")?;
                options.loop_region = Some((
                    start.parse().context("--loop START must be a bar number")?,
                    end.parse().context("--loop END must be a bar number")?,
                ));
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(None);
            }
            other if other.starts_with('-') => {
                anyhow::bail!("unknown flag '{other}'\n{USAGE}");
            }
            other => options.project_path = Some(other.to_string()),
        }
    }
    Ok(Some(options))
}

fn main() -> Result<()> {
    env_logger::init();

    let Some(options) = parse_args()? else {
        return Ok(());
    };

    let arrangement = match &options.project_path {
        Some(path) => project_io::load_arrangement_file(path)?,
        None => {
            log::info!(target: "host", "no project given, using the demo groove");
            project_io::demo_arrangement()
        }
    };

    // Audio output is best-effort; without a device the run is silent but
    // the transport still works.
    let (mut store, _audio): (Box<dyn SampleStore>, Option<AudioOutput>) = match AudioOutput::new()
    {
        Ok(output) => {
            let store = WavSampleStore::new(output.voices(), output.sample_rate());
            (Box::new(store), Some(output))
        }
        Err(err) => {
            log::warn!(target: "host", "audio output unavailable ({err:#}); running silent");
            (Box::new(SilentSampleStore), None)
        }
    };

    let clock = WallClock::new(arrangement.tempo);
    let mut engine = Engine::new(Box::new(clock));

    let (command_tx, command_rx) = unbounded::<EngineCommand>();
    engine.set_command_receiver(command_rx);
    let (playhead_tx, playhead_rx) = playhead_channel();
    engine.set_playhead_sink(playhead_tx);

    engine.load_arrangement(arrangement, store.as_mut())?;

    if let Some((start_bar, end_bar)) = options.loop_region {
        command_tx.send(EngineCommand::SetLoop {
            enabled: true,
            start_bar,
            end_bar,
        })?;
    }
    command_tx.send(EngineCommand::Play)?;

    let mut started = false;
    let mut last_line = String::new();
    loop {
        engine.tick();

        if engine.is_playing() {
            started = true;
        }
        if let Some(position) = playhead_rx.latest() {
            let line = position.to_string();
            if line != last_line {
                print!("\r{line}   ");
                let _ = std::io::stdout().flush();
                last_line = line;
            }
            if let Some(max_bars) = options.max_bars {
                if position.bars >= max_bars {
                    command_tx.send(EngineCommand::Stop)?;
                }
            }
        }
        if started && engine.state() == EngineState::Ready {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    println!();
    log::info!(target: "host", "transport stopped, exiting");
    Ok(())
}
