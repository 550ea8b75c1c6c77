mod app;
mod parse;
mod reference;
mod settings;
mod transport;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use progressing::Baring;

use reference::{compare, CircuitParams};
use settings::Settings;
use transport::DataSource;

/// Capture an RC step response from the sampler and compare it with the first-order model.
#[derive(Parser, Debug)] // requires `derive` feature
#[command()]
struct Args {
    /// TOML settings file ([serial], [circuit] and [capture] sections).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port of the sampler.
    #[arg(short, long)]
    port: Option<String>,

    #[arg(short, long)]
    baud: Option<u32>,

    /// Step height of the model, volts.
    #[arg(long)]
    v_max: Option<f64>,

    /// Resistance of the model, ohms.
    #[arg(long)]
    resistance: Option<f64>,

    /// Capacitance of the model, farads.
    #[arg(long)]
    capacitance: Option<f64>,

    /// Points collected per run.
    #[arg(long)]
    points: Option<usize>,

    /// Read a saved capture instead of the serial port.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Capture once, print the comparison and exit.
    #[arg(long)]
    headless: bool,

    /// Write the captured points to this file (headless mode).
    #[arg(long, requires = "headless")]
    save: Option<PathBuf>,
}

impl Args {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if let Some(port) = &self.port {
            settings.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            settings.serial.baud_rate = baud;
        }
        let c: &mut CircuitParams = &mut settings.circuit;
        c.v_max = self.v_max.unwrap_or(c.v_max);
        c.resistance = self.resistance.unwrap_or(c.resistance);
        c.capacitance = self.capacitance.unwrap_or(c.capacitance);
        if let Some(points) = self.points {
            settings.capture.points = points;
        }
        anyhow::ensure!(
            c.time_constant() > 0.0,
            "R*C must be positive, got {} ohm * {} F",
            c.resistance,
            c.capacitance
        );
        Ok(settings)
    }

    fn source(&self, settings: &Settings) -> DataSource {
        match &self.replay {
            Some(path) => DataSource::Replay(path.clone()),
            None => DataSource::Serial(settings.serial.clone()),
        }
    }
}

fn run_headless(settings: &Settings, source: &DataSource, save: Option<&Path>) -> anyhow::Result<()> {
    println!("Capturing from {}", source.describe());

    let limit = settings.capture.points;
    let mut progress_bar = progressing::mapping::Bar::with_range(0, limit as i64).timed();
    let capture = source.acquire(limit, |n| {
        progress_bar.set(n as i64);
        if progress_bar.has_progressed_significantly() {
            print!("\r{}", progress_bar);
        }
    })?;
    println!();

    if !capture.complete {
        log::warn!("Run incomplete, got {} of {} points", capture.points.len(), limit);
    }

    if let Some(path) = save {
        let f = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        parse::write_capture(std::io::BufWriter::new(f), &capture.points)?;
        println!("Saved {} points to {}", capture.points.len(), path.display());
    }

    let c = &settings.circuit;
    println!(
        "Model: V_max = {} V, R = {} ohm, C = {} F, tau = {:.3} s",
        c.v_max,
        c.resistance,
        c.capacitance,
        c.time_constant()
    );
    match compare(&capture.points, c) {
        Some(cmp) => println!(
            "{} points, RMS deviation {:.4} V, max deviation {:.4} V at {:.2} s",
            cmp.points, cmp.rms_error, cmp.max_error, cmp.max_error_at
        ),
        None => println!("No points received"),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let settings = args.settings()?;
    let source = args.source(&settings);

    if args.headless {
        return run_headless(&settings, &source, args.save.as_deref());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 600.0])
            .with_title(app::TITLE),
        ..Default::default()
    };
    eframe::run_native(
        app::TITLE,
        options,
        Box::new(move |_cc| Box::new(app::StepResponseApp::new(settings, source))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to open the plot window: {}", e))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "step-plot",
            "--port",
            "COM9",
            "--resistance",
            "47000",
            "--points",
            "50",
        ]);
        let s = args.settings().unwrap();
        assert_eq!(s.serial.port, "COM9");
        assert_eq!(s.circuit.resistance, 47_000.0);
        assert_eq!(s.circuit.capacitance, 3.3e-6);
        assert_eq!(s.capture.points, 50);
        assert!(matches!(args.source(&s), DataSource::Serial(_)));
    }

    #[test]
    fn test_rejects_bad_model() {
        let args = Args::parse_from(["step-plot", "--capacitance", "0"]);
        assert!(args.settings().is_err());
    }

    #[test]
    fn test_save_requires_headless() {
        assert!(Args::try_parse_from(["step-plot", "--save", "run.csv"]).is_err());
        assert!(Args::try_parse_from(["step-plot", "--headless", "--save", "run.csv"]).is_ok());
    }

    #[test]
    fn test_headless_replay() {
        let dir = std::env::temp_dir();
        let input = dir.join(format!("step-plot-headless-in-{}.csv", std::process::id()));
        let output = dir.join(format!("step-plot-headless-out-{}.csv", std::process::id()));
        std::fs::write(&input, "0,0.0\n10,0.1\n20,0.19\nEnd\n").unwrap();

        let settings = Settings::default();
        run_headless(&settings, &DataSource::Replay(input.clone()), Some(&output)).unwrap();
        let saved = std::fs::read_to_string(&output).unwrap();
        std::fs::remove_file(&input).unwrap();
        std::fs::remove_file(&output).unwrap();
        assert_eq!(saved, "0,0.0\n10,0.1\n20,0.19\nEnd\n");
    }
}
