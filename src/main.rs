use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use tracing::{info, warn};

use lunge_tracker::config::Config;
use lunge_tracker::lunge::{FrameStatus, FrameVerdict, LungeAnalyzer, RuleClassifier};
use lunge_tracker::pose::LandmarkReplay;

const CONFIG_PATH: &str = "config.toml";

struct Args {
    input: String,
    json: bool,
    classify: bool,
}

fn parse_args() -> Result<Args> {
    // Usage: lunge-tracker <landmarks.jsonl> [--json] [--classify]
    let mut input = None;
    let mut json = false;
    let mut classify = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            "--classify" => classify = true,
            flag if flag.starts_with("--") => bail!("unknown option: {}", flag),
            path => input = Some(path.to_string()),
        }
    }
    match input {
        Some(input) => Ok(Args { input, json, classify }),
        None => bail!("usage: lunge-tracker <landmarks.jsonl> [--json] [--classify]"),
    }
}

fn print_frame(out: &mut impl Write, v: &FrameVerdict) -> Result<()> {
    let index = v.frame_index.unwrap_or_default();
    match v.status {
        FrameStatus::NoPerson => writeln!(out, "[{:>5}] no person", index)?,
        FrameStatus::WarmingUp => writeln!(
            out,
            "[{:>5}] Get ready! Starting in {}...",
            index,
            v.countdown_secs.unwrap_or_default()
        )?,
        FrameStatus::OutOfView | FrameStatus::Analyzed => {
            let side = match v.front_is_left {
                Some(true) => "L",
                Some(false) => "R",
                None => "-",
            };
            let form = if v.errors.is_empty() {
                "Good form".to_string()
            } else {
                v.errors.join(", ")
            };
            writeln!(
                out,
                "[{:>5}] knee {:>6.1}° front={} reps {}/{} | {}",
                index,
                v.front_knee_angle.unwrap_or_default(),
                side,
                v.rep_count,
                v.target_reps,
                form
            )?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lunge_tracker=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = parse_args()?;
    let config = Config::load_or_default(CONFIG_PATH)?;
    info!("Lunge Tracker ({})", env!("CARGO_PKG_VERSION"));
    info!(
        "exercise: {}, fps: {}, target reps: {}",
        config.session.exercise, config.session.fps, config.session.target_reps
    );

    let thresholds = config.thresholds;
    let mut analyzer = LungeAnalyzer::new(config).context("invalid configuration")?;
    if args.classify {
        analyzer = analyzer.with_classifier(Box::new(RuleClassifier::new(thresholds)));
    }

    let file = File::open(&args.input).with_context(|| format!("failed to open {}", args.input))?;
    let mut replay = LandmarkReplay::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut skipped = 0u64;

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", args.input))?;
        if line.trim().is_empty() {
            continue;
        }
        let (frame_index, landmarks) = match replay.decode(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!("line {}: {:#}", line_no + 1, e);
                skipped += 1;
                continue;
            }
        };
        let verdict = analyzer.process_landmarks(frame_index, landmarks.as_deref());
        if args.json {
            serde_json::to_writer(&mut out, &verdict)?;
            writeln!(out)?;
        } else {
            print_frame(&mut out, &verdict)?;
        }
    }

    info!("{} frames replayed, {} lines skipped", replay.decoded(), skipped);
    writeln!(out)?;
    writeln!(out, "{}", analyzer.report().trim_end())?;
    Ok(())
}
