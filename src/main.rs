use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use segue::config::AppConfig;
use segue::engine::{CompatibilityEngine, TransitionResult};
use segue::features::{FeatureRecord, MoodAxis, loader};
use segue::playlist::PlaylistValidator;
use segue::preferences::UserPreferences;

#[derive(Parser)]
#[command(name = "segue", version, about = "Score how well tracks flow into each other")]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Preferences TOML file (replaces the config file's [preferences])
    #[arg(long, global = true)]
    prefs: Option<PathBuf>,

    /// Flag tracks slower than this
    #[arg(long, global = true)]
    min_bpm: Option<f64>,

    /// Flag tracks faster than this
    #[arg(long, global = true)]
    max_bpm: Option<f64>,

    /// Favor destinations with this mood (repeatable)
    #[arg(long = "target-mood", global = true)]
    target_moods: Vec<MoodAxis>,

    /// Penalize destinations with this mood (repeatable)
    #[arg(long = "avoid-mood", global = true)]
    avoid_moods: Vec<MoodAxis>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single transition.
    /// Tracks are LOWLEVEL.json[,HIGHLEVEL.json]
    Compare {
        from: String,
        to: String,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a playlist, scoring every adjacent pair
    Validate {
        #[arg(required = true)]
        tracks: Vec<String>,

        /// Print the full validation as JSON
        #[arg(long)]
        json: bool,

        /// Lowest acceptable single-transition probability
        #[arg(long)]
        floor: Option<f64>,
    },

    /// Rank candidate next tracks for a given track
    Rank {
        from: String,

        /// Candidate tracks (in addition to --dir)
        candidates: Vec<String>,

        /// Directories to search for feature files (defaults to config library_dirs)
        #[arg(long)]
        dir: Vec<PathBuf>,

        /// Number of results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();
    let preferences = resolve_preferences(&cli, &config)?;
    let engine = CompatibilityEngine::new(preferences);

    match cli.command {
        Commands::Compare { from, to, json } => {
            let from = load_arg(&from)?;
            let to = load_arg(&to)?;
            let result = engine
                .get_compatibility(&from, &to)
                .context("Scoring failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            println!("{} -> {}", from.label(), to.label());
            println!();
            print_transition(&result);
        }

        Commands::Validate { tracks, json, floor } => {
            let records = tracks
                .iter()
                .map(|arg| load_arg(arg))
                .collect::<Result<Vec<_>>>()?;
            let validation = PlaylistValidator::new(&engine)
                .with_transition_floor(floor.unwrap_or(config.playlist.transition_floor))
                .validate(&records)
                .context("Validation failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&validation)?);
                return Ok(());
            }

            println!(
                "{:>3}  {:<30} {:<30} {:>6} {:>5}  {}",
                "#", "From", "To", "P", "Viol", "Flags"
            );
            println!("{}", "-".repeat(90));
            for (i, t) in validation.transitions.iter().enumerate() {
                let flags = if t.is_compatible { "" } else { "incompatible" };
                println!(
                    "{:>3}  {:<30} {:<30} {:>5.0}% {:>5}  {}",
                    i,
                    truncate(&records[i].label(), 30),
                    truncate(&records[i + 1].label(), 30),
                    t.probability * 100.0,
                    t.violations.len(),
                    flags
                );
            }
            println!();

            let (weak_idx, weak_p) = validation.weakest_transition;
            println!(
                "Overall: {:.0}% (penalty {:.3}), {} violations",
                validation.overall_probability * 100.0,
                validation.overall_penalty,
                validation.total_violations
            );
            println!(
                "Weakest: #{} {} -> {} ({:.0}%)",
                weak_idx,
                records[weak_idx].label(),
                records[weak_idx + 1].label(),
                weak_p * 100.0
            );
            println!(
                "Playlist is {}",
                if validation.is_valid { "VALID" } else { "INVALID" }
            );
        }

        Commands::Rank { from, candidates, dir, limit } => {
            let from = load_arg(&from)?;

            let mut files: Vec<(PathBuf, Option<PathBuf>)> =
                candidates.iter().map(|arg| split_track_arg(arg)).collect();
            let search_dirs = if !dir.is_empty() {
                dir
            } else if candidates.is_empty() {
                config.library_dirs.clone()
            } else {
                Vec::new()
            };
            for d in &search_dirs {
                files.extend(loader::find_feature_files(d));
            }
            if files.is_empty() {
                anyhow::bail!(
                    "No candidates. Pass tracks, --dir, or set library_dirs in config."
                );
            }

            let records = load_candidates(&files)?;
            let records: Vec<FeatureRecord> =
                records.into_iter().filter(|r| r.id != from.id).collect();

            let mut ranked: Vec<(&FeatureRecord, TransitionResult)> = records
                .iter()
                .zip(engine.score_candidates(&from, &records))
                .filter_map(|(record, scored)| match scored {
                    Ok(result) => Some((record, result)),
                    Err(e) => {
                        log::warn!("Skipping {}: {}", record.id, e);
                        None
                    }
                })
                .collect();
            ranked.sort_by(|a, b| {
                b.1.probability
                    .partial_cmp(&a.1.probability)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            if ranked.is_empty() {
                println!("No candidates could be scored.");
                return Ok(());
            }

            println!("Best next tracks after \"{}\":", from.label());
            println!();
            println!(
                "{:<35} {:>6}  {:>4} {:>4} {:>4} {:>4} {:>4} {:>4} {:>4}",
                "Track", "P", "Key", "Tmp", "Eng", "Lou", "Mood", "Tmb", "Gen"
            );
            println!("{}", "-".repeat(82));
            for (record, r) in ranked.iter().take(limit) {
                println!(
                    "{:<35} {:>5.0}%  {:>4.0} {:>4.0} {:>4.0} {:>4.0} {:>4.0} {:>4.0} {:>4.0}",
                    truncate(&record.label(), 35),
                    r.probability * 100.0,
                    r.key_compatibility * 100.0,
                    r.tempo_compatibility * 100.0,
                    r.energy_compatibility * 100.0,
                    r.loudness_compatibility * 100.0,
                    r.mood_compatibility * 100.0,
                    r.timbre_compatibility * 100.0,
                    r.genre_compatibility * 100.0,
                );
            }
        }
    }

    Ok(())
}

/// Config preferences, replaced by `--prefs`, then patched by CLI flags.
fn resolve_preferences(cli: &Cli, config: &AppConfig) -> Result<UserPreferences> {
    let mut prefs = match &cli.prefs {
        Some(path) => UserPreferences::from_toml_file(path)?,
        None => config.preferences.clone(),
    };
    if cli.min_bpm.is_some() {
        prefs.min_bpm = cli.min_bpm;
    }
    if cli.max_bpm.is_some() {
        prefs.max_bpm = cli.max_bpm;
    }
    if !cli.target_moods.is_empty() {
        prefs.target_moods = cli.target_moods.iter().copied().collect();
    }
    if !cli.avoid_moods.is_empty() {
        prefs.avoid_moods = cli.avoid_moods.iter().copied().collect();
    }
    Ok(prefs)
}

/// `LOW.json,HIGH.json` or just `LOW.json` (high-level sibling guessed).
fn split_track_arg(arg: &str) -> (PathBuf, Option<PathBuf>) {
    match arg.split_once(',') {
        Some((low, high)) => (PathBuf::from(low), Some(PathBuf::from(high))),
        None => {
            let low = PathBuf::from(arg);
            let high = loader::highlevel_sibling(&low);
            (low, high)
        }
    }
}

fn load_arg(arg: &str) -> Result<FeatureRecord> {
    let (low, high) = split_track_arg(arg);
    loader::load_track(&low, high.as_deref())
        .with_context(|| format!("Failed to load {}", low.display()))
}

/// Load every candidate, skipping (and logging) files that fail.
fn load_candidates(files: &[(PathBuf, Option<PathBuf>)]) -> Result<Vec<FeatureRecord>> {
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} tracks ({eta} remaining)")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );

    let mut records = Vec::with_capacity(files.len());
    for (low, high) in files {
        match loader::load_track(low, high.as_deref()) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Skipping {}: {}", low.display(), e),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    log::info!("Loaded {} of {} candidates", records.len(), files.len());
    Ok(records)
}

fn print_transition(result: &TransitionResult) {
    println!(
        "Probability: {:.0}% (penalty {:.3}) -> {}",
        result.probability * 100.0,
        result.penalty,
        if result.is_compatible { "compatible" } else { "INCOMPATIBLE" }
    );
    println!();

    println!("{:<10} {:>6}  {}", "Component", "P", "");
    println!("{}", "-".repeat(26));
    for (component, p) in result.components() {
        let mark = if result.degraded.contains(&component) { "neutral" } else { "" };
        println!("{:<10} {:>5.0}%  {}", component.name(), p * 100.0, mark);
    }

    if !result.violations.is_empty() {
        println!();
        println!("Violations:");
        for v in &result.violations {
            println!("  - {}", v);
        }
    }

    println!();
    println!("{}", result.explanation);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
