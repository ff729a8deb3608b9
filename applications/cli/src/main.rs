/// Waypoint - audio tour player
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waypoint_cli::{CliConfig, CliError, Simulation};
use waypoint_core::{choose_language, KeyValueStore, Language, Tour, TourId};
use waypoint_playback::ProgressTracker;
use waypoint_storage::preferences::{load_preferences, save_selected_language};
use waypoint_storage::{JsonFileStore, TourCatalog};

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(about = "Waypoint audio tour player", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "WAYPOINT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tours in the catalog
    Tours,
    /// Play a tour on the simulated media element
    Play {
        /// Tour id
        tour: String,
        /// Open at this stop (deep link)
        #[arg(short, long)]
        stop: Option<String>,
        /// Language to play in; remembered for next time
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Show saved progress for a tour
    Status {
        /// Tour id
        tour: String,
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Forget saved progress for a tour
    Reset {
        /// Tour id
        tour: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waypoint=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Tours => list_tours(&config)?,
        Commands::Play {
            tour,
            stop,
            language,
        } => play(&config, &tour, stop.as_deref(), language.as_deref()).await?,
        Commands::Status { tour, language } => status(&config, &tour, language.as_deref())?,
        Commands::Reset { tour } => reset(&config, &tour)?,
    }

    Ok(())
}

fn load_catalog(config: &CliConfig) -> anyhow::Result<TourCatalog> {
    TourCatalog::load_dir(&config.storage.tours_dir).with_context(|| {
        format!(
            "Failed to load tours from {}",
            config.storage.tours_dir.display()
        )
    })
}

fn open_store(config: &CliConfig) -> anyhow::Result<JsonFileStore> {
    JsonFileStore::open(&config.storage.progress_file).with_context(|| {
        format!(
            "Failed to open progress store {}",
            config.storage.progress_file.display()
        )
    })
}

/// Resolve the tour version to use: explicit flag, then saved preference,
/// then device locale, then English
fn select_tour(
    catalog: &TourCatalog,
    store: &mut dyn KeyValueStore,
    config: &CliConfig,
    id: &str,
    requested: Option<&str>,
) -> anyhow::Result<Tour> {
    let tour_id = TourId::new(id);
    let available: Vec<Language> = catalog
        .languages_for(&tour_id)
        .into_iter()
        .map(|code| Language::new(code, code))
        .collect();

    let prefs = load_preferences(store);
    let saved = requested.or(prefs.selected_language.as_deref());
    let language = choose_language(&available, saved, config.device_locale.as_deref())
        .ok_or_else(|| CliError::TourNotFound(id.to_string()))?;

    if let Some(code) = requested {
        if code.eq_ignore_ascii_case(&language.code) {
            save_selected_language(store, &language.code)?;
        } else {
            info!("Tour {} is not available in {}, using {}", id, code, language.code);
        }
    }

    catalog
        .tour(&tour_id, &language.code)
        .cloned()
        .ok_or_else(|| CliError::TourNotFound(id.to_string()).into())
}

/// Narration length as `12 min`, rounded up
fn format_minutes(seconds: f64) -> String {
    format!("{} min", (seconds / 60.0).ceil() as u64)
}

fn list_tours(config: &CliConfig) -> anyhow::Result<()> {
    let catalog = load_catalog(config)?;
    if catalog.is_empty() {
        println!("No tours found in {}", config.storage.tours_dir.display());
        return Ok(());
    }

    for id in catalog.tour_ids() {
        let languages = catalog.languages_for(id);
        let Some(tour) = catalog.tour(id, "") else {
            continue;
        };
        println!(
            "{}  {}  {}  [{}]",
            id,
            tour.title,
            format_minutes(tour.total_audio_duration()),
            languages.join(", ")
        );
    }
    Ok(())
}

async fn play(
    config: &CliConfig,
    id: &str,
    stop: Option<&str>,
    language: Option<&str>,
) -> anyhow::Result<()> {
    let catalog = load_catalog(config)?;
    let mut store = open_store(config)?;
    let tour = select_tour(&catalog, &mut store, config, id, language)?;

    info!("Playing {} ({}) with {} stops", tour.id, tour.language, tour.stops.len());
    println!("{}", tour.title);

    let simulation = Simulation::new(Arc::new(tour), Box::new(store), config);
    let report = simulation.run(stop).await;

    println!(
        "Played {} stops in {:.0}s, tour at {:.0}%{}",
        report.stops_played.len(),
        report.elapsed.as_secs_f64(),
        report.tour_percent,
        if report.finished { "" } else { " (stopped early)" }
    );
    Ok(())
}

fn status(config: &CliConfig, id: &str, language: Option<&str>) -> anyhow::Result<()> {
    let catalog = load_catalog(config)?;
    let mut store = open_store(config)?;
    let tour = select_tour(&catalog, &mut store, config, id, language)?;
    let progress = ProgressTracker::new(
        tour.id.clone(),
        Box::new(store),
        config.player.progress.clone(),
    );

    println!("{} ({})", tour.title, tour.language);
    for stop in tour.audio_stops() {
        let mark = if progress.is_stop_completed(stop.id.as_str()) {
            "x"
        } else {
            " "
        };
        println!(
            "  [{}] {:<8} {:<32} {:>6.0}s",
            mark,
            stop.id.as_str(),
            stop.title,
            progress.stop_position(stop.id.as_str())
        );
    }

    let percent = progress.realtime_progress_percentage(&tour.stops, None, 0.0);
    println!(
        "{}/{} stops completed, {:.0}% of {}",
        progress.completed_count(&tour.stops),
        tour.audio_stop_count(),
        percent,
        format_minutes(tour.total_audio_duration())
    );
    Ok(())
}

fn reset(config: &CliConfig, id: &str) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let mut progress = ProgressTracker::new(
        TourId::new(id),
        Box::new(store),
        config.player.progress.clone(),
    );
    progress.reset();
    println!("Progress for {} cleared", id);
    Ok(())
}
