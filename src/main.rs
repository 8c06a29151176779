mod classify;
mod config;
mod csv;
mod error;
mod fetcher;
mod model;
mod pipeline;
mod render;
mod serve;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::model::{Category, Observation};

#[derive(Parser)]
#[command(
    name = "show_tracker",
    about = "Track Reddit discussion threads for one show and chart their comment growth"
)]
struct Cli {
    /// Settings file (default: ./tracker.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, classify, record one snapshot and re-render the dashboard
    Poll,
    /// Serve the output directory for local preview
    Serve,
    /// Show the latest stored standings
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    let result = match cli.command {
        Commands::Poll => {
            println!(
                "Polling r/{} for {:?} ...",
                settings.subreddit, settings.query
            );
            let summary = pipeline::run_cycle(&settings).await?;
            summary.print();
            println!("Dashboard: {}", settings.output_dir.join(render::DASHBOARD).display());
            Ok(())
        }
        Commands::Serve => serve::run(&settings.preview, settings.output_dir.clone()).await,
        Commands::Status => print_status(&settings),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_status(settings: &Settings) -> anyhow::Result<()> {
    // opening a missing sqlite history would create it
    if !settings.history_path().exists() {
        println!(
            "No history at {}. Run 'poll' first.",
            settings.history_path().display()
        );
        return Ok(());
    }
    let store = store::open(settings)?;
    let histories = store.load_all()?;
    if histories.is_empty() {
        println!(
            "No history at {}. Run 'poll' first.",
            settings.history_path().display()
        );
        return Ok(());
    }

    let mut rows: Vec<(&Observation, usize, i64)> = histories
        .values()
        .filter_map(|h| {
            let latest = h.latest()?;
            let first = h.observations.first()?;
            Some((latest, h.len(), latest.num_comments - first.num_comments))
        })
        .collect();
    rows.sort_by(|a, b| {
        rank(a.0.category)
            .cmp(&rank(b.0.category))
            .then(a.0.episode_key.cmp(&b.0.episode_key))
            .then(b.0.num_comments.cmp(&a.0.num_comments))
    });

    println!(
        "{:>3} | {:<8} | {:<7} | {:<12} | {:>8} | {:>7} | {:>7} | {:>5} | {:<20}",
        "#", "Type", "Episode", "Post", "Comments", "Score", "Change", "Snaps", "Last seen (UTC)"
    );
    println!("{}", "-".repeat(100));

    for (i, (obs, snaps, change)) in rows.iter().enumerate() {
        let episode = obs
            .episode_key
            .map(|k| k.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:>3} | {:<8} | {:<7} | {:<12} | {:>8} | {:>7} | {:>+7} | {:>5} | {:<20}",
            i + 1,
            obs.category.label(),
            episode,
            truncate(&obs.post_id, 12),
            obs.num_comments,
            obs.score,
            change,
            snaps,
            obs.observed_at.format("%Y-%m-%d %H:%M").to_string(),
        );
    }

    println!(
        "\n{} posts tracked | history: {}",
        rows.len(),
        settings.history_path().display()
    );
    Ok(())
}

/// Trailer first, then episodes, then everything else.
fn rank(category: Category) -> u8 {
    match category {
        Category::Trailer => 0,
        Category::Episode => 1,
        Category::Other => 2,
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;

    #[test]
    fn status_without_history_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        for backend in [StoreBackend::Csv, StoreBackend::Sqlite] {
            let settings = Settings {
                data_dir: dir.path().join("data"),
                store: backend,
                ..Default::default()
            };
            print_status(&settings).unwrap();
            assert!(!settings.data_dir.exists());
        }
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abc", 12), "abc");
        assert_eq!(truncate("abcdefghijklmnop", 12), "abcdefghijkl...");
    }
}
