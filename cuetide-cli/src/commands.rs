//! CLI command implementations

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Subcommand;
use cuetide_core::config::CuetideConfig;
use cuetide_core::media::TrackId;
use cuetide_core::{CuetideError, Result};
use cuetide_sim::{Scenario, SessionOptions, SessionReport, run_session};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show the tracks described by a scenario file
    Inspect {
        /// Path to the scenario JSON file
        scenario: PathBuf,
    },
    /// Run a simulated playback session and print its report
    Simulate {
        /// Scenario JSON file; the built-in sample when omitted
        #[arg(short, long)]
        scenario: Option<PathBuf>,
        /// Subtitle track to select
        #[arg(short, long, default_value = "0")]
        track: i32,
        /// Position to seek to halfway through the session
        #[arg(long)]
        seek: Option<f64>,
        /// Session length in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
        /// Seed for reproducible network behavior
        #[arg(long)]
        seed: Option<u64>,
        /// Probability that a fragment load fails
        #[arg(long)]
        failure_rate: Option<f64>,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Inspect { scenario } => inspect_scenario(&scenario),
        Commands::Simulate {
            scenario,
            track,
            seek,
            duration,
            seed,
            failure_rate,
        } => {
            let mut config = CuetideConfig::from_env();
            if let Some(seed) = seed {
                config.simulation.deterministic_seed = Some(seed);
            }
            if let Some(rate) = failure_rate {
                config.simulation.load_failure_rate = rate;
            }
            let options = SessionOptions {
                track: TrackId(track),
                seek,
                duration: Duration::from_secs(duration),
            };

            let report = simulate(scenario.as_deref(), config, options).await?;
            let json = serde_json::to_string_pretty(&report).map_err(|e| {
                CuetideError::Scenario {
                    reason: format!("failed to serialize report: {e}"),
                }
            })?;
            println!("{json}");
            Ok(())
        }
    }
}

/// Print a summary of every track in a scenario
///
/// # Errors
/// - `CuetideError::Io` - Scenario file could not be read
/// - `CuetideError::Scenario` - Scenario file is malformed or invalid
pub fn inspect_scenario(path: &Path) -> Result<()> {
    let scenario = Scenario::load(path)?;

    println!("Scenario: {}", scenario.name);
    println!("  Base URL: {}", scenario.base_url);
    println!("  Duration: {:.1}s", scenario.duration());
    for (index, track) in scenario.tracks.iter().enumerate() {
        println!(
            "  [{index}] {} ({}) {} x {:.1}s{}{}",
            track.name,
            track.language.as_deref().unwrap_or("und"),
            track.fragment_count,
            track.fragment_duration,
            if track.default { ", default" } else { "" },
            if track.encrypted { ", encrypted" } else { "" },
        );
    }

    Ok(())
}

/// Run one simulated session
///
/// # Errors
/// - `CuetideError::Configuration` - Invalid configuration values
/// - `CuetideError::Scenario` - Unreadable scenario or unknown track
/// - `CuetideError::Stream` - Stream engine stopped unexpectedly
pub async fn simulate(
    scenario: Option<&Path>,
    config: CuetideConfig,
    options: SessionOptions,
) -> Result<SessionReport> {
    config.validate()?;

    let scenario = match scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::sample(),
    };

    let report = run_session(&scenario, &config, &options).await?;
    if let Some(fatal) = &report.fatal {
        tracing::warn!(%fatal, "Session ended with a fatal stream error");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use cuetide_core::config::SimulationConfig;

    use super::*;

    fn config() -> CuetideConfig {
        CuetideConfig {
            simulation: SimulationConfig::deterministic_testing(),
            ..CuetideConfig::default()
        }
    }

    #[test]
    fn test_inspect_reads_scenario_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        std::fs::write(&path, serde_json::to_string(&Scenario::sample()).unwrap()).unwrap();

        assert!(inspect_scenario(&path).is_ok());
    }

    #[test]
    fn test_inspect_missing_file_is_io_error() {
        let result = inspect_scenario(Path::new("/nonexistent/scenario.json"));

        assert!(matches!(result, Err(CuetideError::Io(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulate_sample_scenario() {
        let report = simulate(None, config(), SessionOptions::default())
            .await
            .unwrap();

        assert_eq!(report.seed, 42);
        assert!(report.fatal.is_none());
        assert!(!report.fragments_buffered.is_empty());
    }

    #[tokio::test]
    async fn test_simulate_rejects_invalid_config() {
        let mut config = config();
        config.simulation.load_failure_rate = 2.0;

        let result = simulate(None, config, SessionOptions::default()).await;

        assert!(matches!(result, Err(CuetideError::Configuration { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulate_unknown_track_is_user_error() {
        let options = SessionOptions {
            track: TrackId(9),
            ..SessionOptions::default()
        };

        let error = simulate(None, config(), options).await.unwrap_err();

        assert!(error.is_user_error());
    }
}
