use crate::chdb::MemoryChDb;
use crate::cli::{Commands, OutputFormat};
use crate::config::RessyncConfig;
use crate::metrics::{Metrics, PrometheusExporter};
use crate::pipeline::{Pipeline, Scenario, ScenarioSource};
use crate::recorder::CycleSummary;
use crate::tagrecorder::ChDump;
use crate::Result;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Replay {
            scenario,
            config,
            format,
            metrics,
            pace_ms,
            realtime,
        } => {
            let options = ReplayOptions {
                format,
                metrics,
                pace_ms,
                realtime,
            };
            handle_replay(scenario, config, options).await
        }
        Commands::Config { config } => handle_config(config.as_deref()),
    }
}

struct ReplayOptions {
    format: OutputFormat,
    metrics: bool,
    pace_ms: Option<u64>,
    realtime: bool,
}

impl ReplayOptions {
    fn pace(&self, config: &RessyncConfig) -> Duration {
        match self.pace_ms {
            Some(ms) => Duration::from_millis(ms),
            None if self.realtime => config.cycle_interval(),
            None => Duration::ZERO,
        }
    }
}

#[derive(Serialize)]
struct ReplayReport {
    cycles: Vec<CycleSummary>,
    tables: ChDump,
}

async fn handle_replay(
    scenario_path: PathBuf,
    config_path: Option<PathBuf>,
    options: ReplayOptions,
) -> Result<()> {
    let config = RessyncConfig::load(config_path.as_deref())?;
    let scenario = Scenario::load(&scenario_path).await?;
    info!(
        "Replaying {} cycles for {}",
        scenario.cycles.len(),
        scenario.metadata
    );

    let metrics = Arc::new(Metrics::new()?);
    let store = Arc::new(MemoryChDb::new());
    let mut pipeline = Pipeline::new(scenario.metadata, &config, store, metrics.clone());
    let mut source = ScenarioSource::new(scenario.cycles);

    let cycles = pipeline
        .run(&mut source, options.pace(&config), shutdown_signal())
        .await?;

    let report = ReplayReport {
        cycles,
        tables: pipeline.tag_recorder().dump()?,
    };
    print!("{}", render(&report, options.format)?);

    if options.metrics {
        let exporter = PrometheusExporter::new(metrics);
        print!("{}", exporter.format_current_metrics()?);
    }
    Ok(())
}

/// Resolves on Ctrl-C. Without a signal handler it never resolves, so the
/// replay runs to the end of the scenario.
async fn shutdown_signal() {
    until_signal(tokio::signal::ctrl_c()).await
}

async fn until_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn handle_config(config_path: Option<&Path>) -> Result<()> {
    let config = RessyncConfig::load(config_path)?;
    info!("Cycle interval: {:?}", config.cycle_interval());
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)? + "\n"),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        name: &'static str,
    }

    #[test]
    fn test_replay_pace() {
        let config = RessyncConfig::default();
        let mut options = ReplayOptions {
            format: OutputFormat::Yaml,
            metrics: false,
            pace_ms: None,
            realtime: false,
        };
        assert_eq!(options.pace(&config), Duration::ZERO);

        options.realtime = true;
        assert_eq!(options.pace(&config), Duration::from_secs(60));

        options.pace_ms = Some(250);
        assert_eq!(options.pace(&config), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_signal_resolves_shutdown() {
        let done = tokio::time::timeout(
            Duration::from_millis(100),
            until_signal(std::future::ready(Ok(()))),
        )
        .await;
        assert!(done.is_ok());
    }

    #[tokio::test]
    async fn test_failed_signal_handler_never_shuts_down() {
        let failed = std::future::ready(Err(std::io::Error::other("no handler")));
        let done = tokio::time::timeout(Duration::from_millis(50), until_signal(failed)).await;
        assert!(done.is_err());
    }

    #[test]
    fn test_render_formats() {
        let sample = Sample { name: "east" };
        assert_eq!(
            render(&sample, OutputFormat::Json).unwrap(),
            "{\n  \"name\": \"east\"\n}\n"
        );
        assert_eq!(render(&sample, OutputFormat::Yaml).unwrap(), "name: east\n");
    }
}
