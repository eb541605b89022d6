#![allow(warnings)]

use clap::Parser;
use color_eyre::eyre;
use opentelemetry::trace::TracerProvider as TracerProviderTrait;
use opentelemetry_sdk::trace::TracerProvider;
use otel_stage_component::factory::ProcessorFactory;
use otel_stage_component::pdata::{KeyValue, Resource, ResourceSpans, Scope, ScopeSpans, Span, Traces};
use otel_stage_component::telemetry::TelemetrySettings;
use otel_stage_component::{Component, ConsumeError, ConsumeTraces, Context};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;

pub const APPLICATION_NAME: &'static str = "otel-batch-stage";

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = eyre::Report;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("json") => Ok(LogFormat::Json),
            s if s.eq_ignore_ascii_case("pretty") => Ok(LogFormat::Pretty),
            other => Err(eyre::eyre!("unknown log format: {other:?}")),
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Options {
    #[arg(long = "log", env = "LOG_LEVEL", aliases = ["log-level"],  help = "Log level. When using a more sophisticated logging setup using RUST_LOG environment variable, this option is overwritten.")]
    pub log_level: Option<tracing::metadata::Level>,

    #[arg(
        long = "log-format",
        env = "LOG_FORMAT",
        help = "Log format (json or pretty)"
    )]
    pub log_format: Option<LogFormat>,

    #[arg(short = 'c', long = "config", env = "CONFIG", aliases = ["conf"],  help = "Path to YAML config file")]
    pub config_path: Option<PathBuf>,
}

struct TelemetryOptions {
    application_name: &'static str,
    log_level: Option<tracing::metadata::Level>,
    log_format: Option<LogFormat>,
}

fn setup_telemetry(options: &TelemetryOptions) -> eyre::Result<()> {
    let provider = TracerProvider::builder().build();
    let tracer = provider.tracer(options.application_name);

    // create a tracing layer with the configured tracer
    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

    let default_log_level = options.log_level.unwrap_or(tracing::metadata::Level::INFO);
    let default_log_directive = format!(
        "none,otel_={}",
        default_log_level.to_string().to_ascii_lowercase()
    );
    let default_env_filter = tracing_subscriber::filter::EnvFilter::builder()
        .with_regex(true)
        .with_default_directive(default_log_level.into())
        .parse(default_log_directive)?;

    let env_filter_directive = std::env::var("RUST_LOG").ok();
    let env_filter = match env_filter_directive {
        Some(directive) => {
            match tracing_subscriber::filter::EnvFilter::builder()
                .with_env_var(directive)
                .try_from_env()
            {
                Ok(env_filter) => env_filter,
                Err(err) => {
                    eprintln!("invalid log filter: {err}");
                    eprintln!("falling back to default logging");
                    default_env_filter
                }
            }
        }
        None => default_env_filter,
    };

    // autodetect logging format
    let log_format = options.log_format.unwrap_or_else(|| {
        if atty::is(atty::Stream::Stdout) {
            // terminal
            LogFormat::Pretty
        } else {
            // not a terminal
            LogFormat::Json
        }
    });

    let fmt_layer_pretty = tracing_subscriber::fmt::Layer::new()
        .compact()
        .with_writer(std::io::stdout);
    let fmt_layer_json = tracing_subscriber::fmt::Layer::new()
        .json()
        .compact()
        .with_writer(std::io::stdout);

    let subscriber = tracing_subscriber::registry()
        .with(telemetry)
        .with(if log_format == LogFormat::Json {
            Some(fmt_layer_json)
        } else {
            None
        })
        .with(if log_format == LogFormat::Pretty {
            Some(fmt_layer_pretty)
        } else {
            None
        })
        .with(env_filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Terminal consumer that logs each batch it receives.
#[derive(Debug, Default)]
struct LoggingSink {}

#[async_trait::async_trait]
impl ConsumeTraces for LoggingSink {
    async fn consume_traces(&self, _ctx: &Context, traces: Traces) -> Result<(), ConsumeError> {
        info!(spans = traces.span_count(), "exporting batch");
        Ok(())
    }
}

/// Builds a small synthetic trace payload, tagged with its sequence number.
fn sample_traces(sequence_number: u64, spans: usize) -> Traces {
    Traces {
        resource_spans: vec![ResourceSpans {
            resource: Resource::new([KeyValue::new("service.name", APPLICATION_NAME)]),
            scope_spans: vec![ScopeSpans {
                scope: Scope::new(APPLICATION_NAME),
                spans: (0..spans)
                    .map(|i| Span {
                        name: format!("operation-{i}"),
                        attributes: vec![KeyValue::new(
                            "sequence_number",
                            sequence_number as i64,
                        )],
                        ..Span::default()
                    })
                    .collect(),
            }],
        }],
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // parse config
    let options = Options::parse();

    setup_telemetry(&TelemetryOptions {
        application_name: APPLICATION_NAME,
        log_level: options.log_level,
        log_format: options.log_format,
    })?;

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.unwrap();
        warn!("received ctrl-c");
        info!("initiate graceful shutdown");
        shutdown_tx.send(true).unwrap();
    });

    let mut config = if let Some(path) = options.config_path {
        otel_stage_component::config::Config::from_file(path)?
    } else {
        otel_stage_component::config::Config::default()
    };

    let settings = TelemetrySettings {
        metrics_level: config.telemetry.metrics_level,
        ..TelemetrySettings::default()
    };
    let batch_config = config
        .processors
        .processors
        .remove("batch")
        .unwrap_or_else(|| serde_yaml::Value::Mapping(Default::default()));

    let factory = otel_batch_processor::Factory::default();
    let processor = factory
        .create_traces(
            "batch".to_string(),
            settings,
            batch_config,
            Arc::new(LoggingSink::default()),
        )
        .await?;
    processor.start().await?;

    // feed the stage until shutdown is requested
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut sequence_number = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => (),
            _ = shutdown_rx.changed() => break,
        };
        tracing::debug!("sending sequence number {sequence_number}");
        if let Err(err) = processor
            .consume_traces(&Context::default(), sample_traces(sequence_number, 10))
            .await
        {
            warn!("failed to submit payload: {err}");
        }
        sequence_number += 1;
    }

    processor.shutdown().await?;
    Ok(())
}
