use anyhow::Context;
use clap::Parser;
use docflow_client::{DocumentApiClient, GeminiClient, S3ObjectStore};
use docflow_core::WorkerKind;
use docflow_worker::{
    AckPolicy, BinaryContentSource, ContentSource, MetadataSource, OcrTransformer, Summarizer,
    TextContentSource, Transformer, Worker, WorkerConfig,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "df-worker")]
#[command(about = "Document processing worker", long_about = None)]
struct Args {
    /// Worker kind: ocr or summary (alias genai)
    #[arg(short, long, env = "DOCFLOW_WORKER_KIND")]
    kind: WorkerKind,

    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Broker host, overrides configuration
    #[arg(long)]
    broker_host: Option<String>,

    /// Document API base URL, overrides configuration
    #[arg(long)]
    api_url: Option<String>,

    /// When deliveries are acknowledged
    #[arg(long, value_parser = parse_ack_policy)]
    ack_policy: Option<AckPolicy>,

    /// Log level filter, overridden by RUST_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn parse_ack_policy(value: &str) -> Result<AckPolicy, String> {
    match value {
        "on_receive" => Ok(AckPolicy::OnReceive),
        "after_processing" => Ok(AckPolicy::AfterProcessing),
        "after_confirmed_publish" => Ok(AckPolicy::AfterConfirmedPublish),
        other => Err(format!(
            "unknown ack policy {other:?} \
             (expected on_receive, after_processing or after_confirmed_publish)"
        )),
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} worker: {:#}", args.kind, e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.monitoring.log_level, config.monitoring.json_logs);

    if let Err(e) = run(args.kind, config).await {
        tracing::error!(error = %format!("{:#}", e), "Worker failed");
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> anyhow::Result<WorkerConfig> {
    let mut config = WorkerConfig::load(args.config.as_deref())?;

    if let Some(host) = &args.broker_host {
        config.broker.host = host.clone();
    }
    if let Some(url) = &args.api_url {
        config.api.base_url = url.clone();
    }
    if let Some(policy) = args.ack_policy {
        config.pipeline.ack_policy = policy;
    }
    if let Some(level) = &args.log_level {
        config.monitoring.log_level = level.clone();
    }
    if args.json_logs {
        config.monitoring.json_logs = true;
    }

    config.validate(args.kind)?;
    Ok(config)
}

async fn run(kind: WorkerKind, config: WorkerConfig) -> anyhow::Result<()> {
    let api: Arc<dyn MetadataSource> = Arc::new(
        DocumentApiClient::new(
            config.api.base_url.clone(),
            config.api.timeout(),
            config.api.retry_policy(),
        )
        .context("building document API client")?,
    );

    let (source, transformer): (Arc<dyn ContentSource>, Arc<dyn Transformer>) = match kind {
        WorkerKind::Ocr => {
            let store = S3ObjectStore::new(&config.storage.s3_settings())
                .context("building object storage client")?;
            (
                Arc::new(BinaryContentSource::new(api, Arc::new(store))),
                Arc::new(OcrTransformer::from_settings(&config.ocr)),
            )
        }
        WorkerKind::Summary => {
            let generator =
                GeminiClient::new(&config.genai.gemini_settings(), config.genai.retry_policy())
                    .context("building Gemini client")?;
            (
                Arc::new(TextContentSource::new(api)),
                Arc::new(Summarizer::new(Arc::new(generator))),
            )
        }
    };

    let worker = Worker::new(kind, config, source, transformer);

    let shutdown = worker.shutdown_token();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal");
        shutdown.cancel();
    });

    worker.run().await?;
    Ok(())
}
