use anyhow::Result;
use cancer_predict::{
    config::{Config, StoreConfig, StoreKind},
    web::serve,
};
use clap::{Parser, ValueEnum};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum StoreArg {
    Memory,
    Firestore,
    #[value(name = "none")]
    Disabled,
}

impl From<StoreArg> for StoreKind {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Memory => StoreKind::Memory,
            StoreArg::Firestore => StoreKind::Firestore,
            StoreArg::Disabled => StoreKind::Disabled,
        }
    }
}

#[derive(Parser)]
#[command(name = "cancer-predict")]
#[command(about = "ONNX-powered cancer image classification service")]
struct Args {
    /// Server bind host
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Server port
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Model location: path, file://, http(s):// or gs://bucket/object (read with the instance service account)
    #[arg(long, env = "MODEL_URL")]
    model_url: Option<String>,

    /// Number of worker threads
    #[arg(long, env = "WORKERS")]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Prediction store backend
    #[arg(long, env = "PREDICTION_STORE", value_enum, default_value = "memory")]
    store: StoreArg,

    /// Firestore project id
    #[arg(long, env = "FIRESTORE_PROJECT_ID")]
    firestore_project: Option<String>,

    /// Firestore database id
    #[arg(long, env = "FIRESTORE_DATABASE", default_value = "(default)")]
    firestore_database: String,

    /// Static Firestore access token; the metadata server is used when absent
    #[arg(long, env = "FIRESTORE_ACCESS_TOKEN", hide_env_values = true)]
    firestore_token: Option<String>,

    /// Inference timeout in seconds
    #[arg(long, env = "INFERENCE_TIMEOUT_SECS", default_value_t = 30)]
    inference_timeout_secs: u64,

    /// Prometheus exporter address; metrics are not exported when absent
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    /// Enable development mode
    #[arg(long)]
    dev: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志系统
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    let metrics_addr = args.metrics_addr;

    let store_config = StoreConfig {
        kind: args.store.into(),
        firestore_project: args.firestore_project,
        firestore_database: args.firestore_database,
        firestore_token: args.firestore_token,
        ..StoreConfig::default()
    };

    // 创建配置
    let config = Config::new(
        format!("{}:{}", args.host, args.port),
        args.model_url,
        args.workers,
        args.dev,
    )?
    .with_store(store_config)?
    .with_inference_timeout(Duration::from_secs(args.inference_timeout_secs.max(1)));

    tracing::info!("Starting cancer prediction service...");
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        "Model source: {}",
        config.model_source.as_deref().unwrap_or("<not configured>")
    );
    tracing::info!("Worker threads: {}", config.workers);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(async {
        if let Some(addr) = metrics_addr {
            PrometheusBuilder::new().with_http_listener(addr).install()?;
            tracing::info!("Metrics exporter listening on http://{}/metrics", addr);
        }

        // 启动服务器
        serve(config).await?;
        Ok::<_, anyhow::Error>(())
    })?;

    Ok(())
}
