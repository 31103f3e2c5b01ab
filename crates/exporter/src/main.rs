use clap::Parser;
use cx_data_client::make_data_client_ref;
use cx_data_client::reqwest::ReqwestDataClient;
use cx_exporter::cli::Cli;
use cx_exporter::server::run_server;
use cx_exporter::{create_sink, metrics, Exporter};
use prometheus_client::registry::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};


fn init_logging(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::builder().parse_lossy(
        std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV)
            .unwrap_or("info".to_string()),
    );

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}


fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    init_logging(args.json_log);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(args))
}


async fn run(args: Cli) -> anyhow::Result<()> {
    let config = args.export_config();
    config.validate()?;

    if let Some(port) = args.prom_port {
        let mut registry = Registry::default();
        metrics::register_metrics(&mut registry);
        tokio::spawn(async move {
            if let Err(err) = run_server(registry, port).await {
                error!("metrics server failed: {:#}", err);
            }
        });
    }

    let client = ReqwestDataClient::from_url(args.rpc.clone())?
        .with_max_retries(args.rpc_retries);

    let mut sinks = Vec::with_capacity(args.sinks.len());
    for spec in args.sinks.iter() {
        sinks.push(create_sink(spec).await?);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("shutdown requested, finishing pending writes");
            cancel.cancel();
        }
    });

    Exporter::new(config, make_data_client_ref(client), sinks)
        .with_cancellation(cancel)
        .run()
        .await?;

    Ok(())
}


async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
