use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use regdocs_core::{build_index, ChatCompletionsSynthesizer, CorpusConfig, Synthesizer};
use server::build_app;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "regdocs-server")]
#[command(about = "Serve search and answer synthesis over the configured document corpus", long_about = None)]
struct Args {
    /// Corpus configuration (TOML)
    #[arg(long, default_value = "./corpus.toml")]
    config: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Serve search only, without the answer synthesizer
    #[arg(long, default_value_t = false)]
    no_synthesis: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = CorpusConfig::from_path(&args.config)?;

    // Build before binding so no request ever sees a partial index
    let built = tokio::task::spawn_blocking({
        let config = config.clone();
        move || build_index(&config)
    })
    .await
    .context("index build task panicked")??;
    for failure in &built.report.failures {
        tracing::warn!(error = %failure, "source skipped");
    }

    let synthesizer: Option<Arc<dyn Synthesizer>> = if args.no_synthesis {
        None
    } else {
        Some(Arc::new(ChatCompletionsSynthesizer::from_config(config.synthesis.clone())?))
    };
    let app: Router = build_app(built.index, synthesizer);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
