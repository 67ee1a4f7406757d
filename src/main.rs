use clap::Parser;
use sse_sentinel::{
    bootstrap::{default_filter, init_tracing},
    config::unix_seconds,
    BearerToken, Config, EventListener, StatusServer, TracingSink,
};
use tracing::{debug, info, warn};

/// Listen to a server-sent-events stream in the background while serving a
/// status page in the foreground.
///
/// Every option falls back to its environment variable, then to a default.
#[derive(Parser, Debug)]
#[command(name = "sse-sentinel", version, about)]
struct Cli {
    /// Event stream URL [env: SSE_URL]
    #[arg(long)]
    url: Option<String>,

    /// Bearer token for the stream [env: SSE_TOKEN]
    #[arg(long)]
    token: Option<String>,

    /// Status server bind address [env: HOST]
    #[arg(long)]
    host: Option<String>,

    /// Status server port [env: PORT]
    #[arg(long, short)]
    port: Option<u16>,

    /// Body served on `GET /` [env: STATUS_BODY]
    #[arg(long)]
    status_body: Option<String>,

    /// Reconnection attempts before giving up [env: SSE_MAX_RETRIES]
    #[arg(long)]
    max_retries: Option<u32>,

    /// Verbose logging [env: DEBUG]
    #[arg(long, short)]
    debug: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(url) = self.url {
            config.listener.url = url;
        }
        if let Some(token) = self.token {
            config.listener.token = Some(BearerToken::new(token));
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(body) = self.status_body {
            config.status_body = body;
        }
        if let Some(max_retries) = self.max_retries {
            config.listener.max_retries = max_retries;
        }
        config.debug |= self.debug;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = Config::from_env();
    cli.apply(&mut config);

    init_tracing(default_filter(config.debug));

    match &config.listener.token {
        None => warn!("no bearer token configured, connecting without Authorization"),
        Some(token) if token.is_expired() => warn!(
            expired_at = token.expires_at().map(unix_seconds),
            "bearer token already expired, the stream will likely reject it"
        ),
        Some(_) => {}
    }

    let listener = EventListener::new(config.listener.clone(), TracingSink)?.spawn();
    info!(url = %config.listener.url, "event listener started");

    StatusServer::new(&config, listener.state())
        .serve(shutdown_signal())
        .await?;

    // Terminal listener failures were already reported when they happened.
    if let Err(err) = listener.shutdown().await {
        debug!(error = %err, "event listener had already stopped");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
