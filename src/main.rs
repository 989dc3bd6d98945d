// src/main.rs

use clap::{Parser, ValueEnum};
use monad_mcp_server::{
    api,
    blockchain::client::ChainClient,
    config::Config,
    mcp::{
        handler::handle_mcp_request,
        protocol::{error_codes, Request, Response},
    },
    AppState,
};
use std::net::SocketAddr;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Monad testnet MCP server
#[derive(Parser, Debug)]
#[command(name = "monad_mcp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Transport mechanism to use
    #[arg(short, long, value_enum, default_value = "stdio")]
    transport: Transport,

    /// Port for the HTTP transport, overrides PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Chain id, overrides CHAIN_ID. Only the first value is used.
    #[arg(long = "chain-id")]
    chain_id: Vec<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
    /// axum HTTP server with `/api/rpc`
    Http,
}

// --- HTTP Server Logic ---
async fn run_http_server(state: AppState) -> anyhow::Result<()> {
    let port = state.config.port;
    let app = api::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("🚀 HTTP Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

// --- MCP Server Logic ---
async fn run_mcp_server(state: AppState) {
    info!("🚀 Starting MCP server on stdin/stdout...");

    let mut stdin = io::BufReader::new(io::stdin());
    let mut stdout = io::stdout();

    loop {
        let mut line = String::new();

        match stdin.read_line(&mut line).await {
            Ok(0) => {
                info!("EOF received, shutting down MCP server");
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                debug!("Received: {}", line);

                let response = match serde_json::from_str::<Request>(line) {
                    Ok(request) => handle_mcp_request(request, state.clone()).await,
                    Err(parse_error) => {
                        error!("JSON parse error: {}", parse_error);
                        Some(Response::error(
                            serde_json::Value::Null,
                            error_codes::PARSE_ERROR,
                            format!("Parse error: {}", parse_error),
                        ))
                    }
                };

                if let Some(response) = response {
                    if let Ok(response_json) = serde_json::to_string(&response) {
                        debug!("Sending: {}", response_json);
                        let written = stdout.write_all(format!("{}\n", response_json).as_bytes()).await;
                        if let Err(e) = written.and(stdout.flush().await) {
                            error!("Failed to write response: {}", e);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to read from stdin: {}", e);
                break;
            }
        }
    }

    info!("MCP server shutting down");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing on stderr; stdout carries the stdio transport
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "monad_mcp_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(chain_id) = cli.chain_id.first() {
        config.chain_id = *chain_id;
    }

    for (var, tools) in config.missing_credentials() {
        warn!("{} is not set; unavailable: {}", var, tools);
    }

    // The node must answer before any tool is served
    let chain = match ChainClient::connect(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("❌ Failed to connect to the Monad RPC node: {:#}", e);
            std::process::exit(1);
        }
    };

    let app_state = match AppState::new(config, chain) {
        Ok(state) => state,
        Err(e) => {
            error!("❌ Failed to initialize application state: {:#}", e);
            std::process::exit(1);
        }
    };

    match cli.transport {
        Transport::Stdio => run_mcp_server(app_state).await,
        Transport::Http => {
            if let Err(e) = run_http_server(app_state).await {
                error!("❌ HTTP server error: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}
