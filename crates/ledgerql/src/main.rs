mod cli;
mod server;

use std::sync::Arc;

use clap::Parser;
use eyre::{eyre, WrapErr};

use ledgerql_core::rpc::{HttpRpcClient, RpcClient};
use ledgerql_core::types::QueryConfig;
use ledgerql_core::{ContextConfig, ExpandLimits, ResolutionCache};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    // Connect to the node and verify it answers before starting the server.
    let transport = HttpRpcClient::new(
        &args.rpc_url,
        args.rpc_user.as_deref(),
        args.rpc_pass.as_deref(),
        args.rpc_requests_per_second,
    )
    .context("configure RPC client")?;
    let rpc = RpcClient::new(Arc::new(transport));

    let slot = rpc.get_slot(&QueryConfig::new()).await.map_err(|err| {
        let message = format_rpc_connect_error(&args.rpc_url, &err.to_string());
        eyre!(message).wrap_err("while attempting to connect to the JSON-RPC node")
    })?;
    tracing::info!(%slot, "connected to JSON-RPC node");

    let context_config = ContextConfig {
        cache_capacity: args.cache_capacity,
        cache_not_found: args.cache_not_found,
    };
    let shared_cache = args
        .shared_cache
        .then(|| Arc::new(ResolutionCache::with_capacity(args.cache_capacity)));
    if shared_cache.is_some() {
        tracing::info!(
            capacity = args.cache_capacity,
            "sharing one resolution cache across requests"
        );
    }

    let state = server::AppState {
        rpc,
        context_config,
        shared_cache,
        expand_limits: ExpandLimits {
            max_depth: args.max_expand_depth,
            max_fields: args.max_expand_fields,
        },
        enable_block_queries: args.enable_block_queries,
    };

    let bind_addr = format!("{}:{}", args.bind, args.port);
    let origin = format!("http://{}:{}", args.bind, args.port);
    let router = server::build_router(state, &origin)?;

    if args.bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0, it is accessible from the network");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("run HTTP server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutting down");
}

fn format_rpc_connect_error(rpc_url: &str, source_error: &str) -> String {
    let mut lines = vec![
        format!("could not connect to RPC endpoint `{rpc_url}`"),
        format!("RPC error: {source_error}"),
    ];

    if source_error.contains("dns error") || source_error.contains("failed to lookup address") {
        lines.push(
            "hint: hostname resolution failed; verify the endpoint hostname and your DNS/network"
                .into(),
        );
    } else if source_error.contains("tls") || source_error.contains("certificate") {
        lines.push(
            "hint: TLS handshake failed; verify certificate trust and that the endpoint uses HTTPS"
                .into(),
        );
    } else if source_error.contains("401") || source_error.contains("403") {
        lines.push(
            "hint: authentication failed; verify token-in-URL or --rpc-user/--rpc-pass".into(),
        );
    } else if source_error.contains("404") {
        lines.push(
            "hint: endpoint path is invalid; verify the full RPC URL including token path".into(),
        );
    } else if source_error.contains("429") {
        lines.push("hint: the node is rate limiting; lower --rpc-requests-per-second".into());
    } else if source_error.contains("error sending request for url") {
        lines.push("hint: request could not be sent; verify URL format, network access, and endpoint reachability".into());
    }

    lines.join("\n")
}
