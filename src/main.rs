// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, net::SocketAddr, path::PathBuf};

use tokio_util::sync::CancellationToken;

use identity_link_server::api::router;
use identity_link_server::config::{self, ProviderConfig};
use identity_link_server::link::{LinkDatabase, LinkService};
use identity_link_server::state::AppState;

#[tokio::main]
async fn main() {
    init_tracing();

    // Provider configuration is loaded once; an incomplete configuration
    // leaves the service running but failing every link call fast.
    let state = match ProviderConfig::from_env() {
        Some(provider) => {
            let data_dir = env::var(config::DATA_DIR_ENV).unwrap_or_else(|_| "data".to_string());
            let db_path = PathBuf::from(data_dir).join("links.redb");
            let db = LinkDatabase::open(&db_path).expect("Failed to open link database");

            let service = LinkService::new(provider.verifier(), db)
                .with_call_timeout(provider.call_timeout);
            AppState::new(service)
        }
        None => {
            tracing::warn!("provider not configured; /v1/link will return Not configured");
            AppState::unconfigured()
        }
    };

    let app = router(state);

    let host = env::var(config::HOST_ENV).unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var(config::PORT_ENV)
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!("identity link server listening on http://{addr} (docs at /docs)");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .expect("HTTP server failed");
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let json = env::var(config::LOG_FORMAT_ENV)
        .map(|v| v == "json")
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
