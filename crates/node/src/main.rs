// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexPay.
//
// PlexPay is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexPay is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexPay. If not, see <https://www.gnu.org/licenses/>.

//! PlexPay node entry point: assemble the engine and serve ingress until a
//! shutdown signal arrives.

use std::sync::Arc;

use anyhow::Context;
use plexpay_balancer::{BalancerConfig, LoadBalancer};
use plexpay_client::HttpProcessorClient;
use plexpay_dispatcher::{DispatcherConfig, WorkDispatcher};
use plexpay_node::config::NodeConfig;
use plexpay_node::http_router::{router, AppState};
use plexpay_node::tracing_setup;
use plexpay_store::{PaymentStore, RedisPaymentStore};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_setup::init_tracing().map_err(|e| anyhow::anyhow!(e))?;

    let config = NodeConfig::from_env();

    let store = Arc::new(
        RedisPaymentStore::connect(&config.redis_url, config.redis_pool_size)
            .await
            .context("failed to connect to redis")?,
    );
    store.ping().await.context("redis ping failed")?;

    let client = Arc::new(
        HttpProcessorClient::new(config.default_url.clone(), config.fallback_url.clone())
            .context("failed to build upstream client")?,
    );
    let balancer = Arc::new(LoadBalancer::new(client, BalancerConfig::from_env()));

    WorkDispatcher::new(
        Arc::clone(&balancer),
        Arc::clone(&store) as Arc<dyn PaymentStore>,
        DispatcherConfig::from_env(),
    )
    .start();

    let app = router(AppState {
        store: store as Arc<dyn PaymentStore>,
    });
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "ingress listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("ingress server failed")?;
    info!("received shutdown signal, ingress stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
