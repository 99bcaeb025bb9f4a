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

//! Status-code mapping tests against a live local HTTP server.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use plexpay_client::{ClientError, HttpProcessorClient, PostOutcome, ProcessorClient};
use plexpay_common::ProcessorKind;

async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn client_for(addr: SocketAddr, path: &str) -> HttpProcessorClient {
    let url = format!("http://{addr}{path}");
    // Point both processors at the same endpoint; tests only use Default.
    HttpProcessorClient::new(url.clone(), url).expect("build client")
}

fn test_routes() -> Router {
    Router::new()
        .route("/ok", post(|| async { StatusCode::OK }))
        .route("/already", post(|| async { StatusCode::UNPROCESSABLE_ENTITY }))
        .route("/boom", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/teapot", post(|| async { StatusCode::IM_A_TEAPOT }))
        .route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                StatusCode::OK
            }),
        )
}

#[tokio::test]
async fn test_2xx_is_delivered_with_elapsed_time() {
    let addr = spawn_server(test_routes()).await;
    let client = client_for(addr, "/ok");

    let outcome = client
        .post_payment(ProcessorKind::Default, b"{}", Duration::from_secs(1))
        .await
        .expect("delivered");

    match outcome {
        PostOutcome::Delivered(nanos) => assert!(nanos > 0, "elapsed time must be measured"),
        other => panic!("expected Delivered, got {other:?}"),
    }
}

#[tokio::test]
async fn test_422_is_already_processed() {
    let addr = spawn_server(test_routes()).await;
    let client = client_for(addr, "/already");

    let outcome = client
        .post_payment(ProcessorKind::Default, b"{}", Duration::from_secs(1))
        .await
        .expect("terminal success");

    assert_eq!(outcome, PostOutcome::AlreadyProcessed);
}

#[tokio::test]
async fn test_500_is_server_error() {
    let addr = spawn_server(test_routes()).await;
    let client = client_for(addr, "/boom");

    let err = client
        .post_payment(ProcessorKind::Default, b"{}", Duration::from_secs(1))
        .await
        .expect_err("server error");

    assert!(matches!(err, ClientError::ServerError), "got {err:?}");
}

#[tokio::test]
async fn test_other_status_is_unexpected() {
    let addr = spawn_server(test_routes()).await;
    let client = client_for(addr, "/teapot");

    let err = client
        .post_payment(ProcessorKind::Default, b"{}", Duration::from_secs(1))
        .await
        .expect_err("unexpected status");

    assert!(matches!(err, ClientError::UnexpectedStatus(418)), "got {err:?}");
}

#[tokio::test]
async fn test_deadline_maps_to_timeout() {
    let addr = spawn_server(test_routes()).await;
    let client = client_for(addr, "/slow");

    let err = client
        .post_payment(ProcessorKind::Default, b"{}", Duration::from_millis(50))
        .await
        .expect_err("timeout");

    assert!(matches!(err, ClientError::Timeout), "got {err:?}");
}

#[tokio::test]
async fn test_connection_refused_is_transport() {
    // Bind then drop a listener so the port is very likely unoccupied.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let client = client_for(addr, "/ok");
    let err = client
        .post_payment(ProcessorKind::Default, b"{}", Duration::from_secs(1))
        .await
        .expect_err("transport failure");

    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
}
