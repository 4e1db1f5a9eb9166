//! Local server bootstrap utilities
//!
//! The listener is bound once and handed to the server as-is, so no other
//! process can grab the port between probing and serving.

use anyhow::{Context, Result};
use std::io;
use std::net::{SocketAddr, TcpListener, UdpSocket};
use tokio::task::JoinHandle;

use crate::common::config::DEFAULT_PORT;

/// Address exposure policy for the listening socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindScope {
    Loopback,
    AllInterfaces,
}

pub fn bind_addr(scope: BindScope, port: u16) -> SocketAddr {
    match scope {
        BindScope::Loopback => SocketAddr::from(([127, 0, 0, 1], port)),
        BindScope::AllInterfaces => SocketAddr::from(([0, 0, 0, 0], port)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error(
        "no free port starting at {start} ({attempts} tried).\n\n\
         Is another ferrydrop instance running?\n\
         Or is another service using these ports?"
    )]
    NoFreePort { start: u16, attempts: u16 },
}

/// Bind the first free port in `preferred..preferred + attempts`.
/// A preferred port of 0 means [`DEFAULT_PORT`].
pub fn bind_available(
    scope: BindScope,
    preferred: u16,
    attempts: u16,
) -> Result<TcpListener, BindError> {
    let start = if preferred == 0 { DEFAULT_PORT } else { preferred };
    let attempts = attempts.max(1);

    for offset in 0..attempts {
        let Some(port) = start.checked_add(offset) else {
            break;
        };
        match TcpListener::bind(bind_addr(scope, port)) {
            Ok(listener) => {
                if offset > 0 {
                    tracing::info!(port, preferred = start, "preferred port busy, using next free one");
                }
                return Ok(listener);
            }
            Err(err) => tracing::debug!(port, error = %err, "port unavailable"),
        }
    }

    Err(BindError::NoFreePort { start, attempts })
}

/// Serve `app` on an already bound listener in a background task.
///
/// Returns the bound port and the serve task, which resolves when the
/// listener stops (after graceful shutdown via `handle`, or on error).
pub fn start_local_server(
    app: axum::Router,
    listener: TcpListener,
    handle: axum_server::Handle,
) -> Result<(u16, JoinHandle<io::Result<()>>)> {
    listener
        .set_nonblocking(true)
        .context("Failed to set listener to non-blocking mode")?;

    let port = listener
        .local_addr()
        .context("Failed to read bound address")?
        .port();

    let task = tokio::spawn(async move {
        axum_server::from_tcp(listener)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
    });

    Ok((port, task))
}

/// Best-effort local non-loopback IP discovery for the share URL.
pub fn get_local_ip() -> Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to bind socket for IP detection")?;

    socket
        .connect("8.8.8.8:80")
        .context("Failed to connect socket for IP detection")?;

    let local_addr = socket.local_addr().context("Failed to get local address")?;

    Ok(local_addr.ip().to_string())
}
