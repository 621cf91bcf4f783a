use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Error};
use async_trait::async_trait;
use axum::Router;
use tokio::{
    net::{TcpListener, TcpSocket},
    select,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::tasks::Run;

// Listens for new connections on addr and serves provided Router
pub struct Server {
    addr: SocketAddr,
    backlog: u32,
    router: Router,
    grace_period: Duration,
}

impl Server {
    pub const fn new(
        addr: SocketAddr,
        backlog: u32,
        router: Router,
        grace_period: Duration,
    ) -> Self {
        Self {
            addr,
            backlog,
            router,
            grace_period,
        }
    }
}

#[async_trait]
impl Run for Server {
    async fn run(&self, token: CancellationToken) -> Result<(), Error> {
        let listener = listen_tcp_backlog(self.addr, self.backlog)
            .with_context(|| format!("unable to listen on {}", self.addr))?;

        warn!("Server {}: running", self.addr);

        // Remote address is needed to geolocate the clients
        let service = self
            .router
            .clone()
            .into_make_service_with_connect_info::<SocketAddr>();

        let shutdown = token.clone();
        let serve = axum::serve(listener, service)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .into_future();

        let grace_period = self.grace_period;
        let deadline = async move {
            token.cancelled().await;
            warn!(
                "Server: shutting down, waiting for the active connections to close for {}s",
                grace_period.as_secs()
            );
            tokio::time::sleep(grace_period).await;
        };

        select! {
            v = serve => v.context("server failed")?,
            () = deadline => {},
        }

        warn!("Server {}: shut down", self.addr);
        Ok(())
    }
}

// Creates a listener with a backlog set
pub fn listen_tcp_backlog(addr: SocketAddr, backlog: u32) -> Result<TcpListener, Error> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };

    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    Ok(socket.listen(backlog)?)
}
