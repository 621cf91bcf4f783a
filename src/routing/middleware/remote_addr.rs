use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use http::{HeaderMap, HeaderName};

use crate::routing::RemoteAddr;

/// Where to take the client's address from
#[derive(Clone, Debug)]
pub struct RemoteAddrState {
    // Trusted header set by the load balancer in front of us
    pub header: Option<HeaderName>,
    // Number of our proxies that append to the header
    pub hops: usize,
}

// Proxies append the address they see, so everything left of the entries
// added by our own proxies is client-controlled. The entry `hops` positions
// from the right is the last one a trusted proxy wrote.
fn from_header(headers: &HeaderMap, name: &HeaderName, hops: usize) -> Option<IpAddr> {
    // Repeated header lines are one list in order of appearance
    let values = headers
        .get_all(name)
        .iter()
        .map(|x| x.to_str().ok())
        .collect::<Option<Vec<_>>>()?;

    values
        .into_iter()
        .flat_map(|x| x.split(','))
        .rev()
        .nth(hops.max(1) - 1)?
        .trim()
        .parse()
        .ok()
}

pub async fn middleware(
    State(state): State<RemoteAddrState>,
    mut request: Request,
    next: Next,
) -> Response {
    let remote_addr = state
        .header
        .as_ref()
        .and_then(|x| from_header(request.headers(), x, state.hops))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|x| x.0.ip())
        })
        // IPv4 clients on dual-stack sockets show up as ::ffff:a.b.c.d
        .map(|x| x.to_canonical());

    if let Some(v) = remote_addr {
        request.extensions_mut().insert(RemoteAddr(v));
    }

    next.run(request).await
}
