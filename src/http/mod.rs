pub mod client;
pub mod headers;
pub mod server;

use http::{HeaderMap, HeaderName, Version, header};

pub use client::{Client, ReqwestClient};
pub use server::Server;

// Hop-by-hop headers that must not be forwarded by proxies (RFC 9110 7.6.1)
const CONNECTION_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Removes hop-by-hop headers including the ones listed in `Connection`
pub fn strip_connection_headers(headers: &mut HeaderMap) {
    let listed = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|x| x.to_str().ok())
        .flat_map(|x| x.split(','))
        .filter_map(|x| HeaderName::try_from(x.trim()).ok())
        .collect::<Vec<_>>();

    for h in listed.iter().chain(CONNECTION_HEADERS.iter()) {
        headers.remove(h);
    }
}

pub const fn http_version(v: Version) -> &'static str {
    match v {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_11 => "1.1",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "-",
    }
}
