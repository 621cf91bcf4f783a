use std::{fmt, time::Duration};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Client: Send + Sync + fmt::Debug {
    async fn execute(&self, req: reqwest::Request) -> Result<reqwest::Response, reqwest::Error>;
}

pub struct Options {
    pub timeout_connect: Duration,
    pub timeout: Duration,
    pub tcp_keepalive: Option<Duration>,
    pub user_agent: String,
}

pub fn new(opts: Options) -> Result<reqwest::Client, anyhow::Error> {
    let client = reqwest::Client::builder()
        .connect_timeout(opts.timeout_connect)
        .timeout(opts.timeout)
        .tcp_nodelay(true)
        .tcp_keepalive(opts.tcp_keepalive)
        .user_agent(opts.user_agent)
        // Redirects from the upstream must reach the client as-is
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()?;

    Ok(client)
}

#[derive(Clone, Debug)]
pub struct ReqwestClient(reqwest::Client);

impl ReqwestClient {
    pub const fn new(client: reqwest::Client) -> Self {
        Self(client)
    }
}

#[async_trait]
impl Client for ReqwestClient {
    async fn execute(&self, req: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
        self.0.execute(req).await
    }
}
