use crate::block::parse_quantity;
use crate::{DataClient, RawBlock};
use anyhow::{anyhow, Context};
use cx_primitives::Height;
use futures::future::BoxFuture;
use reqwest::{Client, IntoUrl, Request, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use serde_json::value::RawValue;
use std::error::Error;
use std::fmt::{Debug, Formatter};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, instrument, warn};


const RETRY_SCHEDULE: [u64; 6] = [0, 100, 200, 500, 1000, 2000];


pub fn default_http_client() -> anyhow::Result<Client> {
    Client::builder()
        .read_timeout(Duration::from_secs(20))
        .connect_timeout(Duration::from_secs(20))
        .gzip(true)
        .build()
        .context("failed to build http client")
}


#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String
}


#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>
}


/// JSON-RPC client for Ethereum style nodes.
pub struct ReqwestDataClient {
    http: Client,
    url: Url,
    max_retries: usize,
    request_id: AtomicU64
}


impl Debug for ReqwestDataClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestDataClient")
            .field("url", &self.url.as_str())
            .finish()
    }
}


impl ReqwestDataClient {
    pub fn from_url(url: impl IntoUrl) -> anyhow::Result<Self> {
        let http = default_http_client()?;
        Self::new(http, url)
    }

    pub fn new(http: Client, url: impl IntoUrl) -> anyhow::Result<Self> {
        Ok(Self {
            http,
            url: url.into_url().context("invalid rpc url")?,
            max_retries: 0,
            request_id: AtomicU64::new(0)
        })
    }

    /// Allows transient transport failures to be retried up to `n` times
    pub fn with_max_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    #[instrument(level = "debug", skip_all, err(Debug), fields(url = %self.url.as_str()))]
    pub async fn block_number(&self) -> anyhow::Result<Height> {
        let quantity: Option<String> = self.call("eth_blockNumber", json!([])).await?;
        let quantity = quantity.ok_or_else(|| anyhow!("eth_blockNumber returned null"))?;
        parse_quantity(&quantity)
    }

    #[instrument(level = "debug", skip(self), err(Debug), fields(url = %self.url.as_str()))]
    pub async fn get_block(&self, height: Height) -> anyhow::Result<RawBlock> {
        let params = json!([format!("0x{:x}", height), true]);
        let payload: Option<Box<RawValue>> = self.call("eth_getBlockByNumber", params).await?;
        let payload = payload.ok_or_else(|| anyhow!("block {} not found", height))?;
        RawBlock::from_json(height, payload)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value
    ) -> anyhow::Result<Option<T>>
    {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);

        let http_req = self.http
            .post(self.url.clone())
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params
            }))
            .build()?;

        debug!(method, id, "send request");

        let response: RpcResponse<T> = self.with_retries(&http_req, |res| async move {
            if res.status().as_u16() == 200 {
                let body = res.json::<RpcResponse<T>>().await?;
                Ok(body)
            } else {
                Err(response_error(res).await)
            }
        }).await?;

        if let Some(err) = response.error {
            anyhow::bail!("{} failed with rpc error {}: {}", method, err.code, err.message)
        }

        Ok(response.result)
    }

    async fn with_retries<R, F, Fut>(
        &self,
        req: &Request,
        mut cb: F
    ) -> anyhow::Result<R>
    where
        F: FnMut(Response) -> Fut,
        Fut: std::future::Future<Output=anyhow::Result<R>>
    {
        let mut retry_attempt = 0;
        loop {
            let request = req.try_clone().ok_or_else(|| anyhow!("request body is not cloneable"))?;

            let retry_error = match self.http.execute(request).await {
                Ok(res) => match res.status().as_u16() {
                    429 | 502 | 503 | 504 | 524 => response_error(res).await,
                    _ => match cb(res).await {
                        Ok(res) => return Ok(res),
                        Err(err) => if is_retryable(err.as_ref()) {
                            err
                        } else {
                            return Err(err)
                        }
                    }
                },
                Err(err) if err.is_timeout() || err.is_connect() || err.is_request() => {
                    anyhow!(err)
                },
                Err(err) => return Err(err.into())
            };

            if retry_attempt >= self.max_retries {
                return Err(retry_error)
            }

            let pause = RETRY_SCHEDULE[std::cmp::min(retry_attempt, RETRY_SCHEDULE.len() - 1)];

            warn!(
                url = %req.url().as_str(),
                error = ?retry_error,
                "rpc request failed, will retry in {} ms",
                pause
            );

            retry_attempt += 1;
            futures_timer::Delay::new(Duration::from_millis(pause)).await;
        }
    }
}


async fn response_error(response: Response) -> anyhow::Error {
    let status = response.status().as_u16();
    if let Ok(text) = response.text().await {
        anyhow!("got HTTP {}: {}", status, text)
    } else {
        anyhow!("got HTTP {}", status)
    }
}


fn is_retryable(err: &(dyn Error + 'static)) -> bool {
    if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
        is_retryable_io(io_err)
    } else {
        err.source().map(is_retryable).unwrap_or(false)
    }
}


fn is_retryable_io(err: &std::io::Error) -> bool {
    match err.kind() {
        ErrorKind::ConnectionReset => true,
        ErrorKind::ConnectionAborted => true,
        ErrorKind::TimedOut => true,
        _ => false
    }
}


impl DataClient for ReqwestDataClient {
    fn current_height(&self) -> BoxFuture<'_, anyhow::Result<Height>> {
        Box::pin(self.block_number())
    }

    fn fetch(&self, height: Height) -> BoxFuture<'_, anyhow::Result<RawBlock>> {
        Box::pin(self.get_block(height))
    }
}
