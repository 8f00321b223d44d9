use anyhow::{Context, Result};
use async_trait::async_trait;
use http::{header, Request, Response};

/// HTTP transport used to reach remote services such as a universal resolver.
///
/// A trait is used here so that native HTTP stacks can be swapped in and tests
/// can answer requests without a network.
#[async_trait]
pub trait AsyncHttpClient: std::fmt::Debug {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

/// A GET request that asks for a DID resolution result.
pub(crate) fn resolution_request(uri: &str) -> Result<Request<Vec<u8>>> {
    Request::get(uri)
        .header(
            header::ACCEPT,
            "application/ld+json;profile=\"https://w3id.org/did-resolution\", application/json",
        )
        .body(Vec::new())
        .with_context(|| format!("unable to build resolution request for '{uri}'"))
}

#[derive(Debug, Clone)]
pub struct ReqwestClient(reqwest::Client);

impl AsRef<reqwest::Client> for ReqwestClient {
    fn as_ref(&self) -> &reqwest::Client {
        &self.0
    }
}

impl From<reqwest::Client> for ReqwestClient {
    fn from(client: reqwest::Client) -> Self {
        Self(client)
    }
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .context("unable to build http_client")
            .map(Self)
    }
}

#[async_trait]
impl AsyncHttpClient for ReqwestClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let response = self
            .0
            .execute(request.try_into().context("unable to convert request")?)
            .await
            .context("http request failed")?;

        let mut builder = Response::builder()
            .status(response.status())
            .version(response.version());

        builder
            .headers_mut()
            .context("unable to set headers")?
            .extend(response.headers().clone());

        builder
            .body(
                response
                    .bytes()
                    .await
                    .context("failed to extract response body")?
                    .to_vec(),
            )
            .context("unable to construct response")
    }
}
