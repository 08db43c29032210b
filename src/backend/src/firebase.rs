use anyhow::{Context, Result, bail};
use crux_http::{
    HttpError,
    protocol::{HttpHeader, HttpRequest, HttpResponse, HttpResult},
};
use futures_util::{StreamExt, TryStreamExt, stream::BoxStream};
use log::{debug, info};
use pump_dashboard_core::http_helpers::database_error_message;
#[cfg(test)]
use mockall::automock;
use reqwest::{Client, Method};
use trait_variant::make;

/// Raw body chunks of a streaming response
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

#[make(Send)]
#[cfg_attr(test, automock)]
pub trait DatabaseClient {
    /// Execute a REST request issued by the core
    async fn execute(&self, request: HttpRequest) -> HttpResult;
    /// Open a server-sent-event stream on `url`
    async fn open_stream(&self, url: String) -> Result<ByteStream>;
}

/// Firebase Realtime Database REST client
#[derive(Clone, Default)]
pub struct FirebaseClient {
    client: Client,
}

impl FirebaseClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to create database HTTP client")?;

        Ok(FirebaseClient { client })
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| HttpError::Url(format!("invalid method {}: {e}", request.method)))?;

        debug!("{method} {}", redact(&request.url));

        let mut builder = self.client.request(method, &request.url);
        for HttpHeader { name, value } in request.headers {
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let res = builder
            .send()
            .await
            .map_err(|e| HttpError::Io(format!("failed to send request: {}", e.without_url())))?;

        let status = res.status().as_u16();
        let headers = res
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|value| HttpHeader {
                    name: name.to_string(),
                    value: value.to_string(),
                })
            })
            .collect();
        let body = res
            .bytes()
            .await
            .map_err(|e| {
                HttpError::Io(format!("failed to read response body: {}", e.without_url()))
            })?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl DatabaseClient for FirebaseClient {
    async fn execute(&self, request: HttpRequest) -> HttpResult {
        match self.send(request).await {
            Ok(response) => HttpResult::Ok(response),
            Err(e) => HttpResult::Err(e),
        }
    }

    async fn open_stream(&self, url: String) -> Result<ByteStream> {
        info!("opening stream {}", redact(&url));

        let res = self
            .client
            .get(&url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| anyhow::Error::new(e.without_url()))
            .context("failed to send stream request")?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            match database_error_message(&body) {
                Some(reason) => bail!("failed to open stream: server returned {status}: {reason}"),
                None => bail!("failed to open stream: server returned {status}"),
            }
        }

        Ok(res
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(|e| anyhow::Error::new(e.without_url()).context("failed to read stream"))
            .boxed())
    }
}

/// Mask the value of every `auth=` parameter in `text`, which may be a URL
/// or a message quoting one
pub fn redact(text: &str) -> String {
    const KEY: &str = "auth=";

    let mut redacted = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find(KEY) {
        let (head, tail) = rest.split_at(at + KEY.len());
        redacted.push_str(head);

        let end = tail
            .find(|c: char| matches!(c, '&' | '#' | ')' | '"' | '\'') || c.is_whitespace())
            .unwrap_or(tail.len());
        if end > 0 {
            redacted.push_str("***");
        }
        rest = &tail[end..];
    }
    redacted.push_str(rest);

    redacted
}
