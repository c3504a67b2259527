//! Network seam behind the `request` action
//!
//! The executor only knows the [`Transport`] contract: a request descriptor in,
//! a response value (or an error) out. [`MockTransport`] answers from canned
//! data after a fixed latency; `HttpTransport` (feature `http`) performs real
//! calls with `reqwest`.

use crate::{Error, Result};
use indexmap::IndexMap;
use protoflow_core::Value;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

/// Boxed future returned by transports
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything needed to perform a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
}

impl RequestDescriptor {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            data: None,
            headers: IndexMap::new(),
        }
    }
}

pub trait Transport: Send + Sync {
    fn send(&self, request: RequestDescriptor) -> BoxFuture<'_, Result<Value>>;
}

/// Canned responses with simulated latency
#[derive(Debug)]
pub struct MockTransport {
    latency: Duration,
    responses: Mutex<IndexMap<String, Value>>,
    failures: Mutex<IndexMap<String, String>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn canned(json: &str) -> Value {
    serde_json::from_str(json).unwrap_or_default()
}

impl MockTransport {
    /// Mock with the built-in demo endpoints and 500 ms latency
    pub fn new() -> Self {
        let mut responses = IndexMap::new();
        responses.insert(
            "/api/user/info".to_string(),
            canned(
                r#"{"code":0,"data":{"id":"1001","name":"测试用户","avatar":"https://example.com/avatar.png"}}"#,
            ),
        );
        responses.insert(
            "/api/list".to_string(),
            canned(
                r#"{"code":0,"data":{"items":[{"id":1,"title":"示例数据1"},{"id":2,"title":"示例数据2"}],"total":2}}"#,
            ),
        );
        Self {
            latency: Duration::from_millis(500),
            responses: Mutex::new(responses),
            failures: Mutex::new(IndexMap::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Answer `url` with `response`
    pub fn respond(&self, url: impl Into<String>, response: Value) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.into(), response);
    }

    /// Make every request to `url` fail with `message`
    pub fn fail(&self, url: impl Into<String>, message: impl Into<String>) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.into(), message.into());
    }

    fn answer(&self, request: &RequestDescriptor) -> Result<Value> {
        if let Some(message) = self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&request.url)
        {
            return Err(Error::Transport(message.clone()));
        }
        let canned = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&request.url)
            .cloned();
        Ok(canned.unwrap_or_else(|| {
            [
                ("code", Value::Int(0)),
                ("message", Value::from("success")),
                ("data", request.data.clone().unwrap_or(Value::Null)),
            ]
            .into_iter()
            .collect()
        }))
    }
}

impl Transport for MockTransport {
    fn send(&self, request: RequestDescriptor) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            log::debug!("mock {} {}", request.method, request.url);
            tokio::time::sleep(self.latency).await;
            self.answer(&request)
        })
    }
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use super::{BoxFuture, RequestDescriptor, Transport};
    use crate::{Error, Result};
    use protoflow_core::Value;

    /// Real HTTP transport
    ///
    /// Non-GET requests send `data` as a JSON body. A non-2xx status is an
    /// error; the body is parsed as JSON and falls back to a string value.
    #[derive(Debug, Clone, Default)]
    pub struct HttpTransport {
        client: reqwest::Client,
        base_url: Option<String>,
    }

    impl HttpTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Prefix relative request urls with `base_url`
        pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
            self.base_url = Some(base_url.into());
            self
        }

        fn url_for(&self, url: &str) -> String {
            match &self.base_url {
                Some(base) if url.starts_with('/') => format!("{}{}", base.trim_end_matches('/'), url),
                _ => url.to_string(),
            }
        }

        async fn perform(&self, request: RequestDescriptor) -> Result<Value> {
            let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
                .map_err(|e| Error::Transport(e.to_string()))?;
            let is_get = method == reqwest::Method::GET;
            let mut builder = self.client.request(method, self.url_for(&request.url));
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let (false, Some(data)) = (is_get, &request.data) {
                builder = builder.json(data);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;
            if !status.is_success() {
                return Err(Error::Transport(format!("HTTP {}", status)));
            }
            Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
        }
    }

    impl Transport for HttpTransport {
        fn send(&self, request: RequestDescriptor) -> BoxFuture<'_, Result<Value>> {
            Box::pin(self.perform(request))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_canned_and_fallback_responses() {
        let transport = MockTransport::new();
        let info = transport.send(RequestDescriptor::get("/api/user/info")).await.unwrap();
        assert_eq!(
            info.get("data").and_then(|d| d.get("id")),
            Some(&Value::from("1001"))
        );

        let mut post = RequestDescriptor::get("/api/save");
        post.method = "POST".into();
        post.data = Some(Value::from("payload"));
        let echoed = transport.send(post).await.unwrap();
        assert_eq!(echoed.get("message"), Some(&Value::from("success")));
        assert_eq!(echoed.get("data"), Some(&Value::from("payload")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_simulated() {
        let transport = MockTransport::new().with_latency(Duration::from_millis(500));
        let start = tokio::time::Instant::now();
        transport.send(RequestDescriptor::get("/api/list")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_failure() {
        let transport = MockTransport::new();
        transport.fail("/api/list", "offline");
        let err = transport.send(RequestDescriptor::get("/api/list")).await.unwrap_err();
        assert!(matches!(err, Error::Transport(ref m) if m == "offline"));
    }
}
