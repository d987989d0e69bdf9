use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::error::{ApiError, ApiResult};

pub use blablabook_shared::protocol::HttpMethod;

// =========================================================
// 核心抽象层 (HTTP Interface Abstraction)
// =========================================================

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(url: &str, method: HttpMethod) -> Self {
        Self {
            url: url.to_string(),
            method,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_str(&self.body).map_err(ApiError::from)
    }
}

/// 传输层端口
///
/// 实现方负责携带会话凭据（Cookie）。传输失败（请求未到达服务器）
/// 返回 `Network` 错误；任何收到的响应（包括 4xx/5xx）都以 `Ok` 返回，
/// 由网关统一分类。
#[async_trait::async_trait(?Send)]
pub trait HttpClient {
    async fn send(&self, req: HttpRequest) -> ApiResult<HttpResponse>;
}

// =========================================================
// 实现层: reqwest 客户端（原生平台）
// =========================================================

#[cfg(not(target_arch = "wasm32"))]
pub use native::ReqwestHttpClient;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::*;
    use std::time::Duration;

    const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

    /// 带 Cookie 存储的 reqwest 客户端，会话 Cookie 在请求之间自动保留
    pub struct ReqwestHttpClient {
        inner: reqwest::Client,
    }

    impl ReqwestHttpClient {
        pub fn new() -> ApiResult<Self> {
            Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
        }

        pub fn with_timeout(timeout: Duration) -> ApiResult<Self> {
            let inner = reqwest::Client::builder()
                .cookie_store(true)
                .timeout(timeout)
                .build()
                .map_err(|e| ApiError::network(e.to_string()).in_op("http.build_client"))?;
            Ok(Self { inner })
        }
    }

    fn to_reqwest(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    #[async_trait::async_trait(?Send)]
    impl HttpClient for ReqwestHttpClient {
        async fn send(&self, req: HttpRequest) -> ApiResult<HttpResponse> {
            let mut builder = self.inner.request(to_reqwest(req.method), &req.url);
            for (k, v) in &req.headers {
                builder = builder.header(k, v);
            }
            if let Some(body) = req.body {
                builder = builder.body(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| ApiError::network(e.to_string()).in_op_with("http.send", &req.url))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| ApiError::network(e.to_string()).in_op_with("http.read_body", &req.url))?;

            Ok(HttpResponse { status, body })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_unreachable_host_is_network_error() {
            let client = ReqwestHttpClient::with_timeout(Duration::from_millis(200)).unwrap();
            let err = client
                .send(HttpRequest::new("http://127.0.0.1:9/api/books", HttpMethod::Get))
                .await
                .unwrap_err();

            assert_eq!(err.kind(), crate::error::ApiErrorKind::Network);
        }
    }
}

// =========================================================
// 测试工具: MockHttpClient
// =========================================================

#[cfg(test)]
pub use mock::{MockHttpClient, RecordedRequest};

#[cfg(test)]
mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub url: String,
        pub method: HttpMethod,
        pub headers: HashMap<String, String>,
        pub body: Option<String>,
    }

    impl RecordedRequest {
        pub fn json_body(&self) -> serde_json::Value {
            self.body
                .as_deref()
                .map(|b| serde_json::from_str(b).unwrap())
                .unwrap_or(serde_json::Value::Null)
        }
    }

    #[derive(Clone)]
    enum MockReply {
        Respond {
            status: u16,
            body: String,
            /// 返回前让出执行权的次数，用于构造并发交错
            yields: usize,
        },
        Fail(String),
    }

    /// 按 "METHOD url" 返回预置响应的客户端
    ///
    /// 同一个键可排队多个响应，依次消费；最后一个响应会被重复使用。
    pub struct MockHttpClient {
        replies: RefCell<HashMap<String, VecDeque<MockReply>>>,
        pub requests: RefCell<Vec<RecordedRequest>>,
    }

    fn key(method: HttpMethod, url: &str) -> String {
        format!("{} {}", method.as_str(), url)
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self {
                replies: RefCell::new(HashMap::new()),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn push(&self, method: HttpMethod, url: &str, reply: MockReply) {
            self.replies
                .borrow_mut()
                .entry(key(method, url))
                .or_default()
                .push_back(reply);
        }

        pub fn mock_response(&self, method: HttpMethod, url: &str, status: u16, body: serde_json::Value) {
            self.mock_delayed(method, url, status, body, 1);
        }

        pub fn mock_delayed(
            &self,
            method: HttpMethod,
            url: &str,
            status: u16,
            body: serde_json::Value,
            yields: usize,
        ) {
            let body = if body.is_null() {
                String::new()
            } else {
                body.to_string()
            };
            self.push(method, url, MockReply::Respond { status, body, yields });
        }

        pub fn mock_network_failure(&self, method: HttpMethod, url: &str) {
            self.push(method, url, MockReply::Fail("connection refused".to_string()));
        }

        pub fn count(&self, method: HttpMethod, url: &str) -> usize {
            self.requests
                .borrow()
                .iter()
                .filter(|r| r.method == method && r.url == url)
                .count()
        }

        pub fn last(&self, method: HttpMethod, url: &str) -> Option<RecordedRequest> {
            self.requests
                .borrow()
                .iter()
                .rev()
                .find(|r| r.method == method && r.url == url)
                .cloned()
        }

        pub fn total(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    #[async_trait::async_trait(?Send)]
    impl HttpClient for MockHttpClient {
        async fn send(&self, req: HttpRequest) -> ApiResult<HttpResponse> {
            self.requests.borrow_mut().push(RecordedRequest {
                url: req.url.clone(),
                method: req.method,
                headers: req.headers.clone(),
                body: req.body.clone(),
            });

            let reply = {
                let mut replies = self.replies.borrow_mut();
                match replies.get_mut(&key(req.method, &req.url)) {
                    Some(queue) if queue.len() > 1 => queue.pop_front(),
                    Some(queue) => queue.front().cloned(),
                    None => None,
                }
            };

            match reply {
                Some(MockReply::Respond { status, body, yields }) => {
                    for _ in 0..yields {
                        tokio::task::yield_now().await;
                    }
                    Ok(HttpResponse { status, body })
                }
                Some(MockReply::Fail(msg)) => Err(ApiError::network(msg)),
                None => Ok(HttpResponse {
                    status: 404,
                    body: "Not Found".to_string(),
                }),
            }
        }
    }
}
