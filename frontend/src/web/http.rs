//! 浏览器传输层
//!
//! 基于 `gloo-net` 实现核心的 [`HttpClient`] 端口。所有请求都携带 Cookie
//! (`credentials: include`)，会话由后端的 HttpOnly Cookie 维持。

use blablabook::{ApiError, ApiResult, HttpClient, HttpMethod, HttpRequest, HttpResponse};
use gloo_net::http::{Method, RequestBuilder};
use web_sys::RequestCredentials;

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserHttpClient;

#[async_trait::async_trait(?Send)]
impl HttpClient for BrowserHttpClient {
    async fn send(&self, req: HttpRequest) -> ApiResult<HttpResponse> {
        let mut builder = RequestBuilder::new(&req.url)
            .method(to_method(req.method))
            .credentials(RequestCredentials::Include);
        for (key, value) in &req.headers {
            builder = builder.header(key, value);
        }

        let request = match req.body {
            Some(body) => builder.body(body),
            None => builder.build(),
        }
        .map_err(|e| ApiError::network(format!("请求构建失败: {}", e)))?;

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("读取响应失败: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}
