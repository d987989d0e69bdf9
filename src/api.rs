use std::rc::Rc;

use blablabook_shared::protocol::{
    ApiRequest, CsrfTokenResponse, ErrorEnvelope, HttpMethod, endpoints,
};
use blablabook_shared::{HEADER_CSRF_TOKEN, HEADER_REQUEST_ID};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::csrf::CsrfCache;
use crate::error::{ApiError, ApiErrorKind, ApiResult};
use crate::request::{HttpClient, HttpRequest, HttpResponse};
use crate::route::{AppRoute, Navigator};
use crate::session::SessionStore;

// =========================================================
// 响应体归一化 (Payload Normalization)
// =========================================================

/// 集合端点的两种合法形状
#[derive(Debug)]
pub enum CollectionPayload {
    /// `[ .. ]`
    Bare(Vec<Value>),
    /// `{ "<name>": [ .. ] }`
    Keyed(Vec<Value>),
}

impl CollectionPayload {
    /// 识别响应形状；其余形状一律视为解码错误，不会静默当作空集合
    pub fn classify(value: Value, key: &str) -> ApiResult<Self> {
        match value {
            Value::Array(items) => Ok(Self::Bare(items)),
            Value::Object(mut map) => match map.remove(key).or_else(|| map.remove("data")) {
                Some(Value::Array(items)) => Ok(Self::Keyed(items)),
                Some(other) => Err(ApiError::decode(format!(
                    "字段 `{}` 不是数组: {}",
                    key,
                    type_name(&other)
                ))),
                None => Err(ApiError::decode(format!("响应缺少集合字段 `{}`", key))),
            },
            other => Err(ApiError::decode(format!(
                "集合响应应为数组或对象，实际为 {}",
                type_name(&other)
            ))),
        }
    }

    pub fn into_items<T: DeserializeOwned>(self) -> ApiResult<Vec<T>> {
        let items = match self {
            Self::Bare(items) | Self::Keyed(items) => items,
        };
        items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(ApiError::from))
            .collect()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn decode_collection<T: DeserializeOwned>(body: &str, key: &str) -> ApiResult<Vec<T>> {
    let value: Value = serde_json::from_str(body)?;
    CollectionPayload::classify(value, key)?
        .into_items()
        .map_err(|e| e.in_op_with("decode.collection", key))
}

/// 单个实体：`{ "<name>": {..} }` 或直接是实体本身
pub fn decode_entity<T: DeserializeOwned>(body: &str, keys: &[&str]) -> ApiResult<T> {
    let value: Value = serde_json::from_str(body)?;
    decode_entity_value(value, keys)
}

pub fn decode_entity_value<T: DeserializeOwned>(mut value: Value, keys: &[&str]) -> ApiResult<T> {
    if let Value::Object(map) = &mut value {
        // 只有值为对象时才视为包装键，`{"rating": 4}` 中的同名字段保持原样
        let wrapper = keys.iter().find(|key| map.get(**key).is_some_and(Value::is_object));
        if let Some(inner) = wrapper.and_then(|key| map.remove(*key)) {
            return serde_json::from_value(inner).map_err(ApiError::from);
        }
    }
    serde_json::from_value(value).map_err(|e| ApiError::from(e).in_op_with("decode.entity", keys.join("|")))
}

fn backend_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(ErrorEnvelope::into_message)
}

/// 登录/注册的 401 是凭据错误，不是会话过期
fn is_credential_exchange(path: &str) -> bool {
    path == endpoints::AUTH_LOGIN || path == endpoints::AUTH_REGISTER
}

// =========================================================
// 网关 (Gateway)
// =========================================================

/// 唯一配置好的 HTTP 网关
///
/// - 变更请求自动附带 CSRF 令牌（缺失时单飞获取）
/// - 按状态码分类错误；401 清空会话并跳转一次
/// - 每个请求带 `X-Request-Id` 并输出结构化日志
pub struct ApiGateway<C: HttpClient> {
    client: Rc<C>,
    config: ClientConfig,
    session: SessionStore,
    navigator: Rc<dyn Navigator>,
    csrf: CsrfCache,
}

impl<C: HttpClient + 'static> ApiGateway<C> {
    pub fn new(
        client: C,
        config: ClientConfig,
        session: SessionStore,
        navigator: Rc<dyn Navigator>,
    ) -> Self {
        Self {
            client: Rc::new(client),
            config,
            session,
            navigator,
            csrf: CsrfCache::new(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn csrf(&self) -> &CsrfCache {
        &self.csrf
    }

    /// 启动时显式获取令牌
    pub async fn bootstrap_csrf(&self) -> ApiResult<String> {
        self.csrf_token().await
    }

    async fn csrf_token(&self) -> ApiResult<String> {
        let client = Rc::clone(&self.client);
        let url = self.config.csrf_url();
        self.csrf
            .get_or_fetch(move || async move { fetch_csrf_token(client.as_ref(), url).await })
            .await
    }

    /// 发送请求并分类错误
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        query: &[(&str, &str)],
    ) -> ApiResult<HttpResponse> {
        let mut url = self.config.url(path);
        if !query.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query)
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }

        let request_id = Uuid::new_v4().to_string();
        let mut req = HttpRequest::new(&url, method)
            .with_header("Accept", "application/json")
            .with_header(HEADER_REQUEST_ID, &request_id);
        if let Some(body) = body {
            req = req
                .with_header("Content-Type", "application/json")
                .with_body(body);
        }
        if method.is_mutating() {
            let token = self
                .csrf_token()
                .await
                .map_err(|e| e.in_op_with("gateway.csrf", path))?;
            req = req.with_header(HEADER_CSRF_TOKEN, &token);
        }

        tracing::debug!(request_id = %request_id, method = method.as_str(), url = %url, "发送请求");
        let response = match self.client.send(req).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(request_id = %request_id, url = %url, error = %e, "请求未到达服务器");
                return Err(e.in_op_with("gateway.request", path));
            }
        };
        tracing::debug!(request_id = %request_id, status = response.status, "收到响应");

        if response.is_success() {
            Ok(response)
        } else {
            Err(self.classify(method, path, &response))
        }
    }

    fn classify(&self, method: HttpMethod, path: &str, response: &HttpResponse) -> ApiError {
        let error = ApiError::from_status(response.status, backend_message(&response.body))
            .in_op_with("gateway.request", format!("{} {}", method.as_str(), path));

        match error.kind() {
            ApiErrorKind::Auth if !is_credential_exchange(path) => self.handle_session_expired(),
            ApiErrorKind::Authorization if error.message().to_ascii_lowercase().contains("csrf") => {
                tracing::info!("CSRF 令牌被拒绝，下一次变更请求将重新获取");
                self.csrf.invalidate();
            }
            _ => {}
        }
        tracing::warn!(status = response.status, code = error.error_code(), path, "请求失败");
        error
    }

    /// 会话过期：清空会话，仅在由已登录变为未登录时跳转，避免并发 401 重复跳转
    fn handle_session_expired(&self) {
        if self.session.logout() {
            let target = AppRoute::session_expired_redirect();
            tracing::info!(target = %target, "会话已过期，跳转到登录页");
            self.navigator.redirect(target);
        }
    }

    // --- 便捷方法 ---

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(HttpMethod::Get, path, None, &[]).await?.json()
    }

    pub async fn get_collection<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        key: &str,
    ) -> ApiResult<Vec<T>> {
        let response = self.request(HttpMethod::Get, path, None, query).await?;
        decode_collection(&response.body, key).map_err(|e| e.in_op_with("gateway.get_collection", path))
    }

    /// 发送 JSON 请求体，返回原始响应（可能是空体）
    pub async fn send_json<B: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &B,
    ) -> ApiResult<HttpResponse> {
        let body = serde_json::to_value(body)?;
        self.request(method, path, Some(body), &[]).await
    }

    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.request(HttpMethod::Delete, path, None, &[]).await.map(|_| ())
    }

    /// 调用类型化请求
    pub async fn call<R: ApiRequest>(&self, req: &R) -> ApiResult<R::Response> {
        self.send_json(R::METHOD, &req.path(), req).await?.json()
    }

    /// 访问外部服务：不带 CSRF，不触发会话处理
    pub async fn fetch_external(&self, url: &str) -> ApiResult<HttpResponse> {
        let response = self
            .client
            .send(HttpRequest::new(url, HttpMethod::Get).with_header("Accept", "application/json"))
            .await
            .map_err(|e| e.in_op_with("gateway.external", url))?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status, None).in_op_with("gateway.external", url))
        }
    }
}

async fn fetch_csrf_token<C: HttpClient>(client: &C, url: String) -> ApiResult<String> {
    tracing::debug!(url = %url, "获取 CSRF 令牌");
    let response = client
        .send(HttpRequest::new(&url, HttpMethod::Get).with_header("Accept", "application/json"))
        .await
        .map_err(|e| e.in_op("csrf.fetch"))?;
    if !response.is_success() {
        return Err(ApiError::from_status(response.status, backend_message(&response.body)).in_op("csrf.fetch"));
    }
    let payload: CsrfTokenResponse = response.json()?;
    Ok(payload.csrf_token)
}
