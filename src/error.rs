use serde::{Deserialize, Serialize};
use thiserror::Error;

// =========================================================
// 错误类型枚举
// =========================================================

/// 错误类型枚举
/// 包含错误对应的语义（可能关联的状态码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiErrorKind {
    /// 请求未到达服务器（网络中断、超时、传输失败）
    Network,
    /// 401: 会话失效，由网关统一登出
    Auth,
    /// 403: 已登录但无权限
    Authorization,
    /// 404: 资源未找到
    NotFound,
    /// 其他 4xx: 请求校验失败，通常带有后端消息
    Validation,
    /// 5xx: 服务端错误
    Server,
    /// 本地前置条件不满足（未登录、评分越界等），不会发出请求
    LocalPrecondition,
    /// 响应体结构与预期不符
    Decode,
}

impl ApiErrorKind {
    /// 按 HTTP 状态码分类，2xx/3xx 返回 None
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 => Some(ApiErrorKind::Auth),
            403 => Some(ApiErrorKind::Authorization),
            404 => Some(ApiErrorKind::NotFound),
            400..=499 => Some(ApiErrorKind::Validation),
            500..=599 => Some(ApiErrorKind::Server),
            _ => None,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiErrorKind::Network => "NETWORK_ERROR",
            ApiErrorKind::Auth => "UNAUTHENTICATED",
            ApiErrorKind::Authorization => "FORBIDDEN",
            ApiErrorKind::NotFound => "RESOURCE_NOT_FOUND",
            ApiErrorKind::Validation => "INVALID_REQUEST",
            ApiErrorKind::Server => "SERVER_ERROR",
            ApiErrorKind::LocalPrecondition => "PRECONDITION_FAILED",
            ApiErrorKind::Decode => "DECODE_ERROR",
        }
    }
}

// =========================================================
// 错误上下文追踪
// =========================================================

/// 结构化的错误追踪片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSpan {
    /// 操作名称，如 "gateway.request", "books.delete"
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorSpan {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            detail: None,
        }
    }

    pub fn with_detail(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            detail: Some(detail.into()),
        }
    }
}

fn trace_suffix(spans: &[ErrorSpan]) -> String {
    if spans.is_empty() {
        return String::new();
    }
    let trace = spans
        .iter()
        .map(|span| match &span.detail {
            Some(detail) => format!("{}({})", span.operation, detail),
            None => span.operation.clone(),
        })
        .collect::<Vec<_>>()
        .join(" -> ");
    format!(" | trace: {}", trace)
}

// =========================================================
// 核心错误类型
// =========================================================

/// 客户端统一错误
///
/// - kind: 错误分类
/// - message: 错误消息（后端提供或本地生成）
/// - status: 关联的 HTTP 状态码（仅响应错误）
/// - spans: 结构化的调用追踪栈
///
/// 需要 `Clone`：CSRF 令牌的单飞请求会把同一个结果分发给所有等待者。
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{}] {}{}", .kind.error_code(), .message, trace_suffix(.spans))]
pub struct ApiError {
    kind: ApiErrorKind,
    message: String,
    status: Option<u16>,
    /// 消息是否来自后端错误信封
    from_backend: bool,
    spans: Vec<ErrorSpan>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            from_backend: false,
            spans: Vec::new(),
        }
    }

    // --- Convenience constructors ---

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, message)
    }

    pub fn local_precondition(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::LocalPrecondition, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Decode, message)
    }

    /// 由非 2xx 响应构造错误
    ///
    /// `backend_message` 为错误信封中提取的文本，缺失时使用状态码描述。
    pub fn from_status(status: u16, backend_message: Option<String>) -> Self {
        let kind = ApiErrorKind::from_status(status).unwrap_or(ApiErrorKind::Validation);
        let from_backend = backend_message.is_some();
        let message = backend_message.unwrap_or_else(|| format!("HTTP {}", status));
        Self {
            kind,
            message,
            status: Some(status),
            from_backend,
            spans: Vec::new(),
        }
    }

    // --- Context builders ---

    /// 添加操作追踪（无额外细节）
    pub fn in_op(mut self, operation: impl Into<String>) -> Self {
        self.spans.push(ErrorSpan::new(operation));
        self
    }

    /// 添加操作追踪（带额外细节）
    pub fn in_op_with(mut self, operation: impl Into<String>, detail: impl Into<String>) -> Self {
        self.spans.push(ErrorSpan::with_detail(operation, detail));
        self
    }

    // --- Accessors ---

    pub fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn spans(&self) -> &[ErrorSpan] {
        &self.spans
    }

    pub fn error_code(&self) -> &'static str {
        self.kind.error_code()
    }

    pub fn is_auth(&self) -> bool {
        self.kind == ApiErrorKind::Auth
    }

    /// 面向用户的消息
    ///
    /// 后端消息与本地前置条件消息原样展示，其余情况使用调用方给出的默认文案。
    pub fn user_message(&self, fallback: &str) -> String {
        if self.from_backend || self.kind == ApiErrorKind::LocalPrecondition {
            self.message.clone()
        } else {
            fallback.to_string()
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

// =========================================================
// 类型转换实现
// =========================================================

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::decode(e.to_string())
    }
}
