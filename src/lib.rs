//! BlaBlaBook 客户端核心
//!
//! 浏览器端的数据同步层：HTTP 网关（CSRF、会话过期处理）、持久化的会话与主题、
//! 通用集合 hook 及其领域实例、路由守卫。与目标平台无关，原生环境下用 tokio 测试。

pub mod api;
pub mod auth;
pub mod collection;
pub mod config;
pub mod csrf;
pub mod error;
pub mod hooks;
pub mod metadata;
pub mod request;
pub mod route;
pub mod session;
pub mod storage;
pub mod store;
pub mod theme;

#[cfg(test)]
mod test_support;

use std::rc::Rc;

use blablabook_shared::UserProfile;

pub use api::ApiGateway;
pub use auth::AuthService;
pub use collection::{Collection, Entity, LoadState, Operation};
pub use config::ClientConfig;
pub use error::{ApiError, ApiErrorKind, ApiResult};
pub use request::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use route::{AppRoute, GuardDecision, Navigator};
pub use session::{Session, SessionStore};
pub use storage::{MemoryStorage, StorageAdapter};
pub use theme::ThemeStore;

use hooks::{BooksHook, LibrariesHook, RatingsHook, ReadingListsHook, ReviewsHook, UsersHook};

// =========================================================
// 应用服务 (Application Services)
// =========================================================

/// 启动时构造一次、注入到各页面的服务集合
///
/// 会话、主题与网关在整个应用中只有一份；hook 每次调用工厂方法都是新实例，
/// 由页面持有并在卸载时 `dispose`。
pub struct AppServices<C: HttpClient> {
    gateway: Rc<ApiGateway<C>>,
    theme: ThemeStore,
    auth: AuthService<C>,
}

impl<C: HttpClient> Clone for AppServices<C> {
    fn clone(&self) -> Self {
        Self {
            gateway: Rc::clone(&self.gateway),
            theme: self.theme.clone(),
            auth: self.auth.clone(),
        }
    }
}

impl<C: HttpClient + 'static> AppServices<C> {
    pub fn new(
        client: C,
        config: ClientConfig,
        storage: Rc<dyn StorageAdapter>,
        navigator: Rc<dyn Navigator>,
    ) -> Self {
        let session = SessionStore::open(Rc::clone(&storage), &config);
        let theme = ThemeStore::open(storage, &config);
        let gateway = Rc::new(ApiGateway::new(client, config, session, navigator));
        let auth = AuthService::new(Rc::clone(&gateway));
        Self {
            gateway,
            theme,
            auth,
        }
    }

    /// 启动流程：先取得 CSRF 令牌，再校验恢复出的会话
    ///
    /// 令牌获取失败不阻止启动，下一次变更请求会重试。
    pub async fn bootstrap(&self) -> ApiResult<Option<UserProfile>> {
        if let Err(e) = self.gateway.bootstrap_csrf().await {
            tracing::warn!(error = %e, "启动时获取 CSRF 令牌失败");
        }
        self.auth.restore().await
    }

    pub fn gateway(&self) -> &Rc<ApiGateway<C>> {
        &self.gateway
    }

    pub fn session(&self) -> &SessionStore {
        self.gateway.session()
    }

    pub fn theme(&self) -> &ThemeStore {
        &self.theme
    }

    pub fn auth(&self) -> &AuthService<C> {
        &self.auth
    }

    // --- hook 工厂 ---

    pub fn books(&self) -> BooksHook<C> {
        BooksHook::new(Rc::clone(&self.gateway))
    }

    pub fn libraries(&self) -> LibrariesHook<C> {
        LibrariesHook::new(Rc::clone(&self.gateway))
    }

    pub fn reading_lists(&self) -> ReadingListsHook<C> {
        ReadingListsHook::new(Rc::clone(&self.gateway))
    }

    pub fn ratings(&self) -> RatingsHook<C> {
        RatingsHook::new(Rc::clone(&self.gateway))
    }

    pub fn reviews(&self) -> ReviewsHook<C> {
        ReviewsHook::new(Rc::clone(&self.gateway))
    }

    pub fn users(&self) -> UsersHook<C> {
        UsersHook::new(Rc::clone(&self.gateway))
    }
}
