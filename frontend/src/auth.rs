//! 认证模块
//!
//! 持有唯一的 [`AppServices`]，把核心的会话 Store 桥接为 Leptos 信号。
//! 路由服务通过注入的会话信号执行守卫，两者互不依赖。

use std::rc::Rc;

use blablabook::config::DEFAULT_API_BASE;
use blablabook::{AppServices, ClientConfig, Session, StorageAdapter};
use blablabook_shared::protocol::{LoginRequest, RegisterRequest};
use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::web::{BrowserHttpClient, BrowserNavigator, BrowserStorage};

/// 覆盖 API 根路径（例如指向另一台开发后端）
const STORAGE_API_BASE_KEY: &str = "blablabook-api-base";

pub type Services = AppServices<BrowserHttpClient>;

/// 认证上下文
#[derive(Clone, Copy)]
pub struct AuthContext {
    services: StoredValue<Services, LocalStorage>,
    session: RwSignal<Session>,
    /// 启动流程（CSRF + 会话校验）是否仍在进行
    is_loading: RwSignal<bool>,
}

impl AuthContext {
    pub fn new() -> Self {
        let storage = BrowserStorage;
        let api_base = storage
            .get(STORAGE_API_BASE_KEY)
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let services = AppServices::new(
            BrowserHttpClient,
            ClientConfig::new(api_base),
            Rc::new(storage),
            Rc::new(BrowserNavigator),
        );

        let session = RwSignal::new(services.session().snapshot());
        services.session().subscribe(move |s| {
            session.try_set(s.clone());
        });

        Self {
            services: StoredValue::new_local(services),
            session,
            is_loading: RwSignal::new(true),
        }
    }

    pub fn services(&self) -> Services {
        self.services.get_value()
    }

    /// 会话信号（用于路由服务注入）
    pub fn session_signal(&self) -> Signal<Session> {
        self.session.into()
    }

    pub fn session(&self) -> Session {
        self.session.get()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading.get()
    }
}

pub fn use_auth() -> AuthContext {
    use_context::<AuthContext>().expect("AuthContext should be provided")
}

/// 启动：获取 CSRF 令牌并校验恢复出的会话
pub fn init_auth(ctx: &AuthContext) {
    let ctx = *ctx;
    spawn_local(async move {
        if let Err(e) = ctx.services().bootstrap().await {
            web_sys::console::warn_1(&format!("[Auth] 会话校验失败: {}", e).into());
        }
        ctx.is_loading.set(false);
    });
}

/// 登录，失败时返回可展示的消息
pub async fn login(ctx: &AuthContext, email: String, password: String) -> Result<(), String> {
    let credentials = LoginRequest { email, password };
    ctx.services()
        .auth()
        .login(&credentials)
        .await
        .map(|_| ())
        .map_err(|e| e.user_message("登录失败，请检查邮箱和密码"))
}

pub async fn register(ctx: &AuthContext, form: RegisterRequest) -> Result<(), String> {
    ctx.services()
        .auth()
        .register(&form)
        .await
        .map(|_| ())
        .map_err(|e| e.user_message("注册失败"))
}

/// 登出；导航由路由服务的会话守卫自动处理
pub fn logout(ctx: &AuthContext) {
    let services = ctx.services();
    spawn_local(async move {
        if let Err(e) = services.auth().logout().await {
            web_sys::console::warn_1(&format!("[Auth] 后端登出失败: {}", e).into());
        }
    });
}
