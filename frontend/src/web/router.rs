//! 路由服务模块 - 核心引擎
//!
//! 封装了 web_sys 的 History API，所有对 window.history 的操作都集中在此模块。
//! 守卫规则来自核心的 [`evaluate`]，这里只负责"监听 -> 守卫 -> 处理 -> 加载"。
//! 会话每次变化都会对当前路由重新执行守卫。

use blablabook::Session;
use blablabook::route::{AppRoute, GuardDecision, Navigator, evaluate};
use leptos::prelude::*;
use wasm_bindgen::prelude::*;

/// 获取当前浏览器路径
fn current_path() -> String {
    web_sys::window()
        .and_then(|w| w.location().pathname().ok())
        .unwrap_or_else(|| "/".to_string())
}

fn push_history_state(path: &str) {
    if let Some(window) = web_sys::window() {
        if let Ok(history) = window.history() {
            let _ = history.push_state_with_url(&JsValue::NULL, "", Some(path));
        }
    }
}

/// 用于重定向，不留下历史记录
fn replace_history_state(path: &str) {
    if let Some(window) = web_sys::window() {
        if let Ok(history) = window.history() {
            let _ = history.replace_state_with_url(&JsValue::NULL, "", Some(path));
        }
    }
}

fn log(message: &str) {
    web_sys::console::log_1(&message.into());
}

/// 对目标路由执行守卫，返回实际应加载的路由
fn resolve(target: AppRoute, session: &Session) -> AppRoute {
    match evaluate(&target, session) {
        GuardDecision::Allow => target,
        GuardDecision::Redirect(redirect) => {
            log(&format!("[Router] {} 被守卫拦截，跳转到 {}", target, redirect));
            redirect
        }
    }
}

/// 路由器服务
///
/// 通过注入的会话信号与认证系统解耦。
#[derive(Clone, Copy)]
pub struct RouterService {
    current_route: ReadSignal<AppRoute>,
    set_route: WriteSignal<AppRoute>,
    session: Signal<Session>,
}

impl RouterService {
    fn new(session: Signal<Session>) -> Self {
        let initial = resolve(AppRoute::from_path(&current_path()), &session.get_untracked());
        replace_history_state(&initial.to_path());
        let (current_route, set_route) = signal(initial);

        Self {
            current_route,
            set_route,
            session,
        }
    }

    pub fn current_route(&self) -> ReadSignal<AppRoute> {
        self.current_route
    }

    pub fn navigate(&self, path: &str) {
        self.navigate_to(AppRoute::from_path(path));
    }

    /// **核心方法：导航与守卫**
    pub fn navigate_to(&self, target: AppRoute) {
        let route = resolve(target, &self.session.get_untracked());
        push_history_state(&route.to_path());
        self.set_route.set(route);
    }

    /// 浏览器后退/前进，以及 [`BrowserNavigator`] 发出的跳转
    fn init_popstate_listener(&self) {
        let set_route = self.set_route;
        let session = self.session;

        let closure = Closure::<dyn Fn()>::new(move || {
            let target = AppRoute::from_path(&current_path());
            let route = resolve(target.clone(), &session.get_untracked());
            if route != target {
                replace_history_state(&route.to_path());
            }
            set_route.set(route);
        });

        if let Some(window) = web_sys::window() {
            let _ = window.add_event_listener_with_callback("popstate", closure.as_ref().unchecked_ref());
        }

        // 泄漏闭包以保持监听器存活
        closure.forget();
    }

    /// 会话变化时对当前路由重新执行守卫
    fn setup_guard_effect(&self) {
        let current_route = self.current_route;
        let set_route = self.set_route;
        let session = self.session;

        Effect::new(move |_| {
            let session = session.get();
            let route = current_route.get_untracked();
            if let GuardDecision::Redirect(redirect) = evaluate(&route, &session) {
                log(&format!("[Router] 会话已变化，{} 跳转到 {}", route, redirect));
                replace_history_state(&redirect.to_path());
                set_route.set(redirect);
            }
        });
    }
}

/// 核心网关使用的导航端口
///
/// 改写地址后派发 `popstate`，由路由服务统一处理。
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn redirect(&self, route: AppRoute) {
        replace_history_state(&route.to_path());
        let dispatched = web_sys::Event::new("popstate")
            .ok()
            .zip(web_sys::window())
            .map(|(event, window)| window.dispatch_event(&event).is_ok());
        if dispatched != Some(true) {
            log("[Router] 无法派发 popstate 事件");
        }
    }
}

fn provide_router(session: Signal<Session>) -> RouterService {
    let router = RouterService::new(session);
    router.init_popstate_listener();
    router.setup_guard_effect();
    provide_context(router);
    router
}

pub fn use_router() -> RouterService {
    use_context::<RouterService>()
        .expect("RouterService not found in context. Ensure Router is provided.")
}

// ============================================================================
// UI 组件
// ============================================================================

/// 路由器根组件
#[component]
pub fn Router(
    /// 会话信号
    session: Signal<Session>,
    children: Children,
) -> impl IntoView {
    provide_router(session);

    children()
}

/// 路由出口组件
#[component]
pub fn RouterOutlet(
    /// 路由匹配函数：接收当前路由，返回对应视图
    matcher: fn(AppRoute) -> AnyView,
) -> impl IntoView {
    let router = use_router();

    move || {
        let current = router.current_route().get();
        matcher(current)
    }
}

#[component]
pub fn Link(
    to: AppRoute,
    #[prop(optional, into)] class: String,
    children: Children,
) -> impl IntoView {
    let router = use_router();
    let href = to.to_path();

    let on_click = move |ev: web_sys::MouseEvent| {
        ev.prevent_default();
        router.navigate_to(to.clone());
    };

    view! {
        <a href=href class=class on:click=on_click>
            {children()}
        </a>
    }
}
