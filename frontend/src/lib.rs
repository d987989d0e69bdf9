//! BlaBlaBook 前端应用
//!
//! 核心逻辑（会话、集合 hook、路由守卫）位于 `blablabook` crate，这里只负责：
//! - `web`: 浏览器 API 适配（HTTP、存储、路由服务）
//! - `auth` / `theme`: 把核心 Store 桥接为 Leptos 上下文
//! - `components`: UI 组件层

mod auth;
mod components {
    pub mod admin;
    pub mod books;
    pub mod login;
    pub mod navbar;
    pub mod profile;
    pub mod shelves;
}
mod hooks;
mod theme;
pub(crate) mod web;

use blablabook::AppRoute;
use leptos::prelude::*;

use crate::auth::{AuthContext, init_auth};
use crate::components::admin::{AdminHomePage, AdminReviewsPage, AdminUsersPage};
use crate::components::books::{BookDetailPage, BooksPage};
use crate::components::login::{LoginPage, RegisterPage};
use crate::components::navbar::Navbar;
use crate::components::profile::{HomePage, ProfilePage};
use crate::components::shelves::{
    LibrariesPage, LibraryDetailPage, ReadingListDetailPage, ReadingListsPage,
};
use crate::theme::ThemeContext;
use crate::web::router::{Router, RouterOutlet};

/// 路由匹配函数
fn route_matcher(route: AppRoute) -> AnyView {
    match route {
        AppRoute::Home => view! { <HomePage /> }.into_any(),
        AppRoute::Login => view! { <LoginPage /> }.into_any(),
        AppRoute::Register => view! { <RegisterPage /> }.into_any(),
        AppRoute::Books => view! { <BooksPage /> }.into_any(),
        AppRoute::BookDetail(id) => view! { <BookDetailPage id=id /> }.into_any(),
        AppRoute::Libraries => view! { <LibrariesPage /> }.into_any(),
        AppRoute::LibraryDetail(id) => view! { <LibraryDetailPage id=id /> }.into_any(),
        AppRoute::ReadingLists => view! { <ReadingListsPage /> }.into_any(),
        AppRoute::ReadingListDetail(id) => view! { <ReadingListDetailPage id=id /> }.into_any(),
        AppRoute::Profile => view! { <ProfilePage /> }.into_any(),
        AppRoute::AdminHome => view! { <AdminHomePage /> }.into_any(),
        AppRoute::AdminUsers => view! { <AdminUsersPage /> }.into_any(),
        AppRoute::AdminReviews => view! { <AdminReviewsPage /> }.into_any(),
        AppRoute::NotFound => view! {
            <div class="flex items-center justify-center min-h-screen bg-base-200">
                <div class="text-center">
                    <h1 class="text-6xl font-bold text-error">"404"</h1>
                    <p class="text-xl mt-4">"页面未找到"</p>
                </div>
            </div>
        }
        .into_any(),
    }
}

#[component]
pub fn App() -> impl IntoView {
    // 1. 创建认证上下文（持有全部核心服务）
    let auth_ctx = AuthContext::new();
    provide_context(auth_ctx);

    // 2. 获取 CSRF 令牌并校验本地会话
    init_auth(&auth_ctx);

    // 3. 主题上下文
    provide_context(ThemeContext::new(auth_ctx.services().theme().clone()));

    // 4. 路由器只依赖会话信号
    let session = auth_ctx.session_signal();

    view! {
        <Router session=session>
            <Navbar />
            <RouterOutlet matcher=route_matcher />
        </Router>
    }
}
