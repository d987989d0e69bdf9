//! 路由定义与守卫 - 领域模型
//!
//! 纯粹的业务逻辑层，不依赖于 DOM 或 web_sys。
//! 守卫只根据会话状态给出放行/重定向决定，真正的跳转由注入的 [`Navigator`] 执行。

use std::fmt::Display;

use blablabook_shared::{BookId, LibraryId, ReadingListId};

use crate::session::Session;

/// 应用路由枚举
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AppRoute {
    /// 公开首页 (默认路由)
    #[default]
    Home,
    Login,
    Register,
    /// 书目浏览（公开）
    Books,
    BookDetail(BookId),
    Libraries,
    LibraryDetail(LibraryId),
    ReadingLists,
    ReadingListDetail(ReadingListId),
    Profile,
    AdminHome,
    AdminUsers,
    AdminReviews,
    NotFound,
}

/// 路由的访问级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Authenticated,
    Admin,
}

impl AppRoute {
    /// 将 URL path 解析为路由枚举
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Self::Home,
            ["login"] => Self::Login,
            ["register"] => Self::Register,
            ["books"] => Self::Books,
            ["books", id] => id.parse().map_or(Self::NotFound, Self::BookDetail),
            ["libraries"] => Self::Libraries,
            ["libraries", id] => id.parse().map_or(Self::NotFound, Self::LibraryDetail),
            ["reading-lists"] => Self::ReadingLists,
            ["reading-lists", id] => id.parse().map_or(Self::NotFound, Self::ReadingListDetail),
            ["profile"] => Self::Profile,
            ["admin"] | ["admin", "home"] => Self::AdminHome,
            ["admin", "users"] => Self::AdminUsers,
            ["admin", "reviews"] => Self::AdminReviews,
            _ => Self::NotFound,
        }
    }

    /// 获取路由对应的 URL path
    pub fn to_path(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            Self::Login => "/login".to_string(),
            Self::Register => "/register".to_string(),
            Self::Books => "/books".to_string(),
            Self::BookDetail(id) => format!("/books/{}", id),
            Self::Libraries => "/libraries".to_string(),
            Self::LibraryDetail(id) => format!("/libraries/{}", id),
            Self::ReadingLists => "/reading-lists".to_string(),
            Self::ReadingListDetail(id) => format!("/reading-lists/{}", id),
            Self::Profile => "/profile".to_string(),
            Self::AdminHome => "/admin/home".to_string(),
            Self::AdminUsers => "/admin/users".to_string(),
            Self::AdminReviews => "/admin/reviews".to_string(),
            Self::NotFound => "/404".to_string(),
        }
    }

    /// **核心守卫表：定义该路由需要的访问级别**
    pub fn access(&self) -> RouteAccess {
        match self {
            Self::Libraries
            | Self::LibraryDetail(_)
            | Self::ReadingLists
            | Self::ReadingListDetail(_)
            | Self::Profile => RouteAccess::Authenticated,
            Self::AdminHome | Self::AdminUsers | Self::AdminReviews => RouteAccess::Admin,
            _ => RouteAccess::Public,
        }
    }

    /// 定义已认证用户是否应该离开此路由（如登录页）
    pub fn should_redirect_when_authenticated(&self) -> bool {
        matches!(self, Self::Login | Self::Register)
    }

    /// 守卫拒绝时的重定向目标（公开入口）
    pub fn auth_failure_redirect() -> Self {
        Self::Home
    }

    /// 已认证用户离开登录页时的目标
    pub fn auth_success_redirect() -> Self {
        Self::Books
    }

    /// 会话过期（401）后的跳转目标
    pub fn session_expired_redirect() -> Self {
        Self::Login
    }
}

impl Display for AppRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_path())
    }
}

// =========================================================
// 守卫 (Guards)
// =========================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(AppRoute),
}

pub fn require_auth(session: &Session) -> GuardDecision {
    if session.is_authenticated {
        GuardDecision::Allow
    } else {
        GuardDecision::Redirect(AppRoute::auth_failure_redirect())
    }
}

pub fn require_admin(session: &Session) -> GuardDecision {
    if session.is_authenticated && session.is_admin() {
        GuardDecision::Allow
    } else {
        GuardDecision::Redirect(AppRoute::auth_failure_redirect())
    }
}

/// 对目标路由执行守卫，会话变化时应重新调用
pub fn evaluate(route: &AppRoute, session: &Session) -> GuardDecision {
    match route.access() {
        RouteAccess::Authenticated => require_auth(session),
        RouteAccess::Admin => require_admin(session),
        RouteAccess::Public if session.is_authenticated && route.should_redirect_when_authenticated() => {
            GuardDecision::Redirect(AppRoute::auth_success_redirect())
        }
        RouteAccess::Public => GuardDecision::Allow,
    }
}

/// 导航端口：由宿主（浏览器 History、测试记录器）实现
pub trait Navigator {
    fn redirect(&self, route: AppRoute);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::session::tests::profile;
    use std::cell::RefCell;

    /// 记录跳转的导航器
    #[derive(Default)]
    pub struct RecordingNavigator {
        pub redirects: RefCell<Vec<AppRoute>>,
    }

    impl Navigator for RecordingNavigator {
        fn redirect(&self, route: AppRoute) {
            self.redirects.borrow_mut().push(route);
        }
    }

    #[test]
    fn test_path_round_trip() {
        for route in [
            AppRoute::Home,
            AppRoute::Books,
            AppRoute::BookDetail(12),
            AppRoute::LibraryDetail(3),
            AppRoute::ReadingListDetail(4),
            AppRoute::AdminHome,
            AppRoute::AdminReviews,
        ] {
            assert_eq!(AppRoute::from_path(&route.to_path()), route);
        }
        assert_eq!(AppRoute::from_path("/books/abc"), AppRoute::NotFound);
        assert_eq!(AppRoute::from_path("/books/?q=dune"), AppRoute::Books);
    }

    #[test]
    fn test_unauthenticated_admin_visit_redirects_home() {
        let session = Session::default();
        assert_eq!(
            evaluate(&AppRoute::from_path("/admin/home"), &session),
            GuardDecision::Redirect(AppRoute::Home)
        );
        assert_eq!(AppRoute::Home.to_path(), "/");
    }

    #[test]
    fn test_admin_guard_needs_admin_role() {
        let reader = Session::authenticated(profile(1, &["USER"]));
        let admin = Session::authenticated(profile(2, &["ADMIN"]));

        assert_eq!(require_admin(&reader), GuardDecision::Redirect(AppRoute::Home));
        assert_eq!(require_admin(&admin), GuardDecision::Allow);
        assert_eq!(evaluate(&AppRoute::Libraries, &reader), GuardDecision::Allow);
        assert_eq!(
            evaluate(&AppRoute::Libraries, &Session::default()),
            GuardDecision::Redirect(AppRoute::Home)
        );
    }

    #[test]
    fn test_authenticated_user_leaves_login() {
        let reader = Session::authenticated(profile(1, &[]));
        assert_eq!(
            evaluate(&AppRoute::Login, &reader),
            GuardDecision::Redirect(AppRoute::Books)
        );
        assert_eq!(evaluate(&AppRoute::Books, &Session::default()), GuardDecision::Allow);
    }
}
