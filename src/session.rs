//! 会话 Store
//!
//! 进程级的认证状态，是所有数据 hook 与路由守卫唯一的事实来源。

use std::rc::Rc;

use blablabook_shared::{ROLE_ADMIN, UserId, UserProfile};
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::storage::StorageAdapter;
use crate::store::{Persisted, PersistedStore, SubscriptionId};

/// 认证状态
///
/// 不变量：`is_authenticated == user.is_some()`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: Option<UserProfile>,
    pub is_authenticated: bool,
}

impl Session {
    pub fn authenticated(user: UserProfile) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id)
    }

    /// 角色名不区分大小写；未认证时恒为 false
    pub fn has_role(&self, name: &str) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| u.roles.iter().any(|r| r.name.eq_ignore_ascii_case(name)))
    }

    pub fn has_permission(&self, action: &str, resource: &str) -> bool {
        self.user.as_ref().is_some_and(|u| {
            u.permissions.iter().any(|p| {
                p.action.eq_ignore_ascii_case(action) && p.resource.eq_ignore_ascii_case(resource)
            })
        })
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }
}

impl Persisted for Session {
    const VERSION: u32 = 1;

    fn rehydrated(mut self) -> Self {
        self.is_authenticated = self.user.is_some();
        self
    }
}

/// 会话 Store 句柄
#[derive(Clone)]
pub struct SessionStore {
    store: PersistedStore<Session>,
}

impl SessionStore {
    pub fn open(storage: Rc<dyn StorageAdapter>, config: &ClientConfig) -> Self {
        Self {
            store: PersistedStore::open(storage, config.session_storage_key.clone()),
        }
    }

    /// 登录：整体替换会话
    pub fn login(&self, profile: UserProfile) {
        tracing::info!(user_id = profile.id, "会话已建立");
        self.store.set(Session::authenticated(profile));
    }

    /// 登出，幂等
    ///
    /// 返回本次调用是否真的改变了状态；已登出时不写存储也不通知订阅者。
    pub fn logout(&self) -> bool {
        let already_out = self.store.with(|s| s.user.is_none() && !s.is_authenticated);
        if already_out {
            return false;
        }
        tracing::info!("会话已清除");
        self.store.set(Session::default());
        true
    }

    pub fn snapshot(&self) -> Session {
        self.store.get()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.with(|s| s.is_authenticated)
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.store.with(|s| s.user.clone())
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.store.with(Session::user_id)
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.store.with(|s| s.has_role(name))
    }

    pub fn has_permission(&self, action: &str, resource: &str) -> bool {
        self.store.with(|s| s.has_permission(action, resource))
    }

    pub fn is_admin(&self) -> bool {
        self.store.with(Session::is_admin)
    }

    /// 变更操作的前置检查：必须已登录
    pub fn require_user(&self) -> ApiResult<UserProfile> {
        self.current_user()
            .ok_or_else(|| ApiError::local_precondition("请先登录后再进行此操作"))
    }

    /// 管理操作的前置检查
    pub fn require_admin(&self) -> ApiResult<UserProfile> {
        let user = self.require_user()?;
        if self.is_admin() {
            Ok(user)
        } else {
            Err(ApiError::local_precondition("需要管理员权限"))
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&Session) + 'static) -> SubscriptionId {
        self.store.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    pub fn reset(&self) {
        self.store.reset();
    }
}
