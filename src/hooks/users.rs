//! 用户管理 hook（仅管理员）

use std::borrow::Cow;
use std::cmp::Ordering;
use std::ops::Deref;
use std::rc::Rc;

use blablabook_shared::protocol::{AssignRoleRequest, HttpMethod, endpoints};
use blablabook_shared::{Role, UserId, UserProfile};
use serde_json::Value;

use crate::api::{ApiGateway, decode_entity_value};
use crate::collection::{
    Collection, Endpoint, Entity, Operation, collate, compare_missing_low, directed,
};
use crate::error::{ApiError, ApiResult};
use crate::request::HttpClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSort {
    UsernameAsc,
    UsernameDesc,
    /// 最近注册的在前
    Recent,
    Oldest,
}

impl Entity for UserProfile {
    type Id = UserId;
    type Sort = UserSort;
    const COLLECTION: &'static str = "users";
    const SINGULAR: &'static str = "user";

    fn id(&self) -> UserId {
        self.id
    }

    fn item_path(&self) -> String {
        endpoints::admin_user(self.id)
    }

    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.username.as_str()),
            Cow::Borrowed(self.email.as_str()),
            Cow::Owned(self.display_name()),
        ]
    }

    fn compare(a: &Self, b: &Self, criterion: UserSort) -> Ordering {
        match criterion {
            UserSort::UsernameAsc => collate(&a.username, &b.username),
            UserSort::UsernameDesc => collate(&a.username, &b.username).reverse(),
            UserSort::Recent => directed(compare_missing_low(a.created_at, b.created_at), true),
            UserSort::Oldest => compare_missing_low(a.created_at, b.created_at),
        }
    }
}

pub struct UsersHook<C: HttpClient> {
    users: Collection<UserProfile, C>,
}

impl<C: HttpClient> Clone for UsersHook<C> {
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
        }
    }
}

impl<C: HttpClient> Deref for UsersHook<C> {
    type Target = Collection<UserProfile, C>;

    fn deref(&self) -> &Self::Target {
        &self.users
    }
}

impl<C: HttpClient + 'static> UsersHook<C> {
    pub fn new(gateway: Rc<ApiGateway<C>>) -> Self {
        Self {
            users: Collection::new(gateway),
        }
    }

    fn require_admin(&self, op: Operation) -> ApiResult<UserProfile> {
        self.session().require_admin().map_err(|e| self.reject(op, e))
    }

    fn loaded(&self, op: Operation, user_id: UserId) -> ApiResult<UserProfile> {
        self.get(&user_id).ok_or_else(|| {
            self.reject(op, ApiError::local_precondition(format!("用户 {} 尚未加载", user_id)))
        })
    }

    pub async fn fetch_users(&self) -> ApiResult<()> {
        self.require_admin(Operation::Fetch)?;
        self.fetch_all(&Endpoint(endpoints::ADMIN_USERS.to_string())).await
    }

    /// 授予角色；已拥有该角色时不发请求
    pub async fn assign_role(&self, user_id: UserId, role: &str) -> ApiResult<UserProfile> {
        self.require_admin(Operation::AssignRole)?;
        let user = self.loaded(Operation::AssignRole, user_id)?;
        if user.roles.iter().any(|r| r.name.eq_ignore_ascii_case(role)) {
            return Ok(user);
        }

        let path = endpoints::user_roles(user_id);
        let request = AssignRoleRequest {
            role: role.to_string(),
        };
        let returned = self
            .run(Operation::AssignRole, async {
                let response = self.gateway().send_json(HttpMethod::Post, &path, &request).await?;
                Ok(returned_user(&response.body))
            })
            .await?;

        let updated = returned.unwrap_or_else(|| {
            let mut user = user;
            user.roles.push(Role::new(role));
            user
        });
        self.commit(updated.clone());
        Ok(updated)
    }

    pub async fn unassign_role(&self, user_id: UserId, role: &str) -> ApiResult<UserProfile> {
        self.require_admin(Operation::AssignRole)?;
        let mut user = self.loaded(Operation::AssignRole, user_id)?;

        let path = endpoints::user_role(user_id, role);
        self.run(Operation::AssignRole, self.gateway().delete(&path)).await?;

        user.roles.retain(|r| !r.name.eq_ignore_ascii_case(role));
        self.commit(user.clone());
        Ok(user)
    }

    /// 删除用户；管理员不能删除自己
    pub async fn delete_user(&self, user_id: UserId) -> ApiResult<()> {
        let admin = self.require_admin(Operation::Delete)?;
        if admin.id == user_id {
            return Err(self.reject(Operation::Delete, ApiError::local_precondition("不能删除当前登录的账号")));
        }
        self.delete(&user_id).await
    }

    /// 写回集合；若修改的是当前登录用户，同步会话
    fn commit(&self, user: UserProfile) {
        if self.session().user_id() == Some(user.id) {
            self.session().login(user.clone());
        }
        self.apply(|state| state.upsert(user));
    }
}

fn returned_user(body: &str) -> Option<UserProfile> {
    let value: Value = serde_json::from_str(body).ok()?;
    decode_entity_value(value, &[UserProfile::SINGULAR]).ok()
}
