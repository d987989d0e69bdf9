//! 认证服务
//!
//! 登录、注册、登出与资料刷新。成功后写入 [`SessionStore`]，
//! 守卫与各 hook 通过会话状态感知结果。

use std::rc::Rc;

use blablabook_shared::UserProfile;
use blablabook_shared::protocol::{HttpMethod, LoginRequest, RegisterRequest, endpoints};

use crate::api::{ApiGateway, decode_entity};
use crate::error::{ApiError, ApiResult};
use crate::request::HttpClient;
use crate::session::SessionStore;

pub struct AuthService<C: HttpClient> {
    gateway: Rc<ApiGateway<C>>,
}

impl<C: HttpClient> Clone for AuthService<C> {
    fn clone(&self) -> Self {
        Self {
            gateway: Rc::clone(&self.gateway),
        }
    }
}

fn require_filled(fields: &[(&str, &str)]) -> ApiResult<()> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((label, _)) => Err(ApiError::local_precondition(format!("{}不能为空", label))),
        None => Ok(()),
    }
}

fn require_email(email: &str) -> ApiResult<()> {
    let email = email.trim();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(())
    } else {
        Err(ApiError::local_precondition("邮箱格式不正确"))
    }
}

impl<C: HttpClient + 'static> AuthService<C> {
    pub fn new(gateway: Rc<ApiGateway<C>>) -> Self {
        Self { gateway }
    }

    pub fn session(&self) -> &SessionStore {
        self.gateway.session()
    }

    pub async fn login(&self, credentials: &LoginRequest) -> ApiResult<UserProfile> {
        require_filled(&[
            ("邮箱", credentials.email.as_str()),
            ("密码", credentials.password.as_str()),
        ])?;

        let response = self
            .gateway
            .call(credentials)
            .await
            .map_err(|e| e.in_op("auth.login"))?;
        tracing::info!(user_id = response.user.id, "登录成功");
        self.session().login(response.user.clone());
        Ok(response.user)
    }

    pub async fn register(&self, form: &RegisterRequest) -> ApiResult<UserProfile> {
        require_filled(&[
            ("用户名", form.username.as_str()),
            ("邮箱", form.email.as_str()),
            ("密码", form.password.as_str()),
        ])?;
        require_email(&form.email)?;

        let response = self
            .gateway
            .call(form)
            .await
            .map_err(|e| e.in_op("auth.register"))?;
        tracing::info!(user_id = response.user.id, "注册成功");
        self.session().login(response.user.clone());
        Ok(response.user)
    }

    /// 通知后端登出；无论请求成败，本地会话与令牌都会被清除
    pub async fn logout(&self) -> ApiResult<()> {
        let result = self
            .gateway
            .request(HttpMethod::Post, endpoints::AUTH_LOGOUT, None, &[])
            .await;
        self.session().logout();
        self.gateway.csrf().invalidate();
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "后端登出失败，已清除本地会话");
                Err(e.in_op("auth.logout"))
            }
        }
    }

    /// 重新获取当前用户资料
    pub async fn refresh_profile(&self) -> ApiResult<UserProfile> {
        let response = self
            .gateway
            .request(HttpMethod::Get, endpoints::AUTH_ME, None, &[])
            .await?;
        let user: UserProfile =
            decode_entity(&response.body, &["user"]).map_err(|e| e.in_op("auth.refresh_profile"))?;
        self.session().login(user.clone());
        Ok(user)
    }

    /// 启动时校验恢复出的会话；未登录时不发请求
    pub async fn restore(&self) -> ApiResult<Option<UserProfile>> {
        if !self.session().is_authenticated() {
            return Ok(None);
        }
        self.refresh_profile().await.map(Some)
    }
}
