use blablabook::AppRoute;
use blablabook_shared::protocol::RegisterRequest;
use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::auth::{login, register, use_auth};
use crate::web::router::Link;

/// 登录成功后会话变化，路由守卫会把用户送往书目页，这里不需要手动导航
#[component]
pub fn LoginPage() -> impl IntoView {
    let auth = use_auth();

    let (email, set_email) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (is_submitting, set_is_submitting) = signal(false);
    let (error_msg, set_error_msg) = signal(Option::<String>::None);

    let on_submit = move |ev: leptos::web_sys::SubmitEvent| {
        ev.prevent_default();
        set_is_submitting.set(true);
        set_error_msg.set(None);

        spawn_local(async move {
            if let Err(message) = login(&auth, email.get_untracked(), password.get_untracked()).await {
                set_error_msg.set(Some(message));
            }
            set_is_submitting.set(false);
        });
    };

    view! {
        <div class="hero min-h-screen bg-base-200">
            <div class="hero-content flex-col w-full max-w-md">
                <h1 class="text-3xl font-bold">"BlaBlaBook"</h1>
                <div class="card shrink-0 w-full shadow-2xl bg-base-100">
                    <form class="card-body" on:submit=on_submit>
                        <ErrorAlert message=error_msg />
                        <div class="form-control">
                            <label class="label" for="email">
                                <span class="label-text">"邮箱"</span>
                            </label>
                            <input
                                id="email"
                                type="email"
                                on:input=move |ev| set_email.set(event_target_value(&ev))
                                prop:value=email
                                class="input input-bordered"
                                required
                            />
                        </div>
                        <div class="form-control">
                            <label class="label" for="password">
                                <span class="label-text">"密码"</span>
                            </label>
                            <input
                                id="password"
                                type="password"
                                on:input=move |ev| set_password.set(event_target_value(&ev))
                                prop:value=password
                                class="input input-bordered"
                                required
                            />
                        </div>
                        <div class="form-control mt-6">
                            <button class="btn btn-primary" disabled=move || is_submitting.get()>
                                {move || if is_submitting.get() {
                                    view! { <span class="loading loading-spinner"></span> "登录中..." }.into_any()
                                } else {
                                    "登录".into_any()
                                }}
                            </button>
                        </div>
                        <Link to=AppRoute::Register class="link text-sm">"还没有账号？注册"</Link>
                    </form>
                </div>
            </div>
        </div>
    }
}

#[component]
pub fn RegisterPage() -> impl IntoView {
    let auth = use_auth();

    let (username, set_username) = signal(String::new());
    let (email, set_email) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (is_submitting, set_is_submitting) = signal(false);
    let (error_msg, set_error_msg) = signal(Option::<String>::None);

    let on_submit = move |ev: leptos::web_sys::SubmitEvent| {
        ev.prevent_default();
        set_is_submitting.set(true);
        set_error_msg.set(None);

        let form = RegisterRequest {
            username: username.get_untracked(),
            email: email.get_untracked(),
            password: password.get_untracked(),
            first_name: None,
            last_name: None,
        };
        spawn_local(async move {
            if let Err(message) = register(&auth, form).await {
                set_error_msg.set(Some(message));
            }
            set_is_submitting.set(false);
        });
    };

    view! {
        <div class="hero min-h-screen bg-base-200">
            <div class="hero-content flex-col w-full max-w-md">
                <h1 class="text-3xl font-bold">"创建账号"</h1>
                <div class="card shrink-0 w-full shadow-2xl bg-base-100">
                    <form class="card-body" on:submit=on_submit>
                        <ErrorAlert message=error_msg />
                        <input
                            type="text"
                            placeholder="用户名"
                            on:input=move |ev| set_username.set(event_target_value(&ev))
                            prop:value=username
                            class="input input-bordered"
                            required
                        />
                        <input
                            type="email"
                            placeholder="邮箱"
                            on:input=move |ev| set_email.set(event_target_value(&ev))
                            prop:value=email
                            class="input input-bordered"
                            required
                        />
                        <input
                            type="password"
                            placeholder="密码"
                            on:input=move |ev| set_password.set(event_target_value(&ev))
                            prop:value=password
                            class="input input-bordered"
                            required
                        />
                        <button class="btn btn-primary mt-4" disabled=move || is_submitting.get()>
                            "注册"
                        </button>
                        <Link to=AppRoute::Login class="link text-sm">"已有账号？登录"</Link>
                    </form>
                </div>
            </div>
        </div>
    }
}

#[component]
pub fn ErrorAlert(message: ReadSignal<Option<String>>) -> impl IntoView {
    move || {
        message.get().map(|text| {
            view! {
                <div role="alert" class="alert alert-error text-sm py-2">
                    <span>{text}</span>
                </div>
            }
        })
    }
}
