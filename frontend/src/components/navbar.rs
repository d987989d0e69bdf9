use blablabook::AppRoute;
use blablabook_shared::Theme;
use leptos::prelude::*;

use crate::auth::{logout, use_auth};
use crate::theme::use_theme;
use crate::web::router::Link;

#[component]
pub fn Navbar() -> impl IntoView {
    let auth = use_auth();
    let theme = use_theme();

    let on_logout = move |_: leptos::web_sys::MouseEvent| logout(&auth);
    let on_toggle = move |_: leptos::web_sys::MouseEvent| theme.toggle();

    view! {
        <div class="navbar bg-base-100 shadow-sm">
            <div class="flex-1 gap-2">
                <Link to=AppRoute::Home class="btn btn-ghost text-xl">"BlaBlaBook"</Link>
                {move || {
                    let session = auth.session();
                    session.is_authenticated.then(|| view! {
                        <Link to=AppRoute::Books class="btn btn-ghost btn-sm">"书目"</Link>
                        <Link to=AppRoute::Libraries class="btn btn-ghost btn-sm">"书架"</Link>
                        <Link to=AppRoute::ReadingLists class="btn btn-ghost btn-sm">"阅读清单"</Link>
                        {session.is_admin().then(|| view! {
                            <Link to=AppRoute::AdminHome class="btn btn-ghost btn-sm">"管理"</Link>
                        })}
                    })
                }}
            </div>
            <div class="flex-none gap-2">
                <button class="btn btn-ghost btn-circle" on:click=on_toggle title="切换主题">
                    {move || match theme.theme() {
                        Theme::Light => "🌙",
                        Theme::Dark => "☀️",
                    }}
                </button>
                {move || match auth.session().user {
                    Some(user) => view! {
                        <Link to=AppRoute::Profile class="btn btn-ghost btn-sm">{user.display_name()}</Link>
                        <button class="btn btn-outline btn-sm" on:click=on_logout>"退出"</button>
                    }
                    .into_any(),
                    None => view! {
                        <Link to=AppRoute::Login class="btn btn-primary btn-sm">"登录"</Link>
                    }
                    .into_any(),
                }}
            </div>
        </div>
    }
}
