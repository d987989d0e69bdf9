use blablabook::{AppRoute, Operation};
use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::auth::use_auth;
use crate::hooks::use_collection;
use crate::web::router::Link;

#[component]
pub fn HomePage() -> impl IntoView {
    let auth = use_auth();

    view! {
        <div class="hero min-h-[60vh]">
            <div class="hero-content text-center">
                <div class="max-w-md space-y-4">
                    <h1 class="text-5xl font-bold">"BlaBlaBook"</h1>
                    <p>"整理你的书架，记录每一次阅读。"</p>
                    {move || {
                        if auth.is_loading() {
                            view! { <span class="loading loading-dots"></span> }.into_any()
                        } else if auth.session().is_authenticated {
                            view! { <Link to=AppRoute::Books class="btn btn-primary">"进入书目"</Link> }.into_any()
                        } else {
                            view! { <Link to=AppRoute::Login class="btn btn-primary">"开始使用"</Link> }.into_any()
                        }
                    }}
                </div>
            </div>
        </div>
    }
}

/// 个人资料与本人的书评
#[component]
pub fn ProfilePage() -> impl IntoView {
    let auth = use_auth();
    let (reviews, version) = use_collection(auth.services().reviews());

    if let Some(user_id) = auth.services().session().user_id() {
        let hook = reviews.get_value();
        spawn_local(async move {
            let _ = hook.fetch_for_user(user_id).await;
        });
    }

    view! {
        <div class="container mx-auto p-4 space-y-4">
            {move || auth.session().user.map(|user| view! {
                <div class="card bg-base-100 shadow p-4">
                    <h1 class="text-2xl font-bold">{user.display_name()}</h1>
                    <p class="opacity-70">{user.email.clone()}</p>
                </div>
            })}
            <h2 class="text-xl font-semibold">"我的书评"</h2>
            {move || {
                version.track();
                reviews.with_value(|h| {
                    if let Some(text) = h.error(Operation::Fetch) {
                        return view! { <div role="alert" class="alert alert-error">{text}</div> }.into_any();
                    }
                    h.projected()
                        .into_iter()
                        .map(|review| {
                            let book_id = review.book_id;
                            let title = review.book_title.unwrap_or_else(|| format!("#{}", book_id));
                            view! {
                                <div class="card bg-base-100 shadow-sm p-3">
                                    <Link to=AppRoute::BookDetail(book_id) class="font-semibold">{title}</Link>
                                    <p>{review.content}</p>
                                </div>
                            }
                        })
                        .collect_view()
                        .into_any()
                })
            }}
        </div>
    }
}
