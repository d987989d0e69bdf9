use std::str::FromStr;

use blablabook::hooks::{BookSort, ReviewsHook};
use blablabook::{AppRoute, Operation};
use blablabook_shared::protocol::CreateReviewRequest;
use blablabook_shared::{Book, BookId};
use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::auth::use_auth;
use crate::components::login::ErrorAlert;
use crate::hooks::use_collection;
use crate::web::BrowserHttpClient;
use crate::web::router::Link;

fn sort_label(sort: BookSort) -> &'static str {
    match sort {
        BookSort::TitleAsc => "书名 A→Z",
        BookSort::TitleDesc => "书名 Z→A",
        BookSort::AuthorAsc => "作者 A→Z",
        BookSort::AuthorDesc => "作者 Z→A",
        BookSort::RatingDesc => "评分从高到低",
        BookSort::RatingAsc => "评分从低到高",
        BookSort::YearDesc => "出版年份（新）",
        BookSort::YearAsc => "出版年份（旧）",
        BookSort::Recent => "最近添加",
    }
}

fn confirm(message: &str) -> bool {
    window().confirm_with_message(message).unwrap_or(false)
}

// =========================================================
// 书目列表
// =========================================================

#[component]
pub fn BooksPage() -> impl IntoView {
    let auth = use_auth();
    let (books, version) = use_collection(auth.services().books());

    let hook = books.get_value();
    spawn_local(async move {
        // 错误已记录在 hook 中，由视图展示
        let _ = hook.fetch_default().await;
    });

    let on_search = move |ev: leptos::web_sys::Event| {
        let query = event_target_value(&ev);
        books.with_value(|h| h.search(&query));
    };

    let on_sort = move |ev: leptos::web_sys::Event| {
        if let Ok(sort) = BookSort::from_str(&event_target_value(&ev)) {
            books.with_value(|h| h.sort(sort));
        }
    };

    let delete_book = move |book: Book| {
        if !confirm(&format!("确定要删除《{}》吗？", book.title)) {
            return;
        }
        let hook = books.get_value();
        spawn_local(async move {
            let _ = hook.delete_book(book.id).await;
        });
    };

    let fetch_error = Signal::derive(move || {
        version.track();
        books.with_value(|h| h.error(Operation::Fetch).or_else(|| h.error(Operation::Delete)))
    });

    view! {
        <div class="container mx-auto p-4 space-y-4">
            <div class="flex flex-wrap gap-2 items-center">
                <input
                    type="search"
                    placeholder="搜索书名、作者或 ISBN"
                    class="input input-bordered flex-1"
                    on:input=on_search
                />
                <select class="select select-bordered" on:change=on_sort>
                    <option value="" disabled selected>"排序"</option>
                    {BookSort::ALL
                        .into_iter()
                        .map(|sort| view! { <option value=sort.as_str()>{sort_label(sort)}</option> })
                        .collect_view()}
                </select>
            </div>

            {move || fetch_error.get().map(|text| view! {
                <div role="alert" class="alert alert-error">{text}</div>
            })}

            {move || {
                version.track();
                let (loading, items) = books.with_value(|h| (h.is_loading(), h.projected()));
                if loading && items.is_empty() {
                    return view! {
                        <div class="flex justify-center p-8">
                            <span class="loading loading-spinner loading-lg"></span>
                        </div>
                    }
                    .into_any();
                }
                if items.is_empty() {
                    return view! { <p class="text-center opacity-60 p-8">"暂无书目"</p> }.into_any();
                }
                view! {
                    <div class="grid gap-4 md:grid-cols-2 lg:grid-cols-3">
                        {items
                            .into_iter()
                            .map(|book| {
                                let can_delete = books.with_value(|h| h.can_manage(&book));
                                view! { <BookCard book=book can_delete=can_delete on_delete=delete_book /> }
                            })
                            .collect_view()}
                    </div>
                }
                .into_any()
            }}
        </div>
    }
}

#[component]
fn BookCard(book: Book, can_delete: bool, on_delete: impl Fn(Book) + Copy + 'static) -> impl IntoView {
    let rating = book
        .average_rating
        .map(|r| format!("★ {:.1}", r))
        .unwrap_or_else(|| "暂无评分".to_string());
    let year = book.publication_year.map(|y| y.to_string()).unwrap_or_default();
    let authors = book.author_names();
    let to = AppRoute::BookDetail(book.id);
    let title = book.title.clone();

    view! {
        <div class="card bg-base-100 shadow-md">
            <div class="card-body">
                <h2 class="card-title">
                    <Link to=to class="link link-hover">{title}</Link>
                </h2>
                <p class="text-sm opacity-70">{authors}</p>
                <div class="flex justify-between text-sm">
                    <span>{rating}</span>
                    <span>{year}</span>
                </div>
                {can_delete.then(|| view! {
                    <div class="card-actions justify-end">
                        <button class="btn btn-ghost btn-xs text-error" on:click=move |_| on_delete(book.clone())>
                            "删除"
                        </button>
                    </div>
                })}
            </div>
        </div>
    }
}

// =========================================================
// 书目详情：评分与书评
// =========================================================

#[component]
pub fn BookDetailPage(id: BookId) -> impl IntoView {
    let auth = use_auth();
    let services = auth.services();
    let (books, book_version) = use_collection(services.books());
    let (ratings, rating_version) = use_collection(services.ratings());
    let (reviews, review_version) = use_collection(services.reviews());

    let (books_hook, ratings_hook, reviews_hook) =
        (books.get_value(), ratings.get_value(), reviews.get_value());
    spawn_local(async move {
        if books_hook.fetch_one(id).await.is_ok() {
            let _ = books_hook.enrich(id).await;
        }
    });
    spawn_local(async move {
        let _ = ratings_hook.fetch_for_book(id).await;
    });
    spawn_local(async move {
        let _ = reviews_hook.fetch_for_book(id).await;
    });

    let book = Signal::derive(move || {
        book_version.track();
        books.with_value(|h| h.get(&id))
    });

    let rate = move |value: u8| {
        let hook = ratings.get_value();
        spawn_local(async move {
            let _ = hook.submit_rating(id, value).await;
        });
    };

    let rating_summary = move || {
        rating_version.track();
        ratings.with_value(|h| {
            let average = h
                .average_rating()
                .map(|a| format!("{:.1}", a))
                .unwrap_or_else(|| "-".to_string());
            let mine = h.user_rating().map(|r| r.rating).unwrap_or(0);
            (average, h.total_ratings(), mine, h.error(Operation::Submit))
        })
    };

    view! {
        <div class="container mx-auto p-4 space-y-6">
            {move || match book.get() {
                Some(book) => view! {
                    <div class="flex gap-6">
                        {book.cover_url.clone().map(|src| view! { <img class="w-32 rounded" src=src /> })}
                        <div class="space-y-2">
                            <h1 class="text-3xl font-bold">{book.title.clone()}</h1>
                            <p class="opacity-70">{book.author_names()}</p>
                            <p>{book.summary.clone().unwrap_or_default()}</p>
                        </div>
                    </div>
                }
                .into_any(),
                None => view! { <span class="loading loading-spinner loading-lg"></span> }.into_any(),
            }}

            <section class="card bg-base-100 shadow p-4 space-y-2">
                {move || {
                    let (average, total, mine, error) = rating_summary();
                    view! {
                        <p>{format!("平均评分 {}（{} 人评分）", average, total)}</p>
                        <div class="rating">
                            {(1..=5u8)
                                .map(|value| view! {
                                    <input
                                        type="radio"
                                        class="mask mask-star-2 bg-orange-400"
                                        prop:checked={value == mine}
                                        on:click=move |_| rate(value)
                                    />
                                })
                                .collect_view()}
                        </div>
                        {error.map(|text| view! { <p class="text-error text-sm">{text}</p> })}
                    }
                }}
            </section>

            <ReviewSection book_id=id reviews=reviews version=review_version />
        </div>
    }
}

#[component]
fn ReviewSection(
    book_id: BookId,
    reviews: StoredValue<ReviewsHook<BrowserHttpClient>, LocalStorage>,
    version: ReadSignal<u64>,
) -> impl IntoView {
    let (content, set_content) = signal(String::new());
    let (error_msg, set_error_msg) = signal(Option::<String>::None);

    let on_submit = move |ev: leptos::web_sys::SubmitEvent| {
        ev.prevent_default();
        set_error_msg.set(None);
        let hook = reviews.get_value();
        let req = CreateReviewRequest {
            book_id,
            content: content.get_untracked(),
            ..Default::default()
        };
        spawn_local(async move {
            match hook.create_review(&req).await {
                Ok(_) => set_content.set(String::new()),
                Err(e) => set_error_msg.set(Some(e.user_message("发表书评失败"))),
            }
        });
    };

    let delete_review = move |review_id| {
        if !confirm("确定要删除这条书评吗？") {
            return;
        }
        let hook = reviews.get_value();
        spawn_local(async move {
            let _ = hook.delete_review(review_id).await;
        });
    };

    view! {
        <section class="space-y-3">
            <h2 class="text-xl font-semibold">"书评"</h2>
            {move || {
                version.track();
                let has_mine = reviews.with_value(|h| h.my_review(book_id).is_some());
                (!has_mine).then(|| view! {
                    <form class="space-y-2" on:submit=on_submit>
                        <ErrorAlert message=error_msg />
                        <textarea
                            class="textarea textarea-bordered w-full"
                            placeholder="写下你的想法"
                            on:input=move |ev| set_content.set(event_target_value(&ev))
                            prop:value=content
                        ></textarea>
                        <button class="btn btn-primary btn-sm">"发表"</button>
                    </form>
                })
            }}
            {move || {
                version.track();
                reviews.with_value(|h| {
                    h.projected()
                        .into_iter()
                        .map(|review| {
                            let can_delete = h.can_moderate(&review);
                            let review_id = review.id;
                            view! {
                                <div class="card bg-base-100 shadow-sm p-3">
                                    <p class="text-sm font-semibold">
                                        {review.username.clone().unwrap_or_default()}
                                    </p>
                                    <p>{review.content.clone()}</p>
                                    {can_delete.then(|| view! {
                                        <button
                                            class="btn btn-ghost btn-xs text-error self-end"
                                            on:click=move |_| delete_review(review_id)
                                        >
                                            "删除"
                                        </button>
                                    })}
                                </div>
                            }
                        })
                        .collect_view()
                })
            }}
        </section>
    }
}
