//! 测试装配：mock 传输 + 内存存储 + 记录跳转的导航器

use std::rc::Rc;

use blablabook_shared::protocol::HttpMethod;
use blablabook_shared::{Author, Book, UserProfile};
use serde_json::json;

use crate::api::ApiGateway;
use crate::config::ClientConfig;
use crate::request::MockHttpClient;
use crate::route::tests::RecordingNavigator;
use crate::session::SessionStore;
use crate::storage::MemoryStorage;

pub use crate::session::tests::profile;

pub const BASE: &str = "http://test.local/api";

pub fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

pub struct Harness {
    pub gateway: Rc<ApiGateway<MockHttpClient>>,
    pub navigator: Rc<RecordingNavigator>,
    pub storage: MemoryStorage,
}

impl Harness {
    pub fn new() -> Self {
        let storage = MemoryStorage::new();
        let config = ClientConfig::new(BASE).with_metadata_base("http://meta.local");
        let session = SessionStore::open(Rc::new(storage.clone()), &config);
        let navigator = Rc::new(RecordingNavigator::default());
        let gateway = ApiGateway::new(MockHttpClient::new(), config, session, navigator.clone());
        let harness = Self {
            gateway: Rc::new(gateway),
            navigator,
            storage,
        };
        harness.mock(HttpMethod::Get, "/csrf-token", 200, json!({"csrfToken": "tok-1"}));
        harness
    }

    pub fn signed_in(user: UserProfile) -> Self {
        let harness = Self::new();
        harness.gateway.session().login(user);
        harness
    }

    pub fn client(&self) -> &MockHttpClient {
        self.gateway.client()
    }

    pub fn mock(&self, method: HttpMethod, path: &str, status: u16, body: serde_json::Value) {
        self.client().mock_response(method, &url(path), status, body);
    }

    pub fn count(&self, method: HttpMethod, path: &str) -> usize {
        self.client().count(method, &url(path))
    }

    pub fn redirects(&self) -> usize {
        self.navigator.redirects.borrow().len()
    }
}

pub fn book(id: i64, title: &str, author: &str, rating: Option<f64>) -> Book {
    Book {
        id,
        title: title.to_string(),
        authors: vec![Author {
            id: None,
            name: author.to_string(),
        }],
        isbn: None,
        open_library_key: None,
        summary: None,
        cover_url: None,
        publication_year: None,
        genres: Vec::new(),
        average_rating: rating,
        owner_id: None,
        created_at: None,
        updated_at: None,
    }
}

pub fn catalog() -> Vec<Book> {
    vec![
        book(1, "Dune", "Frank Herbert", Some(4.6)),
        book(2, "Fondation", "Isaac Asimov", Some(4.2)),
        book(3, "Les Misérables", "Victor Hugo", None),
        book(4, "L'Étranger", "Albert Camus", Some(3.9)),
        book(5, "Hypérion", "Dan Simmons", Some(4.4)),
    ]
}
