//! 浏览器平台适配
//!
//! 为核心的传输、存储、导航端口提供浏览器实现，并承载路由服务。

mod http;
pub mod router;
mod storage;

pub use http::BrowserHttpClient;
pub use router::BrowserNavigator;
pub use storage::BrowserStorage;
