//! 中间件与请求身份解析。

pub mod auth;

pub use auth::*;
