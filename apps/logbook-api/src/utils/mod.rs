//! 响应构造与输入校验。

pub mod response;
pub mod validation;
