//! 权限解析能力
//!
//! - [`resolver`]：纯函数，基于 [`domain::Actor`] 判定权限
//! - [`service`]：从存储装载角色 / 覆盖 / 公共角色，构造 Actor（装载失败即无权限）

pub mod resolver;
pub mod service;

pub use resolver::{all_permissions, has_permission, has_permission_code};
pub use service::{AccessError, AccessService};
