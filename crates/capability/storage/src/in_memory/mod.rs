//! 内存存储实现模块
//!
//! 用于本地演示（未配置数据库时）和测试。
//!
//! 包含以下实现：
//! - UserStore + RbacStore: InMemoryUserStore
//! - SettingsStore: InMemorySettingsStore
//! - IssueStore + RemedyStore + AttachmentStore: InMemoryIssueStore
//! - AuditLogStore: InMemoryAuditLogStore
//! - MachineCatalog: InMemoryMachineCatalog

pub mod audit;
pub mod issue;
pub mod machine;
pub mod settings;
pub mod user;

pub use audit::*;
pub use issue::*;
pub use machine::*;
pub use settings::*;
pub use user::*;
