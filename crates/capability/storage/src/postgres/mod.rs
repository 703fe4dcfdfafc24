//! # PostgreSQL 存储实现模块
//!
//! 本模块提供所有存储接口的 PostgreSQL 实现，用于生产环境。
//!
//! ## 设计原则
//!
//! 1. **参数化查询**：所有 SQL 使用参数绑定（`$1`, `$2` 或 `QueryBuilder::push_bind`）
//! 2. **事务边界**：删除用户、设置角色权限、故障单版本更新 + 停机历史追加均在单个事务内完成
//! 3. **单例行**：`public_role` 与 `global_settings` 固定主键 1，按需原子创建
//! 4. **时间戳**：统一 `timestamptz`；旧的无时区列按 UTC 解释（见 `rows.rs`）
//!
//! ## 包含的实现
//!
//! - **UserStore + RbacStore** (`user.rs`)：用户、角色、权限、用户角色分配、公共角色
//! - **SettingsStore** (`settings.rs`)：全局设置
//! - **IssueStore + RemedyStore + AttachmentStore** (`issue.rs`)：故障单、维修措施、附件记录
//! - **AuditLogStore** (`audit.rs`)：审计日志
//! - **MachineCatalog** (`machine.rs`)：只读机器目录
//!
//! ## 数据库模式
//!
//! 见 `migrations/0001_init.sql`，启动时由 [`crate::connection::apply_schema`] 执行。
//!
//! ## 错误处理
//!
//! 所有存储操作返回 `Result<T, StorageError>`：
//!
//! - `sqlx::Error`：自动转换为 `StorageError`（Backend）
//! - 版本不一致：`StorageError::conflict`
//! - 返回 `Option<T>` / `bool` 表示"可能不存在"

pub mod audit;
pub mod issue;
pub mod machine;
mod rows;
pub mod settings;
pub mod user;

pub use audit::*;
pub use issue::*;
pub use machine::*;
pub use settings::*;
pub use user::*;
