//! # Logbook Storage 模块
//!
//! 本模块提供统一的数据存储抽象层，支持多种存储后端实现。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：定义所有资源存储的异步 Trait 接口
//! 2. **数据模型层** (`models.rs`)：定义存储相关的数据结构
//! 3. **错误处理层** (`error.rs`)：统一的存储错误类型（含并发冲突分类）
//! 4. **验证辅助层** (`validation.rs`)：写入前的一致性校验（附件归属、费用）
//! 5. **连接管理层** (`connection.rs`)：数据库连接池与建表脚本
//! 6. **文件层** (`files.rs`)：附件本体的落盘存储
//! 7. **实现层**：
//!    - `in_memory/`：内存存储实现（未配置数据库时与测试中使用）
//!    - `postgres/`：PostgreSQL 存储实现（生产环境使用）
//!
//! ## 核心约束
//!
//! - **单例**：公共角色与全局设置只有一行，通过原子 get-or-create 访问，不提供通用 CRUD
//! - **乐观并发**：故障单带 `version`，更新时校验，冲突返回可重试错误
//! - **松散引用**：`machine_id_ref` 不是外键，机器目录查不到时照常工作
//! - **删除用户**：单个事务内先删除角色分配，再删除用户
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use logbook_storage::{InMemoryUserStore, UserStore};
//!
//! let user_store = InMemoryUserStore::with_default_admin();
//! let user = user_store.find_by_username("admin").await?;
//! ```

pub mod connection;
pub mod error;
pub mod files;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod traits;
pub mod validation;

pub use connection::*;
pub use error::*;
pub use files::*;
pub use models::*;
pub use traits::*;
pub use validation::*;

pub use in_memory::{
    InMemoryAuditLogStore, InMemoryIssueStore, InMemoryMachineCatalog, InMemorySettingsStore,
    InMemoryUserStore,
};

pub use postgres::{
    PgAuditLogStore, PgIssueStore, PgMachineCatalog, PgSettingsStore, PgUserStore,
};
