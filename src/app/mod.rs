// ==========================================
// 工单一致性维护层 - 应用层
// ==========================================
// 职责: 组装连接、配置与引擎
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
