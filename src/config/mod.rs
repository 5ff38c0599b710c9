// ==========================================
// 工单一致性维护层 - 配置层
// ==========================================
// 职责: 同步配置加载，缺省值与合法性校验
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod sync_config;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigError, ConfigManager, ConfigResult};
pub use sync_config::{CalendarPolicy, SyncConfig};
