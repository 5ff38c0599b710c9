// ==========================================
// 工单一致性维护层 - 应用状态
// ==========================================
// 职责: 持有共享连接、配置管理器与工单引擎
// ==========================================

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::config::{ConfigManager, SyncConfig};
use crate::db::{init_schema, open_shared_connection, SharedConnection};
use crate::engine::{OperationPlanEngine, OperationPlanRepositories, PropagationContext};

/// 显式指定数据库路径的环境变量
pub const DB_PATH_ENV: &str = "OPPLAN_SYNC_DB_PATH";

/// 应用状态
///
/// 所有组件共享同一个连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    pub conn: SharedConnection,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 启动时加载的同步配置
    pub config: SyncConfig,

    /// 工单引擎
    pub engine: Arc<OperationPlanEngine>,
}

impl AppState {
    /// 打开数据库、建表并加载配置
    pub fn new(db_path: String) -> anyhow::Result<Self> {
        tracing::info!("初始化AppState, 数据库路径: {}", db_path);

        let conn = open_shared_connection(&db_path)?;
        {
            let guard = conn
                .lock()
                .map_err(|e| anyhow::anyhow!("数据库锁获取失败: {}", e))?;
            init_schema(&guard)?;
        }

        let config_manager = Arc::new(ConfigManager::from_connection(conn.clone()));
        let config = config_manager.load_sync_config()?;
        tracing::debug!(?config, "同步配置已加载");

        let repos = OperationPlanRepositories::from_connection(conn.clone());
        let engine = Arc::new(OperationPlanEngine::new(repos, config.clone()));

        Ok(Self {
            db_path,
            conn,
            config_manager,
            config,
            engine,
        })
    }

    /// 以当前时间创建传播上下文
    pub fn context(&self, now: NaiveDateTime) -> PropagationContext {
        self.engine.context(now)
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./opplan_sync.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("opplan-sync");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("opplan_sync.db");
        }
    }
    path.to_string_lossy().to_string()
}
