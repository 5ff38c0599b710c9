// ==========================================
// 工单一致性维护层 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::sync_config::{CalendarPolicy, SyncConfig};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// 配置层错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置读取失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("配置锁获取失败: {0}")]
    LockError(String),

    #[error("配置值非法 (key={key}, value={value}): {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> ConfigResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照
    pub fn get_config_snapshot(&self) -> ConfigResult<HashMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(config_map)
    }

    /// 加载同步配置；缺失的键取默认值，非法值报错
    pub fn load_sync_config(&self) -> ConfigResult<SyncConfig> {
        let snapshot = self.get_config_snapshot()?;
        let defaults = SyncConfig::default();

        Ok(SyncConfig {
            consume_material: parse_bool(
                &snapshot,
                config_keys::CONSUME_MATERIAL,
                defaults.consume_material,
            )?,
            consume_capacity: parse_bool(
                &snapshot,
                config_keys::CONSUME_CAPACITY,
                defaults.consume_capacity,
            )?,
            completed_allow_future: parse_bool(
                &snapshot,
                config_keys::COMPLETED_ALLOW_FUTURE,
                defaults.completed_allow_future,
            )?,
            calendar_policy: match snapshot.get(config_keys::CALENDAR_MERGE_POLICY) {
                Some(raw) => CalendarPolicy::from_str(raw).ok_or_else(|| {
                    invalid(config_keys::CALENDAR_MERGE_POLICY, raw, "应为 first_only 或 intersection")
                })?,
                None => defaults.calendar_policy,
            },
            time_unit_seconds: parse_positive_i64(
                &snapshot,
                config_keys::RESOURCEPLAN_TIME_UNIT_SECONDS,
                defaults.time_unit_seconds,
            )?,
            period_of_cover_horizon_days: parse_positive_i64(
                &snapshot,
                config_keys::PERIOD_OF_COVER_HORIZON_DAYS,
                defaults.period_of_cover_horizon_days,
            )?,
        })
    }
}

fn invalid(key: &str, value: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

fn parse_bool(snapshot: &HashMap<String, String>, key: &str, default: bool) -> ConfigResult<bool> {
    let Some(raw) = snapshot.get(key) else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(invalid(key, raw, "应为布尔值")),
    }
}

fn parse_positive_i64(
    snapshot: &HashMap<String, String>,
    key: &str,
    default: i64,
) -> ConfigResult<i64> {
    let Some(raw) = snapshot.get(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<i64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(invalid(key, raw, "应为正整数")),
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 明细生成开关
    pub const CONSUME_MATERIAL: &str = "sync.consume_material";
    pub const CONSUME_CAPACITY: &str = "sync.consume_capacity";

    // 状态生命周期
    pub const COMPLETED_ALLOW_FUTURE: &str = "COMPLETED.allow_future";

    // 日历
    pub const CALENDAR_MERGE_POLICY: &str = "calendar.merge_policy";

    // 资源计划
    pub const RESOURCEPLAN_TIME_UNIT_SECONDS: &str = "resourceplan.time_unit_seconds";

    // 物料结存
    pub const PERIOD_OF_COVER_HORIZON_DAYS: &str = "periodofcover.horizon_days";
}
