// ==========================================
// 工单一致性维护层 - 仓储层错误类型
// ==========================================
// rusqlite 错误按 SQLite 扩展错误码归类（唯一/外键/其它）
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("记录未找到: {entity}={key}")]
    NotFound { entity: String, key: String },

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("SQL 执行失败: {0}")]
    Query(String),

    /// (resource, operationplan) 重复、工单编号重复等
    #[error("唯一约束违反: {0}")]
    UniqueConstraint(String),

    /// 引用了不存在的物料/库点/资源等主数据
    #[error("外键约束违反: {0}")]
    ForeignKey(String),

    #[error("计划注记 JSON 处理失败: {0}")]
    PlanJson(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, msg) => {
                let text = msg.unwrap_or_else(|| code.to_string());
                match code.extended_code {
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        RepositoryError::UniqueConstraint(text)
                    }
                    rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => RepositoryError::ForeignKey(text),
                    _ => RepositoryError::Query(text),
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::not_found("row", "?"),
            other => RepositoryError::Query(other.to_string()),
        }
    }
}

impl RepositoryError {
    pub fn not_found(entity: &str, key: &str) -> Self {
        RepositoryError::NotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
