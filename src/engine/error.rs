// ==========================================
// 工单一致性维护层 - 引擎层错误类型
// ==========================================
// 配置/校验错误立即返回，调用方负责回滚外层事务
// 数据修复失败（关闭补足不足）只记日志，不在此列
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// 引用了不存在的工序/资源/日历等
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("缺少生效的补货协议: item={item}, location={location}, partner={partner}")]
    MissingAgreement {
        item: String,
        location: String,
        partner: String,
    },

    #[error("工单 {reference} ({kind}) 缺少必填字段: {field}")]
    MissingField {
        reference: String,
        kind: String,
        field: String,
    },

    #[error("工单 {reference} 状态不可从 {from} 回退到 {to}")]
    InvalidStateTransition {
        reference: String,
        from: String,
        to: String,
    },

    #[error("校验失败: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type EngineResult<T> = Result<T, EngineError>;
