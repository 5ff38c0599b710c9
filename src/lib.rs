// ==========================================
// 工单一致性维护层 - 核心库
// ==========================================
// 职责: 工单增删改时维护日历工时、物料结存、资源负荷、
//       工序依赖与状态生命周期的一致性
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 一致性规则
pub mod engine;

// 配置层 - 同步配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    DetailStatus, FlowType, OperationType, OrderKind, OrderStatus, ResourceType,
};

// 领域实体
pub use domain::{
    Calendar, DateAnchor, Interruption, OperationPlan, OperationPlanMaterial,
    OperationPlanResource, OrderChange, PlanAnnotations, ReplenishmentAgreement, SizingRule,
};

// 引擎
pub use engine::{
    EngineError, EngineResult, MaterialBalanceMaintainer, OperationPlanEngine,
    OperationPlanRepositories, PropagationContext, RebuildSummary, ResourcePlanAggregator,
    WorkingTimeEvaluator,
};

// 配置
pub use config::{CalendarPolicy, ConfigManager, SyncConfig};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "工单一致性维护层";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
