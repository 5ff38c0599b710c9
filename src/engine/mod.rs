// ==========================================
// 工单一致性维护层 - 引擎层
// ==========================================
// 职责: 工单增删改时维护派生数据，不拼 SQL
// 模块: 工作日历计算 / 物料结存 / 资源计划 / 工单引擎
// ==========================================

pub mod calendar_eval;
pub mod error;
pub mod onhand;
pub mod opplan;
pub mod repositories;
pub mod resource_plan;

// 重导出核心引擎
pub use calendar_eval::WorkingTimeEvaluator;
pub use error::{EngineError, EngineResult};
pub use onhand::{running_balances, MaterialBalanceMaintainer, MinimumSources};
pub use opplan::{OperationPlanEngine, PropagationContext, RebuildSummary};
pub use repositories::OperationPlanRepositories;
pub use resource_plan::{days_between, days_touched, ResourcePlanAggregator};
