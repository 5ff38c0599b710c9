// ==========================================
// 工单一致性维护层 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、纯业务规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod agreement;
pub mod calendar;
pub mod material;
pub mod operation;
pub mod order;
pub mod resource;
pub mod types;

// 重导出核心类型
pub use agreement::{ReplenishmentAgreement, SizingRule};
pub use calendar::{clamp_to_horizon, horizon_end, horizon_start, Calendar, CalendarBucket};
pub use material::{
    Buffer, Demand, Item, Location, MaterialFlowRecord, OperationPlanMaterial,
    OperationPlanResource, ResourceLoadRecord,
};
pub use operation::{Operation, OperationDependency, OperationMaterial, OperationResource};
pub use order::{DateAnchor, Interruption, OperationPlan, OrderChange, PlanAnnotations};
pub use resource::{Resource, ResourcePlanRow};
pub use types::{DetailStatus, FlowType, OperationType, OrderKind, OrderStatus, ResourceType};
