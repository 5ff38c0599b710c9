// ==========================================
// 工单一致性维护层 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod agreement_repo;
pub mod calendar_repo;
pub mod error;
pub mod master_repo;
pub mod operation_repo;
pub mod opplan_material_repo;
pub mod opplan_resource_repo;
pub mod order_repo;
pub mod resource_plan_repo;
pub mod resource_repo;
pub mod row_utils;

// 重导出核心仓储
pub use agreement_repo::AgreementRepository;
pub use calendar_repo::CalendarRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use master_repo::MasterDataRepository;
pub use operation_repo::OperationRepository;
pub use opplan_material_repo::OperationPlanMaterialRepository;
pub use opplan_resource_repo::OperationPlanResourceRepository;
pub use order_repo::OperationPlanRepository;
pub use resource_plan_repo::ResourcePlanRepository;
pub use resource_repo::{ResourceRepository, SkilledResource};
