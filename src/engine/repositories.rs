// ==========================================
// 工单一致性维护层 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合工单引擎所需的所有 Repository
// 目标: 共享同一连接，减少引擎构造参数
// ==========================================

use std::sync::Arc;

use crate::db::SharedConnection;
use crate::repository::{
    AgreementRepository, CalendarRepository, MasterDataRepository,
    OperationPlanMaterialRepository, OperationPlanRepository, OperationPlanResourceRepository,
    OperationRepository, ResourcePlanRepository, ResourceRepository,
};

/// 工单引擎仓储集合
///
/// # 包含的仓储
/// - `order_repo`: 工单
/// - `material_repo`: 工单物料流水
/// - `load_repo`: 工单资源占用
/// - `resource_plan_repo`: 资源计划
/// - `resource_repo` / `operation_repo` / `calendar_repo` / `master_repo` / `agreement_repo`: 只读主数据
#[derive(Clone)]
pub struct OperationPlanRepositories {
    pub order_repo: Arc<OperationPlanRepository>,
    pub material_repo: Arc<OperationPlanMaterialRepository>,
    pub load_repo: Arc<OperationPlanResourceRepository>,
    pub resource_plan_repo: Arc<ResourcePlanRepository>,
    pub resource_repo: Arc<ResourceRepository>,
    pub operation_repo: Arc<OperationRepository>,
    pub calendar_repo: Arc<CalendarRepository>,
    pub master_repo: Arc<MasterDataRepository>,
    pub agreement_repo: Arc<AgreementRepository>,
}

impl OperationPlanRepositories {
    /// 基于同一连接创建全部仓储
    pub fn from_connection(conn: SharedConnection) -> Self {
        Self {
            order_repo: Arc::new(OperationPlanRepository::from_connection(conn.clone())),
            material_repo: Arc::new(OperationPlanMaterialRepository::from_connection(conn.clone())),
            load_repo: Arc::new(OperationPlanResourceRepository::from_connection(conn.clone())),
            resource_plan_repo: Arc::new(ResourcePlanRepository::from_connection(conn.clone())),
            resource_repo: Arc::new(ResourceRepository::from_connection(conn.clone())),
            operation_repo: Arc::new(OperationRepository::from_connection(conn.clone())),
            calendar_repo: Arc::new(CalendarRepository::from_connection(conn.clone())),
            master_repo: Arc::new(MasterDataRepository::from_connection(conn.clone())),
            agreement_repo: Arc::new(AgreementRepository::from_connection(conn)),
        }
    }
}
