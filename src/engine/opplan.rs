// ==========================================
// 工单一致性维护层 - 工单引擎
// ==========================================
// 职责: 工单增删改时维护全部派生数据
// 顺序: 名称 → 批量 → 日期 → 物料 → 资源 → 依赖传播 → 状态传播
// 红线: Engine 不拼 SQL；当前时间由调用方通过上下文传入
// ==========================================
// 终止性: 依赖传播只锁定递归栈上的工单（propagating），汇合节点可被多条路径反复推移，
//         状态传播有进行中标记，父工单下推子工单时不回头重算父工单
// ==========================================

mod dates;
mod dependency;
mod flows;
mod status;
mod update;

use crate::config::SyncConfig;
use crate::engine::onhand::MaterialBalanceMaintainer;
use crate::engine::repositories::OperationPlanRepositories;
use crate::engine::resource_plan::{days_between, ResourcePlanAggregator};
use crate::engine::error::EngineResult;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{info, instrument};

// ==========================================
// PropagationContext - 一次传播的上下文
// ==========================================
#[derive(Debug, Clone)]
pub struct PropagationContext {
    pub now: NaiveDateTime,
    pub config: SyncConfig,
    visited: HashSet<String>,
    propagating: HashSet<String>,
    driving_owners: HashSet<String>,
    status_in_progress: HashSet<String>,
}

impl PropagationContext {
    pub fn new(now: NaiveDateTime, config: SyncConfig) -> Self {
        Self {
            now,
            config,
            visited: HashSet::new(),
            propagating: HashSet::new(),
            driving_owners: HashSet::new(),
            status_in_progress: HashSet::new(),
        }
    }

    /// 本次传播中已做过依赖传播的工单
    pub fn is_visited(&self, reference: &str) -> bool {
        self.visited.contains(reference)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

// ==========================================
// RebuildSummary - 全量重建结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RebuildSummary {
    pub item_locations: usize,
    pub resources: usize,
    pub material_rows_written: usize,
    pub plan_rows_written: usize,
}

// ==========================================
// OperationPlanEngine - 工单引擎
// ==========================================
pub struct OperationPlanEngine {
    repos: OperationPlanRepositories,
    onhand: MaterialBalanceMaintainer,
    resource_plan: ResourcePlanAggregator,
    config: SyncConfig,
}

impl OperationPlanEngine {
    pub fn new(repos: OperationPlanRepositories, config: SyncConfig) -> Self {
        let onhand = MaterialBalanceMaintainer::new(
            repos.material_repo.clone(),
            repos.master_repo.clone(),
            repos.calendar_repo.clone(),
            config.period_of_cover_horizon_days,
        );
        let resource_plan = ResourcePlanAggregator::new(
            repos.resource_repo.clone(),
            repos.load_repo.clone(),
            repos.resource_plan_repo.clone(),
            repos.calendar_repo.clone(),
            repos.master_repo.clone(),
            config.time_unit_seconds,
            config.calendar_policy,
        );
        Self {
            repos,
            onhand,
            resource_plan,
            config,
        }
    }

    /// 以引擎配置创建传播上下文
    pub fn context(&self, now: NaiveDateTime) -> PropagationContext {
        PropagationContext::new(now, self.config.clone())
    }

    pub fn repositories(&self) -> &OperationPlanRepositories {
        &self.repos
    }

    pub fn material_balance(&self) -> &MaterialBalanceMaintainer {
        &self.onhand
    }

    pub fn resource_plan(&self) -> &ResourcePlanAggregator {
        &self.resource_plan
    }

    /// 全量重建结存与资源计划
    #[instrument(skip(self))]
    pub fn rebuild_derived(&self) -> EngineResult<RebuildSummary> {
        let mut summary = RebuildSummary::default();

        for (item, location) in self.repos.material_repo.list_item_locations()? {
            summary.material_rows_written += self.onhand.update_onhand(&item, &location)?;
            summary.item_locations += 1;
        }

        for resource in self.repos.load_repo.list_loaded_resources()? {
            let bucketized = self
                .repos
                .resource_repo
                .find_by_name(&resource)?
                .map(|r| r.resource_type.is_bucketized())
                .unwrap_or(false);

            let mut days = BTreeSet::new();
            for load in self.repos.load_repo.find_loads_by_resource(&resource)? {
                days.extend(days_between(load.startdate, load.enddate, bucketized));
            }
            summary.plan_rows_written += self.resource_plan.refresh_resource(&resource, &days, None)?;
            summary.resources += 1;
        }

        info!(
            item_locations = summary.item_locations,
            resources = summary.resources,
            material_rows = summary.material_rows_written,
            plan_rows = summary.plan_rows_written,
            "派生数据重建完成"
        );
        Ok(summary)
    }
}
