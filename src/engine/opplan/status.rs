use super::{OperationPlanEngine, PropagationContext};
use crate::domain::material::MaterialFlowRecord;
use crate::domain::order::{OperationPlan, OrderChange};
use crate::domain::types::{OrderKind, OrderStatus};
use crate::engine::error::EngineResult;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

const SHORTFALL_EPSILON: f64 = 1e-6;

/// 关闭补足时按此顺序挑选上游供应，已确认供应本就计入结存
const RECLASSIFY_TIERS: [OrderStatus; 2] = [OrderStatus::Approved, OrderStatus::Proposed];

impl OperationPlanEngine {
    /// 工单状态变化后的连带处理
    pub fn propagate_status(
        &self,
        order: &OperationPlan,
        ctx: &mut PropagationContext,
    ) -> EngineResult<()> {
        if order.kind == OrderKind::Inventory {
            return Ok(());
        }
        if !ctx.status_in_progress.insert(order.reference.clone()) {
            return Ok(());
        }
        let result = self.propagate_status_inner(order, ctx);
        ctx.status_in_progress.remove(&order.reference);
        result
    }

    fn propagate_status_inner(
        &self,
        order: &OperationPlan,
        ctx: &mut PropagationContext,
    ) -> EngineResult<()> {
        if !matches!(order.kind, OrderKind::Purchase | OrderKind::Distribution) {
            for child in self.repos.order_repo.find_children(&order.reference)? {
                if child.status != order.status && !ctx.status_in_progress.contains(&child.reference) {
                    self.update(
                        &child.reference,
                        OrderChange::default().status(order.status).admin_reset(),
                        ctx,
                    )?;
                }
            }
        }

        if order.kind == OrderKind::Manufacturing && order.status != OrderStatus::Proposed {
            if let Some(owner) = order.owner.as_deref() {
                let parent = self.repos.order_repo.get(owner)?;
                if parent.status == OrderStatus::Proposed {
                    self.derived_status_update(owner, OrderStatus::Approved, ctx)?;
                }
            }
        }

        if !order.status.is_closed_like() {
            return Ok(());
        }

        self.advance_prior_steps(order, ctx)?;
        self.derive_owner_status(order, ctx)?;
        self.cover_closure_shortfall(order, ctx)?;
        Ok(())
    }

    /// 父工单状态派生，不再回头下推子工单
    fn derived_status_update(
        &self,
        reference: &str,
        status: OrderStatus,
        ctx: &mut PropagationContext,
    ) -> EngineResult<()> {
        let current = self.repos.order_repo.get(reference)?;
        if current.status >= status || ctx.status_in_progress.contains(reference) {
            return Ok(());
        }

        ctx.status_in_progress.insert(reference.to_string());
        let result = self.update(reference, OrderChange::default().status(status), ctx);
        ctx.status_in_progress.remove(reference);
        result?;

        info!(reference, status = %status, "父工单状态已派生");
        Ok(())
    }

    /// 工艺路线中排在前面、状态更低的步骤同步到本状态
    fn advance_prior_steps(
        &self,
        order: &OperationPlan,
        ctx: &mut PropagationContext,
    ) -> EngineResult<()> {
        let Some((parent, routing)) = self.routing_owner(order)? else {
            return Ok(());
        };
        let steps = self.sorted_steps(&parent, &routing.name)?;
        let Some(&(_, mine)) = steps.iter().find(|(s, _)| s.reference == order.reference) else {
            return Ok(());
        };

        for (step, priority) in &steps {
            if *priority >= mine || ctx.status_in_progress.contains(&step.reference) {
                continue;
            }
            let current = self.repos.order_repo.get(&step.reference)?;
            if current.status < order.status {
                self.update(&step.reference, OrderChange::default().status(order.status), ctx)?;
            }
        }
        Ok(())
    }

    /// 根据子工单状态派生父工单状态
    fn derive_owner_status(
        &self,
        order: &OperationPlan,
        ctx: &mut PropagationContext,
    ) -> EngineResult<()> {
        let Some(owner) = order.owner.as_deref() else {
            return Ok(());
        };
        if ctx.status_in_progress.contains(owner) {
            return Ok(());
        }

        let parent = self.repos.order_repo.get(owner)?;
        let children = self.repos.order_repo.find_children(owner)?;
        let step_count = match parent.operation.as_deref() {
            Some(op) => self.repos.operation_repo.find_steps(op)?.len(),
            None => 0,
        };

        let target = if !children.is_empty() && step_count == children.len() {
            if children.iter().all(|c| c.status == OrderStatus::Closed) {
                Some(OrderStatus::Closed)
            } else if children.iter().all(|c| c.status.is_closed_like()) {
                Some(OrderStatus::Completed)
            } else if parent.status == OrderStatus::Proposed {
                Some(OrderStatus::Approved)
            } else {
                None
            }
        } else if parent.status == OrderStatus::Proposed {
            Some(OrderStatus::Approved)
        } else {
            None
        };

        match target {
            Some(status) => self.derived_status_update(owner, status, ctx),
            None => Ok(()),
        }
    }

    /// 关闭工单的消耗缺口由上游供应补足
    ///
    /// 余额 = 截至该消耗（含）的计入结存的流水 + 本工单流水；
    /// 缺口按 已批准 → 建议 的顺序，从最近的供应开始改为本工单状态
    fn cover_closure_shortfall(
        &self,
        order: &OperationPlan,
        ctx: &mut PropagationContext,
    ) -> EngineResult<()> {
        let consumptions: Vec<_> = self
            .repos
            .material_repo
            .find_by_order(&order.reference)?
            .into_iter()
            .filter(|f| f.is_consumption())
            .collect();
        if consumptions.is_empty() {
            return Ok(());
        }

        let mut reclassified: HashSet<String> = HashSet::new();
        for flow in consumptions {
            let by_batch = self
                .repos
                .master_repo
                .find_item(&flow.item)?
                .map(|i| i.is_make_to_order())
                .unwrap_or(false);
            let records: Vec<MaterialFlowRecord> = self
                .repos
                .material_repo
                .find_by_item_location(&flow.item, &flow.location)?
                .into_iter()
                .filter(|r| !by_batch || r.flow.batch == flow.batch)
                .collect();
            let Some(pos) = records.iter().position(|r| r.flow.id == flow.id) else {
                continue;
            };

            let mut balance: f64 = records[..=pos]
                .iter()
                .filter(|r| r.counts_toward_onhand() || r.flow.operationplan == order.reference)
                .map(|r| r.flow.quantity)
                .sum();
            if balance >= -SHORTFALL_EPSILON {
                continue;
            }

            'tiers: for tier in RECLASSIFY_TIERS {
                for supply in records[..pos].iter().rev() {
                    if balance >= -SHORTFALL_EPSILON {
                        break 'tiers;
                    }
                    let reference = &supply.flow.operationplan;
                    if supply.flow.quantity <= 0.0
                        || supply.order_kind == OrderKind::Inventory
                        || supply.order_status != tier
                        || reference == &order.reference
                        || reclassified.contains(reference)
                    {
                        continue;
                    }
                    debug!(
                        reference = %order.reference,
                        supply = %reference,
                        quantity = supply.flow.quantity,
                        "上游供应随关闭工单改状态"
                    );
                    self.update(reference, OrderChange::default().status(order.status), ctx)?;
                    reclassified.insert(reference.clone());
                    balance += supply.flow.quantity;
                }
            }

            if balance < -SHORTFALL_EPSILON {
                warn!(
                    reference = %order.reference,
                    item = %flow.item,
                    location = %flow.location,
                    balance,
                    "关闭工单的物料消耗无法由上游供应补足"
                );
            }
        }
        Ok(())
    }

    /// 完工/关闭工单释放资源占用
    pub(super) fn release_capacity(
        &self,
        order: &OperationPlan,
        prev: Option<&OperationPlan>,
    ) -> EngineResult<()> {
        let existing = self.repos.load_repo.find_by_order(&order.reference)?;
        if existing.is_empty() {
            return Ok(());
        }
        self.repos.load_repo.delete_by_order(&order.reference)?;

        let resources: BTreeSet<String> = existing.into_iter().map(|l| l.resource).collect();
        debug!(reference = %order.reference, resources = resources.len(), "资源占用已释放");
        self.refresh_resources(&resources, order, prev)
    }
}

/// 完工/关闭工单的时间不晚于当前时间，返回是否截断
pub(super) fn clamp_closed_to_now(order: &mut OperationPlan, ctx: &PropagationContext) -> bool {
    if !order.status.is_closed_like()
        || ctx.config.completed_allow_future
        || (order.startdate <= ctx.now && order.enddate <= ctx.now)
    {
        return false;
    }
    order.startdate = order.startdate.min(ctx.now);
    order.enddate = order.enddate.min(ctx.now);
    let end = order.enddate;
    order.plan.interruptions.retain(|i| i.start < end);
    true
}
