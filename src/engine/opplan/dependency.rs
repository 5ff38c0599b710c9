use super::{OperationPlanEngine, PropagationContext};
use crate::domain::operation::Operation;
use crate::domain::order::{OperationPlan, OrderChange};
use crate::domain::types::OperationType;
use crate::engine::error::EngineResult;
use tracing::debug;

impl OperationPlanEngine {
    /// 父工单为工艺路线时返回 (父工单, 工艺路线工序)
    pub(super) fn routing_owner(
        &self,
        order: &OperationPlan,
    ) -> EngineResult<Option<(OperationPlan, Operation)>> {
        let Some(owner) = &order.owner else {
            return Ok(None);
        };
        let Some(parent) = self.repos.order_repo.find_by_reference(owner)? else {
            return Ok(None);
        };
        let Some(op_name) = parent.operation.as_deref() else {
            return Ok(None);
        };
        let routing = self
            .repos
            .operation_repo
            .find_by_name(op_name)?
            .filter(|op| op.op_type == OperationType::Routing);
        Ok(routing.map(|op| (parent, op)))
    }

    /// 依赖传播的候选工单
    ///
    /// 有父工单时限定同一父工单；顶层工单有批次时限定同批次
    fn dependency_candidates(
        &self,
        order: &OperationPlan,
        operation: &str,
    ) -> EngineResult<Vec<OperationPlan>> {
        let candidates = match &order.owner {
            Some(owner) => self
                .repos
                .order_repo
                .find_by_operation(operation, Some(owner))?,
            None => self
                .repos
                .order_repo
                .find_by_operation(operation, None)?
                .into_iter()
                .filter(|c| order.batch.is_none() || c.batch == order.batch)
                .collect(),
        };
        Ok(candidates
            .into_iter()
            .filter(|c| c.reference != order.reference)
            .collect())
    }

    /// 递归栈上的工单不再被推移，其余可调整工单每次违反约束都重新推移
    fn movable(&self, candidate: &OperationPlan, ctx: &PropagationContext) -> bool {
        candidate.status.is_adjustable() && !ctx.propagating.contains(&candidate.reference)
    }

    /// 工单日期变化后推/拉相关工单
    pub fn propagate_dependencies(
        &self,
        order: &OperationPlan,
        ctx: &mut PropagationContext,
    ) -> EngineResult<()> {
        if !ctx.propagating.insert(order.reference.clone()) {
            return Ok(());
        }
        ctx.visited.insert(order.reference.clone());
        let result = self.propagate_dependencies_inner(order, ctx);
        ctx.propagating.remove(&order.reference);
        result
    }

    fn propagate_dependencies_inner(
        &self,
        order: &OperationPlan,
        ctx: &mut PropagationContext,
    ) -> EngineResult<()> {
        if let Some(op_name) = order.operation.as_deref() {
            // 后继：开始时间不早于本工单结束 + 硬安全提前期
            for dep in self.repos.operation_repo.find_successors(op_name)? {
                let earliest = order.enddate + dep.hard_safety_leadtime();
                for cand in self.dependency_candidates(order, &dep.operation)? {
                    // 前面的推移可能已带动该工单
                    let cand = self.repos.order_repo.get(&cand.reference)?;
                    if self.movable(&cand, ctx) && cand.startdate < earliest {
                        debug!(from = %order.reference, to = %cand.reference, %earliest, "后继工单后移");
                        self.update(&cand.reference, OrderChange::default().startdate(earliest), ctx)?;
                    }
                }
            }

            // 前驱：结束时间不晚于本工单开始 - 硬安全提前期
            for dep in self.repos.operation_repo.find_predecessors(op_name)? {
                let latest = order.startdate - dep.hard_safety_leadtime();
                for cand in self.dependency_candidates(order, &dep.blockedby)? {
                    let cand = self.repos.order_repo.get(&cand.reference)?;
                    if self.movable(&cand, ctx) && cand.enddate > latest {
                        debug!(from = %order.reference, to = %cand.reference, %latest, "前驱工单前移");
                        self.update(&cand.reference, OrderChange::default().enddate(latest), ctx)?;
                    }
                }
            }
        }

        let Some(owner) = order.owner.clone() else {
            return Ok(());
        };
        if ctx.driving_owners.contains(&owner) {
            return Ok(());
        }

        self.sequence_routing_steps(order, ctx)?;
        self.refresh_owner_span(&owner, ctx)
    }

    /// 无显式依赖的工艺路线：相邻步骤首尾相接
    fn sequence_routing_steps(
        &self,
        order: &OperationPlan,
        ctx: &mut PropagationContext,
    ) -> EngineResult<()> {
        let Some((parent, routing)) = self.routing_owner(order)? else {
            return Ok(());
        };
        if self
            .repos
            .operation_repo
            .has_dependencies_among_steps(&routing.name)?
        {
            return Ok(());
        }

        let steps = self.sorted_steps(&parent, &routing.name)?;
        let Some(&(_, mine)) = steps.iter().find(|(s, _)| s.reference == order.reference) else {
            return Ok(());
        };

        let next = steps.iter().find(|(_, p)| *p > mine).map(|(s, _)| s.reference.clone());
        let previous = steps
            .iter()
            .rev()
            .find(|(_, p)| *p < mine)
            .map(|(s, _)| s.reference.clone());

        if let Some(reference) = next {
            let step = self.repos.order_repo.get(&reference)?;
            if self.movable(&step, ctx) && step.startdate < order.enddate {
                self.update(&reference, OrderChange::default().startdate(order.enddate), ctx)?;
            }
        }
        if let Some(reference) = previous {
            let step = self.repos.order_repo.get(&reference)?;
            if self.movable(&step, ctx) && step.enddate > order.startdate {
                self.update(&reference, OrderChange::default().enddate(order.startdate), ctx)?;
            }
        }
        Ok(())
    }
}
