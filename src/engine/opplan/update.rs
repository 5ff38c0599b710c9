use super::status::clamp_closed_to_now;
use super::{OperationPlanEngine, PropagationContext};
use crate::domain::order::{DateAnchor, OperationPlan, OrderChange};
use crate::domain::types::OrderKind;
use crate::engine::error::{EngineError, EngineResult};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// 把变更字段写入工单
fn apply_fields(order: &mut OperationPlan, change: &OrderChange) {
    if let Some(v) = &change.operation {
        order.operation = Some(v.clone());
    }
    if let Some(v) = &change.item {
        order.item = Some(v.clone());
    }
    if let Some(v) = &change.location {
        order.location = Some(v.clone());
    }
    if let Some(v) = &change.supplier {
        order.supplier = Some(v.clone());
    }
    if let Some(v) = &change.origin {
        order.origin = Some(v.clone());
    }
    if let Some(v) = &change.destination {
        order.destination = Some(v.clone());
    }
    if let Some(v) = &change.demand {
        order.demand = Some(v.clone());
    }
    if let Some(v) = &change.batch {
        order.batch = Some(v.clone());
    }
    if let Some(v) = change.quantity_completed {
        order.quantity_completed = Some(v);
    }
    if let Some(v) = &change.setup {
        order.plan.setup = Some(v.clone());
    }
    if let Some(status) = change.status {
        order.status = status;
    }
}

impl OperationPlanEngine {
    /// 变更合法性校验（负数量、起止颠倒、状态回退）
    fn validate_change(&self, current: &OperationPlan, change: &OrderChange) -> EngineResult<()> {
        if let Some(q) = change.quantity {
            if q < 0.0 || !q.is_finite() {
                return Err(EngineError::Validation(format!(
                    "工单 {} 数量非法: {}",
                    current.reference, q
                )));
            }
        }
        if let (Some(start), Some(end)) = (change.startdate, change.enddate) {
            if start > end {
                return Err(EngineError::Validation(format!(
                    "工单 {} 开始时间 {} 晚于结束时间 {}",
                    current.reference, start, end
                )));
            }
        }
        if let Some(next) = change.status {
            if !current.status.can_transition_to(next) && !change.admin_reset {
                return Err(EngineError::InvalidStateTransition {
                    reference: current.reference.clone(),
                    from: current.status.to_string(),
                    to: next.to_string(),
                });
            }
        }
        Ok(())
    }

    /// 新建工单并生成全部派生数据
    ///
    /// # 参数
    /// - order: 待建工单；reference 为空时自动生成
    /// - anchor: 日期驱动方向，None 时以结束时间反推
    #[instrument(skip(self, order, ctx), fields(reference = %order.reference, kind = %order.kind))]
    pub fn create(
        &self,
        mut order: OperationPlan,
        anchor: Option<DateAnchor>,
        ctx: &mut PropagationContext,
    ) -> EngineResult<OperationPlan> {
        if order.reference.trim().is_empty() {
            order.reference = OperationPlan::generate_reference();
        }
        if order.quantity < 0.0 || !order.quantity.is_finite() {
            return Err(EngineError::Validation(format!(
                "工单 {} 数量非法: {}",
                order.reference, order.quantity
            )));
        }
        if order.startdate > order.enddate {
            return Err(EngineError::Validation(format!(
                "工单 {} 开始时间晚于结束时间",
                order.reference
            )));
        }
        if self.repos.order_repo.find_by_reference(&order.reference)?.is_some() {
            return Err(EngineError::Validation(format!(
                "工单 {} 已存在",
                order.reference
            )));
        }

        self.fill_derived_keys(&mut order)?;
        order.name = Some(self.display_name(&order));

        let requested = order.quantity;
        order.quantity = self.size_quantity(&order, requested, ctx)?;
        let anchor = anchor.unwrap_or(DateAnchor::End(order.enddate));
        let child_quantity = Some(order.quantity);
        self.compute_dates(&mut order, anchor, child_quantity, ctx)?;

        // 校验与排程都通过后才落库
        self.repos.order_repo.insert(&order)?;
        let created = self.commit(order, None, ctx)?;
        info!(reference = %created.reference, quantity = created.quantity, "工单已创建");
        Ok(created)
    }

    /// 按变更字段更新工单
    ///
    /// 同样的变更重复执行，存储结果不变
    #[instrument(skip(self, change, ctx))]
    pub fn update(
        &self,
        reference: &str,
        change: OrderChange,
        ctx: &mut PropagationContext,
    ) -> EngineResult<OperationPlan> {
        let prev = self.repos.order_repo.get(reference)?;
        self.validate_change(&prev, &change)?;

        let mut order = prev.clone();
        apply_fields(&mut order, &change);
        self.fill_derived_keys(&mut order)?;
        order.name = Some(self.display_name(&order));

        if let Some(requested) = change.quantity {
            order.quantity = self.size_quantity(&order, requested, ctx)?;
        }

        let anchor = change.date_anchor().or_else(|| {
            (change.quantity.is_some() || change.touches_keys())
                .then_some(DateAnchor::Start(order.startdate))
        });
        if let Some(anchor) = anchor {
            let child_quantity = change.quantity.map(|_| order.quantity);
            self.compute_dates(&mut order, anchor, child_quantity, ctx)?;
        }

        self.commit(order, Some(&prev), ctx)
    }

    /// 删除工单（先删子工单），并刷新受影响的结存与资源计划
    #[instrument(skip(self, ctx))]
    pub fn delete(&self, reference: &str, ctx: &mut PropagationContext) -> EngineResult<()> {
        let order = self.repos.order_repo.get(reference)?;

        ctx.driving_owners.insert(order.reference.clone());
        let children = self.repos.order_repo.find_children(reference);
        let child_result = children.map_err(EngineError::from).and_then(|children| {
            children
                .iter()
                .try_for_each(|child| self.delete(&child.reference, ctx))
        });
        ctx.driving_owners.remove(&order.reference);
        child_result?;

        let flows = self.repos.material_repo.find_by_order(reference)?;
        let loads = self.repos.load_repo.find_by_order(reference)?;
        self.repos.order_repo.delete(reference)?;

        let pairs: BTreeSet<(String, String)> = flows
            .iter()
            .map(|f| (f.item.clone(), f.location.clone()))
            .collect();
        for (item, location) in &pairs {
            self.onhand.update_onhand(item, location)?;
        }
        for load in &loads {
            self.resource_plan
                .update_resource_plan(&load.resource, &order, true)?;
        }

        if let Some(owner) = &order.owner {
            if !ctx.driving_owners.contains(owner) {
                self.refresh_owner_span(owner, ctx)?;
            }
        }

        info!(reference, flows = flows.len(), loads = loads.len(), "工单已删除");
        Ok(())
    }

    /// 按工单类型与状态确定最终数量
    ///
    /// 只有建议/已批准工单按批量规则取整
    pub(super) fn size_quantity(
        &self,
        order: &OperationPlan,
        requested: f64,
        ctx: &PropagationContext,
    ) -> EngineResult<f64> {
        let requested = requested.max(0.0);
        if !order.status.is_adjustable() {
            return Ok(requested);
        }
        let rule = match order.kind {
            OrderKind::Manufacturing => self.require_operation(order)?.sizing_rule(),
            OrderKind::Purchase | OrderKind::Distribution => {
                self.require_agreement(order, ctx)?.sizing
            }
            OrderKind::Inventory | OrderKind::Delivery => return Ok(requested),
        };
        let sized = rule.apply(requested);
        if (sized - requested).abs() > f64::EPSILON {
            debug!(reference = %order.reference, requested, sized, "数量按批量规则调整");
        }
        Ok(sized)
    }

    /// 保存工单并依次执行物料、资源、依赖、状态各步骤
    pub(super) fn commit(
        &self,
        mut order: OperationPlan,
        prev: Option<&OperationPlan>,
        ctx: &mut PropagationContext,
    ) -> EngineResult<OperationPlan> {
        if clamp_closed_to_now(&mut order, ctx) {
            debug!(reference = %order.reference, now = %ctx.now, "完工工单时间截止到当前");
        }
        self.repos.order_repo.save(&order)?;

        if ctx.config.consume_material {
            self.sync_materials(&order)?;
        }
        self.sync_resources(&order, prev, ctx)?;

        let dates_moved = prev.map_or(true, |p| p.window() != order.window());
        if dates_moved {
            self.propagate_dependencies(&order, ctx)?;
        }

        let status_moved = prev.map_or(true, |p| p.status != order.status);
        if status_moved {
            self.propagate_status(&order, ctx)?;
        }

        Ok(self.repos.order_repo.get(&order.reference)?)
    }
}
