use super::{OperationPlanEngine, PropagationContext};
use crate::domain::calendar::{clamp_to_horizon, Calendar};
use crate::domain::operation::Operation;
use crate::domain::order::{DateAnchor, OperationPlan, OrderChange};
use crate::domain::types::{OperationType, OrderKind};
use crate::engine::calendar_eval::WorkingTimeEvaluator;
use crate::engine::error::EngineResult;
use chrono::{Duration, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// 子工单的时间跨度 (最早开始, 最晚结束)
pub(super) fn children_span(children: &[OperationPlan]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let start = children.iter().map(|c| c.startdate).min()?;
    let end = children.iter().map(|c| c.enddate).max()?;
    Some((start, end))
}

impl OperationPlanEngine {
    /// 工单相关日历名（按优先顺序，已去重）
    fn calendar_names(&self, order: &OperationPlan) -> EngineResult<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: Option<String>| {
            if let Some(n) = name {
                if !names.contains(&n) {
                    names.push(n);
                }
            }
        };

        match order.kind {
            OrderKind::Manufacturing => {
                let op = self.require_operation(order)?;
                push(op.available.clone());
                if let Some(loc) = order.location.as_deref().or(op.location.as_deref()) {
                    push(self.location_calendar(loc)?);
                }
                for req in self.repos.operation_repo.find_resources(&op.name)? {
                    if let Some(res) = self.repos.resource_repo.find_by_name(&req.resource)? {
                        push(res.available.clone());
                        if let Some(loc) = &res.location {
                            push(self.location_calendar(loc)?);
                        }
                    }
                }
            }
            OrderKind::Distribution => {
                if let Some(dest) = order.receiving_location() {
                    push(self.location_calendar(dest)?);
                }
                if let Some(origin) = &order.origin {
                    push(self.location_calendar(origin)?);
                }
            }
            OrderKind::Purchase | OrderKind::Delivery | OrderKind::Inventory => {
                if let Some(loc) = &order.location {
                    push(self.location_calendar(loc)?);
                }
            }
        }
        Ok(names)
    }

    fn location_calendar(&self, location: &str) -> EngineResult<Option<String>> {
        Ok(self
            .repos
            .master_repo
            .find_location(location)?
            .and_then(|l| l.available))
    }

    /// 收集工单涉及的日历（不存在的日历忽略）
    pub fn collect_calendars(&self, order: &OperationPlan) -> EngineResult<Vec<Calendar>> {
        let mut calendars = Vec::new();
        for name in self.calendar_names(order)? {
            if let Some(cal) = self.repos.calendar_repo.find_by_name(&name)? {
                calendars.push(cal);
            }
        }
        Ok(calendars)
    }

    pub(super) fn evaluator_for(
        &self,
        order: &OperationPlan,
        ctx: &PropagationContext,
    ) -> EngineResult<WorkingTimeEvaluator> {
        Ok(WorkingTimeEvaluator::new(
            self.collect_calendars(order)?,
            ctx.config.calendar_policy,
        ))
    }

    /// 按锚点与所需工作时长设置起止时间，并记录途经的中断
    fn apply_duration(
        &self,
        order: &mut OperationPlan,
        anchor: DateAnchor,
        duration: Duration,
        ctx: &PropagationContext,
    ) -> EngineResult<()> {
        let evaluator = self.evaluator_for(order, ctx)?;
        let mut interruptions = Vec::new();
        match anchor {
            DateAnchor::End(end) => {
                let end = clamp_to_horizon(end);
                order.enddate = end;
                order.startdate =
                    evaluator.calculate_operation_time(end, duration, false, Some(&mut interruptions));
            }
            DateAnchor::Start(start) => {
                let start = clamp_to_horizon(start);
                order.startdate = start;
                order.enddate =
                    evaluator.calculate_operation_time(start, duration, true, Some(&mut interruptions));
            }
        }
        order.plan.interruptions = interruptions;
        if order.startdate > order.enddate {
            order.enddate = order.startdate;
        }
        Ok(())
    }

    /// 按工单类型重算起止时间
    ///
    /// # 参数
    /// - anchor: 固定的一端
    /// - child_quantity: 工艺路线需下推到子工单的数量
    pub(super) fn compute_dates(
        &self,
        order: &mut OperationPlan,
        anchor: DateAnchor,
        child_quantity: Option<f64>,
        ctx: &mut PropagationContext,
    ) -> EngineResult<()> {
        match order.kind {
            OrderKind::Inventory | OrderKind::Delivery => {
                let date = match anchor {
                    DateAnchor::Start(d) | DateAnchor::End(d) => clamp_to_horizon(d),
                };
                order.startdate = date;
                order.enddate = date;
                order.plan.interruptions.clear();
                Ok(())
            }
            OrderKind::Purchase | OrderKind::Distribution => {
                let leadtime = self.require_agreement(order, ctx)?.leadtime();
                self.apply_duration(order, anchor, leadtime, ctx)
            }
            OrderKind::Manufacturing => {
                let op = self.require_operation(order)?;
                match op.op_type {
                    OperationType::Routing => self.drive_routing(order, &op, anchor, child_quantity, ctx),
                    OperationType::Alternate | OperationType::Split => {
                        let children = self.repos.order_repo.find_children(&order.reference)?;
                        match children_span(&children) {
                            Some((start, end)) => {
                                order.startdate = start;
                                order.enddate = end;
                                order.plan.interruptions.clear();
                                Ok(())
                            }
                            None => {
                                let duration = op.working_duration(order.quantity);
                                self.apply_duration(order, anchor, duration, ctx)
                            }
                        }
                    }
                    OperationType::FixedTime | OperationType::TimePer => {
                        let duration = op.working_duration(order.quantity);
                        self.apply_duration(order, anchor, duration, ctx)
                    }
                }
            }
        }
    }

    /// 子工序在工艺路线中的顺序
    pub(super) fn step_priorities(&self, routing: &str) -> EngineResult<HashMap<String, i32>> {
        Ok(self
            .repos
            .operation_repo
            .find_steps(routing)?
            .into_iter()
            .map(|op| (op.name, op.priority))
            .collect())
    }

    /// 按步骤顺序排好的子工单
    pub(super) fn sorted_steps(&self, parent: &OperationPlan, routing: &str) -> EngineResult<Vec<(OperationPlan, i32)>> {
        let priorities = self.step_priorities(routing)?;
        let mut steps: Vec<(OperationPlan, i32)> = self
            .repos
            .order_repo
            .find_children(&parent.reference)?
            .into_iter()
            .map(|c| {
                let p = c
                    .operation
                    .as_ref()
                    .and_then(|o| priorities.get(o).copied())
                    .unwrap_or(i32::MAX);
                (c, p)
            })
            .collect();
        steps.sort_by(|a, b| (a.1, a.0.startdate).cmp(&(b.1, b.0.startdate)));
        Ok(steps)
    }

    /// 工艺路线父工单驱动子工单排程，父工单时间取子工单跨度
    fn drive_routing(
        &self,
        order: &mut OperationPlan,
        op: &Operation,
        anchor: DateAnchor,
        child_quantity: Option<f64>,
        ctx: &mut PropagationContext,
    ) -> EngineResult<()> {
        let steps = self.sorted_steps(order, &op.name)?;
        if steps.is_empty() {
            let duration = op.working_duration(order.quantity);
            return self.apply_duration(order, anchor, duration, ctx);
        }

        ctx.driving_owners.insert(order.reference.clone());
        let result = self.drive_steps(op, anchor, child_quantity, &steps, ctx);
        ctx.driving_owners.remove(&order.reference);
        result?;

        let children = self.repos.order_repo.find_children(&order.reference)?;
        if let Some((start, end)) = children_span(&children) {
            order.startdate = start;
            order.enddate = end;
        }
        order.plan.interruptions.clear();
        debug!(reference = %order.reference, steps = steps.len(), "工艺路线子工单已重排");
        Ok(())
    }

    fn drive_steps(
        &self,
        op: &Operation,
        anchor: DateAnchor,
        child_quantity: Option<f64>,
        steps: &[(OperationPlan, i32)],
        ctx: &mut PropagationContext,
    ) -> EngineResult<()> {
        let base = || {
            let mut change = OrderChange::default();
            change.quantity = child_quantity;
            change
        };

        if !self.repos.operation_repo.has_dependencies_among_steps(&op.name)? {
            // 无显式依赖：按步骤顺序首尾相接
            match anchor {
                DateAnchor::End(end) => {
                    let mut cursor = end;
                    for (step, _) in steps.iter().rev() {
                        let updated = self.update(&step.reference, base().enddate(cursor), ctx)?;
                        cursor = updated.startdate;
                    }
                }
                DateAnchor::Start(start) => {
                    let mut cursor = start;
                    for (step, _) in steps {
                        let updated = self.update(&step.reference, base().startdate(cursor), ctx)?;
                        cursor = updated.enddate;
                    }
                }
            }
            return Ok(());
        }

        // 有显式依赖：只驱动端点步骤，其余由依赖传播带动
        let step_ops: HashSet<&str> = steps
            .iter()
            .filter_map(|(s, _)| s.operation.as_deref())
            .collect();
        for (step, _) in steps {
            let Some(step_op) = step.operation.as_deref() else {
                continue;
            };
            let change = match anchor {
                DateAnchor::End(end) => {
                    let has_successor = self
                        .repos
                        .operation_repo
                        .find_successors(step_op)?
                        .iter()
                        .any(|d| step_ops.contains(d.operation.as_str()));
                    (!has_successor).then(|| base().enddate(end))
                }
                DateAnchor::Start(start) => {
                    let has_predecessor = self
                        .repos
                        .operation_repo
                        .find_predecessors(step_op)?
                        .iter()
                        .any(|d| step_ops.contains(d.blockedby.as_str()));
                    (!has_predecessor).then(|| base().startdate(start))
                }
            };
            match change {
                Some(change) => {
                    self.update(&step.reference, change, ctx)?;
                }
                None if child_quantity.is_some() => {
                    self.update(&step.reference, base(), ctx)?;
                }
                None => {}
            }
        }
        Ok(())
    }

    /// 子工单变化后，把父工单时间收敛到子工单跨度
    pub(super) fn refresh_owner_span(&self, owner: &str, ctx: &mut PropagationContext) -> EngineResult<()> {
        let Some(parent) = self.repos.order_repo.find_by_reference(owner)? else {
            return Ok(());
        };
        let children = self.repos.order_repo.find_children(owner)?;
        let Some((start, end)) = children_span(&children) else {
            return Ok(());
        };
        if parent.startdate == start && parent.enddate == end {
            return Ok(());
        }

        let mut updated = parent.clone();
        updated.startdate = start;
        updated.enddate = end;
        updated.plan.interruptions.clear();
        debug!(owner, %start, %end, "父工单时间跨度已更新");
        self.commit(updated, Some(&parent), ctx)?;
        Ok(())
    }
}
