use super::{OperationPlanEngine, PropagationContext};
use crate::domain::agreement::ReplenishmentAgreement;
use crate::domain::material::{OperationPlanMaterial, OperationPlanResource};
use crate::domain::operation::Operation;
use crate::domain::order::OperationPlan;
use crate::domain::resource::Resource;
use crate::domain::types::{DetailStatus, FlowType, OrderKind};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::resource_plan::days_touched;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

fn missing(order: &OperationPlan, field: &str) -> EngineError {
    EngineError::MissingField {
        reference: order.reference.clone(),
        kind: order.kind.to_string(),
        field: field.to_string(),
    }
}

fn required<'a>(order: &OperationPlan, value: &'a Option<String>, field: &str) -> EngineResult<&'a str> {
    value.as_deref().ok_or_else(|| missing(order, field))
}

fn key(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn flow_order(a: &OperationPlanMaterial, b: &OperationPlanMaterial) -> Ordering {
    (&a.item, &a.location, a.flowdate)
        .cmp(&(&b.item, &b.location, b.flowdate))
        .then(a.quantity.partial_cmp(&b.quantity).unwrap_or(Ordering::Equal))
}

/// 两组流水在业务上是否一致（与顺序无关）
fn same_flows(existing: &[OperationPlanMaterial], desired: &[OperationPlanMaterial]) -> bool {
    if existing.len() != desired.len() {
        return false;
    }
    let mut a: Vec<&OperationPlanMaterial> = existing.iter().collect();
    let mut b: Vec<&OperationPlanMaterial> = desired.iter().collect();
    a.sort_by(|x, y| flow_order(x, y));
    b.sort_by(|x, y| flow_order(x, y));
    a.iter().zip(b.iter()).all(|(x, y)| x.same_flow(y))
}

fn same_loads(existing: &[OperationPlanResource], desired: &[OperationPlanResource]) -> bool {
    if existing.len() != desired.len() {
        return false;
    }
    let mut a: Vec<&OperationPlanResource> = existing.iter().collect();
    let mut b: Vec<&OperationPlanResource> = desired.iter().collect();
    a.sort_by(|x, y| x.resource.cmp(&y.resource));
    b.sort_by(|x, y| x.resource.cmp(&y.resource));
    a.iter().zip(b.iter()).all(|(x, y)| x.same_load(y))
}

impl OperationPlanEngine {
    /// 工单名称（制造单取工序名，其余按外键拼接）
    pub fn display_name(&self, order: &OperationPlan) -> String {
        match order.kind {
            OrderKind::Manufacturing => key(&order.operation).to_string(),
            OrderKind::Purchase => format!(
                "Purchase {} @ {} from {}",
                key(&order.item),
                key(&order.location),
                key(&order.supplier)
            ),
            OrderKind::Distribution => format!(
                "Ship {} from {} to {}",
                key(&order.item),
                key(&order.origin),
                key(&order.destination)
            ),
            OrderKind::Delivery => {
                format!("Ship {} @ {}", key(&order.item), key(&order.location))
            }
            OrderKind::Inventory => {
                format!("Inventory {} @ {}", key(&order.item), key(&order.location))
            }
        }
    }

    /// 补齐可由其他外键推出的字段
    pub(super) fn fill_derived_keys(&self, order: &mut OperationPlan) -> EngineResult<()> {
        match order.kind {
            OrderKind::Delivery => {
                if let Some(name) = order.demand.clone() {
                    let demand = self
                        .repos
                        .master_repo
                        .find_demand(&name)?
                        .ok_or_else(|| EngineError::Configuration(format!("未知需求: {}", name)))?;
                    if order.item.is_none() {
                        order.item = Some(demand.item);
                    }
                    if order.location.is_none() {
                        order.location = Some(demand.location);
                    }
                    if order.due.is_none() {
                        order.due = Some(demand.due);
                    }
                }
            }
            OrderKind::Distribution => {
                if order.location.is_none() {
                    order.location = order.destination.clone();
                }
            }
            OrderKind::Manufacturing => {
                let op = self.require_operation(order)?;
                if order.location.is_none() {
                    order.location = op.location;
                }
                if order.item.is_none() {
                    order.item = op.item;
                }
            }
            OrderKind::Purchase | OrderKind::Inventory => {}
        }
        Ok(())
    }

    pub(super) fn require_operation(&self, order: &OperationPlan) -> EngineResult<Operation> {
        let name = required(order, &order.operation, "operation")?;
        self.repos
            .operation_repo
            .find_by_name(name)?
            .ok_or_else(|| EngineError::Configuration(format!("未知工序: {}", name)))
    }

    /// 采购/调拨单当前生效的补货协议
    pub(super) fn find_agreement(
        &self,
        order: &OperationPlan,
        ctx: &PropagationContext,
    ) -> EngineResult<Option<ReplenishmentAgreement>> {
        let item = required(order, &order.item, "item")?;
        let found = match order.kind {
            OrderKind::Purchase => {
                let supplier = required(order, &order.supplier, "supplier")?;
                let location = required(order, &order.location, "location")?;
                self.repos
                    .agreement_repo
                    .find_item_supplier(supplier, item, location, ctx.now)?
            }
            OrderKind::Distribution => {
                let origin = required(order, &order.origin, "origin")?;
                let destination = order
                    .receiving_location()
                    .ok_or_else(|| missing(order, "destination"))?;
                self.repos
                    .agreement_repo
                    .find_item_distribution(origin, item, destination, ctx.now)?
            }
            _ => None,
        };
        Ok(found)
    }

    pub(super) fn require_agreement(
        &self,
        order: &OperationPlan,
        ctx: &PropagationContext,
    ) -> EngineResult<ReplenishmentAgreement> {
        self.find_agreement(order, ctx)?.ok_or_else(|| {
            let partner = match order.kind {
                OrderKind::Purchase => key(&order.supplier),
                _ => key(&order.origin),
            };
            EngineError::MissingAgreement {
                item: key(&order.item).to_string(),
                location: order.receiving_location().unwrap_or("").to_string(),
                partner: partner.to_string(),
            }
        })
    }

    /// 工单应有的物料流水
    pub fn desired_materials(&self, order: &OperationPlan) -> EngineResult<Vec<OperationPlanMaterial>> {
        let status = DetailStatus::from_order_status(order.status);
        let qty = order.quantity;
        let draft = |item: &str, location: &str, quantity: f64, flowdate| {
            OperationPlanMaterial::draft(
                &order.reference,
                item,
                location,
                order.batch.clone(),
                quantity,
                flowdate,
                status,
            )
        };

        let flows = match order.kind {
            OrderKind::Inventory => {
                let item = required(order, &order.item, "item")?;
                let location = required(order, &order.location, "location")?;
                vec![draft(item, location, qty, order.startdate)]
            }
            OrderKind::Purchase => {
                let item = required(order, &order.item, "item")?;
                let location = required(order, &order.location, "location")?;
                vec![draft(item, location, qty, order.enddate)]
            }
            OrderKind::Distribution => {
                let item = required(order, &order.item, "item")?;
                let origin = required(order, &order.origin, "origin")?;
                let destination = order
                    .receiving_location()
                    .ok_or_else(|| missing(order, "destination"))?;
                vec![
                    draft(item, origin, -qty, order.startdate),
                    draft(item, destination, qty, order.enddate),
                ]
            }
            OrderKind::Delivery => {
                let item = required(order, &order.item, "item")?;
                let location = required(order, &order.location, "location")?;
                vec![draft(item, location, -qty, order.enddate)]
            }
            OrderKind::Manufacturing => {
                let op = self.require_operation(order)?;
                let location = order.location.clone().or_else(|| op.location.clone());
                let mut flows = Vec::new();

                for m in self.repos.operation_repo.find_materials(&op.name)? {
                    let quantity = m.flow_quantity(qty);
                    if quantity == 0.0 {
                        continue;
                    }
                    let loc = location.as_deref().ok_or_else(|| missing(order, "location"))?;
                    let flowdate = match m.flow_type {
                        FlowType::Start => order.startdate,
                        FlowType::End => order.enddate,
                    };
                    flows.push(draft(&m.item, loc, quantity, flowdate));
                }

                // 工序产出物料未显式配置时，按工单数量在结束时入库
                if let Some(item) = &op.item {
                    let produced = flows.iter().any(|f| &f.item == item && f.quantity > 0.0);
                    if !produced && qty > 0.0 {
                        let loc = location.as_deref().ok_or_else(|| missing(order, "location"))?;
                        flows.push(draft(item, loc, qty, order.enddate));
                    }
                }
                flows
            }
        };
        Ok(flows)
    }

    /// 物料流水与工单对齐，变化时重算涉及的结存
    pub(super) fn sync_materials(&self, order: &OperationPlan) -> EngineResult<()> {
        let desired = self.desired_materials(order)?;
        let existing = self.repos.material_repo.find_by_order(&order.reference)?;
        if same_flows(&existing, &desired) {
            return Ok(());
        }

        self.repos.material_repo.delete_by_order(&order.reference)?;
        for flow in &desired {
            self.repos.material_repo.insert(flow)?;
        }

        let pairs: BTreeSet<(String, String)> = existing
            .iter()
            .chain(desired.iter())
            .map(|f| (f.item.clone(), f.location.clone()))
            .collect();
        for (item, location) in &pairs {
            self.onhand.update_onhand(item, location)?;
        }
        debug!(reference = %order.reference, flows = desired.len(), "物料流水已重建");
        Ok(())
    }

    /// 选择实际占用的资源
    ///
    /// 叶子资源返回自身；聚合资源返回具备技能的最优叶子资源
    pub fn get_preferred_resource(
        &self,
        resource: &str,
        skill: Option<&str>,
    ) -> EngineResult<Option<Resource>> {
        let res = self
            .repos
            .resource_repo
            .find_by_name(resource)?
            .ok_or_else(|| EngineError::Configuration(format!("未知资源: {}", resource)))?;
        if self.repos.resource_repo.find_children(resource)?.is_empty() {
            return Ok(Some(res));
        }
        Ok(self
            .repos
            .resource_repo
            .find_skilled_leaves(resource, skill)?
            .into_iter()
            .next()
            .map(|s| s.resource))
    }

    /// 工单应有的资源占用（同一资源合并）
    pub fn desired_loads(
        &self,
        order: &OperationPlan,
        ctx: &PropagationContext,
    ) -> EngineResult<Vec<OperationPlanResource>> {
        let mut requirements: Vec<(Resource, f64, Option<String>)> = Vec::new();

        match order.kind {
            OrderKind::Manufacturing => {
                let op = self.require_operation(order)?;
                for req in self.repos.operation_repo.find_resources(&op.name)? {
                    match self.get_preferred_resource(&req.resource, req.skill.as_deref())? {
                        Some(res) => {
                            let setup = order.plan.setup.clone().or_else(|| req.setup.clone());
                            requirements.push((res, req.quantity, setup));
                        }
                        None => warn!(
                            reference = %order.reference,
                            resource = %req.resource,
                            skill = ?req.skill,
                            "聚合资源下无满足技能的资源，跳过占用"
                        ),
                    }
                }
            }
            OrderKind::Purchase | OrderKind::Distribution => {
                let resource = self
                    .find_agreement(order, ctx)?
                    .and_then(|agr| agr.resource.map(|r| (r, agr.resource_qty)));
                if let Some((name, quantity)) = resource {
                    match self.get_preferred_resource(&name, None)? {
                        Some(res) => requirements.push((res, quantity, order.plan.setup.clone())),
                        None => warn!(reference = %order.reference, resource = %name, "协议资源下无可用资源"),
                    }
                }
            }
            OrderKind::Inventory | OrderKind::Delivery => {}
        }

        let status = DetailStatus::from_order_status(order.status);
        let mut merged: BTreeMap<String, OperationPlanResource> = BTreeMap::new();
        for (res, quantity, setup) in requirements {
            let quantity = if res.resource_type.is_bucketized() {
                quantity * order.quantity
            } else {
                quantity
            };
            merged
                .entry(res.name.clone())
                .and_modify(|load| load.quantity += quantity)
                .or_insert_with(|| {
                    OperationPlanResource::draft(&order.reference, &res.name, quantity, setup, status)
                });
        }
        Ok(merged.into_values().collect())
    }

    /// 资源占用与工单对齐，占用或时间窗口变化时刷新资源计划
    pub(super) fn sync_resources(
        &self,
        order: &OperationPlan,
        prev: Option<&OperationPlan>,
        ctx: &PropagationContext,
    ) -> EngineResult<()> {
        if order.status.is_closed_like() {
            return self.release_capacity(order, prev);
        }
        if !ctx.config.consume_capacity {
            return Ok(());
        }

        let desired = self.desired_loads(order, ctx)?;
        let existing = self.repos.load_repo.find_by_order(&order.reference)?;
        let loads_changed = !same_loads(&existing, &desired);
        let window_changed = prev.map_or(true, |p| {
            p.window() != order.window() || p.plan.interruptions != order.plan.interruptions
        });

        if loads_changed {
            self.repos.load_repo.delete_by_order(&order.reference)?;
            for load in &desired {
                self.repos.load_repo.insert(load)?;
            }
        }
        if !loads_changed && !window_changed {
            return Ok(());
        }

        let resources: BTreeSet<String> = existing
            .iter()
            .chain(desired.iter())
            .map(|l| l.resource.clone())
            .collect();
        self.refresh_resources(&resources, order, prev)
    }

    /// 按新旧时间窗口涉及的日期刷新资源计划
    pub(super) fn refresh_resources(
        &self,
        resources: &BTreeSet<String>,
        order: &OperationPlan,
        prev: Option<&OperationPlan>,
    ) -> EngineResult<()> {
        for name in resources {
            let Some(res) = self.repos.resource_repo.find_by_name(name)? else {
                warn!(resource = %name, "资源不存在，跳过资源计划刷新");
                continue;
            };
            let bucketized = res.resource_type.is_bucketized();
            let mut days = days_touched(order, bucketized);
            if let Some(p) = prev {
                days.extend(days_touched(p, bucketized));
            }
            self.resource_plan.refresh_resource(name, &days, None)?;
        }
        Ok(())
    }
}
