// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDateTime;
use opplan_sync::domain::order::OperationPlan;
use opplan_sync::domain::types::{OrderKind, OrderStatus};

// ==========================================
// OperationPlan 构建器
// ==========================================

pub struct OrderBuilder {
    order: OperationPlan,
}

impl OrderBuilder {
    fn base(reference: &str, kind: OrderKind, date: NaiveDateTime) -> Self {
        Self {
            order: OperationPlan::new(reference, kind, 1.0, date),
        }
    }

    /// 制造单
    pub fn manufacturing(reference: &str, operation: &str, date: NaiveDateTime) -> Self {
        let mut b = Self::base(reference, OrderKind::Manufacturing, date);
        b.order.operation = Some(operation.to_string());
        b
    }

    /// 采购单
    pub fn purchase(reference: &str, item: &str, location: &str, supplier: &str, date: NaiveDateTime) -> Self {
        let mut b = Self::base(reference, OrderKind::Purchase, date);
        b.order.item = Some(item.to_string());
        b.order.location = Some(location.to_string());
        b.order.supplier = Some(supplier.to_string());
        b
    }

    /// 调拨单
    pub fn distribution(
        reference: &str,
        item: &str,
        origin: &str,
        destination: &str,
        date: NaiveDateTime,
    ) -> Self {
        let mut b = Self::base(reference, OrderKind::Distribution, date);
        b.order.item = Some(item.to_string());
        b.order.origin = Some(origin.to_string());
        b.order.destination = Some(destination.to_string());
        b
    }

    /// 发货单（挂需求）
    pub fn delivery(reference: &str, demand: &str, date: NaiveDateTime) -> Self {
        let mut b = Self::base(reference, OrderKind::Delivery, date);
        b.order.demand = Some(demand.to_string());
        b
    }

    /// 库存单
    pub fn inventory(reference: &str, item: &str, location: &str, date: NaiveDateTime) -> Self {
        let mut b = Self::base(reference, OrderKind::Inventory, date);
        b.order.item = Some(item.to_string());
        b.order.location = Some(location.to_string());
        b
    }

    pub fn quantity(mut self, quantity: f64) -> Self {
        self.order.quantity = quantity;
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.order.status = status;
        self
    }

    pub fn owner(mut self, owner: &str) -> Self {
        self.order.owner = Some(owner.to_string());
        self
    }

    pub fn batch(mut self, batch: &str) -> Self {
        self.order.batch = Some(batch.to_string());
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.order.location = Some(location.to_string());
        self
    }

    pub fn start(mut self, start: NaiveDateTime) -> Self {
        self.order.startdate = start;
        self
    }

    pub fn build(self) -> OperationPlan {
        self.order
    }
}
