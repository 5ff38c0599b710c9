// ==========================================
// 工单一致性维护层 - 物料与明细领域模型
// ==========================================
// 职责: 工单物料流水、工单资源占用、库点/物料/缓冲区主数据
// 归属: 物料流水与资源占用由工单独占（级联删除）
// ==========================================

use crate::domain::types::{DetailStatus, OrderKind, OrderStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// OperationPlanMaterial - 工单物料流水
// ==========================================
// quantity: 负数消耗，正数产出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationPlanMaterial {
    pub id: i64,
    pub operationplan: String,
    pub item: String,
    pub location: String,
    pub batch: Option<String>,
    pub quantity: f64,
    pub flowdate: NaiveDateTime,
    pub onhand: Option<f64>,
    pub minimum: Option<f64>,
    /// 覆盖期（秒）
    pub periodofcover: Option<f64>,
    pub status: DetailStatus,
}

impl OperationPlanMaterial {
    /// 尚未落库的新流水
    pub fn draft(
        operationplan: &str,
        item: &str,
        location: &str,
        batch: Option<String>,
        quantity: f64,
        flowdate: NaiveDateTime,
        status: DetailStatus,
    ) -> Self {
        Self {
            id: 0,
            operationplan: operationplan.to_string(),
            item: item.to_string(),
            location: location.to_string(),
            batch,
            quantity,
            flowdate,
            onhand: None,
            minimum: None,
            periodofcover: None,
            status,
        }
    }

    /// 判断两条流水在业务上是否一致（忽略 id 与结存字段）
    pub fn same_flow(&self, other: &OperationPlanMaterial) -> bool {
        self.item == other.item
            && self.location == other.location
            && self.batch == other.batch
            && (self.quantity - other.quantity).abs() < 1e-9
            && self.flowdate == other.flowdate
            && self.status == other.status
    }

    pub fn is_consumption(&self) -> bool {
        self.quantity < 0.0
    }
}

// ==========================================
// MaterialFlowRecord - 流水 + 所属工单状态
// ==========================================
// 结存计算与关闭补足时使用
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialFlowRecord {
    pub flow: OperationPlanMaterial,
    pub order_kind: OrderKind,
    pub order_status: OrderStatus,
}

impl MaterialFlowRecord {
    /// 计入结存：库存、已确认、完工、关闭
    pub fn counts_toward_onhand(&self) -> bool {
        self.order_kind == OrderKind::Inventory || self.order_status >= OrderStatus::Confirmed
    }
}

// ==========================================
// OperationPlanResource - 工单资源占用
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationPlanResource {
    pub id: i64,
    pub operationplan: String,
    pub resource: String,
    pub quantity: f64,
    pub setup: Option<String>,
    pub status: DetailStatus,
}

impl OperationPlanResource {
    pub fn draft(
        operationplan: &str,
        resource: &str,
        quantity: f64,
        setup: Option<String>,
        status: DetailStatus,
    ) -> Self {
        Self {
            id: 0,
            operationplan: operationplan.to_string(),
            resource: resource.to_string(),
            quantity,
            setup,
            status,
        }
    }

    /// 判断两条占用在业务上是否一致（忽略 id）
    pub fn same_load(&self, other: &OperationPlanResource) -> bool {
        self.resource == other.resource
            && (self.quantity - other.quantity).abs() < 1e-9
            && self.setup == other.setup
            && self.status == other.status
    }
}

// ==========================================
// ResourceLoadRecord - 资源占用 + 工单时间
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceLoadRecord {
    pub operationplan: String,
    pub quantity: f64,
    pub startdate: NaiveDateTime,
    pub enddate: NaiveDateTime,
    pub plan: crate::domain::order::PlanAnnotations,
}

// ==========================================
// 主数据
// ==========================================

/// 库点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub available: Option<String>,
}

/// 物料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    /// make to stock / make to order
    pub item_type: Option<String>,
}

impl Item {
    /// 按订单生产的物料需要按批次分区结存
    pub fn is_make_to_order(&self) -> bool {
        self.item_type
            .as_deref()
            .map(|t| t.trim().eq_ignore_ascii_case("make to order"))
            .unwrap_or(false)
    }
}

/// 需求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    pub name: String,
    pub item: String,
    pub location: String,
    pub quantity: f64,
    pub due: NaiveDateTime,
}

/// 缓冲区（安全库存）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buffer {
    pub id: i64,
    pub item: String,
    pub location: String,
    pub batch: Option<String>,
    pub minimum: Option<f64>,
    pub minimum_calendar: Option<String>,
}
