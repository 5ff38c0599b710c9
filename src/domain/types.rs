// ==========================================
// 工单一致性维护层 - 领域类型定义
// ==========================================
// 职责: 工单类型/状态、工序类型、资源类型等封闭枚举
// 约定: to_db_str/from_str 与数据库存储值保持一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 工单类型 (Order Kind)
// ==========================================
// 存储值: STCK / MO / PO / DO / DLVR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Inventory,     // 库存
    Manufacturing, // 生产工单
    Purchase,      // 采购单
    Distribution,  // 调拨单
    Delivery,      // 发货单
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl OrderKind {
    /// 从数据库存储值解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "STCK" => Some(OrderKind::Inventory),
            "MO" => Some(OrderKind::Manufacturing),
            "PO" => Some(OrderKind::Purchase),
            "DO" => Some(OrderKind::Distribution),
            "DLVR" => Some(OrderKind::Delivery),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OrderKind::Inventory => "STCK",
            OrderKind::Manufacturing => "MO",
            OrderKind::Purchase => "PO",
            OrderKind::Distribution => "DO",
            OrderKind::Delivery => "DLVR",
        }
    }
}

// ==========================================
// 工单状态 (Order Status)
// ==========================================
// 顺序: Proposed < Approved < Confirmed < Completed < Closed
// Closed 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Proposed,  // 建议
    Approved,  // 已批准
    Confirmed, // 已确认
    Completed, // 已完工
    Closed,    // 已关闭
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl OrderStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "proposed" => Some(OrderStatus::Proposed),
            "approved" => Some(OrderStatus::Approved),
            "confirmed" => Some(OrderStatus::Confirmed),
            "completed" => Some(OrderStatus::Completed),
            "closed" => Some(OrderStatus::Closed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OrderStatus::Proposed => "proposed",
            OrderStatus::Approved => "approved",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Completed => "completed",
            OrderStatus::Closed => "closed",
        }
    }

    /// 只允许沿生命周期前进（可跳级），Closed 之后不可再变
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        next >= *self
    }

    /// 计划层仍可调整（建议/已批准）
    pub fn is_adjustable(&self) -> bool {
        matches!(self, OrderStatus::Proposed | OrderStatus::Approved)
    }

    /// 完工或关闭
    pub fn is_closed_like(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Closed)
    }
}

// ==========================================
// 工序类型 (Operation Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    FixedTime, // 固定工时
    TimePer,   // 固定工时 + 单件工时
    Routing,   // 工艺路线（由子工序组成）
    Alternate, // 替代工序
    Split,     // 拆分工序
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl OperationType {
    /// 从字符串解析工序类型；空值按 fixed_time 处理
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "fixed_time" => Some(OperationType::FixedTime),
            "time_per" => Some(OperationType::TimePer),
            "routing" => Some(OperationType::Routing),
            "alternate" => Some(OperationType::Alternate),
            "split" => Some(OperationType::Split),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OperationType::FixedTime => "fixed_time",
            OperationType::TimePer => "time_per",
            OperationType::Routing => "routing",
            OperationType::Alternate => "alternate",
            OperationType::Split => "split",
        }
    }

    /// 是否为容器型工序（时间跨度来自子工单）
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            OperationType::Routing | OperationType::Alternate | OperationType::Split
        )
    }
}

// ==========================================
// 资源类型 (Resource Type)
// ==========================================
// default: 连续时间产能
// buckets*: 按日汇总产能
// infinite: 不计负荷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Default,
    Buckets,
    Infinite,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ResourceType {
    /// 从字符串解析资源类型（buckets_day/buckets_week/... 统一视为 buckets）
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "" | "default" => Some(ResourceType::Default),
            "infinite" => Some(ResourceType::Infinite),
            _ if s.starts_with("buckets") => Some(ResourceType::Buckets),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ResourceType::Default => "default",
            ResourceType::Buckets => "buckets",
            ResourceType::Infinite => "infinite",
        }
    }

    /// 是否为分桶资源
    pub fn is_bucketized(&self) -> bool {
        matches!(self, ResourceType::Buckets)
    }
}

// ==========================================
// 物料流水时点 (Flow Type)
// ==========================================
// start: 工单开始时发生；end: 工单结束时发生
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    Start,
    End,
}

impl FlowType {
    /// 从字符串解析；空值按消耗在开始、产出在结束推断
    pub fn from_str(s: &str, quantity: f64) -> Self {
        match s.trim().to_lowercase().as_str() {
            "start" => FlowType::Start,
            "end" => FlowType::End,
            _ if quantity < 0.0 => FlowType::Start,
            _ => FlowType::End,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            FlowType::Start => "start",
            FlowType::End => "end",
        }
    }
}

// ==========================================
// 物料/资源明细状态 (Detail Status)
// ==========================================
// 由所属工单状态派生
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailStatus {
    Proposed,
    Confirmed,
    Closed,
}

impl DetailStatus {
    /// 由工单状态派生明细状态
    pub fn from_order_status(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Proposed | OrderStatus::Approved => DetailStatus::Proposed,
            OrderStatus::Confirmed => DetailStatus::Confirmed,
            OrderStatus::Completed | OrderStatus::Closed => DetailStatus::Closed,
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "proposed" => Some(DetailStatus::Proposed),
            "confirmed" => Some(DetailStatus::Confirmed),
            "closed" => Some(DetailStatus::Closed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            DetailStatus::Proposed => "proposed",
            DetailStatus::Confirmed => "confirmed",
            DetailStatus::Closed => "closed",
        }
    }
}
