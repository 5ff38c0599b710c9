// ==========================================
// 工单一致性维护层 - 工单领域模型
// ==========================================
// 职责: OperationPlan 实体、计划注记、变更字段集合
// 说明: plan 列在存储边界序列化为 JSON，领域内使用强类型
// ==========================================

use crate::domain::types::{OrderKind, OrderStatus};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Interruption - 不可用区间
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interruption {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interruption {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// 与 [from, to) 的重叠时长
    pub fn overlap(&self, from: NaiveDateTime, to: NaiveDateTime) -> Duration {
        overlap(self.start, self.end, from, to)
    }
}

/// 两个区间的重叠时长（无重叠时为 0）
pub fn overlap(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> Duration {
    let start = a_start.max(b_start);
    let end = a_end.min(b_end);
    if end > start {
        end - start
    } else {
        Duration::zero()
    }
}

// ==========================================
// PlanAnnotations - 计划注记
// ==========================================
// 取代原先自由结构的 plan JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanAnnotations {
    /// 日历不可用区间（按时间升序）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interruptions: Vec<Interruption>,

    /// 换型覆盖值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,

    /// 换型结束时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setupend: Option<NaiveDateTime>,

    /// 外部引擎给出的可行性标志
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feasible: Option<bool>,
}

impl PlanAnnotations {
    /// 解析存储的 JSON；空串视为空注记
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// [from, to) 内被中断的总时长
    pub fn interrupted_within(&self, from: NaiveDateTime, to: NaiveDateTime) -> Duration {
        self.interruptions
            .iter()
            .fold(Duration::zero(), |acc, i| acc + i.overlap(from, to))
    }
}

// ==========================================
// OperationPlan - 工单
// ==========================================
// 不变量: startdate <= enddate, quantity >= 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationPlan {
    pub reference: String,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub name: Option<String>,
    pub quantity: f64,
    pub quantity_completed: Option<f64>,
    pub startdate: NaiveDateTime,
    pub enddate: NaiveDateTime,
    pub criticality: Option<f64>,
    /// 延误（秒）
    pub delay_secs: Option<i64>,
    pub plan: PlanAnnotations,

    // ===== 生产工单 =====
    pub operation: Option<String>,
    pub owner: Option<String>,
    pub batch: Option<String>,

    // ===== 采购/调拨/发货 =====
    pub item: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub supplier: Option<String>,
    pub location: Option<String>,
    pub demand: Option<String>,
    pub due: Option<NaiveDateTime>,
}

impl OperationPlan {
    /// 创建一个最小工单，起止时间相同
    pub fn new(reference: &str, kind: OrderKind, quantity: f64, date: NaiveDateTime) -> Self {
        Self {
            reference: reference.to_string(),
            kind,
            status: OrderStatus::Proposed,
            name: None,
            quantity,
            quantity_completed: None,
            startdate: date,
            enddate: date,
            criticality: None,
            delay_secs: None,
            plan: PlanAnnotations::default(),
            operation: None,
            owner: None,
            batch: None,
            item: None,
            origin: None,
            destination: None,
            supplier: None,
            location: None,
            demand: None,
            due: None,
        }
    }

    /// 生成新的工单编号
    pub fn generate_reference() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// 工单占用的时间区间
    pub fn window(&self) -> (NaiveDateTime, NaiveDateTime) {
        (self.startdate, self.enddate)
    }

    /// 物料流水所在库点（采购/发货为 location，调拨为 destination）
    pub fn receiving_location(&self) -> Option<&str> {
        match self.kind {
            OrderKind::Distribution => self.destination.as_deref(),
            _ => self.location.as_deref(),
        }
    }
}

// ==========================================
// DateAnchor - 日期驱动方向
// ==========================================
// Start: 给定开始时间，正向推算结束时间
// End: 给定结束时间，反向推算开始时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateAnchor {
    Start(NaiveDateTime),
    End(NaiveDateTime),
}

// ==========================================
// OrderChange - 变更字段集合
// ==========================================
// 调用方只填写发生变化的字段
#[derive(Debug, Clone, Default)]
pub struct OrderChange {
    pub quantity: Option<f64>,
    pub quantity_completed: Option<f64>,
    pub startdate: Option<NaiveDateTime>,
    pub enddate: Option<NaiveDateTime>,
    pub status: Option<OrderStatus>,
    pub operation: Option<String>,
    pub item: Option<String>,
    pub location: Option<String>,
    pub supplier: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub demand: Option<String>,
    pub batch: Option<String>,
    pub setup: Option<String>,
    /// 管理员重置：允许状态回退
    pub admin_reset: bool,
}

impl OrderChange {
    pub fn quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn startdate(mut self, date: NaiveDateTime) -> Self {
        self.startdate = Some(date);
        self
    }

    pub fn enddate(mut self, date: NaiveDateTime) -> Self {
        self.enddate = Some(date);
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn admin_reset(mut self) -> Self {
        self.admin_reset = true;
        self
    }

    /// 是否变更了外键（影响名称、协议、物料与资源）
    pub fn touches_keys(&self) -> bool {
        self.operation.is_some()
            || self.item.is_some()
            || self.location.is_some()
            || self.supplier.is_some()
            || self.origin.is_some()
            || self.destination.is_some()
            || self.demand.is_some()
            || self.batch.is_some()
    }

    /// 日期驱动方向：给了结束时间则反推开始时间
    pub fn date_anchor(&self) -> Option<DateAnchor> {
        match (self.startdate, self.enddate) {
            (_, Some(end)) => Some(DateAnchor::End(end)),
            (Some(start), None) => Some(DateAnchor::Start(start)),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_plan_annotations_json_roundtrip_skips_empty_fields() {
        let empty = PlanAnnotations::default();
        assert_eq!(empty.to_json().unwrap(), "{}");
        assert_eq!(PlanAnnotations::from_json("").unwrap(), empty);

        let plan = PlanAnnotations {
            interruptions: vec![Interruption::new(dt(1, 12), dt(1, 13))],
            setup: Some("red".to_string()),
            ..Default::default()
        };
        let back = PlanAnnotations::from_json(&plan.to_json().unwrap()).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn test_interrupted_within_clips_to_window() {
        let plan = PlanAnnotations {
            interruptions: vec![
                Interruption::new(dt(1, 10), dt(1, 14)),
                Interruption::new(dt(2, 0), dt(2, 2)),
            ],
            ..Default::default()
        };
        assert_eq!(plan.interrupted_within(dt(1, 12), dt(1, 20)), Duration::hours(2));
        assert_eq!(plan.interrupted_within(dt(1, 0), dt(3, 0)), Duration::hours(6));
    }

    #[test]
    fn test_end_date_wins_as_anchor() {
        let change = OrderChange::default().startdate(dt(1, 8)).enddate(dt(1, 10));
        assert_eq!(change.date_anchor(), Some(DateAnchor::End(dt(1, 10))));
        let change = OrderChange::default().startdate(dt(1, 8));
        assert_eq!(change.date_anchor(), Some(DateAnchor::Start(dt(1, 8))));
    }
}
