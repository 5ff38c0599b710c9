// ==========================================
// 工单一致性维护层 - 工序领域模型
// ==========================================
// 职责: 工序、工序物料、工序资源、工序依赖
// ==========================================

use crate::domain::agreement::SizingRule;
use crate::domain::types::{FlowType, OperationType};
use chrono::Duration;
use serde::{Deserialize, Serialize};

// ==========================================
// Operation - 工序
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub op_type: OperationType,
    pub item: Option<String>,
    pub location: Option<String>,
    /// 父工序（routing/alternate/split）
    pub owner: Option<String>,
    /// 在父工序中的顺序
    pub priority: i32,
    pub duration_secs: i64,
    pub duration_per_secs: i64,
    pub sizeminimum: Option<f64>,
    pub sizemultiple: Option<f64>,
    pub sizemaximum: Option<f64>,
    /// 工作日历
    pub available: Option<String>,
}

impl Operation {
    pub fn new(name: &str, op_type: OperationType) -> Self {
        Self {
            name: name.to_string(),
            op_type,
            item: None,
            location: None,
            owner: None,
            priority: 1,
            duration_secs: 0,
            duration_per_secs: 0,
            sizeminimum: Some(1.0),
            sizemultiple: None,
            sizemaximum: None,
            available: None,
        }
    }

    /// 按数量计算所需工作时长
    pub fn working_duration(&self, quantity: f64) -> Duration {
        let base = Duration::seconds(self.duration_secs.max(0));
        match self.op_type {
            OperationType::TimePer => {
                let per = (self.duration_per_secs.max(0) as f64 * quantity.max(0.0)).round() as i64;
                base + Duration::seconds(per)
            }
            _ => base,
        }
    }

    /// 工序批量规则
    pub fn sizing_rule(&self) -> SizingRule {
        SizingRule::new(self.sizeminimum, self.sizemultiple, self.sizemaximum)
    }
}

// ==========================================
// OperationMaterial - 工序物料
// ==========================================
// quantity 为单件用量（负数消耗/正数产出），quantity_fixed 为固定用量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMaterial {
    pub id: i64,
    pub operation: String,
    pub item: String,
    pub quantity: f64,
    pub quantity_fixed: f64,
    pub flow_type: FlowType,
}

impl OperationMaterial {
    /// 工单数量对应的流水数量
    pub fn flow_quantity(&self, order_quantity: f64) -> f64 {
        self.quantity * order_quantity + self.quantity_fixed
    }
}

// ==========================================
// OperationResource - 工序资源需求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResource {
    pub id: i64,
    pub operation: String,
    pub resource: String,
    pub quantity: f64,
    pub skill: Option<String>,
    pub setup: Option<String>,
}

// ==========================================
// OperationDependency - 工序依赖
// ==========================================
// operation 被 blockedby 阻塞：blockedby 结束后 operation 才能开始
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDependency {
    pub id: i64,
    pub operation: String,
    pub blockedby: String,
    pub quantity: f64,
    /// 软安全提前期（秒），本层只记录不强制
    pub safety_leadtime_secs: i64,
    /// 硬安全提前期（秒）
    pub hard_safety_leadtime_secs: i64,
}

impl OperationDependency {
    pub fn hard_safety_leadtime(&self) -> Duration {
        Duration::seconds(self.hard_safety_leadtime_secs.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_per_duration_scales_with_quantity() {
        let mut op = Operation::new("paint", OperationType::TimePer);
        op.duration_secs = 3600;
        op.duration_per_secs = 60;
        assert_eq!(op.working_duration(30.0), Duration::seconds(3600 + 1800));

        op.op_type = OperationType::FixedTime;
        assert_eq!(op.working_duration(30.0), Duration::seconds(3600));
    }

    #[test]
    fn test_flow_quantity_adds_fixed_part() {
        let flow = OperationMaterial {
            id: 1,
            operation: "paint".to_string(),
            item: "paint-can".to_string(),
            quantity: -2.0,
            quantity_fixed: -5.0,
            flow_type: FlowType::Start,
        };
        assert_eq!(flow.flow_quantity(10.0), -25.0);
    }
}
