// ==========================================
// 工单一致性维护层 - 补货协议领域模型
// ==========================================
// 职责: 物料-供应商协议、物料-调拨协议，及批量规则
// ==========================================

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// SizingRule - 批量规则
// ==========================================
// 最小批量 / 批量倍数 / 最大批量，0 或 None 表示不限制
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SizingRule {
    pub minimum: Option<f64>,
    pub multiple: Option<f64>,
    pub maximum: Option<f64>,
}

const SIZE_EPSILON: f64 = 1e-9;

impl SizingRule {
    pub fn new(minimum: Option<f64>, multiple: Option<f64>, maximum: Option<f64>) -> Self {
        Self {
            minimum,
            multiple,
            maximum,
        }
    }

    fn positive(v: Option<f64>) -> Option<f64> {
        v.filter(|x| *x > SIZE_EPSILON)
    }

    /// 对请求数量应用批量规则
    ///
    /// 1) 低于最小批量: 取最小批量，有倍数时向上取整到倍数
    /// 2) 高于最大批量: 向下取整到不超过最大批量的倍数；
    ///    最小与最大之间容不下任何倍数时退回一个倍数
    /// 3) 其它: 向上取整到倍数（取整后超出最大批量按第 2 条处理）
    pub fn apply(&self, requested: f64) -> f64 {
        let quantity = requested.max(0.0);
        let minimum = Self::positive(self.minimum);
        let multiple = Self::positive(self.multiple);
        let maximum = Self::positive(self.maximum);

        let round_up = |q: f64| match multiple {
            Some(m) => (q / m - SIZE_EPSILON).ceil() * m,
            None => q,
        };

        let capped = |q: f64| -> f64 {
            match maximum {
                Some(max) if q > max + SIZE_EPSILON => match multiple {
                    Some(m) => {
                        let floored = (max / m + SIZE_EPSILON).floor() * m;
                        if floored < minimum.unwrap_or(0.0) - SIZE_EPSILON || floored <= 0.0 {
                            m
                        } else {
                            floored
                        }
                    }
                    None => max,
                },
                _ => q,
            }
        };

        match minimum {
            Some(min) if quantity < min - SIZE_EPSILON => capped(round_up(min)),
            _ => capped(round_up(quantity)),
        }
    }
}

// ==========================================
// ReplenishmentAgreement - 补货协议
// ==========================================
// 供应商协议: partner=供应商；调拨协议: partner=发出库点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplenishmentAgreement {
    pub id: i64,
    pub item: String,
    /// None 表示适用所有库点
    pub location: Option<String>,
    pub partner: String,
    pub leadtime_secs: i64,
    pub sizing: SizingRule,
    pub priority: i32,
    pub effective_start: Option<NaiveDateTime>,
    pub effective_end: Option<NaiveDateTime>,
    pub resource: Option<String>,
    pub resource_qty: f64,
}

impl ReplenishmentAgreement {
    pub fn leadtime(&self) -> Duration {
        Duration::seconds(self.leadtime_secs.max(0))
    }

    /// 在 now 时刻是否生效
    pub fn is_effective(&self, now: NaiveDateTime) -> bool {
        self.effective_start.map_or(true, |s| s <= now) && self.effective_end.map_or(true, |e| now < e)
    }

    /// 选择最合适的协议：优先级数字小者优先，其次指定库点优先，其次最新
    pub fn pick_best(
        candidates: Vec<ReplenishmentAgreement>,
        now: NaiveDateTime,
    ) -> Option<ReplenishmentAgreement> {
        candidates
            .into_iter()
            .filter(|a| a.is_effective(now))
            .min_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then(b.location.is_some().cmp(&a.location.is_some()))
                    .then(b.id.cmp(&a.id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rule(min: f64, mult: f64, max: f64) -> SizingRule {
        SizingRule::new(Some(min), Some(mult), Some(max))
    }

    #[test]
    fn test_below_minimum_takes_minimum() {
        assert_eq!(rule(100.0, 50.0, 0.0).apply(30.0), 100.0);
        // 最小批量不是倍数时向上取整
        assert_eq!(rule(120.0, 50.0, 0.0).apply(30.0), 150.0);
    }

    #[test]
    fn test_rounds_up_to_multiple() {
        assert_eq!(rule(100.0, 50.0, 0.0).apply(120.0), 150.0);
        assert_eq!(rule(100.0, 50.0, 0.0).apply(150.0), 150.0);
    }

    #[test]
    fn test_above_maximum_rounds_down_to_multiple() {
        assert_eq!(rule(100.0, 50.0, 420.0).apply(500.0), 400.0);
        // 向上取整后越过最大批量
        assert_eq!(rule(100.0, 50.0, 130.0).apply(120.0), 100.0);
    }

    #[test]
    fn test_no_multiple_fits_falls_back_to_one_step() {
        assert_eq!(rule(110.0, 50.0, 140.0).apply(500.0), 50.0);
    }

    #[test]
    fn test_without_limits_quantity_is_kept() {
        assert_eq!(SizingRule::default().apply(37.5), 37.5);
        assert_eq!(SizingRule::default().apply(-3.0), 0.0);
    }

    #[test]
    fn test_results_are_multiples_within_maximum() {
        let r = rule(100.0, 50.0, 400.0);
        for q in [0.0, 1.0, 99.0, 101.0, 250.0, 399.0, 401.0, 1000.0] {
            let sized = r.apply(q);
            assert!(sized >= 0.0);
            assert!((sized / 50.0 - (sized / 50.0).round()).abs() < 1e-9);
            assert!(sized <= 400.0);
        }
    }

    #[test]
    fn test_pick_best_prefers_priority_then_specific_location() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let base = ReplenishmentAgreement {
            id: 1,
            item: "bolt".to_string(),
            location: None,
            partner: "acme".to_string(),
            leadtime_secs: 86400,
            sizing: SizingRule::default(),
            priority: 1,
            effective_start: None,
            effective_end: None,
            resource: None,
            resource_qty: 1.0,
        };
        let specific = ReplenishmentAgreement {
            id: 2,
            location: Some("factory".to_string()),
            ..base.clone()
        };
        let expired = ReplenishmentAgreement {
            id: 3,
            priority: 0,
            effective_end: Some(now),
            ..base.clone()
        };
        let best = ReplenishmentAgreement::pick_best(vec![base, specific, expired], now).unwrap();
        assert_eq!(best.id, 2);
    }
}
