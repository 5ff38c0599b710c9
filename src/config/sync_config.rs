// ==========================================
// 工单一致性维护层 - 同步配置
// ==========================================
// 职责: 显式传入引擎的配置结构（不读取进程环境变量）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 多日历合并策略
// ==========================================
// FirstOnly: 只取候选列表中第一个非空日历
// Intersection: 所有候选日历同时可用才计入工作时间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarPolicy {
    FirstOnly,
    Intersection,
}

impl fmt::Display for CalendarPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl CalendarPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "first_only" | "first" => Some(CalendarPolicy::FirstOnly),
            "intersection" => Some(CalendarPolicy::Intersection),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CalendarPolicy::FirstOnly => "first_only",
            CalendarPolicy::Intersection => "intersection",
        }
    }
}

// ==========================================
// SyncConfig - 同步配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 是否生成物料流水
    pub consume_material: bool,
    /// 是否生成资源占用
    pub consume_capacity: bool,
    /// 完工/关闭工单是否允许未来日期
    pub completed_allow_future: bool,
    pub calendar_policy: CalendarPolicy,
    /// 资源计划负荷单位（秒），默认小时
    pub time_unit_seconds: i64,
    /// 覆盖期上限（天）
    pub period_of_cover_horizon_days: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            consume_material: true,
            consume_capacity: true,
            completed_allow_future: false,
            calendar_policy: CalendarPolicy::FirstOnly,
            time_unit_seconds: 3600,
            period_of_cover_horizon_days: 999,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SyncConfig::default();
        assert!(cfg.consume_material);
        assert!(cfg.consume_capacity);
        assert!(!cfg.completed_allow_future);
        assert_eq!(cfg.calendar_policy, CalendarPolicy::FirstOnly);
        assert_eq!(cfg.time_unit_seconds, 3600);
    }

    #[test]
    fn test_calendar_policy_codes() {
        assert_eq!(CalendarPolicy::from_str("Intersection"), Some(CalendarPolicy::Intersection));
        assert_eq!(CalendarPolicy::from_str("first_only"), Some(CalendarPolicy::FirstOnly));
        assert!(CalendarPolicy::from_str("union").is_none());
    }
}
