// ==========================================
// 工单一致性维护层 - 资源领域模型
// ==========================================
// 职责: 资源、资源技能、资源计划行 (out_resourceplan)
// 层级: 资源通过 owner 组成森林，计划行在父资源上汇总
// ==========================================

use crate::domain::types::ResourceType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 比较浮点值时的容差
pub const LOAD_EPSILON: f64 = 1e-6;

// ==========================================
// Resource - 资源
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub resource_type: ResourceType,
    pub maximum: f64,
    pub available: Option<String>,
    pub location: Option<String>,
    pub owner: Option<String>,
    /// 效率百分比
    pub efficiency: f64,
}

impl Resource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            resource_type: ResourceType::Default,
            maximum: 1.0,
            available: None,
            location: None,
            owner: None,
            efficiency: 100.0,
        }
    }
}

// ==========================================
// ResourcePlanRow - 资源计划行
// ==========================================
// 单位: load/available 等按配置的时间单位（默认小时）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePlanRow {
    pub resource: String,
    pub startdate: NaiveDate,
    pub available: f64,
    pub unavailable: f64,
    pub setup: f64,
    pub load: f64,
    pub free: f64,
}

impl ResourcePlanRow {
    pub fn empty(resource: &str, startdate: NaiveDate) -> Self {
        Self {
            resource: resource.to_string(),
            startdate,
            available: 0.0,
            unavailable: 0.0,
            setup: 0.0,
            load: 0.0,
            free: 0.0,
        }
    }

    /// 按 load 重算 free
    pub fn recompute_free(&mut self) {
        self.free = (self.available - self.load).max(0.0);
    }

    /// 各汇总字段是否与另一行相同（容差内）
    pub fn same_figures(&self, other: &ResourcePlanRow) -> bool {
        (self.available - other.available).abs() < LOAD_EPSILON
            && (self.unavailable - other.unavailable).abs() < LOAD_EPSILON
            && (self.setup - other.setup).abs() < LOAD_EPSILON
            && (self.load - other.load).abs() < LOAD_EPSILON
            && (self.free - other.free).abs() < LOAD_EPSILON
    }

    /// 累加另一行的汇总字段
    pub fn accumulate(&mut self, other: &ResourcePlanRow) {
        self.available += other.available;
        self.unavailable += other.unavailable;
        self.setup += other.setup;
        self.load += other.load;
        self.free += other.free;
    }
}
