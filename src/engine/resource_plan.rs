// ==========================================
// 工单一致性维护层 - 资源计划汇总
// ==========================================
// 职责: 维护 out_resourceplan 的按日负荷，并沿资源层级向上汇总
// 连续资源: load = Σ(工单与当日重叠时长 - 中断时长) × 占用数量 / 时间单位
// 分桶资源: load = Σ 当日开工工单的占用数量
// 写入: 只回写发生变化的行
// ==========================================

use crate::config::CalendarPolicy;
use crate::domain::material::ResourceLoadRecord;
use crate::domain::order::{overlap, OperationPlan};
use crate::domain::resource::{Resource, ResourcePlanRow};
use crate::engine::calendar_eval::WorkingTimeEvaluator;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{
    CalendarRepository, MasterDataRepository, OperationPlanResourceRepository,
    ResourcePlanRepository, ResourceRepository,
};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_time(NaiveTime::MIN);
    (start, start + Duration::days(1))
}

/// 工单在资源计划中涉及的日期
pub fn days_touched(order: &OperationPlan, bucketized: bool) -> BTreeSet<NaiveDate> {
    days_between(order.startdate, order.enddate, bucketized)
}

/// 区间 [start, end) 涉及的日期
///
/// 分桶资源只看开工日；连续资源为区间覆盖的每一天
pub fn days_between(start: NaiveDateTime, end: NaiveDateTime, bucketized: bool) -> BTreeSet<NaiveDate> {
    let mut days = BTreeSet::new();
    let first = start.date();
    days.insert(first);
    if bucketized || end <= start {
        return days;
    }

    let last_day = (end - Duration::seconds(1)).date();
    let mut day = first;
    while day < last_day {
        match day.succ_opt() {
            Some(next) => {
                day = next;
                days.insert(day);
            }
            None => break,
        }
    }
    days
}

// ==========================================
// ResourcePlanAggregator - 资源计划汇总器
// ==========================================
pub struct ResourcePlanAggregator {
    resource_repo: Arc<ResourceRepository>,
    load_repo: Arc<OperationPlanResourceRepository>,
    plan_repo: Arc<ResourcePlanRepository>,
    calendar_repo: Arc<CalendarRepository>,
    master_repo: Arc<MasterDataRepository>,
    time_unit_seconds: i64,
    calendar_policy: CalendarPolicy,
}

impl ResourcePlanAggregator {
    pub fn new(
        resource_repo: Arc<ResourceRepository>,
        load_repo: Arc<OperationPlanResourceRepository>,
        plan_repo: Arc<ResourcePlanRepository>,
        calendar_repo: Arc<CalendarRepository>,
        master_repo: Arc<MasterDataRepository>,
        time_unit_seconds: i64,
        calendar_policy: CalendarPolicy,
    ) -> Self {
        Self {
            resource_repo,
            load_repo,
            plan_repo,
            calendar_repo,
            master_repo,
            time_unit_seconds: time_unit_seconds.max(1),
            calendar_policy,
        }
    }

    fn get_resource(&self, name: &str) -> EngineResult<Resource> {
        self.resource_repo
            .find_by_name(name)?
            .ok_or_else(|| EngineError::Configuration(format!("未知资源: {}", name)))
    }

    /// 资源日历（资源自身日历优先，其次资源所在库点日历）
    fn evaluator_for(&self, resource: &Resource) -> EngineResult<WorkingTimeEvaluator> {
        let mut names = Vec::new();
        if let Some(cal) = &resource.available {
            names.push(cal.clone());
        }
        if let Some(loc) = &resource.location {
            if let Some(cal) = self.master_repo.find_location(loc)?.and_then(|l| l.available) {
                if !names.contains(&cal) {
                    names.push(cal);
                }
            }
        }

        let mut calendars = Vec::new();
        for name in names {
            if let Some(cal) = self.calendar_repo.find_by_name(&name)? {
                calendars.push(cal);
            }
        }
        Ok(WorkingTimeEvaluator::new(calendars, self.calendar_policy))
    }

    /// 某工单变化后刷新资源计划
    ///
    /// # 参数
    /// - resource: 资源名
    /// - order: 变化的工单（其时间窗口决定刷新的日期）
    /// - delete: 工单正在删除，汇总时排除其占用
    #[instrument(skip(self, order), fields(reference = %order.reference))]
    pub fn update_resource_plan(
        &self,
        resource: &str,
        order: &OperationPlan,
        delete: bool,
    ) -> EngineResult<usize> {
        let res = self.get_resource(resource)?;
        let days = days_touched(order, res.resource_type.is_bucketized());
        let exclude = if delete { Some(order.reference.as_str()) } else { None };
        self.refresh_resource(resource, &days, exclude)
    }

    /// 重算资源在指定日期的计划行，并向上汇总
    ///
    /// # 返回
    /// 本资源及祖先实际回写的行数
    pub fn refresh_resource(
        &self,
        resource: &str,
        days: &BTreeSet<NaiveDate>,
        exclude_order: Option<&str>,
    ) -> EngineResult<usize> {
        if days.is_empty() {
            return Ok(0);
        }
        let res = self.get_resource(resource)?;
        let bucketized = res.resource_type.is_bucketized();
        let evaluator = self.evaluator_for(&res)?;
        let loads: Vec<ResourceLoadRecord> = self
            .load_repo
            .find_loads_by_resource(resource)?
            .into_iter()
            .filter(|l| Some(l.operationplan.as_str()) != exclude_order)
            .collect();

        let mut written = 0;
        for day in days {
            let load = if bucketized {
                bucket_load(&loads, *day)
            } else {
                self.continuous_load(&loads, *day)
            };

            let existing = self.plan_repo.find(resource, *day)?;
            let mut row = match &existing {
                Some(row) => row.clone(),
                None => self.fresh_row(&res, &evaluator, *day),
            };
            row.load = load;
            row.recompute_free();

            let changed = existing.as_ref().map_or(true, |old| !old.same_figures(&row));
            if changed {
                self.plan_repo.upsert(&row)?;
                written += 1;
            }
        }

        written += self.rollup_ancestors(resource, days)?;
        debug!(resource, days = days.len(), written, "资源计划刷新完成");
        Ok(written)
    }

    fn continuous_load(&self, loads: &[ResourceLoadRecord], day: NaiveDate) -> f64 {
        let (day_start, day_end) = day_bounds(day);
        let seconds: f64 = loads
            .iter()
            .map(|l| {
                let worked = overlap(l.startdate, l.enddate, day_start, day_end);
                if worked <= Duration::zero() {
                    return 0.0;
                }
                let from = l.startdate.max(day_start);
                let to = l.enddate.min(day_end);
                let net = (worked - l.plan.interrupted_within(from, to)).max(Duration::zero());
                net.num_seconds() as f64 * l.quantity
            })
            .sum();
        seconds / self.time_unit_seconds as f64
    }

    /// 无存量行时的可用/不可用产能
    fn fresh_row(
        &self,
        res: &Resource,
        evaluator: &WorkingTimeEvaluator,
        day: NaiveDate,
    ) -> ResourcePlanRow {
        let mut row = ResourcePlanRow::empty(&res.name, day);
        if res.resource_type.is_bucketized() {
            row.available = res.maximum;
        } else {
            let (day_start, day_end) = day_bounds(day);
            let open = evaluator.available_time(day_start, day_end).num_seconds() as f64;
            let total = (day_end - day_start).num_seconds() as f64;
            let unit = self.time_unit_seconds as f64;
            row.available = res.maximum * open / unit;
            row.unavailable = res.maximum * (total - open) / unit;
        }
        row
    }

    /// 沿 owner 链向上，把直接子资源的同日计划行求和写入父资源
    pub fn rollup_ancestors(&self, resource: &str, days: &BTreeSet<NaiveDate>) -> EngineResult<usize> {
        let mut written = 0;
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(resource.to_string());
        let mut current = self.get_resource(resource)?;

        while let Some(owner) = current.owner.clone() {
            if !seen.insert(owner.clone()) {
                break;
            }
            let children = self.resource_repo.find_children(&owner)?;
            for day in days {
                let mut sum = ResourcePlanRow::empty(&owner, *day);
                for child in &children {
                    if let Some(row) = self.plan_repo.find(&child.name, *day)? {
                        sum.accumulate(&row);
                    }
                }
                let existing = self.plan_repo.find(&owner, *day)?;
                if existing.as_ref().map_or(true, |old| !old.same_figures(&sum)) {
                    self.plan_repo.upsert(&sum)?;
                    written += 1;
                }
            }
            current = self.get_resource(&owner)?;
        }
        Ok(written)
    }
}

fn bucket_load(loads: &[ResourceLoadRecord], day: NaiveDate) -> f64 {
    loads
        .iter()
        .filter(|l| l.startdate.date() == day)
        .map(|l| l.quantity)
        .sum()
}
