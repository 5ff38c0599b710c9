// ==========================================
// 工单一致性维护层 - 物料结存维护
// ==========================================
// 职责: 重算 (物料, 库点) 下每条流水的 onhand / minimum / periodofcover
// 排序: (flowdate, quantity desc, id)，同一时刻先入库后出库
// 口径: onhand = 截至本行（含）的库存/已确认/完工/关闭流水之和 + 本行（若本行不在其中）
// 分区: 按订单生产的物料再按批次分区
// 写入: 只回写发生变化的行
// ==========================================

use crate::domain::calendar::Calendar;
use crate::domain::material::{Buffer, MaterialFlowRecord};
use crate::engine::error::EngineResult;
use crate::repository::{
    CalendarRepository, MasterDataRepository, OperationPlanMaterialRepository,
};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

const BALANCE_EPSILON: f64 = 1e-6;

// ==========================================
// MinimumSources - 安全库存来源
// ==========================================
// 优先级: 物料-库点安全库存日历桶 > 该日历默认值
//        > 缓冲区日历桶 > 该日历默认值 > 缓冲区固定值 > 0
#[derive(Debug, Clone, Default)]
pub struct MinimumSources {
    pub safety_calendar: Option<Calendar>,
    pub buffer: Option<Buffer>,
    pub buffer_calendar: Option<Calendar>,
}

impl MinimumSources {
    /// 时刻 t 生效的安全库存
    pub fn minimum_at(&self, t: NaiveDateTime) -> f64 {
        if let Some(cal) = &self.safety_calendar {
            return cal.value_at(t);
        }
        if let Some(cal) = &self.buffer_calendar {
            return cal.value_at(t);
        }
        self.buffer
            .as_ref()
            .and_then(|b| b.minimum)
            .unwrap_or(0.0)
    }
}

fn differs(stored: Option<f64>, computed: f64) -> bool {
    match stored {
        Some(v) => (v - computed).abs() > BALANCE_EPSILON,
        None => true,
    }
}

// ==========================================
// MaterialBalanceMaintainer - 结存维护器
// ==========================================
pub struct MaterialBalanceMaintainer {
    material_repo: Arc<OperationPlanMaterialRepository>,
    master_repo: Arc<MasterDataRepository>,
    calendar_repo: Arc<CalendarRepository>,
    cover_horizon: Duration,
}

impl MaterialBalanceMaintainer {
    pub fn new(
        material_repo: Arc<OperationPlanMaterialRepository>,
        master_repo: Arc<MasterDataRepository>,
        calendar_repo: Arc<CalendarRepository>,
        cover_horizon_days: i64,
    ) -> Self {
        Self {
            material_repo,
            master_repo,
            calendar_repo,
            cover_horizon: Duration::days(cover_horizon_days),
        }
    }

    /// 加载某分区的安全库存来源
    pub fn minimum_sources(
        &self,
        item: &str,
        location: &str,
        batch: Option<&str>,
    ) -> EngineResult<MinimumSources> {
        let safety_calendar = match self.master_repo.find_safety_stock_calendar(item, location)? {
            Some(name) => self.calendar_repo.find_by_name(&name)?,
            None => None,
        };
        let buffer = self.master_repo.find_buffer(item, location, batch)?;
        let buffer_calendar = match buffer.as_ref().and_then(|b| b.minimum_calendar.as_deref()) {
            Some(name) => self.calendar_repo.find_by_name(name)?,
            None => None,
        };
        Ok(MinimumSources {
            safety_calendar,
            buffer,
            buffer_calendar,
        })
    }

    /// 查询某时刻生效的安全库存
    pub fn effective_minimum(
        &self,
        item: &str,
        location: &str,
        batch: Option<&str>,
        at: NaiveDateTime,
    ) -> EngineResult<f64> {
        Ok(self.minimum_sources(item, location, batch)?.minimum_at(at))
    }

    /// 重算 (物料, 库点) 的结存
    ///
    /// # 返回
    /// 实际回写的行数
    #[instrument(skip(self))]
    pub fn update_onhand(&self, item: &str, location: &str) -> EngineResult<usize> {
        let records = self.material_repo.find_by_item_location(item, location)?;
        if records.is_empty() {
            return Ok(0);
        }

        let by_batch = self
            .master_repo
            .find_item(item)?
            .map(|i| i.is_make_to_order())
            .unwrap_or(false);

        let mut partitions: BTreeMap<Option<String>, Vec<&MaterialFlowRecord>> = BTreeMap::new();
        for record in &records {
            let key = if by_batch { record.flow.batch.clone() } else { None };
            partitions.entry(key).or_default().push(record);
        }

        let mut written = 0;
        for (batch, rows) in partitions {
            let sources = self.minimum_sources(item, location, batch.as_deref())?;
            written += self.update_partition(&rows, &sources)?;
        }

        debug!(item, location, rows = records.len(), written, "结存重算完成");
        Ok(written)
    }

    fn update_partition(
        &self,
        rows: &[&MaterialFlowRecord],
        sources: &MinimumSources,
    ) -> EngineResult<usize> {
        let balances = running_balances(rows);
        let mut written = 0;

        for (idx, record) in rows.iter().enumerate() {
            let flow = &record.flow;
            let onhand = balances[idx];
            let minimum = sources.minimum_at(flow.flowdate);
            let cover = self.period_of_cover(rows, idx, onhand);

            if differs(flow.onhand, onhand)
                || differs(flow.minimum, minimum)
                || differs(flow.periodofcover, cover)
            {
                self.material_repo
                    .update_balance(flow.id, onhand, minimum, cover)?;
                written += 1;
            }
        }
        Ok(written)
    }

    /// 覆盖期（秒）：后续消耗把 onhand 耗尽所需的时间
    fn period_of_cover(&self, rows: &[&MaterialFlowRecord], idx: usize, onhand: f64) -> f64 {
        if onhand <= 0.0 {
            return 0.0;
        }
        let from = rows[idx].flow.flowdate;
        let mut balance = onhand;
        for later in &rows[idx + 1..] {
            if later.flow.quantity < 0.0 {
                balance += later.flow.quantity;
                if balance <= BALANCE_EPSILON {
                    return (later.flow.flowdate - from).num_seconds() as f64;
                }
            }
        }
        self.cover_horizon.num_seconds() as f64
    }
}

/// 计算分区内每行的 onhand（输入已按 flowdate, quantity desc, id 排序）
pub fn running_balances(rows: &[&MaterialFlowRecord]) -> Vec<f64> {
    let mut firm_sum = 0.0;
    rows.iter()
        .map(|record| {
            if record.counts_toward_onhand() {
                firm_sum += record.flow.quantity;
                firm_sum
            } else {
                firm_sum + record.flow.quantity
            }
        })
        .collect()
}
