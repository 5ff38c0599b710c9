// ==========================================
// 工单一致性维护层 - 工作时间计算器
// ==========================================
// 职责: 按日历可用性把"工作时长"换算为起止时间
// 规则:
// - 时长为 0 时原样返回参考时间
// - 无日历时为纯偏移
// - 有日历时按窗口（max(2×时长, 1 天)）逐段推进，不可用段记为中断
// - 结果钳制到 [1971-01-01, 2030-12-31]
// ==========================================

use crate::config::CalendarPolicy;
use crate::domain::calendar::{clamp_to_horizon, horizon_end, horizon_start, Calendar};
use crate::domain::order::Interruption;
use chrono::{Duration, NaiveDateTime};

// ==========================================
// WorkingTimeEvaluator - 工作时间计算器
// ==========================================
#[derive(Debug, Clone)]
pub struct WorkingTimeEvaluator {
    calendars: Vec<Calendar>,
}

impl WorkingTimeEvaluator {
    /// 按合并策略构造
    ///
    /// # 参数
    /// - calendars: 按优先顺序收集的候选日历（已去重）
    /// - policy: FirstOnly 只保留第一个；Intersection 保留全部
    pub fn new(mut calendars: Vec<Calendar>, policy: CalendarPolicy) -> Self {
        if policy == CalendarPolicy::FirstOnly {
            calendars.truncate(1);
        }
        Self { calendars }
    }

    /// 不受日历约束的计算器
    pub fn unconstrained() -> Self {
        Self {
            calendars: Vec::new(),
        }
    }

    pub fn has_calendars(&self) -> bool {
        !self.calendars.is_empty()
    }

    /// 时刻 t 是否所有日历均可用
    pub fn is_available_at(&self, t: NaiveDateTime) -> bool {
        self.calendars.iter().all(|c| c.is_available_at(t))
    }

    /// (from, to) 内的所有可用性变化点
    fn change_points(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<NaiveDateTime> {
        let mut points: Vec<NaiveDateTime> = self
            .calendars
            .iter()
            .flat_map(|c| c.change_points(from, to))
            .collect();
        points.sort();
        points.dedup();
        points
    }

    /// 计算工序结束（正向）或开始（反向）时间
    ///
    /// # 参数
    /// - refdate: 参考时间（正向为开始，反向为结束）
    /// - duration: 需要的工作时长
    /// - forward: 计算方向
    /// - interruptions: 若提供，追加途经的不可用区间（升序、相邻合并）
    pub fn calculate_operation_time(
        &self,
        refdate: NaiveDateTime,
        duration: Duration,
        forward: bool,
        interruptions: Option<&mut Vec<Interruption>>,
    ) -> NaiveDateTime {
        if duration <= Duration::zero() {
            return refdate;
        }

        if !self.has_calendars() {
            let shifted = if forward {
                refdate.checked_add_signed(duration).unwrap_or(horizon_end())
            } else {
                refdate.checked_sub_signed(duration).unwrap_or(horizon_start())
            };
            return clamp_to_horizon(shifted);
        }

        let mut found = Vec::new();
        let result = if forward {
            self.walk_forward(refdate, duration, &mut found)
        } else {
            self.walk_backward(refdate, duration, &mut found)
        };

        if let Some(out) = interruptions {
            out.extend(found);
            out.sort_by_key(|i| i.start);
        }
        result
    }

    fn window_for(duration: Duration) -> Duration {
        (duration * 2).max(Duration::days(1))
    }

    fn walk_forward(
        &self,
        refdate: NaiveDateTime,
        duration: Duration,
        found: &mut Vec<Interruption>,
    ) -> NaiveDateTime {
        let window = Self::window_for(duration);
        let limit = horizon_end();
        let mut remaining = duration;
        let mut cursor = clamp_to_horizon(refdate);

        while cursor < limit {
            let win_end = cursor.checked_add_signed(window).unwrap_or(limit).min(limit);
            let mut bounds = vec![cursor];
            bounds.extend(self.change_points(cursor, win_end));
            bounds.push(win_end);

            for seg in bounds.windows(2) {
                let (a, b) = (seg[0], seg[1]);
                if self.is_available_at(a) {
                    let len = b - a;
                    if remaining <= len {
                        return a + remaining;
                    }
                    remaining = remaining - len;
                } else {
                    match found.last_mut() {
                        Some(last) if last.end == a => last.end = b,
                        _ => found.push(Interruption::new(a, b)),
                    }
                }
            }
            cursor = win_end;
        }
        limit
    }

    fn walk_backward(
        &self,
        refdate: NaiveDateTime,
        duration: Duration,
        found: &mut Vec<Interruption>,
    ) -> NaiveDateTime {
        let window = Self::window_for(duration);
        let limit = horizon_start();
        let mut remaining = duration;
        let mut cursor = clamp_to_horizon(refdate);

        while cursor > limit {
            let win_start = cursor.checked_sub_signed(window).unwrap_or(limit).max(limit);
            let mut bounds = vec![win_start];
            bounds.extend(self.change_points(win_start, cursor));
            bounds.push(cursor);

            for seg in bounds.windows(2).rev() {
                let (a, b) = (seg[0], seg[1]);
                if self.is_available_at(a) {
                    let len = b - a;
                    if remaining <= len {
                        return b - remaining;
                    }
                    remaining = remaining - len;
                } else {
                    match found.last_mut() {
                        Some(last) if last.start == b => last.start = a,
                        _ => found.push(Interruption::new(a, b)),
                    }
                }
            }
            cursor = win_start;
        }
        limit
    }

    /// [from, to) 内的可用时长
    pub fn available_time(&self, from: NaiveDateTime, to: NaiveDateTime) -> Duration {
        if to <= from {
            return Duration::zero();
        }
        if !self.has_calendars() {
            return to - from;
        }

        let mut bounds = vec![from];
        bounds.extend(self.change_points(from, to));
        bounds.push(to);
        bounds
            .windows(2)
            .filter(|seg| self.is_available_at(seg[0]))
            .fold(Duration::zero(), |acc, seg| acc + (seg[1] - seg[0]))
    }
}
