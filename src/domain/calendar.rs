// ==========================================
// 工单一致性维护层 - 日历领域模型
// ==========================================
// 职责: 日历/日历桶实体与生效判定
// 规则: 多个桶同时生效时 priority 小者优先，同优先级取 id 大者（最新）
// ==========================================

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// 可表示时间下界
pub fn horizon_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1971, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// 可表示时间上界
pub fn horizon_end() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 12, 31)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MAX)
}

/// 将时间钳制到可表示区间
pub fn clamp_to_horizon(t: NaiveDateTime) -> NaiveDateTime {
    t.max(horizon_start()).min(horizon_end())
}

// ==========================================
// CalendarBucket - 日历桶
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarBucket {
    pub id: i64,
    pub calendar: String,
    pub startdate: NaiveDateTime,
    pub enddate: NaiveDateTime,
    pub value: f64,
    pub priority: i32,
    /// 周一..周日
    pub weekdays: [bool; 7],
    pub starttime: NaiveTime,
    pub endtime: NaiveTime,
}

impl CalendarBucket {
    /// 全周全天生效的桶
    pub fn all_day(
        id: i64,
        calendar: &str,
        startdate: NaiveDateTime,
        enddate: NaiveDateTime,
        value: f64,
        priority: i32,
    ) -> Self {
        Self {
            id,
            calendar: calendar.to_string(),
            startdate,
            enddate,
            value,
            priority,
            weekdays: [true; 7],
            starttime: NaiveTime::MIN,
            endtime: end_of_day_marker(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.value != 0.0
    }

    fn weekday_enabled(&self, day: Weekday) -> bool {
        self.weekdays[day.num_days_from_monday() as usize]
    }

    /// 桶当天的开始时刻
    fn day_open(&self, day: NaiveDate) -> NaiveDateTime {
        day.and_time(self.starttime)
    }

    /// 桶当天的结束时刻；23:59:59 视作次日零点
    fn day_close(&self, day: NaiveDate) -> NaiveDateTime {
        if self.endtime >= end_of_day_marker() {
            day.and_time(NaiveTime::MIN) + Duration::days(1)
        } else {
            day.and_time(self.endtime)
        }
    }

    /// 跨零点的班次（结束时刻早于开始时刻）
    pub fn is_overnight(&self) -> bool {
        self.endtime < self.starttime
    }

    /// 桶在时刻 t 是否生效
    ///
    /// 跨零点班次的次日部分归属开班当天的星期
    pub fn covers(&self, t: NaiveDateTime) -> bool {
        if t < self.startdate || t >= self.enddate {
            return false;
        }
        let day = t.date();
        if !self.is_overnight() {
            return self.weekday_enabled(day.weekday())
                && t >= self.day_open(day)
                && t < self.day_close(day);
        }

        if t >= self.day_open(day) {
            return self.weekday_enabled(day.weekday());
        }
        t < self.day_close(day) && self.weekday_enabled(day.weekday().pred())
    }
}

fn end_of_day_marker() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

// ==========================================
// Calendar - 日历
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub name: String,
    pub default_value: f64,
    pub buckets: Vec<CalendarBucket>,
}

impl Calendar {
    pub fn new(name: &str, default_value: f64) -> Self {
        Self {
            name: name.to_string(),
            default_value,
            buckets: Vec::new(),
        }
    }

    /// 时刻 t 生效的桶
    pub fn effective_bucket(&self, t: NaiveDateTime) -> Option<&CalendarBucket> {
        self.buckets
            .iter()
            .filter(|b| b.covers(t))
            .min_by(|a, b| a.priority.cmp(&b.priority).then(b.id.cmp(&a.id)))
    }

    /// 时刻 t 的取值（无生效桶时取默认值）
    pub fn value_at(&self, t: NaiveDateTime) -> f64 {
        self.effective_bucket(t)
            .map(|b| b.value)
            .unwrap_or(self.default_value)
    }

    /// 时刻 t 是否可用
    pub fn is_available_at(&self, t: NaiveDateTime) -> bool {
        self.value_at(t) != 0.0
    }

    /// (from, to) 内所有可能改变取值的时刻，升序去重
    pub fn change_points(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<NaiveDateTime> {
        let mut points = Vec::new();
        if to <= from {
            return points;
        }

        let mut day = from.date();
        let last_day = to.date();
        while day <= last_day {
            points.push(day.and_time(NaiveTime::MIN));
            for bucket in &self.buckets {
                let day_start = day.and_time(NaiveTime::MIN);
                if bucket.enddate <= day_start || bucket.startdate >= day_start + Duration::days(1) {
                    continue;
                }
                points.push(bucket.day_open(day));
                points.push(bucket.day_close(day));
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        for bucket in &self.buckets {
            points.push(bucket.startdate);
            points.push(bucket.enddate);
        }

        points.retain(|p| *p > from && *p < to);
        points.sort();
        points.dedup();
        points
    }
}
