// ==========================================
// 工单一致性维护层 - 日历仓储
// ==========================================
// 表: calendar, calendarbucket
// 时刻列: starttime/endtime 以 %H:%M:%S 文本存储
// ==========================================

use crate::domain::calendar::{Calendar, CalendarBucket};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

fn parse_time(idx: usize, raw: &str) -> SqliteResult<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ==========================================
// CalendarRepository - 日历仓储
// ==========================================
pub struct CalendarRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CalendarRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按名称加载日历及其全部桶
    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Calendar>> {
        let conn = self.get_conn()?;
        let default_value: Option<f64> = conn
            .query_row(
                "SELECT defaultvalue FROM calendar WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        let Some(default_value) = default_value else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT id, calendar, startdate, enddate, value, priority,
                   monday, tuesday, wednesday, thursday, friday, saturday, sunday,
                   starttime, endtime
            FROM calendarbucket
            WHERE calendar = ?1
            ORDER BY priority, id
            "#,
        )?;
        let buckets = stmt
            .query_map(params![name], |row| {
                let mut weekdays = [true; 7];
                for (offset, flag) in weekdays.iter_mut().enumerate() {
                    let v: i64 = row.get(6 + offset)?;
                    *flag = v != 0;
                }
                let starttime: String = row.get(13)?;
                let endtime: String = row.get(14)?;
                Ok(CalendarBucket {
                    id: row.get(0)?,
                    calendar: row.get(1)?,
                    startdate: row.get(2)?,
                    enddate: row.get(3)?,
                    value: row.get(4)?,
                    priority: row.get(5)?,
                    weekdays,
                    starttime: parse_time(13, &starttime)?,
                    endtime: parse_time(14, &endtime)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(Some(Calendar {
            name: name.to_string(),
            default_value,
            buckets,
        }))
    }
}
