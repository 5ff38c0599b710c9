// ==========================================
// 工单一致性维护层 - 资源计划仓储
// ==========================================
// 表: out_resourceplan（主键 resource + startdate，按日分桶）
// ==========================================

use crate::domain::resource::ResourcePlanRow;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

fn map_plan_row(row: &Row<'_>) -> SqliteResult<ResourcePlanRow> {
    Ok(ResourcePlanRow {
        resource: row.get(0)?,
        startdate: row.get(1)?,
        available: row.get(2)?,
        unavailable: row.get(3)?,
        setup: row.get(4)?,
        load: row.get(5)?,
        free: row.get(6)?,
    })
}

// ==========================================
// ResourcePlanRepository - 资源计划仓储
// ==========================================
pub struct ResourcePlanRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ResourcePlanRepository {
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

    /// 查询资源某日的计划行
    pub fn find(&self, resource: &str, day: NaiveDate) -> RepositoryResult<Option<ResourcePlanRow>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT resource, startdate, available, unavailable, setup, load, free
                FROM out_resourceplan
                WHERE resource = ?1 AND startdate = ?2
                "#,
                params![resource, day],
                map_plan_row,
            )
            .optional()?;
        Ok(row)
    }

    /// 查询资源全部计划行（按日期排序）
    pub fn find_by_resource(&self, resource: &str) -> RepositoryResult<Vec<ResourcePlanRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT resource, startdate, available, unavailable, setup, load, free
            FROM out_resourceplan
            WHERE resource = ?1
            ORDER BY startdate
            "#,
        )?;
        let rows = stmt
            .query_map(params![resource], map_plan_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 写入或覆盖计划行
    pub fn upsert(&self, row: &ResourcePlanRow) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO out_resourceplan (resource, startdate, available, unavailable, setup, load, free)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(resource, startdate) DO UPDATE SET
                available = excluded.available,
                unavailable = excluded.unavailable,
                setup = excluded.setup,
                load = excluded.load,
                free = excluded.free
            "#,
            params![
                row.resource,
                row.startdate,
                row.available,
                row.unavailable,
                row.setup,
                row.load,
                row.free,
            ],
        )?;
        Ok(())
    }
}
