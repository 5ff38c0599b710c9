// ==========================================
// 工单一致性维护层 - 主数据仓储
// ==========================================
// 表: location, item, demand, buffer, itemlocation
// 只读: 主数据由外部维护，本层只查询
// ==========================================

use crate::domain::material::{Buffer, Demand, Item, Location};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// MasterDataRepository - 主数据仓储
// ==========================================
pub struct MasterDataRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MasterDataRepository {
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

    pub fn find_location(&self, name: &str) -> RepositoryResult<Option<Location>> {
        let conn = self.get_conn()?;
        let location = conn
            .query_row(
                "SELECT name, available FROM location WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Location {
                        name: row.get(0)?,
                        available: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(location)
    }

    pub fn find_item(&self, name: &str) -> RepositoryResult<Option<Item>> {
        let conn = self.get_conn()?;
        let item = conn
            .query_row(
                "SELECT name, type FROM item WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Item {
                        name: row.get(0)?,
                        item_type: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(item)
    }

    pub fn find_demand(&self, name: &str) -> RepositoryResult<Option<Demand>> {
        let conn = self.get_conn()?;
        let demand = conn
            .query_row(
                "SELECT name, item, location, quantity, due FROM demand WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Demand {
                        name: row.get(0)?,
                        item: row.get(1)?,
                        location: row.get(2)?,
                        quantity: row.get(3)?,
                        due: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(demand)
    }

    /// 查询缓冲区
    ///
    /// 批次精确匹配优先，其次取不区分批次的缓冲区
    pub fn find_buffer(
        &self,
        item: &str,
        location: &str,
        batch: Option<&str>,
    ) -> RepositoryResult<Option<Buffer>> {
        let conn = self.get_conn()?;
        let buffer = conn
            .query_row(
                r#"
                SELECT id, item, location, batch, minimum, minimum_calendar
                FROM buffer
                WHERE item = ?1 AND location = ?2
                  AND (batch IS NULL OR batch = ?3)
                ORDER BY CASE WHEN batch IS NULL THEN 1 ELSE 0 END, id DESC
                LIMIT 1
                "#,
                params![item, location, batch],
                |row| {
                    Ok(Buffer {
                        id: row.get(0)?,
                        item: row.get(1)?,
                        location: row.get(2)?,
                        batch: row.get(3)?,
                        minimum: row.get(4)?,
                        minimum_calendar: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(buffer)
    }

    /// 查询物料-库点的安全库存日历名
    pub fn find_safety_stock_calendar(
        &self,
        item: &str,
        location: &str,
    ) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let calendar: Option<Option<String>> = conn
            .query_row(
                "SELECT safetystock_calendar FROM itemlocation WHERE item = ?1 AND location = ?2",
                params![item, location],
                |row| row.get(0),
            )
            .optional()?;
        Ok(calendar.flatten())
    }
}
