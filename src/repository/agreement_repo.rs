// ==========================================
// 工单一致性维护层 - 补货协议仓储
// ==========================================
// 表: itemsupplier（采购协议）, itemdistribution（调拨协议）
// 选择规则: ReplenishmentAgreement::pick_best
// ==========================================

use crate::domain::agreement::{ReplenishmentAgreement, SizingRule};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

fn map_agreement(row: &Row<'_>) -> SqliteResult<ReplenishmentAgreement> {
    Ok(ReplenishmentAgreement {
        id: row.get(0)?,
        item: row.get(1)?,
        location: row.get(2)?,
        partner: row.get(3)?,
        leadtime_secs: row.get(4)?,
        sizing: SizingRule::new(row.get(5)?, row.get(6)?, row.get(7)?),
        priority: row.get(8)?,
        effective_start: row.get(9)?,
        effective_end: row.get(10)?,
        resource: row.get(11)?,
        resource_qty: row.get(12)?,
    })
}

// ==========================================
// AgreementRepository - 补货协议仓储
// ==========================================
pub struct AgreementRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AgreementRepository {
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

    /// 查询 now 时刻生效的最佳采购协议
    ///
    /// # 参数
    /// - supplier/item/location: 采购单外键；location 为空的协议适用于所有库点
    pub fn find_item_supplier(
        &self,
        supplier: &str,
        item: &str,
        location: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<Option<ReplenishmentAgreement>> {
        let candidates = {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, item, location, supplier, leadtime, sizeminimum, sizemultiple, sizemaximum,
                       priority, effective_start, effective_end, resource, resource_qty
                FROM itemsupplier
                WHERE supplier = ?1 AND item = ?2 AND (location IS NULL OR location = ?3)
                "#,
            )?;
            let rows = stmt
                .query_map(params![supplier, item, location], map_agreement)?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };
        Ok(ReplenishmentAgreement::pick_best(candidates, now))
    }

    /// 查询 now 时刻生效的最佳调拨协议
    ///
    /// # 参数
    /// - origin: 发出库点；location: 接收库点（协议 location 为空时适用于所有库点）
    pub fn find_item_distribution(
        &self,
        origin: &str,
        item: &str,
        location: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<Option<ReplenishmentAgreement>> {
        let candidates = {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, item, location, origin, leadtime, sizeminimum, sizemultiple, sizemaximum,
                       priority, effective_start, effective_end, resource, resource_qty
                FROM itemdistribution
                WHERE origin = ?1 AND item = ?2 AND (location IS NULL OR location = ?3)
                "#,
            )?;
            let rows = stmt
                .query_map(params![origin, item, location], map_agreement)?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };
        Ok(ReplenishmentAgreement::pick_best(candidates, now))
    }
}
