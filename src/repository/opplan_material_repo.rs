// ==========================================
// 工单一致性维护层 - 工单物料流水仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 表: operationplanmaterial（联表 operationplan 读取工单类型/状态）
// ==========================================

use crate::domain::material::{MaterialFlowRecord, OperationPlanMaterial};
use crate::domain::types::{DetailStatus, OrderKind, OrderStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::parse_code;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const FLOW_COLUMNS: &str = r#"
    opm.id, opm.operationplan, opm.item, opm.location, opm.batch,
    opm.quantity, opm.flowdate, opm.onhand, opm.minimum, opm.periodofcover, opm.status
"#;

fn map_flow(row: &Row<'_>) -> SqliteResult<OperationPlanMaterial> {
    let status_raw: String = row.get(10)?;
    Ok(OperationPlanMaterial {
        id: row.get(0)?,
        operationplan: row.get(1)?,
        item: row.get(2)?,
        location: row.get(3)?,
        batch: row.get(4)?,
        quantity: row.get(5)?,
        flowdate: row.get(6)?,
        onhand: row.get(7)?,
        minimum: row.get(8)?,
        periodofcover: row.get(9)?,
        status: parse_code(10, &status_raw, DetailStatus::from_str)?,
    })
}

fn map_flow_record(row: &Row<'_>) -> SqliteResult<MaterialFlowRecord> {
    let kind_raw: String = row.get(11)?;
    let status_raw: String = row.get(12)?;
    Ok(MaterialFlowRecord {
        flow: map_flow(row)?,
        order_kind: parse_code(11, &kind_raw, OrderKind::from_str)?,
        order_status: parse_code(12, &status_raw, OrderStatus::from_str)?,
    })
}

// ==========================================
// OperationPlanMaterialRepository - 物料流水仓储
// ==========================================
pub struct OperationPlanMaterialRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OperationPlanMaterialRepository {
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

    /// 查询工单的全部物料流水（按 id 排序）
    pub fn find_by_order(&self, reference: &str) -> RepositoryResult<Vec<OperationPlanMaterial>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM operationplanmaterial opm WHERE opm.operationplan = ?1 ORDER BY opm.id",
            FLOW_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let flows = stmt
            .query_map(params![reference], map_flow)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(flows)
    }

    /// 查询 (物料, 库点) 下的全部流水及所属工单类型/状态
    ///
    /// # 返回
    /// 按 (flowdate, quantity desc, id) 排序：同一时刻先入库后出库
    pub fn find_by_item_location(
        &self,
        item: &str,
        location: &str,
    ) -> RepositoryResult<Vec<MaterialFlowRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}, op.type, op.status
            FROM operationplanmaterial opm
            INNER JOIN operationplan op ON op.reference = opm.operationplan
            WHERE opm.item = ?1 AND opm.location = ?2
            ORDER BY opm.flowdate ASC, opm.quantity DESC, opm.id ASC
            "#,
            FLOW_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![item, location], map_flow_record)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }

    /// 列出所有出现过流水的 (物料, 库点)
    pub fn list_item_locations(&self) -> RepositoryResult<Vec<(String, String)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT item, location FROM operationplanmaterial ORDER BY item, location",
        )?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<SqliteResult<Vec<(String, String)>>>()?;
        Ok(pairs)
    }

    /// 新增流水，返回新 id
    pub fn insert(&self, flow: &OperationPlanMaterial) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO operationplanmaterial
                (operationplan, item, location, batch, quantity, flowdate, onhand, minimum, periodofcover, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                flow.operationplan,
                flow.item,
                flow.location,
                flow.batch,
                flow.quantity,
                flow.flowdate,
                flow.onhand,
                flow.minimum,
                flow.periodofcover,
                flow.status.to_db_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 删除工单的全部流水
    pub fn delete_by_order(&self, reference: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM operationplanmaterial WHERE operationplan = ?1",
            params![reference],
        )?;
        Ok(affected)
    }

    /// 回写结存、安全库存与覆盖期
    pub fn update_balance(
        &self,
        id: i64,
        onhand: f64,
        minimum: f64,
        periodofcover: f64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE operationplanmaterial SET onhand = ?2, minimum = ?3, periodofcover = ?4 WHERE id = ?1",
            params![id, onhand, minimum, periodofcover],
        )?;
        Ok(())
    }
}
