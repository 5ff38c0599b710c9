// ==========================================
// 工单一致性维护层 - 工单资源占用仓储
// ==========================================
// 表: operationplanresource（联表 operationplan 读取起止时间与计划注记）
// 约束: (resource, operationplan) 唯一，由数据库保证
// ==========================================

use crate::domain::material::{OperationPlanResource, ResourceLoadRecord};
use crate::domain::order::PlanAnnotations;
use crate::domain::types::DetailStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{json_error, parse_code};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

fn map_load(row: &Row<'_>) -> SqliteResult<OperationPlanResource> {
    let status_raw: String = row.get(5)?;
    Ok(OperationPlanResource {
        id: row.get(0)?,
        operationplan: row.get(1)?,
        resource: row.get(2)?,
        quantity: row.get(3)?,
        setup: row.get(4)?,
        status: parse_code(5, &status_raw, DetailStatus::from_str)?,
    })
}

// ==========================================
// OperationPlanResourceRepository - 资源占用仓储
// ==========================================
pub struct OperationPlanResourceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OperationPlanResourceRepository {
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

    /// 查询工单的全部资源占用（按资源名排序）
    pub fn find_by_order(&self, reference: &str) -> RepositoryResult<Vec<OperationPlanResource>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, operationplan, resource, quantity, setup, status
            FROM operationplanresource
            WHERE operationplan = ?1
            ORDER BY resource
            "#,
        )?;
        let loads = stmt
            .query_map(params![reference], map_load)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(loads)
    }

    /// 查询资源上的全部占用（含工单时间与中断）
    pub fn find_loads_by_resource(&self, resource: &str) -> RepositoryResult<Vec<ResourceLoadRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT opr.operationplan, opr.quantity, op.startdate, op.enddate, op.plan
            FROM operationplanresource opr
            INNER JOIN operationplan op ON op.reference = opr.operationplan
            WHERE opr.resource = ?1
            ORDER BY op.startdate, opr.operationplan
            "#,
        )?;
        let records = stmt
            .query_map(params![resource], |row| {
                let plan_raw: String = row.get(4)?;
                Ok(ResourceLoadRecord {
                    operationplan: row.get(0)?,
                    quantity: row.get(1)?,
                    startdate: row.get(2)?,
                    enddate: row.get(3)?,
                    plan: PlanAnnotations::from_json(&plan_raw).map_err(|e| json_error(4, e))?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }

    /// 列出所有被占用过的资源
    pub fn list_loaded_resources(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT resource FROM operationplanresource ORDER BY resource")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<SqliteResult<Vec<String>>>()?;
        Ok(names)
    }

    /// 新增占用，返回新 id
    pub fn insert(&self, load: &OperationPlanResource) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO operationplanresource (operationplan, resource, quantity, setup, status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                load.operationplan,
                load.resource,
                load.quantity,
                load.setup,
                load.status.to_db_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 删除工单的全部占用
    pub fn delete_by_order(&self, reference: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM operationplanresource WHERE operationplan = ?1",
            params![reference],
        )?;
        Ok(affected)
    }
}
