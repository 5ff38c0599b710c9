// ==========================================
// 工单一致性维护层 - 工序主数据仓储
// ==========================================
// 表: operation, operationmaterial, operationresource, operation_dependency
// 工艺路线: 子工序通过 operation.owner 挂在路线上，按 priority 排序
// ==========================================

use crate::domain::operation::{
    Operation, OperationDependency, OperationMaterial, OperationResource,
};
use crate::domain::types::{FlowType, OperationType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::parse_code;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const OPERATION_COLUMNS: &str = r#"
    name, type, item, location, owner, priority, duration, duration_per,
    sizeminimum, sizemultiple, sizemaximum, available
"#;

fn map_operation(row: &Row<'_>) -> SqliteResult<Operation> {
    let type_raw: Option<String> = row.get(1)?;
    Ok(Operation {
        name: row.get(0)?,
        op_type: parse_code(1, type_raw.as_deref().unwrap_or(""), OperationType::from_str)?,
        item: row.get(2)?,
        location: row.get(3)?,
        owner: row.get(4)?,
        priority: row.get(5)?,
        duration_secs: row.get(6)?,
        duration_per_secs: row.get(7)?,
        sizeminimum: row.get(8)?,
        sizemultiple: row.get(9)?,
        sizemaximum: row.get(10)?,
        available: row.get(11)?,
    })
}

fn map_dependency(row: &Row<'_>) -> SqliteResult<OperationDependency> {
    Ok(OperationDependency {
        id: row.get(0)?,
        operation: row.get(1)?,
        blockedby: row.get(2)?,
        quantity: row.get(3)?,
        safety_leadtime_secs: row.get(4)?,
        hard_safety_leadtime_secs: row.get(5)?,
    })
}

// ==========================================
// OperationRepository - 工序仓储
// ==========================================
pub struct OperationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OperationRepository {
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

    /// 按名称查询工序
    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Operation>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM operation WHERE name = ?1", OPERATION_COLUMNS);
        let op = conn.query_row(&sql, params![name], map_operation).optional()?;
        Ok(op)
    }

    /// 查询工艺路线的子工序（按 priority、名称排序）
    pub fn find_steps(&self, owner: &str) -> RepositoryResult<Vec<Operation>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM operation WHERE owner = ?1 ORDER BY priority, name",
            OPERATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let steps = stmt
            .query_map(params![owner], map_operation)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(steps)
    }

    /// 查询工序的物料清单
    pub fn find_materials(&self, operation: &str) -> RepositoryResult<Vec<OperationMaterial>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, operation, item, quantity, quantity_fixed, type
            FROM operationmaterial
            WHERE operation = ?1
            ORDER BY id
            "#,
        )?;
        let materials = stmt
            .query_map(params![operation], |row| {
                let quantity: f64 = row.get(3)?;
                let type_raw: Option<String> = row.get(5)?;
                Ok(OperationMaterial {
                    id: row.get(0)?,
                    operation: row.get(1)?,
                    item: row.get(2)?,
                    quantity,
                    quantity_fixed: row.get(4)?,
                    flow_type: FlowType::from_str(type_raw.as_deref().unwrap_or(""), quantity),
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(materials)
    }

    /// 查询工序的资源需求
    pub fn find_resources(&self, operation: &str) -> RepositoryResult<Vec<OperationResource>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, operation, resource, quantity, skill, setup
            FROM operationresource
            WHERE operation = ?1
            ORDER BY id
            "#,
        )?;
        let resources = stmt
            .query_map(params![operation], |row| {
                Ok(OperationResource {
                    id: row.get(0)?,
                    operation: row.get(1)?,
                    resource: row.get(2)?,
                    quantity: row.get(3)?,
                    skill: row.get(4)?,
                    setup: row.get(5)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(resources)
    }

    /// 查询被该工序阻塞的后继依赖（blockedby = operation）
    pub fn find_successors(&self, operation: &str) -> RepositoryResult<Vec<OperationDependency>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, operation, blockedby, quantity, safety_leadtime, hard_safety_leadtime
            FROM operation_dependency
            WHERE blockedby = ?1
            ORDER BY id
            "#,
        )?;
        let deps = stmt
            .query_map(params![operation], map_dependency)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(deps)
    }

    /// 查询该工序依赖的前驱（operation = operation）
    pub fn find_predecessors(&self, operation: &str) -> RepositoryResult<Vec<OperationDependency>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, operation, blockedby, quantity, safety_leadtime, hard_safety_leadtime
            FROM operation_dependency
            WHERE operation = ?1
            ORDER BY id
            "#,
        )?;
        let deps = stmt
            .query_map(params![operation], map_dependency)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(deps)
    }

    /// 工艺路线的子工序之间是否定义了显式依赖
    pub fn has_dependencies_among_steps(&self, routing: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM operation_dependency d
            INNER JOIN operation a ON a.name = d.operation
            INNER JOIN operation b ON b.name = d.blockedby
            WHERE a.owner = ?1 AND b.owner = ?1
            "#,
            params![routing],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
