// ==========================================
// 工单一致性维护层 - 工单数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 表: operationplan
// ==========================================

use crate::domain::order::{OperationPlan, PlanAnnotations};
use crate::domain::types::{OrderKind, OrderStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{json_error, parse_code};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const ORDER_COLUMNS: &str = r#"
    reference, type, status, name, quantity, quantity_completed,
    startdate, enddate, criticality, delay, plan,
    operation, owner, batch, item, origin, destination,
    supplier, location, demand, due
"#;

fn map_order(row: &Row<'_>) -> SqliteResult<OperationPlan> {
    let kind_raw: String = row.get(1)?;
    let status_raw: String = row.get(2)?;
    let plan_raw: String = row.get(10)?;
    let plan = PlanAnnotations::from_json(&plan_raw).map_err(|e| json_error(10, e))?;

    Ok(OperationPlan {
        reference: row.get(0)?,
        kind: parse_code(1, &kind_raw, OrderKind::from_str)?,
        status: parse_code(2, &status_raw, OrderStatus::from_str)?,
        name: row.get(3)?,
        quantity: row.get(4)?,
        quantity_completed: row.get(5)?,
        startdate: row.get(6)?,
        enddate: row.get(7)?,
        criticality: row.get(8)?,
        delay_secs: row.get(9)?,
        plan,
        operation: row.get(11)?,
        owner: row.get(12)?,
        batch: row.get(13)?,
        item: row.get(14)?,
        origin: row.get(15)?,
        destination: row.get(16)?,
        supplier: row.get(17)?,
        location: row.get(18)?,
        demand: row.get(19)?,
        due: row.get(20)?,
    })
}

// ==========================================
// OperationPlanRepository - 工单仓储
// ==========================================
pub struct OperationPlanRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OperationPlanRepository {
    /// 创建新的工单仓储实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按编号查询工单
    pub fn find_by_reference(&self, reference: &str) -> RepositoryResult<Option<OperationPlan>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM operationplan WHERE reference = ?1", ORDER_COLUMNS);
        let order = conn
            .query_row(&sql, params![reference], map_order)
            .optional()?;
        Ok(order)
    }

    /// 按编号查询工单，不存在时报错
    pub fn get(&self, reference: &str) -> RepositoryResult<OperationPlan> {
        self.find_by_reference(reference)?
            .ok_or_else(|| RepositoryError::not_found("operationplan", reference))
    }

    /// 查询子工单（按开始时间、编号排序）
    pub fn find_children(&self, owner: &str) -> RepositoryResult<Vec<OperationPlan>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM operationplan WHERE owner = ?1 ORDER BY startdate, reference",
            ORDER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let orders = stmt
            .query_map(params![owner], map_order)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(orders)
    }

    /// 查询某工序下的工单
    ///
    /// owner 为 Some 时只返回同一父工单下的工单；为 None 时只返回顶层工单
    pub fn find_by_operation(
        &self,
        operation: &str,
        owner: Option<&str>,
    ) -> RepositoryResult<Vec<OperationPlan>> {
        let conn = self.get_conn()?;
        let orders = match owner {
            Some(owner) => {
                let sql = format!(
                    "SELECT {} FROM operationplan WHERE operation = ?1 AND owner = ?2 ORDER BY startdate, reference",
                    ORDER_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![operation, owner], map_order)?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM operationplan WHERE operation = ?1 AND owner IS NULL ORDER BY startdate, reference",
                    ORDER_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![operation], map_order)?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
        };
        Ok(orders)
    }

    /// 查询全部工单编号
    pub fn list_references(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT reference FROM operationplan ORDER BY reference")?;
        let refs = stmt
            .query_map([], |row| row.get(0))?
            .collect::<SqliteResult<Vec<String>>>()?;
        Ok(refs)
    }

    /// 新增工单
    pub fn insert(&self, order: &OperationPlan) -> RepositoryResult<()> {
        let plan_json = order.plan.to_json()?;
        let conn = self.get_conn()?;
        let sql = format!(
            "INSERT INTO operationplan ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            ORDER_COLUMNS
        );
        conn.execute(
            &sql,
            params![
                order.reference,
                order.kind.to_db_str(),
                order.status.to_db_str(),
                order.name,
                order.quantity,
                order.quantity_completed,
                order.startdate,
                order.enddate,
                order.criticality,
                order.delay_secs,
                plan_json,
                order.operation,
                order.owner,
                order.batch,
                order.item,
                order.origin,
                order.destination,
                order.supplier,
                order.location,
                order.demand,
                order.due,
            ],
        )?;
        Ok(())
    }

    /// 保存工单全部字段
    ///
    /// 说明: 使用 UPDATE 而非 REPLACE，避免触发明细表的级联删除
    pub fn save(&self, order: &OperationPlan) -> RepositoryResult<()> {
        let plan_json = order.plan.to_json()?;
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE operationplan SET
                type = ?2, status = ?3, name = ?4, quantity = ?5, quantity_completed = ?6,
                startdate = ?7, enddate = ?8, criticality = ?9, delay = ?10, plan = ?11,
                operation = ?12, owner = ?13, batch = ?14, item = ?15, origin = ?16,
                destination = ?17, supplier = ?18, location = ?19, demand = ?20, due = ?21
            WHERE reference = ?1
            "#,
            params![
                order.reference,
                order.kind.to_db_str(),
                order.status.to_db_str(),
                order.name,
                order.quantity,
                order.quantity_completed,
                order.startdate,
                order.enddate,
                order.criticality,
                order.delay_secs,
                plan_json,
                order.operation,
                order.owner,
                order.batch,
                order.item,
                order.origin,
                order.destination,
                order.supplier,
                order.location,
                order.demand,
                order.due,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("operationplan", &order.reference));
        }
        Ok(())
    }

    /// 删除工单（物料/资源明细与子工单由外键级联删除）
    pub fn delete(&self, reference: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM operationplan WHERE reference = ?1",
            params![reference],
        )?;
        Ok(affected)
    }
}
