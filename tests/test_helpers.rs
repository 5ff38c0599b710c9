// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、引擎装配与主数据种子
// ==========================================

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use opplan_sync::config::ConfigManager;
use opplan_sync::domain::material::{OperationPlanMaterial, OperationPlanResource};
use opplan_sync::domain::order::OperationPlan;
use opplan_sync::domain::resource::ResourcePlanRow;
use opplan_sync::db::{init_schema, open_shared_connection, open_sqlite_connection, SharedConnection};
use opplan_sync::engine::{OperationPlanEngine, OperationPlanRepositories, PropagationContext};
use rusqlite::{params, Connection};
use std::error::Error;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试数据库连接（开启外键）
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    Ok(open_sqlite_connection(db_path)?)
}

/// 测试环境：临时库 + 共享连接 + 引擎
pub struct TestEnv {
    pub _temp_file: NamedTempFile,
    pub db_path: String,
    pub conn: SharedConnection,
    pub engine: OperationPlanEngine,
}

impl TestEnv {
    /// 在共享连接上执行种子 SQL
    pub fn seed<F>(&self, f: F)
    where
        F: FnOnce(&Connection) -> rusqlite::Result<()>,
    {
        let conn = self.conn.lock().unwrap();
        f(&conn).unwrap();
    }

    /// 按当前配置重新装配引擎（修改 config_kv 后调用）
    pub fn reload_engine(&mut self) {
        let config = ConfigManager::from_connection(self.conn.clone())
            .load_sync_config()
            .unwrap();
        let repos = OperationPlanRepositories::from_connection(self.conn.clone());
        self.engine = OperationPlanEngine::new(repos, config);
    }

    pub fn ctx(&self) -> PropagationContext {
        self.engine.context(now())
    }

    pub fn ctx_at(&self, at: NaiveDateTime) -> PropagationContext {
        self.engine.context(at)
    }

    /// 直接读取单个数值
    pub fn query_f64(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Option<f64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(sql, args, |row| row.get::<_, Option<f64>>(0))
            .unwrap_or(None)
    }

    pub fn count(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> i64 {
        let conn = self.conn.lock().unwrap();
        conn.query_row(sql, args, |row| row.get(0)).unwrap()
    }

    pub fn order(&self, reference: &str) -> OperationPlan {
        self.engine.repositories().order_repo.get(reference).unwrap()
    }

    pub fn flows(&self, reference: &str) -> Vec<OperationPlanMaterial> {
        self.engine
            .repositories()
            .material_repo
            .find_by_order(reference)
            .unwrap()
    }

    pub fn loads(&self, reference: &str) -> Vec<OperationPlanResource> {
        self.engine
            .repositories()
            .load_repo
            .find_by_order(reference)
            .unwrap()
    }

    /// 资源某日的计划行
    pub fn plan_row(&self, resource: &str, day: u32) -> Option<ResourcePlanRow> {
        self.engine
            .repositories()
            .resource_plan_repo
            .find(resource, date(day))
            .unwrap()
    }

    /// 某物料库点在 flowdate 上的 (数量, onhand) 列表，按结存顺序
    pub fn balances(&self, item: &str, location: &str) -> Vec<(f64, f64)> {
        self.engine
            .repositories()
            .material_repo
            .find_by_item_location(item, location)
            .unwrap()
            .into_iter()
            .map(|r| (r.flow.quantity, r.flow.onhand.unwrap_or(f64::NAN)))
            .collect()
    }
}

/// 创建测试环境（默认配置）
pub fn setup() -> TestEnv {
    opplan_sync::logging::init_test();
    let (temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_shared_connection(&db_path).expect("Failed to open db");
    let config = ConfigManager::from_connection(conn.clone())
        .load_sync_config()
        .expect("Failed to load config");
    let repos = OperationPlanRepositories::from_connection(conn.clone());
    TestEnv {
        _temp_file: temp_file,
        db_path,
        conn,
        engine: OperationPlanEngine::new(repos, config),
    }
}

/// 2024-01-{day} {hour}:00:00（2024-01-01 为周一）
pub fn dt(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

/// 测试中的当前时间
pub fn now() -> NaiveDateTime {
    dt(20, 0)
}

// ==========================================
// 主数据种子
// ==========================================

pub fn insert_calendar(conn: &Connection, name: &str, default_value: f64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO calendar (name, defaultvalue) VALUES (?1, ?2)",
        params![name, default_value],
    )?;
    Ok(())
}

/// 每天 starttime-endtime 取 value 的日历桶
pub fn insert_shift_bucket(
    conn: &Connection,
    calendar: &str,
    starttime: &str,
    endtime: &str,
    value: f64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO calendarbucket (calendar, value, priority, starttime, endtime) VALUES (?1, ?2, 0, ?3, ?4)",
        params![calendar, value, starttime, endtime],
    )?;
    Ok(())
}

pub fn insert_location(conn: &Connection, name: &str, calendar: Option<&str>) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO location (name, available) VALUES (?1, ?2)",
        params![name, calendar],
    )?;
    Ok(())
}

pub fn insert_item(conn: &Connection, name: &str, item_type: Option<&str>) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO item (name, type) VALUES (?1, ?2)",
        params![name, item_type],
    )?;
    Ok(())
}

pub fn insert_supplier(conn: &Connection, name: &str) -> rusqlite::Result<()> {
    conn.execute("INSERT INTO supplier (name) VALUES (?1)", params![name])?;
    Ok(())
}

pub fn insert_resource(
    conn: &Connection,
    name: &str,
    resource_type: &str,
    maximum: f64,
    owner: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO resource (name, type, maximum, owner) VALUES (?1, ?2, ?3, ?4)",
        params![name, resource_type, maximum, owner],
    )?;
    Ok(())
}

pub fn set_resource_calendar(conn: &Connection, name: &str, calendar: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE resource SET available = ?2 WHERE name = ?1",
        params![name, calendar],
    )?;
    Ok(())
}

pub fn insert_resource_skill(
    conn: &Connection,
    resource: &str,
    skill: &str,
    priority: i32,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO resourceskill (resource, skill, priority) VALUES (?1, ?2, ?3)",
        params![resource, skill, priority],
    )?;
    Ok(())
}

/// 工序（duration 以秒计）
pub fn insert_operation(
    conn: &Connection,
    name: &str,
    op_type: &str,
    item: Option<&str>,
    location: Option<&str>,
    duration_secs: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO operation (name, type, item, location, duration) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, op_type, item, location, duration_secs],
    )?;
    Ok(())
}

/// 工艺路线子工序
pub fn insert_step(
    conn: &Connection,
    name: &str,
    routing: &str,
    priority: i32,
    location: Option<&str>,
    duration_secs: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO operation (name, type, location, owner, priority, duration) VALUES (?1, 'fixed_time', ?2, ?3, ?4, ?5)",
        params![name, location, routing, priority, duration_secs],
    )?;
    Ok(())
}

pub fn set_operation_duration_per(conn: &Connection, name: &str, per_secs: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE operation SET type = 'time_per', duration_per = ?2 WHERE name = ?1",
        params![name, per_secs],
    )?;
    Ok(())
}

pub fn set_operation_sizing(
    conn: &Connection,
    name: &str,
    minimum: Option<f64>,
    multiple: Option<f64>,
    maximum: Option<f64>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE operation SET sizeminimum = ?2, sizemultiple = ?3, sizemaximum = ?4 WHERE name = ?1",
        params![name, minimum, multiple, maximum],
    )?;
    Ok(())
}

pub fn insert_operation_material(
    conn: &Connection,
    operation: &str,
    item: &str,
    quantity: f64,
    quantity_fixed: f64,
    flow_type: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO operationmaterial (operation, item, quantity, quantity_fixed, type) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![operation, item, quantity, quantity_fixed, flow_type],
    )?;
    Ok(())
}

pub fn insert_operation_resource(
    conn: &Connection,
    operation: &str,
    resource: &str,
    quantity: f64,
    skill: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO operationresource (operation, resource, quantity, skill) VALUES (?1, ?2, ?3, ?4)",
        params![operation, resource, quantity, skill],
    )?;
    Ok(())
}

/// operation 依赖 blockedby（hard_safety_leadtime 以秒计）
pub fn insert_dependency(
    conn: &Connection,
    operation: &str,
    blockedby: &str,
    hard_safety_leadtime_secs: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO operation_dependency (operation, blockedby, hard_safety_leadtime) VALUES (?1, ?2, ?3)",
        params![operation, blockedby, hard_safety_leadtime_secs],
    )?;
    Ok(())
}

pub fn insert_item_supplier(
    conn: &Connection,
    item: &str,
    location: Option<&str>,
    supplier: &str,
    leadtime_secs: i64,
    sizing: (Option<f64>, Option<f64>, Option<f64>),
) -> rusqlite::Result<()> {
    conn.execute(
        r#"INSERT INTO itemsupplier (item, location, supplier, leadtime, sizeminimum, sizemultiple, sizemaximum)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        params![item, location, supplier, leadtime_secs, sizing.0, sizing.1, sizing.2],
    )?;
    Ok(())
}

pub fn set_item_supplier_resource(
    conn: &Connection,
    item: &str,
    supplier: &str,
    resource: &str,
    resource_qty: f64,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE itemsupplier SET resource = ?3, resource_qty = ?4 WHERE item = ?1 AND supplier = ?2",
        params![item, supplier, resource, resource_qty],
    )?;
    Ok(())
}

pub fn insert_item_distribution(
    conn: &Connection,
    item: &str,
    location: Option<&str>,
    origin: &str,
    leadtime_secs: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO itemdistribution (item, location, origin, leadtime) VALUES (?1, ?2, ?3, ?4)",
        params![item, location, origin, leadtime_secs],
    )?;
    Ok(())
}

pub fn insert_demand(
    conn: &Connection,
    name: &str,
    item: &str,
    location: &str,
    quantity: f64,
    due: NaiveDateTime,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO demand (name, item, location, quantity, due) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, item, location, quantity, due],
    )?;
    Ok(())
}

pub fn insert_buffer(
    conn: &Connection,
    item: &str,
    location: &str,
    minimum: Option<f64>,
    minimum_calendar: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO buffer (item, location, minimum, minimum_calendar) VALUES (?1, ?2, ?3, ?4)",
        params![item, location, minimum, minimum_calendar],
    )?;
    Ok(())
}

pub fn insert_config(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

/// 常用主数据：库点 plant / dc，物料 bolt / widget，供应商 acme
pub fn seed_basic_master(conn: &Connection) -> rusqlite::Result<()> {
    insert_location(conn, "plant", None)?;
    insert_location(conn, "dc", None)?;
    insert_item(conn, "bolt", None)?;
    insert_item(conn, "widget", None)?;
    insert_supplier(conn, "acme")?;
    Ok(())
}
