// ==========================================
// 工单一致性维护层 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键级联依赖 foreign_keys）
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供建库脚本，供维护程序与测试复用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 共享连接类型
pub type SharedConnection = Arc<Mutex<Connection>>;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启（物料/资源明细依赖级联删除）
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开连接并包装为共享连接
pub fn open_shared_connection(db_path: &str) -> rusqlite::Result<SharedConnection> {
    Ok(Arc::new(Mutex::new(open_sqlite_connection(db_path)?)))
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建库（幂等）并登记 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 建表脚本
///
/// 时间以文本存储（%Y-%m-%d %H:%M:%S），时长以整数秒存储
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS calendar (
    name TEXT PRIMARY KEY,
    defaultvalue REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS calendarbucket (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    calendar TEXT NOT NULL REFERENCES calendar(name) ON DELETE CASCADE,
    startdate TEXT NOT NULL DEFAULT '1971-01-01 00:00:00',
    enddate TEXT NOT NULL DEFAULT '2030-12-31 00:00:00',
    value REAL NOT NULL DEFAULT 0,
    priority INTEGER NOT NULL DEFAULT 0,
    monday INTEGER NOT NULL DEFAULT 1,
    tuesday INTEGER NOT NULL DEFAULT 1,
    wednesday INTEGER NOT NULL DEFAULT 1,
    thursday INTEGER NOT NULL DEFAULT 1,
    friday INTEGER NOT NULL DEFAULT 1,
    saturday INTEGER NOT NULL DEFAULT 1,
    sunday INTEGER NOT NULL DEFAULT 1,
    starttime TEXT NOT NULL DEFAULT '00:00:00',
    endtime TEXT NOT NULL DEFAULT '23:59:59'
);

CREATE TABLE IF NOT EXISTS location (
    name TEXT PRIMARY KEY,
    available TEXT REFERENCES calendar(name) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS item (
    name TEXT PRIMARY KEY,
    type TEXT
);

CREATE TABLE IF NOT EXISTS supplier (
    name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS resource (
    name TEXT PRIMARY KEY,
    type TEXT NOT NULL DEFAULT 'default',
    maximum REAL NOT NULL DEFAULT 1,
    available TEXT REFERENCES calendar(name) ON DELETE SET NULL,
    location TEXT REFERENCES location(name) ON DELETE SET NULL,
    owner TEXT REFERENCES resource(name) ON DELETE SET NULL,
    efficiency REAL NOT NULL DEFAULT 100
);

CREATE TABLE IF NOT EXISTS resourceskill (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    resource TEXT NOT NULL REFERENCES resource(name) ON DELETE CASCADE,
    skill TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 1,
    UNIQUE (resource, skill)
);

CREATE TABLE IF NOT EXISTS operation (
    name TEXT PRIMARY KEY,
    type TEXT NOT NULL DEFAULT 'fixed_time',
    item TEXT REFERENCES item(name) ON DELETE CASCADE,
    location TEXT REFERENCES location(name) ON DELETE CASCADE,
    owner TEXT REFERENCES operation(name) ON DELETE SET NULL,
    priority INTEGER NOT NULL DEFAULT 1,
    duration INTEGER NOT NULL DEFAULT 0,
    duration_per INTEGER NOT NULL DEFAULT 0,
    sizeminimum REAL DEFAULT 1,
    sizemultiple REAL,
    sizemaximum REAL,
    available TEXT REFERENCES calendar(name) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS operationmaterial (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL REFERENCES operation(name) ON DELETE CASCADE,
    item TEXT NOT NULL REFERENCES item(name) ON DELETE CASCADE,
    quantity REAL NOT NULL DEFAULT 1,
    quantity_fixed REAL NOT NULL DEFAULT 0,
    type TEXT
);

CREATE TABLE IF NOT EXISTS operationresource (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL REFERENCES operation(name) ON DELETE CASCADE,
    resource TEXT NOT NULL REFERENCES resource(name) ON DELETE CASCADE,
    quantity REAL NOT NULL DEFAULT 1,
    skill TEXT,
    setup TEXT
);

CREATE TABLE IF NOT EXISTS operation_dependency (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL REFERENCES operation(name) ON DELETE CASCADE,
    blockedby TEXT NOT NULL REFERENCES operation(name) ON DELETE CASCADE,
    quantity REAL NOT NULL DEFAULT 1,
    safety_leadtime INTEGER NOT NULL DEFAULT 0,
    hard_safety_leadtime INTEGER NOT NULL DEFAULT 0,
    UNIQUE (operation, blockedby)
);

CREATE TABLE IF NOT EXISTS itemsupplier (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item TEXT NOT NULL REFERENCES item(name) ON DELETE CASCADE,
    location TEXT REFERENCES location(name) ON DELETE CASCADE,
    supplier TEXT NOT NULL REFERENCES supplier(name) ON DELETE CASCADE,
    leadtime INTEGER NOT NULL DEFAULT 0,
    sizeminimum REAL,
    sizemultiple REAL,
    sizemaximum REAL,
    priority INTEGER NOT NULL DEFAULT 1,
    effective_start TEXT,
    effective_end TEXT,
    resource TEXT REFERENCES resource(name) ON DELETE SET NULL,
    resource_qty REAL NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS itemdistribution (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item TEXT NOT NULL REFERENCES item(name) ON DELETE CASCADE,
    location TEXT REFERENCES location(name) ON DELETE CASCADE,
    origin TEXT NOT NULL REFERENCES location(name) ON DELETE CASCADE,
    leadtime INTEGER NOT NULL DEFAULT 0,
    sizeminimum REAL,
    sizemultiple REAL,
    sizemaximum REAL,
    priority INTEGER NOT NULL DEFAULT 1,
    effective_start TEXT,
    effective_end TEXT,
    resource TEXT REFERENCES resource(name) ON DELETE SET NULL,
    resource_qty REAL NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS demand (
    name TEXT PRIMARY KEY,
    item TEXT NOT NULL REFERENCES item(name) ON DELETE CASCADE,
    location TEXT NOT NULL REFERENCES location(name) ON DELETE CASCADE,
    quantity REAL NOT NULL DEFAULT 0,
    due TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS buffer (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item TEXT NOT NULL REFERENCES item(name) ON DELETE CASCADE,
    location TEXT NOT NULL REFERENCES location(name) ON DELETE CASCADE,
    batch TEXT,
    minimum REAL,
    minimum_calendar TEXT REFERENCES calendar(name) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS itemlocation (
    item TEXT NOT NULL REFERENCES item(name) ON DELETE CASCADE,
    location TEXT NOT NULL REFERENCES location(name) ON DELETE CASCADE,
    safetystock_calendar TEXT REFERENCES calendar(name) ON DELETE SET NULL,
    PRIMARY KEY (item, location)
);

CREATE TABLE IF NOT EXISTS operationplan (
    reference TEXT PRIMARY KEY,
    type TEXT NOT NULL DEFAULT 'MO',
    status TEXT NOT NULL DEFAULT 'proposed',
    name TEXT,
    quantity REAL NOT NULL DEFAULT 1,
    quantity_completed REAL,
    startdate TEXT NOT NULL,
    enddate TEXT NOT NULL,
    criticality REAL,
    delay INTEGER,
    plan TEXT NOT NULL DEFAULT '{}',
    operation TEXT REFERENCES operation(name) ON DELETE CASCADE,
    owner TEXT REFERENCES operationplan(reference) ON DELETE CASCADE,
    batch TEXT,
    item TEXT REFERENCES item(name) ON DELETE CASCADE,
    origin TEXT REFERENCES location(name) ON DELETE CASCADE,
    destination TEXT REFERENCES location(name) ON DELETE CASCADE,
    supplier TEXT REFERENCES supplier(name) ON DELETE CASCADE,
    location TEXT REFERENCES location(name) ON DELETE CASCADE,
    demand TEXT REFERENCES demand(name) ON DELETE CASCADE,
    due TEXT
);
CREATE INDEX IF NOT EXISTS operationplan_operation ON operationplan (operation);
CREATE INDEX IF NOT EXISTS operationplan_owner ON operationplan (owner);

CREATE TABLE IF NOT EXISTS operationplanmaterial (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operationplan TEXT NOT NULL REFERENCES operationplan(reference) ON DELETE CASCADE,
    item TEXT NOT NULL REFERENCES item(name) ON DELETE CASCADE,
    location TEXT NOT NULL REFERENCES location(name) ON DELETE CASCADE,
    batch TEXT,
    quantity REAL NOT NULL,
    flowdate TEXT NOT NULL,
    onhand REAL,
    minimum REAL,
    periodofcover REAL,
    status TEXT NOT NULL DEFAULT 'proposed'
);
CREATE INDEX IF NOT EXISTS opplanmat_itemloc ON operationplanmaterial (item, location);
CREATE INDEX IF NOT EXISTS opplanmat_opplan ON operationplanmaterial (operationplan);

CREATE TABLE IF NOT EXISTS operationplanresource (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operationplan TEXT NOT NULL REFERENCES operationplan(reference) ON DELETE CASCADE,
    resource TEXT NOT NULL REFERENCES resource(name) ON DELETE CASCADE,
    quantity REAL NOT NULL DEFAULT 1,
    setup TEXT,
    status TEXT NOT NULL DEFAULT 'proposed',
    UNIQUE (resource, operationplan)
);

CREATE TABLE IF NOT EXISTS out_resourceplan (
    resource TEXT NOT NULL REFERENCES resource(name) ON DELETE CASCADE,
    startdate TEXT NOT NULL,
    available REAL NOT NULL DEFAULT 0,
    unavailable REAL NOT NULL DEFAULT 0,
    setup REAL NOT NULL DEFAULT 0,
    load REAL NOT NULL DEFAULT 0,
    free REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (resource, startdate)
);
"#;
