// ==========================================
// 工单一致性维护层 - 资源主数据仓储
// ==========================================
// 表: resource, resourceskill
// 层级: resource.owner 组成森林
// ==========================================

use crate::domain::resource::Resource;
use crate::domain::types::ResourceType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::parse_code;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

fn map_resource(row: &Row<'_>) -> SqliteResult<Resource> {
    let type_raw: String = row.get(1)?;
    Ok(Resource {
        name: row.get(0)?,
        resource_type: parse_code(1, &type_raw, ResourceType::from_str)?,
        maximum: row.get(2)?,
        available: row.get(3)?,
        location: row.get(4)?,
        owner: row.get(5)?,
        efficiency: row.get(6)?,
    })
}

/// 具备某技能的叶子资源及其技能优先级
#[derive(Debug, Clone, PartialEq)]
pub struct SkilledResource {
    pub resource: Resource,
    pub skill_priority: i32,
}

// ==========================================
// ResourceRepository - 资源仓储
// ==========================================
pub struct ResourceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ResourceRepository {
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

    /// 按名称查询资源
    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Resource>> {
        let conn = self.get_conn()?;
        let resource = conn
            .query_row(
                r#"
                SELECT name, type, maximum, available, location, owner, efficiency
                FROM resource WHERE name = ?1
                "#,
                params![name],
                map_resource,
            )
            .optional()?;
        Ok(resource)
    }

    /// 查询直接子资源（按名称排序）
    pub fn find_children(&self, owner: &str) -> RepositoryResult<Vec<Resource>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT name, type, maximum, available, location, owner, efficiency
            FROM resource WHERE owner = ?1
            ORDER BY name
            "#,
        )?;
        let children = stmt
            .query_map(params![owner], map_resource)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(children)
    }

    /// 查询聚合资源下具备某技能的叶子资源
    ///
    /// # 参数
    /// - root: 聚合资源名
    /// - skill: 技能名，None 表示不限技能
    ///
    /// # 返回
    /// 按 (效率降序, 名称) 排序；技能优先级仅随结果返回
    pub fn find_skilled_leaves(
        &self,
        root: &str,
        skill: Option<&str>,
    ) -> RepositoryResult<Vec<SkilledResource>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            WITH RECURSIVE tree(name) AS (
                SELECT name FROM resource WHERE owner = ?1
                UNION
                SELECT r.name FROM resource r INNER JOIN tree t ON r.owner = t.name
            )
            SELECT r.name, r.type, r.maximum, r.available, r.location, r.owner, r.efficiency,
                   COALESCE(rs.priority, 0) AS skill_priority
            FROM resource r
            INNER JOIN tree t ON t.name = r.name
            LEFT JOIN resourceskill rs ON rs.resource = r.name AND rs.skill = ?2
            WHERE NOT EXISTS (SELECT 1 FROM resource c WHERE c.owner = r.name)
              AND (?2 IS NULL OR rs.id IS NOT NULL)
            ORDER BY r.efficiency DESC, r.name ASC
            "#,
        )?;
        let leaves = stmt
            .query_map(params![root, skill], |row| {
                Ok(SkilledResource {
                    resource: map_resource(row)?,
                    skill_priority: row.get(7)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(leaves)
    }
}
