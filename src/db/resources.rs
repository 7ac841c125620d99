//! Info-resource library

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::collections::BTreeMap;

use super::{Database, Filter, like_pattern, text};
use crate::error::{AppError, Result};
use crate::models::{
    InfoResource, Page, ResourceChanges, ResourceDraft, ResourceQuery, ResourceStats,
    ResourceStatus, ResourceType, format_timestamp, now_timestamp, page_bounds,
};
use crate::report::week_window;

/// Who a resource belongs to. Guests share the resources without an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Guest,
    User(i64),
}

impl Owner {
    /// Bound against `user_id IS ?`, which also matches NULL for guests
    pub(super) fn param(self) -> Option<i64> {
        match self {
            Owner::Guest => None,
            Owner::User(id) => Some(id),
        }
    }
}

const RESOURCE_SELECT: &str = "SELECT id, title, content, resource_type, user_id, status, \
     created_at, updated_at FROM info_resources";

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<InfoResource> {
    let resource_type: String = row.get(3)?;
    let status: String = row.get(5)?;

    Ok(InfoResource {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        resource_type: ResourceType::parse(&resource_type).unwrap_or_default(),
        user_id: row.get(4)?,
        status: ResourceStatus::parse(&status).unwrap_or_default(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn find(conn: &Connection, owner: Owner, id: i64) -> Result<InfoResource> {
    conn.query_row(
        &format!("{RESOURCE_SELECT} WHERE id = ?1 AND user_id IS ?2"),
        params![id, owner.param()],
        resource_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound("info resource"))
}

impl Database {
    pub fn create_resource(&self, owner: Owner, draft: &ResourceDraft) -> Result<InfoResource> {
        let conn = self.conn();
        let now = now_timestamp();
        conn.execute(
            r#"INSERT INTO info_resources (title, content, resource_type, user_id, status,
               created_at, updated_at) VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?5)"#,
            params![
                &draft.title,
                &draft.content,
                draft.resource_type.as_str(),
                owner.param(),
                &now,
            ],
        )?;
        find(&conn, owner, conn.last_insert_rowid())
    }

    pub fn get_resource(&self, owner: Owner, id: i64) -> Result<InfoResource> {
        find(&self.conn(), owner, id)
    }

    /// Filtered, paginated listing, newest first
    pub fn list_resources(&self, owner: Owner, query: &ResourceQuery) -> Result<Page<InfoResource>> {
        let (page, per_page) = page_bounds(query.page, query.per_page);

        let mut filter = Filter::default();
        filter.push(
            "user_id IS ?",
            [owner.param().map_or(Value::Null, Value::Integer)],
        );
        match query.status.as_str() {
            "" | "all" => filter.push_clause("status != 'deleted'"),
            status => filter.push("status = ?", [text(status)]),
        }
        if !query.search.is_empty() {
            let pattern = like_pattern(&query.search);
            filter.push(
                r"(title LIKE ? ESCAPE '\' OR content LIKE ? ESCAPE '\')",
                [pattern.clone(), pattern],
            );
        }
        if let Some(resource_type) = ResourceType::parse(&query.resource_type) {
            filter.push("resource_type = ?", [text(resource_type.as_str())]);
        }

        let conn = self.conn();
        let where_sql = filter.sql();
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM info_resources {where_sql}"),
            params_from_iter(filter.params.iter()),
            |row| row.get(0),
        )?;

        let mut page_params = filter.params.clone();
        page_params.push(Value::Integer(i64::from(per_page)));
        page_params.push(Value::Integer(i64::from(page - 1) * i64::from(per_page)));

        let mut stmt = conn.prepare(&format!(
            "{RESOURCE_SELECT} {where_sql} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))?;
        let items = stmt
            .query_map(params_from_iter(page_params.iter()), resource_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }

    pub fn update_resource(
        &self,
        owner: Owner,
        id: i64,
        changes: &ResourceChanges,
    ) -> Result<InfoResource> {
        let conn = self.conn();
        let mut resource = find(&conn, owner, id)?;

        if let Some(title) = &changes.title {
            resource.title = title.clone();
        }
        if let Some(content) = &changes.content {
            resource.content = content.clone();
        }
        if let Some(resource_type) = changes.resource_type {
            resource.resource_type = resource_type;
        }
        if let Some(status) = changes.status {
            resource.status = status;
        }

        conn.execute(
            r#"UPDATE info_resources SET title = ?2, content = ?3, resource_type = ?4,
               status = ?5, updated_at = ?6 WHERE id = ?1"#,
            params![
                id,
                &resource.title,
                &resource.content,
                resource.resource_type.as_str(),
                resource.status.as_str(),
                now_timestamp(),
            ],
        )?;
        find(&conn, owner, id)
    }

    /// Move a resource to `status`; used for delete (soft), archive and restore
    pub fn set_resource_status(
        &self,
        owner: Owner,
        id: i64,
        status: ResourceStatus,
    ) -> Result<InfoResource> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE info_resources SET status = ?3, updated_at = ?4 WHERE id = ?1 AND user_id IS ?2",
            params![id, owner.param(), status.as_str(), now_timestamp()],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound("info resource"));
        }
        find(&conn, owner, id)
    }

    /// Statistics over the owner's whole non-deleted library
    pub fn resource_stats(&self, owner: Owner, now: DateTime<Utc>) -> Result<ResourceStats> {
        let (week_start, _) = week_window(now, 0);
        let week_start = format_timestamp(week_start);

        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT status, resource_type, created_at >= ?2, COUNT(*) FROM info_resources
             WHERE user_id IS ?1 AND status != 'deleted'
             GROUP BY status, resource_type, created_at >= ?2",
        )?;
        let rows = stmt.query_map(params![owner.param(), week_start], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut stats = ResourceStats {
            total: 0,
            active: 0,
            archived: 0,
            by_type: BTreeMap::new(),
            this_week: 0,
        };
        for row in rows {
            let (status, resource_type, recent, count) = row?;
            stats.total += count;
            match ResourceStatus::parse(&status) {
                Some(ResourceStatus::Active) => stats.active += count,
                Some(ResourceStatus::Archived) => stats.archived += count,
                _ => {}
            }
            *stats.by_type.entry(resource_type).or_default() += count;
            if recent {
                stats.this_week += count;
            }
        }
        Ok(stats)
    }

    #[cfg(test)]
    pub(crate) fn set_resource_created(&self, id: i64, created_at: &str) {
        self.conn()
            .execute(
                "UPDATE info_resources SET created_at = ?2 WHERE id = ?1",
                params![id, created_at],
            )
            .unwrap();
    }
}
