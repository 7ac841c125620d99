//! Task / quick-capture records

use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};
use std::collections::BTreeMap;

use super::{Database, Filter, like_pattern, text};
use crate::error::{AppError, Result};
use crate::models::{
    Category, Page, Priority, Record, RecordChanges, RecordDraft, RecordQuery, RecordStats,
    RecordStatus, SubtaskSuggestion, TaskType, now_timestamp, page_bounds, random_id,
};

const RECORD_SELECT: &str = "SELECT r.id, r.content, r.category, r.parent_id, r.user_id, \
     r.priority, r.progress, r.progress_notes, r.status, r.task_type, r.created_at, r.updated_at, \
     (SELECT COUNT(*) FROM records c WHERE c.parent_id = r.id AND c.status = 'active') \
     FROM records r";

/// How many times a colliding random id is regenerated
const ID_ATTEMPTS: usize = 3;

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let category: String = row.get(2)?;
    let priority: String = row.get(5)?;
    let status: String = row.get(8)?;
    let task_type: String = row.get(9)?;

    Ok(Record {
        id: row.get(0)?,
        content: row.get(1)?,
        category: Category::parse(&category).unwrap_or_default(),
        parent_id: row.get(3)?,
        user_id: row.get(4)?,
        priority: Priority::parse(&priority).unwrap_or_default(),
        progress: row.get(6)?,
        progress_notes: row.get(7)?,
        status: RecordStatus::parse(&status).unwrap_or_default(),
        task_type: TaskType::parse(&task_type).unwrap_or_default(),
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        subtask_count: row.get(12)?,
        subtasks: None,
    })
}

fn find(conn: &Connection, user_id: i64, id: i64) -> Result<Record> {
    conn.query_row(
        &format!("{RECORD_SELECT} WHERE r.id = ?1 AND r.user_id = ?2"),
        params![id, user_id],
        record_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound("record"))
}

fn active_children(conn: &Connection, parent_id: i64) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(&format!(
        "{RECORD_SELECT} WHERE r.parent_id = ?1 AND r.status = 'active' ORDER BY r.created_at ASC"
    ))?;
    let rows = stmt.query_map(params![parent_id], record_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

fn with_subtasks(conn: &Connection, mut record: Record) -> Result<Record> {
    record.subtasks = Some(active_children(conn, record.id)?);
    Ok(record)
}

/// Insert a record under a fresh random id, retrying on the rare collision
fn insert(conn: &Connection, user_id: i64, draft: &RecordDraft) -> Result<i64> {
    let now = now_timestamp();
    let mut attempt = 0;
    loop {
        let id = random_id();
        let result = conn.execute(
            r#"INSERT INTO records (id, content, category, parent_id, user_id, priority,
               progress, status, task_type, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'active', ?7, ?8, ?8)"#,
            params![
                id,
                &draft.content,
                draft.category.as_str(),
                draft.parent_id,
                user_id,
                draft.priority.as_str(),
                draft.task_type.as_str(),
                &now,
            ],
        );
        match result {
            Ok(_) => return Ok(id),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation && attempt + 1 < ID_ATTEMPTS =>
            {
                attempt += 1;
                tracing::warn!(attempt, "Record id collision, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// The parent of a new subtask must be a task owned by the same user
fn task_parent(conn: &Connection, user_id: i64, parent_id: i64) -> Result<Record> {
    match find(conn, user_id, parent_id) {
        Ok(parent) if parent.is_task() => Ok(parent),
        Ok(_) | Err(AppError::NotFound(_)) => Err(AppError::validation(
            "parent task does not exist or is not a task",
        )),
        Err(e) => Err(e),
    }
}

impl Database {
    /// Create a record, validating its parent when one is given
    pub fn create_record(&self, user_id: i64, draft: &RecordDraft) -> Result<Record> {
        let conn = self.conn();
        if let Some(parent_id) = draft.parent_id {
            task_parent(&conn, user_id, parent_id)?;
        }
        let id = insert(&conn, user_id, draft)?;
        find(&conn, user_id, id)
    }

    pub fn get_record(&self, user_id: i64, id: i64, include_subtasks: bool) -> Result<Record> {
        let conn = self.conn();
        let record = find(&conn, user_id, id)?;
        if include_subtasks {
            with_subtasks(&conn, record)
        } else {
            Ok(record)
        }
    }

    /// Filtered, paginated listing, newest first
    pub fn list_records(&self, user_id: i64, query: &RecordQuery) -> Result<Page<Record>> {
        let (page, per_page) = page_bounds(query.page, query.per_page);

        let mut filter = Filter::default();
        filter.push("r.user_id = ?", [Value::Integer(user_id)]);

        match query.status.as_str() {
            "" | "all" => filter.push_clause("r.status != 'deleted'"),
            "pending" => {
                filter.push_clause("r.status NOT IN ('completed', 'cancelled', 'deleted')")
            }
            status => filter.push("r.status = ?", [text(status)]),
        }
        if !query.search.is_empty() {
            filter.push(r"r.content LIKE ? ESCAPE '\'", [like_pattern(&query.search)]);
        }
        if let Some(category) = Category::parse(&query.category) {
            filter.push("r.category = ?", [text(category.as_str())]);
        }
        if let Some(priority) = Priority::parse(&query.priority) {
            filter.push("r.priority = ?", [text(priority.as_str())]);
        }
        if let Some(task_type) = TaskType::parse(&query.task_type) {
            filter.push("r.task_type = ?", [text(task_type.as_str())]);
        }
        if !query.include_subtasks {
            filter.push_clause("r.parent_id IS NULL");
        }

        let conn = self.conn();
        let where_sql = filter.sql();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM records r {where_sql}"),
            params_from_iter(filter.params.iter()),
            |row| row.get(0),
        )?;

        let mut page_params = filter.params.clone();
        page_params.push(Value::Integer(i64::from(per_page)));
        page_params.push(Value::Integer(i64::from(page - 1) * i64::from(per_page)));

        let mut stmt = conn.prepare(&format!(
            "{RECORD_SELECT} {where_sql} ORDER BY r.created_at DESC, r.id DESC LIMIT ? OFFSET ?"
        ))?;
        let records = stmt
            .query_map(params_from_iter(page_params.iter()), record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let items = if query.include_subtasks {
            records
                .into_iter()
                .map(|r| with_subtasks(&conn, r))
                .collect::<Result<Vec<_>>>()?
        } else {
            records
        };

        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Active records containing `term`, at most 50
    pub fn search_records(&self, user_id: i64, term: &str) -> Result<Vec<Record>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            r"{RECORD_SELECT} WHERE r.user_id = ?1 AND r.status = 'active'
              AND r.content LIKE ?2 ESCAPE '\' ORDER BY r.created_at DESC LIMIT 50"
        ))?;
        let rows = stmt.query_map(params![user_id, like_pattern(term)], record_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn update_record(&self, user_id: i64, id: i64, changes: &RecordChanges) -> Result<Record> {
        let conn = self.conn();
        let mut record = find(&conn, user_id, id)?;

        if let Some(content) = &changes.content {
            record.content = content.clone();
        }
        if let Some(status) = changes.status {
            record.status = status;
        }
        if let Some(priority) = changes.priority {
            record.priority = priority;
        }
        if let Some(notes) = &changes.progress_notes {
            record.progress_notes = Some(notes.clone());
        }
        if let Some(progress) = changes.progress {
            record.progress = progress;
        }
        if let Some(task_type) = changes.task_type {
            record.task_type = task_type;
        }
        if let Some(category) = changes.category {
            record.category = category;
        }

        conn.execute(
            r#"UPDATE records SET content = ?2, status = ?3, priority = ?4, progress_notes = ?5,
               progress = ?6, task_type = ?7, category = ?8, updated_at = ?9
               WHERE id = ?1"#,
            params![
                id,
                &record.content,
                record.status.as_str(),
                record.priority.as_str(),
                &record.progress_notes,
                record.progress,
                record.task_type.as_str(),
                record.category.as_str(),
                now_timestamp(),
            ],
        )?;

        find(&conn, user_id, id)
    }

    /// Soft delete: the row stays with status `deleted`
    pub fn delete_record(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE records SET status = 'deleted', updated_at = ?3 WHERE id = ?1 AND user_id = ?2",
            params![id, user_id, now_timestamp()],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound("record"));
        }
        Ok(())
    }

    /// A task and its active subtasks
    pub fn subtasks(&self, user_id: i64, parent_id: i64) -> Result<(Record, Vec<Record>)> {
        let conn = self.conn();
        let parent = find(&conn, user_id, parent_id)?;
        if !parent.is_task() {
            return Err(AppError::validation("only tasks have subtasks"));
        }
        let children = active_children(&conn, parent_id)?;
        Ok((parent, children))
    }

    /// Create a subtask; returns `(subtask, parent)`
    pub fn add_subtask(
        &self,
        user_id: i64,
        parent_id: i64,
        content: String,
        category: Category,
    ) -> Result<(Record, Record)> {
        let conn = self.conn();
        let parent = find(&conn, user_id, parent_id)?;
        if !parent.is_task() {
            return Err(AppError::validation("only tasks can have subtasks"));
        }

        let draft = RecordDraft {
            content,
            category,
            parent_id: Some(parent_id),
            priority: Priority::DEFAULT,
            task_type: parent.task_type,
        };
        let id = insert(&conn, user_id, &draft)?;
        let subtask = find(&conn, user_id, id)?;
        let parent = find(&conn, user_id, parent_id)?;
        Ok((subtask, parent))
    }

    /// Bulk-create subtasks from suggestions; entries without a title are
    /// skipped. Returns the created subtasks and the parent with its subtasks.
    pub fn create_subtasks_from_suggestions(
        &self,
        user_id: i64,
        parent_id: i64,
        suggestions: &[SubtaskSuggestion],
    ) -> Result<(Vec<Record>, Record)> {
        let mut conn = self.conn();
        let parent = find(&conn, user_id, parent_id)?;
        if !parent.is_task() {
            return Err(AppError::validation("only tasks can have subtasks"));
        }

        let tx = conn.transaction()?;
        let mut created_ids = Vec::new();
        for suggestion in suggestions.iter().filter(|s| !s.title.trim().is_empty()) {
            let draft = RecordDraft {
                content: suggestion.content(),
                category: Category::Task,
                parent_id: Some(parent_id),
                priority: suggestion.priority(),
                task_type: parent.task_type,
            };
            created_ids.push(insert(&tx, user_id, &draft)?);
        }
        tx.commit()?;

        let created = created_ids
            .into_iter()
            .map(|id| find(&conn, user_id, id))
            .collect::<Result<Vec<_>>>()?;
        let parent = with_subtasks(&conn, find(&conn, user_id, parent_id)?)?;
        Ok((created, parent))
    }

    /// Counts over every non-deleted record of the user
    pub fn record_stats(&self, user_id: i64) -> Result<RecordStats> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT status, priority, task_type, COUNT(*) FROM records
             WHERE user_id = ?1 AND status != 'deleted'
             GROUP BY status, priority, task_type",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut stats = RecordStats {
            total: 0,
            by_status: BTreeMap::new(),
            by_priority: BTreeMap::new(),
            by_task_type: BTreeMap::new(),
        };
        for row in rows {
            let (status, priority, task_type, count) = row?;
            stats.total += count;
            *stats.by_status.entry(status).or_default() += count;
            *stats.by_priority.entry(priority).or_default() += count;
            *stats.by_task_type.entry(task_type).or_default() += count;
        }
        Ok(stats)
    }

    /// Every task-category record of the user, deleted ones included, each
    /// with its active subtasks. Input of the weekly report.
    pub fn task_records(&self, user_id: i64, task_type: Option<TaskType>) -> Result<Vec<Record>> {
        let conn = self.conn();
        let mut filter = Filter::default();
        filter.push("r.user_id = ?", [Value::Integer(user_id)]);
        filter.push_clause("r.category = 'task'");
        if let Some(task_type) = task_type {
            filter.push("r.task_type = ?", [text(task_type.as_str())]);
        }

        let mut stmt = conn.prepare(&format!(
            "{RECORD_SELECT} {} ORDER BY r.created_at ASC",
            filter.sql()
        ))?;
        let records = stmt
            .query_map(params_from_iter(filter.params.iter()), record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        records
            .into_iter()
            .map(|r| with_subtasks(&conn, r))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn set_record_times(&self, id: i64, created_at: &str, updated_at: &str) {
        self.conn()
            .execute(
                "UPDATE records SET created_at = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, created_at, updated_at],
            )
            .unwrap();
    }
}
