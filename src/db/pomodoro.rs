//! Pomodoro tasks and their state transitions

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use super::Database;
use crate::error::{AppError, Result};
use crate::models::{
    NewPomodoroTask, PomodoroAction, PomodoroStats, PomodoroStatus, PomodoroTask, PomodoroToday,
    PomodoroTotals, Priority, format_timestamp, now_timestamp, round1,
};

const POMODORO_SELECT: &str = "SELECT id, user_id, title, description, related_task_ids, \
     priority_score, estimated_pomodoros, order_index, status, started_at, completed_at, \
     pomodoros_completed, total_focus_time, generation_context, ai_reasoning, created_at, \
     updated_at FROM pomodoro_tasks";

/// Longest record excerpt used as a pomodoro title
const TITLE_EXCERPT_CHARS: usize = 50;

fn pomodoro_from_row(row: &Row<'_>) -> rusqlite::Result<PomodoroTask> {
    let related: String = row.get(4)?;
    let status: String = row.get(8)?;

    Ok(PomodoroTask {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        related_task_ids: serde_json::from_str(&related).unwrap_or_default(),
        priority_score: row.get(5)?,
        estimated_pomodoros: row.get(6)?,
        order_index: row.get(7)?,
        status: PomodoroStatus::parse(&status).unwrap_or_default(),
        started_at: row.get(9)?,
        completed_at: row.get(10)?,
        pomodoros_completed: row.get(11)?,
        total_focus_time: row.get(12)?,
        generation_context: row.get(13)?,
        ai_reasoning: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn find(conn: &Connection, user_id: i64, id: i64) -> Result<PomodoroTask> {
    conn.query_row(
        &format!("{POMODORO_SELECT} WHERE id = ?1 AND user_id = ?2"),
        params![id, user_id],
        pomodoro_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound("pomodoro task"))
}

fn active_task(conn: &Connection, user_id: i64) -> Result<Option<PomodoroTask>> {
    conn.query_row(
        &format!("{POMODORO_SELECT} WHERE user_id = ?1 AND status = 'active'"),
        params![user_id],
        pomodoro_from_row,
    )
    .optional()
    .map_err(Into::into)
}

/// Write back the mutable state columns of a task
fn save_state(conn: &Connection, task: &PomodoroTask) -> Result<()> {
    conn.execute(
        r#"UPDATE pomodoro_tasks SET status = ?2, started_at = ?3, completed_at = ?4,
           pomodoros_completed = ?5, total_focus_time = ?6, updated_at = ?7 WHERE id = ?1"#,
        params![
            task.id,
            task.status.as_str(),
            &task.started_at,
            &task.completed_at,
            task.pomodoros_completed,
            task.total_focus_time,
            &task.updated_at,
        ],
    )?;
    Ok(())
}

fn excerpt(content: &str) -> String {
    if content.chars().count() > TITLE_EXCERPT_CHARS {
        let head: String = content.chars().take(TITLE_EXCERPT_CHARS).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}

impl Database {
    /// The user's pomodoro tasks in display order
    pub fn list_pomodoro_tasks(&self, user_id: i64) -> Result<Vec<PomodoroTask>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{POMODORO_SELECT} WHERE user_id = ?1 ORDER BY order_index ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![user_id], pomodoro_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }

    pub fn get_pomodoro_task(&self, user_id: i64, id: i64) -> Result<PomodoroTask> {
        find(&self.conn(), user_id, id)
    }

    /// Append a manually defined task at the end of the list
    pub fn create_pomodoro_task(&self, user_id: i64, new: &NewPomodoroTask) -> Result<PomodoroTask> {
        let conn = self.conn();
        let now = now_timestamp();
        let related = serde_json::to_string(&new.related_task_ids)
            .map_err(|e| AppError::Internal(e.into()))?;

        conn.execute(
            r#"INSERT INTO pomodoro_tasks (user_id, title, description, related_task_ids,
               priority_score, estimated_pomodoros, order_index, status, ai_reasoning,
               created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                   (SELECT COALESCE(MAX(order_index), 0) + 1 FROM pomodoro_tasks WHERE user_id = ?1),
                   'pending', ?7, ?8, ?8)"#,
            params![
                user_id,
                &new.title,
                &new.description,
                related,
                new.priority_score.unwrap_or(0),
                new.estimated_pomodoros.unwrap_or(1),
                &new.ai_reasoning,
                &now,
            ],
        )?;
        find(&conn, user_id, conn.last_insert_rowid())
    }

    /// Promote a record to the front of the pomodoro list and start it.
    /// Whatever task was active is skipped first.
    pub fn add_record_to_pomodoro(&self, user_id: i64, record_id: i64) -> Result<PomodoroTask> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (content, priority, task_type): (String, String, String) = tx
            .query_row(
                "SELECT content, priority, task_type FROM records
                 WHERE id = ?1 AND user_id = ?2 AND status != 'deleted'",
                params![record_id, user_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
            .ok_or(AppError::NotFound("record"))?;
        let priority = Priority::parse(&priority).unwrap_or_default();
        let now = now_timestamp();

        if let Some(mut active) = active_task(&tx, user_id)? {
            active.apply(PomodoroAction::Skip, &now)?;
            save_state(&tx, &active)?;
            tracing::info!(task_id = active.id, "Skipped active pomodoro task");
        }

        tx.execute(
            "UPDATE pomodoro_tasks SET order_index = order_index + 1 WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.execute(
            r#"INSERT INTO pomodoro_tasks (user_id, title, description, related_task_ids,
               priority_score, estimated_pomodoros, order_index, status, started_at,
               generation_context, ai_reasoning, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, 1, 0, 'active', ?6, ?7, ?8, ?6, ?6)"#,
            params![
                user_id,
                excerpt(&content),
                format!(
                    "Based on task: {content}\n\nPriority: {priority}\nTask type: {task_type}"
                ),
                format!("[{record_id}]"),
                priority.pomodoro_score(),
                &now,
                format!("Added manually from task: {content}"),
                format!("Chosen by the user, priority: {priority}"),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        find(&conn, user_id, id)
    }

    /// Apply a state transition. Starting a task while another one is active
    /// is a conflict.
    pub fn transition_pomodoro(
        &self,
        user_id: i64,
        id: i64,
        action: PomodoroAction,
    ) -> Result<PomodoroTask> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut task = find(&tx, user_id, id)?;
        if action == PomodoroAction::Start
            && let Some(active) = active_task(&tx, user_id)?
            && active.id != task.id
        {
            return Err(AppError::Conflict(format!(
                "pomodoro task {} is already active",
                active.id
            )));
        }

        task.apply(action, &now_timestamp())?;
        save_state(&tx, &task)?;
        tx.commit()?;

        tracing::info!(
            task_id = task.id,
            action = action.name(),
            status = %task.status,
            "Pomodoro task updated"
        );
        Ok(task)
    }

    pub fn delete_pomodoro_task(&self, user_id: i64, id: i64) -> Result<()> {
        let changed = self.conn().execute(
            "DELETE FROM pomodoro_tasks WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound("pomodoro task"));
        }
        Ok(())
    }

    /// Remove every pomodoro task of the user; returns how many were removed
    pub fn clear_pomodoro_tasks(&self, user_id: i64) -> Result<usize> {
        let removed = self.conn().execute(
            "DELETE FROM pomodoro_tasks WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(removed)
    }

    pub fn pomodoro_stats(&self, user_id: i64, now: DateTime<Utc>) -> Result<PomodoroStats> {
        let today_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| format_timestamp(dt.and_utc()))
            .unwrap_or_default();

        let conn = self.conn();
        let totals = conn.query_row(
            r#"SELECT COUNT(*),
                      COALESCE(SUM(status = 'completed'), 0),
                      COALESCE(SUM(status = 'active'), 0),
                      COALESCE(SUM(status = 'pending'), 0),
                      COALESCE(SUM(status = 'skipped'), 0),
                      COALESCE(SUM(pomodoros_completed), 0),
                      COALESCE(SUM(total_focus_time), 0)
               FROM pomodoro_tasks WHERE user_id = ?1"#,
            params![user_id],
            |row| {
                let total_tasks: i64 = row.get(0)?;
                let completed_tasks: i64 = row.get(1)?;
                Ok(PomodoroTotals {
                    total_tasks,
                    completed_tasks,
                    active_tasks: row.get(2)?,
                    pending_tasks: row.get(3)?,
                    skipped_tasks: row.get(4)?,
                    total_pomodoros: row.get(5)?,
                    total_focus_time: row.get(6)?,
                    completion_rate: if total_tasks > 0 {
                        round1(completed_tasks as f64 / total_tasks as f64 * 100.0)
                    } else {
                        0.0
                    },
                })
            },
        )?;

        let today = conn.query_row(
            r#"SELECT COALESCE(SUM(status = 'completed'), 0),
                      COALESCE(SUM(pomodoros_completed), 0),
                      COALESCE(SUM(total_focus_time), 0)
               FROM pomodoro_tasks WHERE user_id = ?1 AND created_at >= ?2"#,
            params![user_id, today_start],
            |row| {
                let focus: i64 = row.get(2)?;
                Ok(PomodoroToday {
                    today_completed_tasks: row.get(0)?,
                    today_pomodoros: row.get(1)?,
                    today_focus_time: focus,
                    today_focus_hours: round1(focus as f64 / 60.0),
                })
            },
        )?;

        Ok(PomodoroStats {
            total_stats: totals,
            today_stats: today,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewRecord, RecordStatus};

    const USER: i64 = 77;

    fn new_task(db: &Database, title: &str, estimated: i64) -> PomodoroTask {
        db.create_pomodoro_task(
            USER,
            &NewPomodoroTask {
                title: title.to_string(),
                estimated_pomodoros: Some(estimated),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn manual_tasks_append_in_order() {
        let db = Database::open_in_memory().unwrap();
        let a = new_task(&db, "A", 1);
        let b = new_task(&db, "B", 1);
        assert!(b.order_index > a.order_index);

        let titles: Vec<String> = db
            .list_pomodoro_tasks(USER)
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, ["A", "B"]);
    }

    #[test]
    fn only_one_task_may_be_active() {
        let db = Database::open_in_memory().unwrap();
        let a = new_task(&db, "A", 1);
        let b = new_task(&db, "B", 1);

        let started = db
            .transition_pomodoro(USER, a.id, PomodoroAction::Start)
            .unwrap();
        assert_eq!(started.status, PomodoroStatus::Active);

        let err = db
            .transition_pomodoro(USER, b.id, PomodoroAction::Start)
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(
            db.get_pomodoro_task(USER, b.id).unwrap().status,
            PomodoroStatus::Pending
        );

        db.transition_pomodoro(USER, a.id, PomodoroAction::Skip)
            .unwrap();
        db.transition_pomodoro(USER, b.id, PomodoroAction::Start)
            .unwrap();
    }

    #[test]
    fn other_users_do_not_block_start() {
        let db = Database::open_in_memory().unwrap();
        let a = new_task(&db, "A", 1);
        let theirs = db
            .create_pomodoro_task(
                USER + 1,
                &NewPomodoroTask {
                    title: "Theirs".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        db.transition_pomodoro(USER + 1, theirs.id, PomodoroAction::Start)
            .unwrap();
        db.transition_pomodoro(USER, a.id, PomodoroAction::Start)
            .unwrap();
        assert!(
            db.transition_pomodoro(USER, theirs.id, PomodoroAction::Skip)
                .is_err()
        );
    }

    #[test]
    fn complete_accumulates_focus_time() {
        let db = Database::open_in_memory().unwrap();
        let task = new_task(&db, "Deep work", 2);
        db.transition_pomodoro(USER, task.id, PomodoroAction::Start)
            .unwrap();
        let once = db
            .transition_pomodoro(USER, task.id, PomodoroAction::Complete { focus_minutes: 25 })
            .unwrap();
        assert_eq!(once.status, PomodoroStatus::Active);

        let twice = db
            .transition_pomodoro(USER, task.id, PomodoroAction::Complete { focus_minutes: 20 })
            .unwrap();
        assert_eq!(twice.status, PomodoroStatus::Completed);
        assert_eq!(twice.total_focus_time, 45);

        let stats = db.pomodoro_stats(USER, Utc::now()).unwrap();
        assert_eq!(stats.total_stats.completed_tasks, 1);
        assert_eq!(stats.total_stats.total_pomodoros, 2);
        assert_eq!(stats.total_stats.completion_rate, 100.0);
        assert_eq!(stats.today_stats.today_focus_time, 45);
        assert_eq!(stats.today_stats.today_focus_hours, 0.8);
    }

    #[test]
    fn add_record_skips_active_and_goes_first() {
        let db = Database::open_in_memory().unwrap();
        let existing = new_task(&db, "Existing", 1);
        db.transition_pomodoro(USER, existing.id, PomodoroAction::Start)
            .unwrap();

        let draft = NewRecord {
            content: "x".repeat(60),
            category: Some("task".to_string()),
            priority: Some("urgent".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let record = db.create_record(USER, &draft).unwrap();
        assert_eq!(record.status, RecordStatus::Active);

        let promoted = db.add_record_to_pomodoro(USER, record.id).unwrap();
        assert_eq!(promoted.status, PomodoroStatus::Active);
        assert_eq!(promoted.priority_score, 90);
        assert_eq!(promoted.related_task_ids, vec![record.id]);
        assert_eq!(promoted.title, format!("{}...", "x".repeat(50)));

        let tasks = db.list_pomodoro_tasks(USER).unwrap();
        assert_eq!(tasks[0].id, promoted.id);
        let old = tasks.iter().find(|t| t.id == existing.id).unwrap();
        assert_eq!(old.status, PomodoroStatus::Skipped);
    }

    #[test]
    fn add_unknown_record_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.add_record_to_pomodoro(USER, 123),
            Err(AppError::NotFound("record"))
        ));
    }

    #[test]
    fn delete_and_clear() {
        let db = Database::open_in_memory().unwrap();
        let a = new_task(&db, "A", 1);
        new_task(&db, "B", 1);
        db.delete_pomodoro_task(USER, a.id).unwrap();
        assert!(db.delete_pomodoro_task(USER, a.id).is_err());
        assert_eq!(db.clear_pomodoro_tasks(USER).unwrap(), 1);
        assert!(db.list_pomodoro_tasks(USER).unwrap().is_empty());
    }
}
