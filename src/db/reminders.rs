//! Recurring reminders, owned by a user or shared by guests

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::{Database, Filter, Owner, like_pattern, text};
use crate::error::{AppError, Result};
use crate::models::{
    Reminder, ReminderDraft, ReminderFrequency, ReminderQuery, ReminderStatus, ReminderUpdate,
    format_date, now_timestamp,
};

const REMINDER_SELECT: &str = "SELECT id, user_id, content, frequency, day_of_week, remind_time, \
     status, last_triggered_date, created_at, updated_at FROM reminders";

fn reminder_from_row(row: &Row<'_>) -> rusqlite::Result<Reminder> {
    let frequency: String = row.get(3)?;
    let status: String = row.get(6)?;

    Ok(Reminder {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        frequency: ReminderFrequency::parse(&frequency).unwrap_or_default(),
        day_of_week: row.get(4)?,
        remind_time: row.get(5)?,
        status: ReminderStatus::parse(&status).unwrap_or_default(),
        last_triggered_date: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Deleted reminders are gone for every operation but a `deleted` listing
fn find(conn: &Connection, owner: Owner, id: i64) -> Result<Reminder> {
    conn.query_row(
        &format!("{REMINDER_SELECT} WHERE id = ?1 AND user_id IS ?2 AND status != 'deleted'"),
        params![id, owner.param()],
        reminder_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound("reminder"))
}

fn save(conn: &Connection, reminder: &Reminder) -> Result<()> {
    conn.execute(
        r#"UPDATE reminders SET content = ?2, frequency = ?3, day_of_week = ?4,
           remind_time = ?5, status = ?6, last_triggered_date = ?7, updated_at = ?8
           WHERE id = ?1"#,
        params![
            reminder.id,
            &reminder.content,
            reminder.frequency.as_str(),
            reminder.day_of_week,
            &reminder.remind_time,
            reminder.status.as_str(),
            &reminder.last_triggered_date,
            now_timestamp(),
        ],
    )?;
    Ok(())
}

impl Database {
    pub fn create_reminder(&self, owner: Owner, draft: &ReminderDraft) -> Result<Reminder> {
        let conn = self.conn();
        let now = now_timestamp();
        conn.execute(
            r#"INSERT INTO reminders (user_id, content, frequency, day_of_week, remind_time,
               status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?6)"#,
            params![
                owner.param(),
                &draft.content,
                draft.frequency.as_str(),
                draft.day_of_week,
                &draft.remind_time,
                &now,
            ],
        )?;
        find(&conn, owner, conn.last_insert_rowid())
    }

    /// Newest first. `status` defaults to `active`; `all` or empty lists
    /// everything that is not deleted.
    pub fn list_reminders(&self, owner: Owner, query: &ReminderQuery) -> Result<Vec<Reminder>> {
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
            filter.push(
                r"content LIKE ? ESCAPE '\'",
                [like_pattern(&query.search)],
            );
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{REMINDER_SELECT} {} ORDER BY created_at DESC, id DESC",
            filter.sql()
        ))?;
        let reminders = stmt
            .query_map(params_from_iter(filter.params.iter()), reminder_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reminders)
    }

    pub fn update_reminder(
        &self,
        owner: Owner,
        id: i64,
        update: ReminderUpdate,
    ) -> Result<Reminder> {
        let conn = self.conn();
        let mut reminder = find(&conn, owner, id)?;
        update.apply(&mut reminder)?;
        save(&conn, &reminder)?;
        find_any(&conn, owner, id)
    }

    /// Pause, resume or soft-delete
    pub fn set_reminder_status(
        &self,
        owner: Owner,
        id: i64,
        status: ReminderStatus,
    ) -> Result<Reminder> {
        let conn = self.conn();
        let mut reminder = find(&conn, owner, id)?;
        reminder.status = status;
        save(&conn, &reminder)?;
        find_any(&conn, owner, id)
    }

    /// Active reminders of `owner` that are due at `now`
    pub fn due_reminders(&self, owner: Owner, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let query = ReminderQuery::default();
        let mut reminders = self.list_reminders(owner, &query)?;
        reminders.retain(|r| r.is_due(now));
        Ok(reminders)
    }

    /// Mark the reminder as handled for `today`
    pub fn acknowledge_reminder(
        &self,
        owner: Owner,
        id: i64,
        today: NaiveDate,
    ) -> Result<Reminder> {
        let conn = self.conn();
        let mut reminder = find(&conn, owner, id)?;
        reminder.last_triggered_date = Some(format_date(today));
        save(&conn, &reminder)?;
        find(&conn, owner, id)
    }
}

/// Like [`find`], but also returns a reminder that was just deleted
fn find_any(conn: &Connection, owner: Owner, id: i64) -> Result<Reminder> {
    conn.query_row(
        &format!("{REMINDER_SELECT} WHERE id = ?1 AND user_id IS ?2"),
        params![id, owner.param()],
        reminder_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound("reminder"))
}
