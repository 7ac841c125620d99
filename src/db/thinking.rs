//! Structured-thinking session storage

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Database;
use crate::error::{AppError, Result};
use crate::models::{
    MAX_TITLE_LEN, NewThinkingRecord, TemplateUsage, ThinkingRecord, ThinkingStats,
    format_timestamp, now_timestamp, round1,
};

const THINKING_SELECT: &str = "SELECT id, user_id, template_id, template_name, title, questions, \
     answers, is_completed, total_time_spent, tags, summary, insights, created_at, updated_at \
     FROM thinking_records";

fn thinking_from_row(row: &Row<'_>) -> rusqlite::Result<ThinkingRecord> {
    let questions: String = row.get(5)?;
    let answers: String = row.get(6)?;
    let tags: String = row.get(9)?;

    Ok(ThinkingRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        template_id: row.get(2)?,
        template_name: row.get(3)?,
        title: row.get(4)?,
        questions: serde_json::from_str(&questions).unwrap_or_default(),
        answers: serde_json::from_str(&answers).unwrap_or_default(),
        is_completed: row.get(7)?,
        total_time_spent: row.get(8)?,
        tags: tags
            .split(',')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        summary: row.get(10)?,
        insights: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn find(conn: &Connection, user_id: i64, id: i64) -> Result<ThinkingRecord> {
    conn.query_row(
        &format!("{THINKING_SELECT} WHERE id = ?1 AND user_id = ?2"),
        params![id, user_id],
        thinking_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound("thinking record"))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| AppError::Internal(e.into()))
}

impl Database {
    /// Start a thinking session from a question template
    pub fn create_thinking_record(
        &self,
        user_id: i64,
        new: &NewThinkingRecord,
    ) -> Result<ThinkingRecord> {
        let template_id = new.template_id.trim();
        let template_name = new.template_name.trim();
        if template_id.is_empty() || template_name.is_empty() {
            return Err(AppError::validation(
                "template_id and template_name are required",
            ));
        }
        if new.questions.is_empty() {
            return Err(AppError::validation("questions must not be empty"));
        }

        let now = Utc::now();
        let title = match new.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => format!("{template_name} - {}", now.format("%Y-%m-%d %H:%M")),
        };
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::validation(format!(
                "title must not exceed {MAX_TITLE_LEN} characters"
            )));
        }
        let tags: Vec<&str> = new
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty() && !t.contains(','))
            .collect();
        let now = format_timestamp(now);

        let conn = self.conn();
        conn.execute(
            r#"INSERT INTO thinking_records (user_id, template_id, template_name, title,
               questions, answers, tags, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, '{}', ?6, ?7, ?7)"#,
            params![
                user_id,
                template_id,
                template_name,
                title,
                to_json(&new.questions)?,
                tags.join(","),
                &now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(user_id, id, template_id, "Thinking record created");

        find(&conn, user_id, id)
    }

    /// Most recently updated first. Returns the page and the total count.
    pub fn list_thinking_records(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
        template_id: Option<&str>,
    ) -> Result<(Vec<ThinkingRecord>, i64)> {
        let conn = self.conn();
        let template_id = template_id.filter(|t| !t.is_empty());

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM thinking_records WHERE user_id = ?1
             AND (?2 IS NULL OR template_id = ?2)",
            params![user_id, template_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "{THINKING_SELECT} WHERE user_id = ?1 AND (?2 IS NULL OR template_id = ?2)
             ORDER BY updated_at DESC, id DESC LIMIT ?3 OFFSET ?4"
        ))?;
        let records = stmt
            .query_map(
                params![user_id, template_id, limit, offset],
                thinking_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((records, total))
    }

    pub fn get_thinking_record(&self, user_id: i64, id: i64) -> Result<ThinkingRecord> {
        find(&self.conn(), user_id, id)
    }

    /// Store the answer to one question. The session completes once every
    /// question has a non-blank answer.
    pub fn update_thinking_answer(
        &self,
        user_id: i64,
        id: i64,
        question_index: usize,
        answer: &str,
    ) -> Result<ThinkingRecord> {
        let conn = self.conn();
        let mut record = find(&conn, user_id, id)?;
        if question_index >= record.questions.len() {
            return Err(AppError::validation(format!(
                "question_index must be below {}",
                record.questions.len()
            )));
        }

        record
            .answers
            .insert(question_index.to_string(), answer.to_string());
        if record.answered() == record.questions.len() {
            record.is_completed = true;
        }

        conn.execute(
            "UPDATE thinking_records SET answers = ?2, is_completed = ?3, updated_at = ?4
             WHERE id = ?1",
            params![
                id,
                to_json(&record.answers)?,
                record.is_completed,
                now_timestamp()
            ],
        )?;
        find(&conn, user_id, id)
    }

    pub fn update_thinking_summary(
        &self,
        user_id: i64,
        id: i64,
        summary: &str,
        insights: &str,
    ) -> Result<ThinkingRecord> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE thinking_records SET summary = ?3, insights = ?4, updated_at = ?5
             WHERE id = ?1 AND user_id = ?2",
            params![id, user_id, summary, insights, now_timestamp()],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound("thinking record"));
        }
        find(&conn, user_id, id)
    }

    /// Mark a session finished, adding `time_spent` minutes when positive
    pub fn complete_thinking_record(
        &self,
        user_id: i64,
        id: i64,
        time_spent: i64,
    ) -> Result<ThinkingRecord> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE thinking_records
             SET is_completed = 1, total_time_spent = total_time_spent + ?3, updated_at = ?4
             WHERE id = ?1 AND user_id = ?2",
            params![id, user_id, time_spent.max(0), now_timestamp()],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound("thinking record"));
        }
        find(&conn, user_id, id)
    }

    pub fn delete_thinking_record(&self, user_id: i64, id: i64) -> Result<()> {
        let changed = self.conn().execute(
            "DELETE FROM thinking_records WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound("thinking record"));
        }
        tracing::info!(user_id, id, "Thinking record deleted");
        Ok(())
    }

    /// Usage over all sessions; `recent_records` counts those created in the
    /// last `days` days.
    pub fn thinking_stats(
        &self,
        user_id: i64,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<ThinkingStats> {
        let since = format_timestamp(now - Duration::days(i64::from(days)));
        let conn = self.conn();

        let (total_records, completed_records, recent_records, total_time_spent): (
            i64,
            i64,
            i64,
            i64,
        ) = conn.query_row(
            r#"SELECT COUNT(*),
                      COALESCE(SUM(is_completed), 0),
                      COALESCE(SUM(created_at >= ?2), 0),
                      COALESCE(SUM(total_time_spent), 0)
               FROM thinking_records WHERE user_id = ?1"#,
            params![user_id, since],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        let mut stmt = conn.prepare(
            "SELECT template_name, COUNT(*) FROM thinking_records WHERE user_id = ?1
             GROUP BY template_name ORDER BY COUNT(*) DESC, template_name",
        )?;
        let template_usage = stmt
            .query_map(params![user_id], |row| {
                Ok(TemplateUsage {
                    template_name: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ThinkingStats {
            total_records,
            completed_records,
            completion_rate: if total_records > 0 {
                round1(completed_records as f64 / total_records as f64 * 100.0)
            } else {
                0.0
            },
            recent_records,
            total_time_spent,
            average_time_per_record: if completed_records > 0 {
                round1(total_time_spent as f64 / completed_records as f64)
            } else {
                0.0
            },
            template_usage,
        })
    }
}
