//! Table statistics for administrators

use serde::Serialize;

use super::Database;
use crate::error::Result;

/// Row counts per table, for the admin overview
#[derive(Debug, Clone, Serialize)]
pub struct TableCounts {
    pub records: i64,
    pub deleted_records: i64,
    pub info_resources: i64,
    pub pomodoro_tasks: i64,
    pub thinking_records: i64,
    pub reminders: i64,
    pub users: i64,
}

impl Database {
    pub fn table_counts(&self) -> Result<TableCounts> {
        let conn = self.conn();
        let counts = conn.query_row(
            r#"SELECT
                (SELECT COUNT(*) FROM records WHERE status != 'deleted'),
                (SELECT COUNT(*) FROM records WHERE status = 'deleted'),
                (SELECT COUNT(*) FROM info_resources WHERE status != 'deleted'),
                (SELECT COUNT(*) FROM pomodoro_tasks),
                (SELECT COUNT(*) FROM thinking_records),
                (SELECT COUNT(*) FROM reminders WHERE status != 'deleted'),
                (SELECT COUNT(DISTINCT user_id) FROM (
                    SELECT user_id FROM records
                    UNION SELECT user_id FROM info_resources
                    UNION SELECT user_id FROM pomodoro_tasks
                    UNION SELECT user_id FROM thinking_records
                    UNION SELECT user_id FROM reminders
                ))"#,
            [],
            |row| {
                Ok(TableCounts {
                    records: row.get(0)?,
                    deleted_records: row.get(1)?,
                    info_resources: row.get(2)?,
                    pomodoro_tasks: row.get(3)?,
                    thinking_records: row.get(4)?,
                    reminders: row.get(5)?,
                    users: row.get(6)?,
                })
            },
        )?;
        Ok(counts)
    }
}
