//! Weekly report: window arithmetic, bucketing of task records and the
//! plain-text task summary.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Priority, Record, RecordStatus, format_timestamp, parse_timestamp};

/// Tasks not touched for longer than this are stagnant
const STAGNANT_AFTER_DAYS: i64 = 7;
/// Deletions this soon after creation count as churn
const QUICK_DELETE_DAYS: i64 = 3;
/// Status changes this soon after creation count as churn
const QUICK_CHANGE_DAYS: i64 = 7;
/// Reports reach at most ten years into the past or future
pub const MAX_WEEK_OFFSET: i64 = 520;

/// Monday 00:00:00 to Sunday 23:59:59 UTC of the week `offset` weeks away
/// from the one containing `now`. `offset` is clamped to `MAX_WEEK_OFFSET`.
pub fn week_window(now: DateTime<Utc>, offset: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = offset.clamp(-MAX_WEEK_OFFSET, MAX_WEEK_OFFSET);
    let today = now.date_naive();
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let start = monday.and_time(NaiveTime::MIN).and_utc() + Duration::weeks(offset);
    let end = start + Duration::days(7) - Duration::seconds(1);
    (start, end)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekInfo {
    pub start_date: String,
    pub end_date: String,
    pub week_offset: i64,
    pub is_current_week: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagnantTask {
    pub task: Record,
    pub days_stagnant: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_new: usize,
    pub total_completed: usize,
    pub total_status_changed: usize,
    pub total_deleted: usize,
    pub stagnant_high_priority_count: usize,
    pub frequent_changes_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub week_info: WeekInfo,
    pub task_type_filter: String,
    pub new_tasks: Vec<Record>,
    pub completed_tasks: Vec<Record>,
    pub status_changed_tasks: Vec<Record>,
    pub deleted_tasks: Vec<Record>,
    pub stagnant_high_priority: Vec<StagnantTask>,
    pub frequent_changes: Vec<Record>,
    pub summary: ReportSummary,
}

/// Sort task records into the report buckets.
///
/// `records` are the caller's task records, deleted ones included. Records
/// whose timestamps do not parse are ignored.
pub fn build_weekly_report(
    records: Vec<Record>,
    now: DateTime<Utc>,
    week_offset: i64,
    task_type_filter: &str,
) -> WeeklyReport {
    let (start, end) = week_window(now, week_offset);
    let in_window = |ts: DateTime<Utc>| ts >= start && ts <= end;

    let mut report = WeeklyReport {
        week_info: WeekInfo {
            start_date: format_timestamp(start),
            end_date: format_timestamp(end),
            week_offset,
            is_current_week: week_offset == 0,
        },
        task_type_filter: task_type_filter.to_string(),
        new_tasks: Vec::new(),
        completed_tasks: Vec::new(),
        status_changed_tasks: Vec::new(),
        deleted_tasks: Vec::new(),
        stagnant_high_priority: Vec::new(),
        frequent_changes: Vec::new(),
        summary: ReportSummary::default(),
    };

    for record in records {
        let (Some(created), Some(updated)) = (
            parse_timestamp(&record.created_at),
            parse_timestamp(&record.updated_at),
        ) else {
            continue;
        };
        let age_days = (now - created).num_days();

        if record.status == RecordStatus::Deleted {
            if in_window(updated) {
                if (0..=QUICK_DELETE_DAYS).contains(&age_days) {
                    report.frequent_changes.push(record.clone());
                }
                report.deleted_tasks.push(record);
            }
            continue;
        }

        if record.priority.is_high()
            && matches!(record.status, RecordStatus::Active | RecordStatus::Paused)
        {
            let days_stagnant = (now - updated).num_days();
            if days_stagnant > STAGNANT_AFTER_DAYS {
                report.stagnant_high_priority.push(StagnantTask {
                    task: record.clone(),
                    days_stagnant,
                });
            }
        }

        if in_window(created) {
            report.new_tasks.push(record.clone());
        }
        if !in_window(updated) {
            continue;
        }
        match record.status {
            RecordStatus::Completed => report.completed_tasks.push(record),
            RecordStatus::Active
            | RecordStatus::Paused
            | RecordStatus::Cancelled
            | RecordStatus::Archived
                if created < start =>
            {
                if (0..=QUICK_CHANGE_DAYS).contains(&age_days) {
                    report.frequent_changes.push(record.clone());
                }
                report.status_changed_tasks.push(record);
            }
            _ => {}
        }
    }

    report.summary = ReportSummary {
        total_new: report.new_tasks.len(),
        total_completed: report.completed_tasks.len(),
        total_status_changed: report.status_changed_tasks.len(),
        total_deleted: report.deleted_tasks.len(),
        stagnant_high_priority_count: report.stagnant_high_priority.len(),
        frequent_changes_count: report.frequent_changes.len(),
    };
    report
}

/// The part of a task the summary needs. Lenient so that a report posted
/// back by a client deserializes even when it carries extra fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryTask {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub subtask_count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryInput {
    #[serde(default)]
    pub completed_tasks: Vec<SummaryTask>,
    #[serde(default)]
    pub new_tasks: Vec<SummaryTask>,
}

/// Two headed paragraphs: what was finished and what was started this week,
/// high-priority starts first.
pub fn basic_summary(input: &SummaryInput) -> String {
    let completed: Vec<String> = input
        .completed_tasks
        .iter()
        .map(|task| match task.subtask_count {
            0 => format!("Completed \"{}\"", task.content),
            1 => format!("Completed \"{}\" (with 1 subtask)", task.content),
            n => format!("Completed \"{}\" (with {n} subtasks)", task.content),
        })
        .collect();

    let mut started: Vec<(Priority, &SummaryTask)> = input
        .new_tasks
        .iter()
        .map(|task| {
            let priority = task
                .priority
                .as_deref()
                .and_then(Priority::parse)
                .unwrap_or_default();
            (priority, task)
        })
        .collect();
    started.sort_by_key(|(priority, _)| priority.rank());
    let started: Vec<String> = started
        .into_iter()
        .map(|(priority, task)| {
            if priority.is_high() {
                format!("Started high-priority task \"{}\"", task.content)
            } else {
                format!("Started \"{}\"", task.content)
            }
        })
        .collect();

    format!(
        "{}\n\n{}",
        paragraph("Completed this week", &completed),
        paragraph("Started this week", &started)
    )
}

fn paragraph(heading: &str, items: &[String]) -> String {
    if items.is_empty() {
        format!("**{heading}:**\nNone")
    } else {
        format!("**{heading}:**\n{}.", items.join("; "))
    }
}

/// A headed block of free text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub heading: Option<String>,
    pub body: String,
}

/// Split loosely formatted text into headed sections.
///
/// Headings are lines of the form `**Heading:**`, `## Heading` or
/// `1. **Heading**`; anything after the closing `**` on the same line starts
/// the body. Text before the first heading becomes an untitled section.
pub fn parse_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section {
        heading: None,
        body: String::new(),
    };

    for line in text.lines() {
        if let Some((heading, rest)) = heading_line(line.trim()) {
            push_section(&mut sections, current);
            current = Section {
                heading: Some(heading),
                body: rest,
            };
        } else {
            if !current.body.is_empty() {
                current.body.push('\n');
            }
            current.body.push_str(line.trim_end());
        }
    }
    push_section(&mut sections, current);
    sections
}

fn push_section(sections: &mut Vec<Section>, mut section: Section) {
    section.body = section.body.trim().to_string();
    if section.heading.is_some() || !section.body.is_empty() {
        sections.push(section);
    }
}

fn heading_line(line: &str) -> Option<(String, String)> {
    if let Some(rest) = line.strip_prefix('#') {
        let title = rest.trim_start_matches('#');
        if title.starts_with(' ') && !title.trim().is_empty() {
            return Some((clean_heading(title), String::new()));
        }
        return None;
    }

    let bold = match line.find(". **") {
        Some(dot) if dot > 0 && line[..dot].chars().all(|c| c.is_ascii_digit()) => {
            &line[dot + 2..]
        }
        _ => line,
    };
    let inner = bold.strip_prefix("**")?;
    let close = inner.find("**")?;
    let heading = clean_heading(&inner[..close]);
    if heading.is_empty() {
        return None;
    }
    let rest = inner[close + 2..].trim_start_matches([':', '：']).trim();
    Some((heading, rest.to_string()))
}

fn clean_heading(raw: &str) -> String {
    raw.trim().trim_end_matches([':', '：']).trim().to_string()
}
