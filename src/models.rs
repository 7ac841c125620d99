//! Domain models and API payloads
//!
//! Uses String timestamps (RFC 3339, UTC, millisecond precision) so that
//! lexical order in SQLite equals chronological order.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AppError, Result};

/// Maximum length of a record's content
pub const MAX_CONTENT_LEN: usize = 5000;
/// Maximum length of a record's progress notes
pub const MAX_NOTES_LEN: usize = 10000;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_RESOURCE_CONTENT_LEN: usize = 10000;
pub const MAX_REMINDER_LEN: usize = 500;

/// Declares a lowercase string-backed enum with `as_str`/`parse` helpers.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? } default $default:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $(
                #[doc = $text]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const DEFAULT: $name = $name::$default;

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::DEFAULT
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// What kind of capture a record is
    Category { Idea => "idea", Task => "task", Note => "note", General => "general" } default General
}

string_enum! {
    /// Priority level for records
    Priority { Low => "low", Medium => "medium", High => "high", Urgent => "urgent" } default Medium
}

string_enum! {
    /// Lifecycle of a record
    RecordStatus {
        Active => "active",
        Completed => "completed",
        Paused => "paused",
        Cancelled => "cancelled",
        Archived => "archived",
        Deleted => "deleted",
    } default Active
}

string_enum! {
    /// Area of life a task belongs to
    TaskType { Work => "work", Hobby => "hobby", Life => "life" } default Work
}

string_enum! {
    ResourceType {
        General => "general",
        Article => "article",
        Bookmark => "bookmark",
        Note => "note",
        Reference => "reference",
        Tutorial => "tutorial",
        Other => "other",
    } default General
}

string_enum! {
    /// How often a reminder fires
    ReminderFrequency { Daily => "daily", Weekly => "weekly", Weekdays => "weekdays" } default Daily
}

string_enum! {
    ReminderStatus { Active => "active", Paused => "paused", Deleted => "deleted" } default Active
}

string_enum! {
    ResourceStatus { Active => "active", Archived => "archived", Deleted => "deleted" } default Active
}

string_enum! {
    /// Execution state of a pomodoro task
    PomodoroStatus {
        Pending => "pending",
        Active => "active",
        Completed => "completed",
        Skipped => "skipped",
    } default Pending
}

impl Priority {
    /// Score used when a record is promoted to a pomodoro task
    pub fn pomodoro_score(self) -> i64 {
        match self {
            Priority::Urgent => 90,
            Priority::High => 75,
            Priority::Medium => 50,
            Priority::Low => 25,
        }
    }

    /// Sort rank, most pressing first
    pub fn rank(self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn is_high(self) -> bool {
        matches!(self, Priority::High | Priority::Urgent)
    }
}

// ---------------------------------------------------------------------------
// Timestamps

pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Calendar date as `YYYY-MM-DD`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Random 48-bit identifier in `[2^47, 2^48)`, hard to enumerate
pub fn random_id() -> i64 {
    use rand::Rng;
    rand::rng().random_range((1i64 << 47)..(1i64 << 48))
}

// ---------------------------------------------------------------------------
// Records

/// A task / quick-capture entry, optionally nested under a parent task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub content: String,
    pub category: Category,
    pub parent_id: Option<i64>,
    pub user_id: Option<i64>,
    pub priority: Priority,
    pub progress: i64,
    pub progress_notes: Option<String>,
    pub status: RecordStatus,
    pub task_type: TaskType,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub subtask_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<Record>>,
}

impl Record {
    pub fn is_task(&self) -> bool {
        self.category == Category::Task
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRecord {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
}

/// Validated form of [`NewRecord`]
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub content: String,
    pub category: Category,
    pub parent_id: Option<i64>,
    pub priority: Priority,
    pub task_type: TaskType,
}

impl NewRecord {
    /// Validates content; unknown categories fall back to `general`.
    pub fn validate(self) -> Result<RecordDraft> {
        let content = validate_content(&self.content)?;
        let priority = match self.priority.as_deref() {
            None => Priority::DEFAULT,
            Some(p) => {
                Priority::parse(p).ok_or_else(|| AppError::validation("invalid priority"))?
            }
        };
        let task_type = match self.task_type.as_deref() {
            None => TaskType::DEFAULT,
            Some(t) => {
                TaskType::parse(t).ok_or_else(|| AppError::validation("invalid task type"))?
            }
        };
        Ok(RecordDraft {
            content,
            category: self
                .category
                .as_deref()
                .and_then(Category::parse)
                .unwrap_or(Category::DEFAULT),
            parent_id: self.parent_id,
            priority,
            task_type,
        })
    }
}

fn validate_content(raw: &str) -> Result<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::validation("content must not be empty"));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(AppError::validation(format!(
            "content must not exceed {MAX_CONTENT_LEN} characters"
        )));
    }
    Ok(content.to_string())
}

/// Partial update of a record. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordUpdate {
    pub content: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub progress_notes: Option<String>,
    pub progress: Option<i64>,
    pub task_type: Option<String>,
    pub category: Option<String>,
}

/// Validated form of [`RecordUpdate`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordChanges {
    pub content: Option<String>,
    pub status: Option<RecordStatus>,
    pub priority: Option<Priority>,
    pub progress_notes: Option<String>,
    pub progress: Option<i64>,
    pub task_type: Option<TaskType>,
    pub category: Option<Category>,
}

impl RecordUpdate {
    pub fn validate(self) -> Result<RecordChanges> {
        let content = self.content.as_deref().map(validate_content).transpose()?;
        let status = self
            .status
            .as_deref()
            .map(|s| RecordStatus::parse(s).ok_or_else(|| AppError::validation("invalid status")))
            .transpose()?;
        let priority = self
            .priority
            .as_deref()
            .map(|p| Priority::parse(p).ok_or_else(|| AppError::validation("invalid priority")))
            .transpose()?;
        let task_type = self
            .task_type
            .as_deref()
            .map(|t| TaskType::parse(t).ok_or_else(|| AppError::validation("invalid task type")))
            .transpose()?;
        let category = self
            .category
            .as_deref()
            .map(|c| Category::parse(c).ok_or_else(|| AppError::validation("invalid category")))
            .transpose()?;
        if let Some(notes) = &self.progress_notes
            && notes.chars().count() > MAX_NOTES_LEN
        {
            return Err(AppError::validation(format!(
                "progress notes must not exceed {MAX_NOTES_LEN} characters"
            )));
        }
        if let Some(progress) = self.progress
            && !(0..=100).contains(&progress)
        {
            return Err(AppError::validation("progress must be between 0 and 100"));
        }

        Ok(RecordChanges {
            content,
            status,
            priority,
            progress_notes: self.progress_notes,
            progress: self.progress,
            task_type,
            category,
        })
    }
}

/// Query string of `GET /api/records`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub task_type: String,
    #[serde(default)]
    pub include_subtasks: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubtask {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl NewSubtask {
    /// Subtasks default to the `task` category, also for unknown values
    pub fn validate(self) -> Result<(String, Category)> {
        let content = validate_content(&self.content)?;
        let category = self
            .category
            .as_deref()
            .and_then(Category::parse)
            .unwrap_or(Category::Task);
        Ok((content, category))
    }
}

/// A subtask proposed by an assistant, as posted by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskSuggestion {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl SubtaskSuggestion {
    /// Content of the created subtask: `title - description`
    pub fn content(&self) -> String {
        match self.description.as_deref().map(str::trim) {
            Some(desc) if !desc.is_empty() => format!("{} - {}", self.title.trim(), desc),
            _ => self.title.trim().to_string(),
        }
    }

    /// Assistant priorities only use low/medium/high
    pub fn priority(&self) -> Priority {
        match self.priority.as_deref() {
            Some("high") => Priority::High,
            Some("low") => Priority::Low,
            _ => Priority::Medium,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_priority: BTreeMap<String, i64>,
    pub by_task_type: BTreeMap<String, i64>,
}

/// One page of a listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn pages(&self) -> i64 {
        let per_page = i64::from(self.per_page.max(1));
        (self.total + per_page - 1) / per_page
    }
}

/// Clamp pagination parameters: page >= 1, per_page in 1..=100 (default 20)
pub fn page_bounds(page: Option<u32>, per_page: Option<u32>) -> (u32, u32) {
    (page.unwrap_or(1).max(1), per_page.unwrap_or(20).clamp(1, 100))
}

// ---------------------------------------------------------------------------
// Info resources

/// A saved reference document, distinct from actionable tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResource {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub resource_type: ResourceType,
    pub user_id: Option<i64>,
    pub status: ResourceStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewResource {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResourceDraft {
    pub title: String,
    pub content: String,
    pub resource_type: ResourceType,
}

fn validate_title(raw: &str) -> Result<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::validation(format!(
            "title must not exceed {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_resource_content(raw: &str) -> Result<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::validation("content must not be empty"));
    }
    if content.chars().count() > MAX_RESOURCE_CONTENT_LEN {
        return Err(AppError::validation(format!(
            "content must not exceed {MAX_RESOURCE_CONTENT_LEN} characters"
        )));
    }
    Ok(content.to_string())
}

impl NewResource {
    pub fn validate(self) -> Result<ResourceDraft> {
        Ok(ResourceDraft {
            title: validate_title(&self.title)?,
            content: validate_resource_content(&self.content)?,
            resource_type: self
                .resource_type
                .as_deref()
                .and_then(ResourceType::parse)
                .unwrap_or(ResourceType::DEFAULT),
        })
    }
}

/// Partial update of an info resource. Unknown type/status values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub resource_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub resource_type: Option<ResourceType>,
    pub status: Option<ResourceStatus>,
}

impl ResourceUpdate {
    pub fn validate(self) -> Result<ResourceChanges> {
        Ok(ResourceChanges {
            title: self.title.as_deref().map(validate_title).transpose()?,
            content: self
                .content
                .as_deref()
                .map(validate_resource_content)
                .transpose()?,
            resource_type: self.resource_type.as_deref().and_then(ResourceType::parse),
            status: self.status.as_deref().and_then(ResourceStatus::parse),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub status: String,
}

/// Summary over the caller's whole resource library
#[derive(Debug, Clone, Serialize)]
pub struct ResourceStats {
    pub total: i64,
    pub active: i64,
    pub archived: i64,
    pub by_type: BTreeMap<String, i64>,
    pub this_week: i64,
}

// ---------------------------------------------------------------------------
// Pomodoro

/// A time-boxed focus unit tracked against a countdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroTask {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub related_task_ids: Vec<i64>,
    pub priority_score: i64,
    pub estimated_pomodoros: i64,
    pub order_index: i64,
    pub status: PomodoroStatus,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub pomodoros_completed: i64,
    pub total_focus_time: i64,
    pub generation_context: Option<String>,
    pub ai_reasoning: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PomodoroAction {
    Start,
    Complete { focus_minutes: i64 },
    Skip,
    Reset,
}

impl PomodoroAction {
    pub fn name(self) -> &'static str {
        match self {
            PomodoroAction::Start => "start",
            PomodoroAction::Complete { .. } => "complete",
            PomodoroAction::Skip => "skip",
            PomodoroAction::Reset => "reset",
        }
    }
}

impl PomodoroTask {
    /// Apply a state transition in place.
    ///
    /// `pending -> active -> {completed | skipped}`, `pending -> skipped`,
    /// and `reset` from any non-pending state. The single-active rule is
    /// checked by the caller, which can see the other tasks.
    pub fn apply(&mut self, action: PomodoroAction, now: &str) -> Result<()> {
        use PomodoroStatus::*;

        let invalid = || AppError::InvalidTransition {
            action: action.name(),
            from: self.status.as_str(),
        };

        match (action, self.status) {
            (PomodoroAction::Start, Pending) => {
                self.status = Active;
                self.started_at = Some(now.to_string());
            }
            (PomodoroAction::Complete { focus_minutes }, Active) => {
                self.pomodoros_completed = self.pomodoros_completed.saturating_add(1);
                self.total_focus_time =
                    self.total_focus_time.saturating_add(focus_minutes.max(0));
                if self.pomodoros_completed >= self.estimated_pomodoros {
                    self.status = Completed;
                    self.completed_at = Some(now.to_string());
                }
            }
            (PomodoroAction::Skip, Pending | Active) => {
                self.status = Skipped;
            }
            (PomodoroAction::Reset, Active | Completed | Skipped) => {
                self.status = Pending;
                self.started_at = None;
                self.completed_at = None;
                self.pomodoros_completed = 0;
                self.total_focus_time = 0;
            }
            _ => return Err(invalid()),
        }

        self.updated_at = now.to_string();
        Ok(())
    }

    pub fn progress_percentage(&self) -> i64 {
        if self.estimated_pomodoros <= 0 {
            return 0;
        }
        (self.pomodoros_completed * 100 / self.estimated_pomodoros).min(100)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPomodoroTask {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub related_task_ids: Vec<i64>,
    #[serde(default)]
    pub priority_score: Option<i64>,
    #[serde(default)]
    pub estimated_pomodoros: Option<i64>,
    #[serde(default)]
    pub ai_reasoning: Option<String>,
}

impl NewPomodoroTask {
    pub fn validate(mut self) -> Result<Self> {
        self.title = validate_title(&self.title)?;
        if let Some(score) = self.priority_score
            && !(0..=100).contains(&score)
        {
            return Err(AppError::validation("priority_score must be between 0 and 100"));
        }
        if let Some(estimate) = self.estimated_pomodoros
            && estimate < 1
        {
            return Err(AppError::validation("estimated_pomodoros must be at least 1"));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PomodoroTotals {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub active_tasks: i64,
    pub pending_tasks: i64,
    pub skipped_tasks: i64,
    pub total_pomodoros: i64,
    pub total_focus_time: i64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PomodoroToday {
    pub today_completed_tasks: i64,
    pub today_pomodoros: i64,
    pub today_focus_time: i64,
    pub today_focus_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PomodoroStats {
    pub total_stats: PomodoroTotals,
    pub today_stats: PomodoroToday,
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Thinking records

/// A structured-thinking session driven by a question template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingRecord {
    pub id: i64,
    pub user_id: i64,
    pub template_id: String,
    pub template_name: String,
    pub title: String,
    pub questions: Vec<String>,
    pub answers: BTreeMap<String, String>,
    pub is_completed: bool,
    pub total_time_spent: i64,
    pub tags: Vec<String>,
    pub summary: String,
    pub insights: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ThinkingRecord {
    pub fn answered(&self) -> usize {
        self.answers.values().filter(|a| !a.trim().is_empty()).count()
    }

    /// Fraction of questions with a non-blank answer, 0.0..=1.0
    pub fn completion_rate(&self) -> f64 {
        if self.questions.is_empty() {
            return 0.0;
        }
        self.answered() as f64 / self.questions.len() as f64
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewThinkingRecord {
    pub template_id: String,
    pub template_name: String,
    pub questions: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateUsage {
    pub template_name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThinkingStats {
    pub total_records: i64,
    pub completed_records: i64,
    pub completion_rate: f64,
    pub recent_records: i64,
    pub total_time_spent: i64,
    pub average_time_per_record: f64,
    pub template_usage: Vec<TemplateUsage>,
}

// ---------------------------------------------------------------------------
// Reminders

/// A recurring nudge at a fixed UTC time of day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    pub user_id: Option<i64>,
    pub content: String,
    pub frequency: ReminderFrequency,
    /// 0 = Monday .. 6 = Sunday, set only for weekly reminders
    pub day_of_week: Option<u32>,
    /// `HH:MM`, UTC
    pub remind_time: String,
    pub status: ReminderStatus,
    pub last_triggered_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Reminder {
    /// Whether the reminder should fire at `now` and has not been
    /// acknowledged yet today.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.status != ReminderStatus::Active {
            return false;
        }
        let today = now.date_naive();
        if self.last_triggered_date.as_deref() == Some(format_date(today).as_str()) {
            return false;
        }

        let weekday = today.weekday().num_days_from_monday();
        let day_matches = match self.frequency {
            ReminderFrequency::Daily => true,
            ReminderFrequency::Weekdays => weekday < 5,
            ReminderFrequency::Weekly => self.day_of_week == Some(weekday),
        };
        day_matches && parse_remind_time(&self.remind_time).is_some_and(|at| now.time() >= at)
    }
}

/// Strict `HH:MM` parse
fn parse_remind_time(raw: &str) -> Option<NaiveTime> {
    if raw.len() != 5 {
        return None;
    }
    NaiveTime::parse_from_str(raw, "%H:%M").ok()
}

fn validate_remind_time(raw: &str) -> Result<String> {
    let raw = raw.trim();
    parse_remind_time(raw)
        .map(|_| raw.to_string())
        .ok_or_else(|| AppError::validation("remind_time must be HH:MM (UTC)"))
}

fn validate_reminder_content(raw: &str) -> Result<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::validation("content must not be empty"));
    }
    if content.chars().count() > MAX_REMINDER_LEN {
        return Err(AppError::validation(format!(
            "content must not exceed {MAX_REMINDER_LEN} characters"
        )));
    }
    Ok(content.to_string())
}

fn parse_frequency(raw: &str) -> Result<ReminderFrequency> {
    ReminderFrequency::parse(raw).ok_or_else(|| AppError::validation("invalid frequency"))
}

fn validate_day_of_week(day: i64) -> Result<u32> {
    u32::try_from(day)
        .ok()
        .filter(|day| *day <= 6)
        .ok_or_else(|| AppError::validation("day_of_week must be between 0 and 6"))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewReminder {
    #[serde(default)]
    pub content: String,
    pub frequency: Option<String>,
    pub day_of_week: Option<i64>,
    #[serde(default)]
    pub remind_time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReminderDraft {
    pub content: String,
    pub frequency: ReminderFrequency,
    pub day_of_week: Option<u32>,
    pub remind_time: String,
}

impl NewReminder {
    /// Weekly reminders need a day; other frequencies drop it.
    pub fn validate(self) -> Result<ReminderDraft> {
        let content = validate_reminder_content(&self.content)?;
        let frequency = self
            .frequency
            .as_deref()
            .map(parse_frequency)
            .transpose()?
            .unwrap_or_default();
        let day_of_week = match frequency {
            ReminderFrequency::Weekly => Some(validate_day_of_week(self.day_of_week.ok_or_else(
                || AppError::validation("weekly reminders need a day_of_week (0-6)"),
            )?)?),
            _ => None,
        };
        Ok(ReminderDraft {
            content,
            frequency,
            day_of_week,
            remind_time: validate_remind_time(&self.remind_time)?,
        })
    }
}

/// Partial update of a reminder
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReminderUpdate {
    pub content: Option<String>,
    pub frequency: Option<String>,
    pub day_of_week: Option<i64>,
    pub remind_time: Option<String>,
    pub status: Option<String>,
}

impl ReminderUpdate {
    /// Validate and apply onto `reminder`. Leaving the weekly frequency
    /// clears the day; `day_of_week` only applies to weekly reminders.
    pub fn apply(self, reminder: &mut Reminder) -> Result<()> {
        if let Some(content) = &self.content {
            reminder.content = validate_reminder_content(content)?;
        }
        if let Some(frequency) = &self.frequency {
            reminder.frequency = parse_frequency(frequency)?;
            if reminder.frequency != ReminderFrequency::Weekly {
                reminder.day_of_week = None;
            }
        }
        if let Some(day) = self.day_of_week
            && reminder.frequency == ReminderFrequency::Weekly
        {
            reminder.day_of_week = Some(validate_day_of_week(day)?);
        }
        if reminder.frequency == ReminderFrequency::Weekly && reminder.day_of_week.is_none() {
            return Err(AppError::validation(
                "weekly reminders need a day_of_week (0-6)",
            ));
        }
        if let Some(remind_time) = &self.remind_time {
            reminder.remind_time = validate_remind_time(remind_time)?;
        }
        if let Some(status) = &self.status {
            reminder.status = ReminderStatus::parse(status)
                .ok_or_else(|| AppError::validation("invalid status"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderQuery {
    #[serde(default)]
    pub search: String,
    /// `all` or empty lists everything but deleted reminders
    #[serde(default = "default_reminder_filter")]
    pub status: String,
}

impl Default for ReminderQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: default_reminder_filter(),
        }
    }
}

fn default_reminder_filter() -> String {
    ReminderStatus::Active.as_str().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pomodoro(status: PomodoroStatus, estimated: i64) -> PomodoroTask {
        PomodoroTask {
            id: 1,
            user_id: 7,
            title: "Write report".to_string(),
            description: None,
            related_task_ids: Vec::new(),
            priority_score: 50,
            estimated_pomodoros: estimated,
            order_index: 0,
            status,
            started_at: None,
            completed_at: None,
            pomodoros_completed: 0,
            total_focus_time: 0,
            generation_context: None,
            ai_reasoning: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    const NOW: &str = "2026-01-02T09:00:00.000Z";

    #[test]
    fn start_then_complete_single_estimate() {
        let mut task = pomodoro(PomodoroStatus::Pending, 1);
        task.apply(PomodoroAction::Start, NOW).unwrap();
        assert_eq!(task.status, PomodoroStatus::Active);
        assert_eq!(task.started_at.as_deref(), Some(NOW));

        task.apply(PomodoroAction::Complete { focus_minutes: 25 }, NOW)
            .unwrap();
        assert_eq!(task.status, PomodoroStatus::Completed);
        assert_eq!(task.pomodoros_completed, 1);
        assert_eq!(task.total_focus_time, 25);
        assert_eq!(task.progress_percentage(), 100);
    }

    #[test]
    fn complete_keeps_active_until_estimate_reached() {
        let mut task = pomodoro(PomodoroStatus::Active, 3);
        task.apply(PomodoroAction::Complete { focus_minutes: 25 }, NOW)
            .unwrap();
        assert_eq!(task.status, PomodoroStatus::Active);
        assert_eq!(task.progress_percentage(), 33);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn focus_time_saturates() {
        let mut task = pomodoro(PomodoroStatus::Active, 3);
        task.total_focus_time = i64::MAX - 10;
        task.apply(PomodoroAction::Complete { focus_minutes: 25 }, NOW)
            .unwrap();
        assert_eq!(task.total_focus_time, i64::MAX);
        assert_eq!(task.pomodoros_completed, 1);
    }

    #[test]
    fn reset_clears_counters() {
        let mut task = pomodoro(PomodoroStatus::Active, 2);
        task.apply(PomodoroAction::Complete { focus_minutes: 30 }, NOW)
            .unwrap();
        task.apply(PomodoroAction::Reset, NOW).unwrap();
        assert_eq!(task.status, PomodoroStatus::Pending);
        assert_eq!(task.pomodoros_completed, 0);
        assert_eq!(task.total_focus_time, 0);
        assert!(task.started_at.is_none());
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let cases = [
            (PomodoroStatus::Active, PomodoroAction::Start),
            (PomodoroStatus::Completed, PomodoroAction::Start),
            (PomodoroStatus::Pending, PomodoroAction::Complete { focus_minutes: 25 }),
            (PomodoroStatus::Skipped, PomodoroAction::Skip),
            (PomodoroStatus::Pending, PomodoroAction::Reset),
        ];
        for (status, action) in cases {
            let mut task = pomodoro(status, 1);
            let err = task.apply(action, NOW).unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition { .. }));
            assert_eq!(task.status, status, "{action:?} must not change state");
        }
    }

    #[test]
    fn new_record_falls_back_to_general_category() {
        let draft = NewRecord {
            content: "  buy milk  ".to_string(),
            category: Some("shopping".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(draft.content, "buy milk");
        assert_eq!(draft.category, Category::General);
        assert_eq!(draft.priority, Priority::Medium);
    }

    #[test]
    fn new_record_rejects_blank_and_oversized_content() {
        let blank = NewRecord {
            content: "   ".to_string(),
            ..Default::default()
        };
        assert!(blank.validate().is_err());

        let huge = NewRecord {
            content: "x".repeat(MAX_CONTENT_LEN + 1),
            ..Default::default()
        };
        assert!(huge.validate().is_err());
    }

    #[test]
    fn record_update_validates_each_field() {
        let bad_status = RecordUpdate {
            status: Some("done".to_string()),
            ..Default::default()
        };
        assert!(bad_status.validate().is_err());

        let bad_progress = RecordUpdate {
            progress: Some(101),
            ..Default::default()
        };
        assert!(bad_progress.validate().is_err());

        let long_notes = RecordUpdate {
            progress_notes: Some("n".repeat(MAX_NOTES_LEN + 1)),
            ..Default::default()
        };
        assert!(long_notes.validate().is_err());

        let ok = RecordUpdate {
            status: Some("paused".to_string()),
            priority: Some("urgent".to_string()),
            progress: Some(40),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(ok.status, Some(RecordStatus::Paused));
        assert_eq!(ok.priority, Some(Priority::Urgent));
        assert_eq!(ok.progress, Some(40));
    }

    #[test]
    fn suggestion_content_joins_title_and_description() {
        let suggestion = SubtaskSuggestion {
            title: "Draft outline".to_string(),
            description: Some("three sections".to_string()),
            priority: Some("critical".to_string()),
            estimated_time: None,
            dependencies: Vec::new(),
        };
        assert_eq!(suggestion.content(), "Draft outline - three sections");
        assert_eq!(suggestion.priority(), Priority::Medium);
    }

    #[test]
    fn random_ids_have_48_bits() {
        for _ in 0..100 {
            let id = random_id();
            assert!(id >= 1 << 47 && id < 1 << 48);
        }
    }

    #[test]
    fn pages_round_up() {
        let page: Page<()> = Page {
            items: Vec::new(),
            total: 41,
            page: 1,
            per_page: 20,
        };
        assert_eq!(page.pages(), 3);
        assert_eq!(page_bounds(Some(0), Some(500)), (1, 100));
        assert_eq!(page_bounds(None, None), (1, 20));
    }

    #[test]
    fn thinking_completion_rate_ignores_blank_answers() {
        let record = ThinkingRecord {
            id: 1,
            user_id: 1,
            template_id: "5whys".to_string(),
            template_name: "Five whys".to_string(),
            title: "t".to_string(),
            questions: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            answers: BTreeMap::from([
                ("0".to_string(), "because".to_string()),
                ("1".to_string(), "   ".to_string()),
            ]),
            is_completed: false,
            total_time_spent: 0,
            tags: Vec::new(),
            summary: String::new(),
            insights: String::new(),
            created_at: NOW.to_string(),
            updated_at: NOW.to_string(),
        };
        assert_eq!(record.answered(), 1);
        assert!((record.completion_rate() - 0.25).abs() < f64::EPSILON);
    }

    fn reminder(frequency: ReminderFrequency, day: Option<u32>, at: &str) -> Reminder {
        Reminder {
            id: 1,
            user_id: None,
            content: "Stretch".to_string(),
            frequency,
            day_of_week: day,
            remind_time: at.to_string(),
            status: ReminderStatus::Active,
            last_triggered_date: None,
            created_at: NOW.to_string(),
            updated_at: NOW.to_string(),
        }
    }

    fn utc(value: &str) -> DateTime<Utc> {
        parse_timestamp(value).unwrap()
    }

    #[test]
    fn daily_reminder_is_due_after_its_time_until_acknowledged() {
        // 2026-03-11 is a Wednesday
        let mut r = reminder(ReminderFrequency::Daily, None, "09:30");
        assert!(!r.is_due(utc("2026-03-11T09:29:59.000Z")));
        assert!(r.is_due(utc("2026-03-11T09:30:00.000Z")));

        r.last_triggered_date = Some("2026-03-11".to_string());
        assert!(!r.is_due(utc("2026-03-11T18:00:00.000Z")));
        assert!(r.is_due(utc("2026-03-12T10:00:00.000Z")));

        r.status = ReminderStatus::Paused;
        assert!(!r.is_due(utc("2026-03-12T10:00:00.000Z")));
    }

    #[test]
    fn weekday_and_weekly_reminders_follow_the_calendar() {
        let weekdays = reminder(ReminderFrequency::Weekdays, None, "08:00");
        assert!(weekdays.is_due(utc("2026-03-13T08:00:00.000Z")));
        assert!(!weekdays.is_due(utc("2026-03-14T08:00:00.000Z")));

        let sundays = reminder(ReminderFrequency::Weekly, Some(6), "08:00");
        assert!(sundays.is_due(utc("2026-03-15T12:00:00.000Z")));
        assert!(!sundays.is_due(utc("2026-03-11T12:00:00.000Z")));
    }

    #[test]
    fn new_reminder_validation() {
        let draft = NewReminder {
            content: " Water plants ".to_string(),
            frequency: Some("daily".to_string()),
            day_of_week: Some(3),
            remind_time: "07:05".to_string(),
        }
        .validate()
        .unwrap();
        assert_eq!(draft.content, "Water plants");
        assert_eq!(draft.day_of_week, None);

        for (frequency, day, at) in [
            ("hourly", None, "07:00"),
            ("weekly", None, "07:00"),
            ("weekly", Some(7), "07:00"),
            ("daily", None, "24:00"),
            ("daily", None, "7:00"),
            ("daily", None, "07:60"),
        ] {
            let new = NewReminder {
                content: "x".to_string(),
                frequency: Some(frequency.to_string()),
                day_of_week: day,
                remind_time: at.to_string(),
            };
            assert!(new.validate().is_err(), "{frequency} {day:?} {at}");
        }
    }

    #[test]
    fn reminder_update_tracks_frequency_and_day() {
        let mut r = reminder(ReminderFrequency::Weekly, Some(2), "09:00");

        // A day for a non-weekly reminder is ignored
        ReminderUpdate {
            frequency: Some("daily".to_string()),
            day_of_week: Some(4),
            ..Default::default()
        }
        .apply(&mut r)
        .unwrap();
        assert_eq!(r.frequency, ReminderFrequency::Daily);
        assert_eq!(r.day_of_week, None);

        let to_weekly = ReminderUpdate {
            frequency: Some("weekly".to_string()),
            ..Default::default()
        };
        assert!(to_weekly.clone().apply(&mut r.clone()).is_err());

        ReminderUpdate {
            day_of_week: Some(4),
            ..to_weekly
        }
        .apply(&mut r)
        .unwrap();
        assert_eq!(r.day_of_week, Some(4));

        let bad_status = ReminderUpdate {
            status: Some("snoozed".to_string()),
            ..Default::default()
        };
        assert!(bad_status.apply(&mut r).is_err());
    }
}
