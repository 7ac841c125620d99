//! Progress monitoring: completion, efficiency, bottleneck and trend
//! statistics over a user's task records for the last `days` days.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{
    Priority, Record, RecordStatus, TaskType, format_date, format_timestamp, parse_timestamp,
    round1,
};

/// Unfinished tasks older than this count as stalled
const STALLED_AFTER_DAYS: i64 = 7;
/// Task types with fewer tasks are never flagged for low completion
const LOW_COMPLETION_MIN_TASKS: usize = 3;
const LOW_COMPLETION_RATE: f64 = 50.0;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisPeriod {
    pub start_date: String,
    pub end_date: String,
    pub days: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub total: usize,
    pub completed: usize,
}

impl Tally {
    fn add(&mut self, completed: bool) {
        self.total += 1;
        if completed {
            self.completed += 1;
        }
    }

    /// Percentage, one decimal
    pub fn rate(self) -> f64 {
        percent(self.completed, self.total)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BasicStatistics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub active_tasks: usize,
    pub paused_tasks: usize,
    pub completion_rate: f64,
    pub priority_distribution: BTreeMap<&'static str, Tally>,
    pub type_distribution: BTreeMap<&'static str, Tally>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekCompletion {
    pub week_start: String,
    pub week_end: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: f64,
}

/// Whole days from creation to completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletionTimes {
    pub same_day: usize,
    pub within_week: usize,
    pub within_month: usize,
    pub over_month: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionAnalysis {
    pub weekly_trends: Vec<WeekCompletion>,
    pub average_completion_time_days: f64,
    pub completion_time_distribution: CompletionTimes,
}

#[derive(Debug, Clone, Serialize)]
pub struct StalledTask {
    pub id: i64,
    pub content: String,
    pub progress: i64,
    pub days_since_creation: i64,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize)]
pub struct EfficiencyAnalysis {
    pub efficiency_score: i64,
    /// `"40-49%"`-style buckets over tasks with some progress
    pub progress_distribution: BTreeMap<String, usize>,
    pub stalled_tasks: Vec<StalledTask>,
    pub stalled_tasks_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StuckTask {
    pub id: i64,
    pub content: String,
    pub days_stuck: i64,
    pub progress: i64,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct LowCompletionType {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub completion_rate: f64,
    pub total_tasks: usize,
    pub completed_tasks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bottlenecks {
    pub bottleneck_score: i64,
    pub stuck_high_priority_tasks: Vec<StuckTask>,
    pub frequently_paused_types: BTreeMap<&'static str, usize>,
    pub low_completion_rate_types: Vec<LowCompletionType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyStat {
    pub date: String,
    pub created_tasks: usize,
    pub completed_tasks: usize,
    pub net_change: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trends {
    pub daily_statistics: Vec<DailyStat>,
    pub recent_week_avg_completion: f64,
    pub previous_week_avg_completion: f64,
    pub trend_direction: TrendDirection,
    pub trend_strength: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressAnalysis {
    pub analysis_period: AnalysisPeriod,
    pub basic_statistics: BasicStatistics,
    pub completion_analysis: CompletionAnalysis,
    pub efficiency_analysis: EfficiencyAnalysis,
    pub bottlenecks: Bottlenecks,
    pub trends: Trends,
}

/// A task record with parsed timestamps
struct Task<'a> {
    record: &'a Record,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl Task<'_> {
    fn completed(&self) -> bool {
        self.record.status == RecordStatus::Completed
    }

    fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created).num_days()
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(part as f64 / total as f64 * 100.0)
    }
}

/// Analyze `records`, the caller's task records, over `[now - days, now]`.
///
/// Deleted records and records with unparseable timestamps are ignored.
/// Stuck and stalled detection looks at every task, not only the window.
pub fn analyze(records: &[Record], now: DateTime<Utc>, days: u32) -> ProgressAnalysis {
    let start = now - Duration::days(i64::from(days));
    let tasks: Vec<Task<'_>> = records
        .iter()
        .filter(|r| r.is_task() && r.status != RecordStatus::Deleted)
        .filter_map(|record| {
            Some(Task {
                record,
                created: parse_timestamp(&record.created_at)?,
                updated: parse_timestamp(&record.updated_at)?,
            })
        })
        .collect();
    let window: Vec<&Task<'_>> = tasks
        .iter()
        .filter(|t| t.created >= start && t.created <= now)
        .collect();

    let basic_statistics = basic_statistics(&window);
    let completion_analysis = completion_analysis(&window, start, now);
    let efficiency_analysis = efficiency_analysis(&tasks, &window, now);
    let bottlenecks = bottlenecks(&tasks, &window, now);
    let trends = trends(&tasks, start, now);

    ProgressAnalysis {
        analysis_period: AnalysisPeriod {
            start_date: format_timestamp(start),
            end_date: format_timestamp(now),
            days,
        },
        basic_statistics,
        completion_analysis,
        efficiency_analysis,
        bottlenecks,
        trends,
    }
}

fn basic_statistics(window: &[&Task<'_>]) -> BasicStatistics {
    let mut priority_distribution: BTreeMap<&'static str, Tally> = Priority::ALL
        .iter()
        .map(|p| (p.as_str(), Tally::default()))
        .collect();
    let mut type_distribution: BTreeMap<&'static str, Tally> = TaskType::ALL
        .iter()
        .map(|t| (t.as_str(), Tally::default()))
        .collect();
    let mut overall = Tally::default();
    let (mut active, mut paused) = (0, 0);

    for task in window {
        let record = task.record;
        let completed = task.completed();
        overall.add(completed);
        priority_distribution
            .entry(record.priority.as_str())
            .or_default()
            .add(completed);
        type_distribution
            .entry(record.task_type.as_str())
            .or_default()
            .add(completed);
        match record.status {
            RecordStatus::Active => active += 1,
            RecordStatus::Paused => paused += 1,
            _ => {}
        }
    }

    BasicStatistics {
        total_tasks: overall.total,
        completed_tasks: overall.completed,
        active_tasks: active,
        paused_tasks: paused,
        completion_rate: overall.rate(),
        priority_distribution,
        type_distribution,
    }
}

fn completion_analysis(
    window: &[&Task<'_>],
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> CompletionAnalysis {
    let mut weekly_trends = Vec::new();
    let mut week_start = start;
    while week_start < now {
        let week_end = (week_start + Duration::days(7)).min(now);
        let mut tally = Tally::default();
        for task in window
            .iter()
            .filter(|t| t.created >= week_start && t.created < week_end)
        {
            tally.add(task.completed());
        }
        weekly_trends.push(WeekCompletion {
            week_start: format_date(week_start.date_naive()),
            week_end: format_date(week_end.date_naive()),
            total_tasks: tally.total,
            completed_tasks: tally.completed,
            completion_rate: tally.rate(),
        });
        week_start = week_end;
    }

    let durations: Vec<i64> = window
        .iter()
        .filter(|t| t.completed())
        .map(|t| (t.updated - t.created).num_days().max(0))
        .collect();
    let mut distribution = CompletionTimes::default();
    for &days in &durations {
        match days {
            0 => distribution.same_day += 1,
            1..=7 => distribution.within_week += 1,
            8..=30 => distribution.within_month += 1,
            _ => distribution.over_month += 1,
        }
    }
    let average = if durations.is_empty() {
        0.0
    } else {
        round1(durations.iter().sum::<i64>() as f64 / durations.len() as f64)
    };

    CompletionAnalysis {
        weekly_trends,
        average_completion_time_days: average,
        completion_time_distribution: distribution,
    }
}

/// Unfinished active task that has been open for more than a week
fn is_stalled(task: &Task<'_>, now: DateTime<Utc>) -> bool {
    task.record.status == RecordStatus::Active
        && task.record.progress < 100
        && task.age_days(now) > STALLED_AFTER_DAYS
}

/// 0-100: completion up to 40, high-priority completion up to 30, minus up
/// to 20 for stalled tasks, plus 10 once anything was completed.
fn efficiency_score(tasks: &[Task<'_>], window: &[&Task<'_>], now: DateTime<Utc>) -> i64 {
    let mut overall = Tally::default();
    let mut high = Tally::default();
    for task in window {
        overall.add(task.completed());
        if task.record.priority.is_high() {
            high.add(task.completed());
        }
    }

    let completion = if overall.total > 0 {
        overall.completed as f64 / overall.total as f64 * 40.0
    } else {
        0.0
    };
    let priority = if high.total > 0 {
        high.completed as f64 / high.total as f64 * 30.0
    } else {
        30.0
    };
    let stalled = tasks.iter().filter(|t| is_stalled(t, now)).count();
    let penalty = (stalled as f64 * 5.0).min(20.0);
    let bonus = if overall.completed > 0 { 10.0 } else { 0.0 };

    (completion + priority - penalty + bonus).clamp(0.0, 100.0).round() as i64
}

fn efficiency_analysis(
    tasks: &[Task<'_>],
    window: &[&Task<'_>],
    now: DateTime<Utc>,
) -> EfficiencyAnalysis {
    let mut progress_distribution = BTreeMap::new();
    let mut stalled_tasks = Vec::new();

    for task in window.iter().filter(|t| t.record.progress > 0) {
        let record = task.record;
        let low = record.progress / 10 * 10;
        *progress_distribution
            .entry(format!("{low}-{}%", low + 9))
            .or_default() += 1;

        if is_stalled(task, now) {
            stalled_tasks.push(StalledTask {
                id: record.id,
                content: record.content.clone(),
                progress: record.progress,
                days_since_creation: task.age_days(now),
                priority: record.priority,
            });
        }
    }

    EfficiencyAnalysis {
        efficiency_score: efficiency_score(tasks, window, now),
        progress_distribution,
        stalled_tasks_count: stalled_tasks.len(),
        stalled_tasks,
    }
}

fn bottlenecks(tasks: &[Task<'_>], window: &[&Task<'_>], now: DateTime<Utc>) -> Bottlenecks {
    let stuck_high_priority_tasks: Vec<StuckTask> = tasks
        .iter()
        .filter(|t| {
            t.record.priority.is_high()
                && matches!(t.record.status, RecordStatus::Active | RecordStatus::Paused)
                && t.age_days(now) > STALLED_AFTER_DAYS
        })
        .map(|t| StuckTask {
            id: t.record.id,
            content: t.record.content.clone(),
            days_stuck: t.age_days(now),
            progress: t.record.progress,
            status: t.record.status,
        })
        .collect();

    let mut frequently_paused_types: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut by_type: BTreeMap<&'static str, Tally> = BTreeMap::new();
    for task in window {
        let task_type = task.record.task_type.as_str();
        if task.record.status == RecordStatus::Paused {
            *frequently_paused_types.entry(task_type).or_default() += 1;
        }
        by_type.entry(task_type).or_default().add(task.completed());
    }

    let low_completion_rate_types: Vec<LowCompletionType> = TaskType::ALL
        .iter()
        .filter_map(|&task_type| {
            let tally = by_type.get(task_type.as_str()).copied().unwrap_or_default();
            (tally.total >= LOW_COMPLETION_MIN_TASKS && tally.rate() < LOW_COMPLETION_RATE).then(
                || LowCompletionType {
                    task_type,
                    completion_rate: tally.rate(),
                    total_tasks: tally.total,
                    completed_tasks: tally.completed,
                },
            )
        })
        .collect();

    let paused: usize = frequently_paused_types.values().sum();
    let score = stuck_high_priority_tasks.len() * 15
        + paused * 5
        + low_completion_rate_types.len() * 10;

    Bottlenecks {
        bottleneck_score: score.min(100) as i64,
        stuck_high_priority_tasks,
        frequently_paused_types,
        low_completion_rate_types,
    }
}

fn trends(tasks: &[Task<'_>], start: DateTime<Utc>, now: DateTime<Utc>) -> Trends {
    let mut daily_statistics = Vec::new();
    let mut day = start;
    while day < now {
        let next = day + Duration::days(1);
        let in_day = |ts: DateTime<Utc>| ts >= day && ts < next;
        let created = tasks.iter().filter(|t| in_day(t.created)).count();
        let completed = tasks
            .iter()
            .filter(|t| t.completed() && in_day(t.updated))
            .count();
        daily_statistics.push(DailyStat {
            date: format_date(day.date_naive()),
            created_tasks: created,
            completed_tasks: completed,
            net_change: completed as i64 - created as i64,
        });
        day = next;
    }

    let average = |days: &[DailyStat]| {
        if days.is_empty() {
            0.0
        } else {
            days.iter().map(|d| d.completed_tasks).sum::<usize>() as f64 / days.len() as f64
        }
    };
    let len = daily_statistics.len();
    let recent = average(&daily_statistics[len.saturating_sub(7)..]);
    let previous = if len >= 14 {
        average(&daily_statistics[len - 14..len - 7])
    } else {
        0.0
    };
    let trend_direction = if recent > previous {
        TrendDirection::Improving
    } else if recent < previous {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };

    Trends {
        daily_statistics,
        recent_week_avg_completion: round1(recent),
        previous_week_avg_completion: round1(previous),
        trend_direction,
        trend_strength: round1((recent - previous).abs()),
    }
}
