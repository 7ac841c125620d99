//! Suggestions for short gaps of free time

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::Serialize;

/// Environment in which only offline-friendly actions are suggested
pub const OFFLINE: &str = "offline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuickAction {
    pub title: &'static str,
    pub description: &'static str,
    pub estimated_time: u32,
    pub action_type: &'static str,
}

const fn action(
    title: &'static str,
    description: &'static str,
    estimated_time: u32,
    action_type: &'static str,
) -> QuickAction {
    QuickAction {
        title,
        description,
        estimated_time,
        action_type,
    }
}

const FIVE_MINUTES: &[QuickAction] = &[
    action("Quick task check", "Look over today's to-dos and confirm priorities", 2, "review"),
    action("Reply to messages", "Answer short messages and notifications", 5, "communication"),
    action("Capture an idea", "Write down an idea before it slips away", 3, "capture"),
];

const FIFTEEN_MINUTES: &[QuickAction] = &[
    action("Update task progress", "Record how existing tasks are going", 10, "update"),
    action("Finish a small task", "Complete one simple to-do", 15, "execution"),
    action("Short learning", "Read a short article or watch a short video", 12, "learning"),
    action("Prepare tomorrow", "Sketch a plan for tomorrow's work", 8, "planning"),
];

const LONGER: &[QuickAction] = &[
    action("Push a deep task", "Focus on part of an important task", 25, "deep_work"),
    action("Break down a task", "Split a complex task into concrete subtasks", 20, "planning"),
    action("Practice a skill", "Work through one full learning or practice session", 30, "learning"),
    action("Review a project", "Look back at progress and adjust the plan", 18, "review"),
];

/// Action kinds that need neither network nor devices
const OFFLINE_KINDS: &[&str] = &["planning", "review", "capture"];

/// Preset suggestions for the given number of free minutes
pub fn quick_actions(available_minutes: u32, environment: &str) -> Vec<QuickAction> {
    let tier = match available_minutes {
        0..=5 => FIVE_MINUTES,
        6..=15 => FIFTEEN_MINUTES,
        _ => LONGER,
    };
    tier.iter()
        .filter(|a| environment != OFFLINE || OFFLINE_KINDS.contains(&a.action_type))
        .copied()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeContext {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub typical_duration: &'static str,
    pub optimal_activities: &'static [&'static str],
}

pub const TIME_CONTEXTS: &[TimeContext] = &[
    TimeContext {
        id: "morning_commute",
        name: "Morning commute",
        description: "On the way to work",
        typical_duration: "15-45 minutes",
        optimal_activities: &["Audio learning", "News", "Agenda review"],
    },
    TimeContext {
        id: "lunch_break",
        name: "Lunch break",
        description: "Rest after lunch",
        typical_duration: "30-60 minutes",
        optimal_activities: &["Light learning", "Task planning", "Creative thinking"],
    },
    TimeContext {
        id: "evening_commute",
        name: "Evening commute",
        description: "On the way home",
        typical_duration: "15-45 minutes",
        optimal_activities: &["Podcasts", "Day summary", "Prepare tomorrow"],
    },
    TimeContext {
        id: "waiting_time",
        name: "Waiting",
        description: "Queues, waiting rooms and the like",
        typical_duration: "5-30 minutes",
        optimal_activities: &["Quick tasks", "Messages", "Capture ideas"],
    },
    TimeContext {
        id: "meeting_break",
        name: "Between meetings",
        description: "The gap between two meetings",
        typical_duration: "10-20 minutes",
        optimal_activities: &["Email check", "Task updates", "Preparation"],
    },
    TimeContext {
        id: "before_sleep",
        name: "Before sleep",
        description: "Winding down before bed",
        typical_duration: "20-60 minutes",
        optimal_activities: &["Light reading", "Reflection", "Meditation"],
    },
    TimeContext {
        id: "weekend_leisure",
        name: "Weekend leisure",
        description: "Free time at the weekend",
        typical_duration: "30-120 minutes",
        optimal_activities: &["Deep learning", "Creative projects", "Skill building"],
    },
];

/// The context a moment most likely falls into, judged by weekday and hour
pub fn current_context(now: DateTime<Utc>) -> &'static str {
    let hour = now.hour();
    let weekend = matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
    match (weekend, hour) {
        (_, 21..=23) => "before_sleep",
        (true, _) => "weekend_leisure",
        (false, 7..=9) => "morning_commute",
        (false, 12..=14) => "lunch_break",
        (false, 17..=19) => "evening_commute",
        (false, _) => "waiting_time",
    }
}
