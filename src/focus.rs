//! Terminal focus session: a one-second countdown bound to a pomodoro task.
//!
//! The session is mirrored to a small JSON file after every change so that an
//! interrupted session resumes where it stopped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::Database;
use crate::models::{PomodoroAction, PomodoroStatus, PomodoroTask};

/// Outcome of one countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not running
    Idle,
    Running,
    /// Reached 00:00 on this tick
    Finished,
}

/// Minutes/seconds countdown. Finishing stops it, so a finished countdown
/// reports `Finished` once and `Idle` afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    length_minutes: u32,
    minutes: u32,
    seconds: u32,
    running: bool,
}

impl Countdown {
    pub fn new(length_minutes: u32) -> Self {
        Self {
            length_minutes,
            minutes: length_minutes,
            seconds: 0,
            running: false,
        }
    }

    /// Resume from a saved position; seconds above 59 are clamped
    pub fn resume(length_minutes: u32, minutes: u32, seconds: u32, running: bool) -> Self {
        Self {
            length_minutes,
            minutes,
            seconds: seconds.min(59),
            running,
        }
    }

    pub fn start(&mut self) {
        if self.is_zero() {
            self.reset();
        }
        self.running = true;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn reset(&mut self) {
        self.minutes = self.length_minutes;
        self.seconds = 0;
        self.running = false;
    }

    pub fn tick(&mut self) -> Tick {
        if !self.running {
            return Tick::Idle;
        }
        if self.seconds > 0 {
            self.seconds -= 1;
        } else if self.minutes > 0 {
            self.minutes -= 1;
            self.seconds = 59;
        }
        if self.is_zero() {
            self.running = false;
            Tick::Finished
        } else {
            Tick::Running
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining(&self) -> (u32, u32) {
        (self.minutes, self.seconds)
    }

    fn is_zero(&self) -> bool {
        self.minutes == 0 && self.seconds == 0
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

/// What is persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusState {
    pub active_task_id: Option<i64>,
    pub minutes: u32,
    pub seconds: u32,
    pub running: bool,
}

impl FocusState {
    /// `None` when no state has been saved
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).context("Failed to read focus state")?;
        let state = serde_json::from_str(&content).context("Failed to parse focus state")?;
        Ok(Some(state))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create state directory")?;
        }
        let content = serde_json::to_string_pretty(self)?;
        // Write-then-rename so a crash never leaves half a file
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content).context("Failed to write focus state")?;
        std::fs::rename(&tmp, path).context("Failed to replace focus state")?;
        Ok(())
    }

    pub fn clear(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove focus state"),
        }
    }
}

/// A countdown attached to one task
#[derive(Debug, Clone)]
pub struct FocusSession {
    pub task_id: i64,
    pub countdown: Countdown,
    /// Restored sessions open expanded so the user sees what resumed
    pub expanded: bool,
}

impl FocusSession {
    pub fn new(task_id: i64, focus_minutes: u32) -> Self {
        Self {
            task_id,
            countdown: Countdown::new(focus_minutes),
            expanded: false,
        }
    }

    /// Rebuild a session from saved state. `None` if no task was active.
    pub fn restore(state: &FocusState, focus_minutes: u32) -> Option<Self> {
        let task_id = state.active_task_id?;
        Some(Self {
            task_id,
            countdown: Countdown::resume(
                focus_minutes,
                state.minutes,
                state.seconds,
                state.running,
            ),
            expanded: true,
        })
    }

    pub fn state(&self) -> FocusState {
        let (minutes, seconds) = self.countdown.remaining();
        FocusState {
            active_task_id: Some(self.task_id),
            minutes,
            seconds,
            running: self.countdown.is_running(),
        }
    }
}

/// How a focus run ended
#[derive(Debug)]
pub enum FocusOutcome {
    Completed(PomodoroTask),
    Paused { minutes: u32, seconds: u32 },
}

/// Drives a [`FocusSession`] against the database
pub struct FocusRunner<'a> {
    db: &'a Database,
    user_id: i64,
    session: FocusSession,
    state_path: PathBuf,
    title: String,
}

impl<'a> FocusRunner<'a> {
    /// Resume the saved session for `task_id`, or start the task fresh.
    /// Without a `task_id` the saved session's task is resumed.
    pub fn begin(
        db: &'a Database,
        user_id: i64,
        task_id: Option<i64>,
        focus_minutes: u32,
        state_path: PathBuf,
    ) -> Result<Self> {
        let restored = FocusState::load(&state_path)?
            .and_then(|state| FocusSession::restore(&state, focus_minutes));

        let task_id = match (task_id, &restored) {
            (Some(task_id), _) => task_id,
            (None, Some(saved)) => saved.task_id,
            (None, None) => anyhow::bail!("No saved focus session; pass a task id"),
        };

        let mut session = match restored {
            Some(session) if session.task_id == task_id => session,
            Some(other) => {
                tracing::warn!(
                    saved_task = other.task_id,
                    task_id,
                    "Discarding saved focus session for another task"
                );
                FocusSession::new(task_id, focus_minutes)
            }
            None => FocusSession::new(task_id, focus_minutes),
        };

        let mut task = db.get_pomodoro_task(user_id, task_id)?;
        if task.status != PomodoroStatus::Active {
            task = db.transition_pomodoro(user_id, task_id, PomodoroAction::Start)?;
        }
        session.countdown.start();

        let runner = Self {
            db,
            user_id,
            session,
            state_path,
            title: task.title,
        };
        runner.persist()?;
        Ok(runner)
    }

    pub fn session(&self) -> &FocusSession {
        &self.session
    }

    /// Advance one second. Returns the updated task when the countdown
    /// finished on this tick.
    pub fn tick(&mut self) -> Result<Option<PomodoroTask>> {
        match self.session.countdown.tick() {
            Tick::Idle => Ok(None),
            Tick::Running => {
                self.persist()?;
                Ok(None)
            }
            Tick::Finished => {
                let focus_minutes = i64::from(self.session.countdown.length_minutes);
                let task = self.db.transition_pomodoro(
                    self.user_id,
                    self.session.task_id,
                    PomodoroAction::Complete { focus_minutes },
                )?;
                FocusState::clear(&self.state_path)?;
                tracing::info!(
                    task_id = task.id,
                    pomodoros = task.pomodoros_completed,
                    "Focus session completed"
                );
                Ok(Some(task))
            }
        }
    }

    /// Stop counting and keep the position for the next run
    pub fn pause(&mut self) -> Result<()> {
        self.session.countdown.pause();
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        self.session.state().save(&self.state_path)
    }

    /// Count down once per second until the session finishes or Ctrl-C
    pub async fn run(mut self) -> Result<FocusOutcome> {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // The first tick of an interval completes immediately
        interval.tick().await;

        if self.session.expanded {
            println!("Resuming focus on \"{}\"", self.title);
        } else {
            println!("Focusing on \"{}\"", self.title);
        }

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Some(task) = self.tick()? {
                        println!("\r{} done", self.session.countdown);
                        return Ok(FocusOutcome::Completed(task));
                    }
                    print!("\r{} ", self.session.countdown);
                    std::io::stdout().flush()?;
                }
                _ = tokio::signal::ctrl_c() => {
                    self.pause()?;
                    println!();
                    let (minutes, seconds) = self.session.countdown.remaining();
                    return Ok(FocusOutcome::Paused { minutes, seconds });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPomodoroTask;

    #[test]
    fn countdown_finishes_exactly_once() {
        let mut countdown = Countdown::resume(25, 0, 2, true);
        assert_eq!(countdown.tick(), Tick::Running);
        assert_eq!(countdown.to_string(), "00:01");
        assert_eq!(countdown.tick(), Tick::Finished);
        for _ in 0..5 {
            assert_eq!(countdown.tick(), Tick::Idle);
        }
        assert_eq!(countdown.remaining(), (0, 0));
    }

    #[test]
    fn countdown_borrows_from_minutes() {
        let mut countdown = Countdown::new(25);
        assert_eq!(countdown.tick(), Tick::Idle);
        countdown.start();
        assert_eq!(countdown.tick(), Tick::Running);
        assert_eq!(countdown.to_string(), "24:59");
    }

    #[test]
    fn pause_stops_and_start_resumes() {
        let mut countdown = Countdown::resume(25, 10, 0, true);
        countdown.tick();
        countdown.pause();
        assert_eq!(countdown.tick(), Tick::Idle);
        assert_eq!(countdown.remaining(), (9, 59));
        countdown.start();
        countdown.tick();
        assert_eq!(countdown.remaining(), (9, 58));
    }

    #[test]
    fn starting_a_finished_countdown_restarts_it() {
        let mut countdown = Countdown::resume(25, 0, 1, true);
        assert_eq!(countdown.tick(), Tick::Finished);
        countdown.start();
        assert_eq!(countdown.remaining(), (25, 0));
        assert!(countdown.is_running());
    }

    #[test]
    fn state_round_trips_and_restores_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("focus.json");
        assert!(FocusState::load(&path).unwrap().is_none());

        let mut session = FocusSession::new(9, 25);
        session.countdown.start();
        session.countdown.tick();
        session.state().save(&path).unwrap();

        let loaded = FocusState::load(&path).unwrap().unwrap();
        assert_eq!(
            loaded,
            FocusState {
                active_task_id: Some(9),
                minutes: 24,
                seconds: 59,
                running: true
            }
        );
        let restored = FocusSession::restore(&loaded, 25).unwrap();
        assert!(restored.expanded);
        assert_eq!(restored.countdown.remaining(), (24, 59));

        FocusState::clear(&path).unwrap();
        FocusState::clear(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn state_without_task_restores_nothing() {
        let state = FocusState {
            active_task_id: None,
            minutes: 3,
            seconds: 0,
            running: false,
        };
        assert!(FocusSession::restore(&state, 25).is_none());
    }

    fn pending_task(db: &Database, user_id: i64) -> PomodoroTask {
        db.create_pomodoro_task(
            user_id,
            &NewPomodoroTask {
                title: "Write chapter".to_string(),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn runner_completes_task_once() {
        let db = Database::open_in_memory().unwrap();
        let task = pending_task(&db, 1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focus.json");

        // Two seconds left from an earlier run
        FocusState {
            active_task_id: Some(task.id),
            minutes: 0,
            seconds: 2,
            running: false,
        }
        .save(&path)
        .unwrap();

        let mut runner = FocusRunner::begin(&db, 1, Some(task.id), 25, path.clone()).unwrap();
        assert!(runner.session().expanded);
        assert_eq!(
            db.get_pomodoro_task(1, task.id).unwrap().status,
            PomodoroStatus::Active
        );

        assert!(runner.tick().unwrap().is_none());
        assert_eq!(FocusState::load(&path).unwrap().unwrap().seconds, 1);

        let done = runner.tick().unwrap().expect("finished on this tick");
        assert_eq!(done.status, PomodoroStatus::Completed);
        assert_eq!(done.total_focus_time, 25);
        assert!(!path.exists());

        assert!(runner.tick().unwrap().is_none());
        assert_eq!(db.get_pomodoro_task(1, task.id).unwrap().pomodoros_completed, 1);
    }

    #[test]
    fn runner_pause_persists_position() {
        let db = Database::open_in_memory().unwrap();
        let task = pending_task(&db, 1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focus.json");

        let mut runner = FocusRunner::begin(&db, 1, Some(task.id), 25, path.clone()).unwrap();
        assert!(!runner.session().expanded);
        runner.tick().unwrap();
        runner.pause().unwrap();

        let saved = FocusState::load(&path).unwrap().unwrap();
        assert!(!saved.running);
        assert_eq!((saved.minutes, saved.seconds), (24, 59));
    }

    #[test]
    fn runner_discards_state_of_another_task() {
        let db = Database::open_in_memory().unwrap();
        let task = pending_task(&db, 1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focus.json");
        FocusState {
            active_task_id: Some(task.id + 100),
            minutes: 1,
            seconds: 0,
            running: true,
        }
        .save(&path)
        .unwrap();

        let runner = FocusRunner::begin(&db, 1, Some(task.id), 25, path).unwrap();
        assert!(!runner.session().expanded);
        assert_eq!(runner.session().countdown.remaining(), (25, 0));
    }

    #[test]
    fn runner_without_task_resumes_saved_session() {
        let db = Database::open_in_memory().unwrap();
        let task = pending_task(&db, 1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focus.json");

        let err = FocusRunner::begin(&db, 1, None, 25, path.clone())
            .err()
            .expect("nothing saved yet");
        assert!(err.to_string().contains("No saved focus session"));

        FocusState {
            active_task_id: Some(task.id),
            minutes: 12,
            seconds: 30,
            running: false,
        }
        .save(&path)
        .unwrap();

        let runner = FocusRunner::begin(&db, 1, None, 25, path).unwrap();
        assert!(runner.session().expanded);
        assert_eq!(runner.session().task_id, task.id);
        assert_eq!(runner.session().countdown.remaining(), (12, 30));
    }
}
