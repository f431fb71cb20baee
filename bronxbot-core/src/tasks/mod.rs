// src/tasks/mod.rs
//
// Owns every scheduled-loop lifecycle. Tasks are registered by name with a
// schedule and a body; the manager exposes start/stop/restart/force_run. A
// body error is logged and the loop continues on its next tick; no task dies
// from a single failed iteration.

pub mod stats_tasks;
pub mod performance_tasks;
pub mod dashboard_tasks;
pub mod retention;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    NotStarted,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy)]
pub enum Schedule {
    /// Fixed interval, first run one interval after start.
    Every(Duration),
    /// Once a day at the given UTC hour. The first delay is computed against
    /// the wall clock so the task aligns to the hour, not to process start.
    DailyAt { utc_hour: u32 },
}

impl Schedule {
    fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        match self {
            Schedule::Every(interval) => *interval,
            Schedule::DailyAt { utc_hour } => time_until_utc_hour(now, *utc_hour),
        }
    }
}

/// Duration until the next occurrence of `hour:00:00` UTC, strictly in the
/// future (exactly on the hour rolls to tomorrow).
pub fn time_until_utc_hour(now: DateTime<Utc>, hour: u32) -> Duration {
    let hour = hour % 24;
    let today = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .expect("hour is in range")
        .and_utc();
    let target = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (target - now).to_std().unwrap_or_default()
}

/// One scheduled unit of work.
#[async_trait]
pub trait TaskBody: Send + Sync + 'static {
    async fn run(&self) -> Result<(), Error>;
}

struct TaskEntry {
    schedule: Schedule,
    body: Arc<dyn TaskBody>,
    state: TaskState,
    cancel: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

pub struct TaskManager {
    tasks: Mutex<HashMap<String, TaskEntry>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn register(
        &self,
        name: &str,
        schedule: Schedule,
        body: Arc<dyn TaskBody>,
    ) -> Result<(), Error> {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(name) {
            return Err(Error::Task(format!("task '{name}' already registered")));
        }
        tasks.insert(
            name.to_string(),
            TaskEntry {
                schedule,
                body,
                state: TaskState::NotStarted,
                cancel: None,
                handle: None,
            },
        );
        Ok(())
    }

    /// Start a task's loop. Starting a running task is a no-op.
    pub async fn start(&self, name: &str) -> Result<(), Error> {
        let mut tasks = self.tasks.lock().await;
        let entry = tasks
            .get_mut(name)
            .ok_or_else(|| Error::Task(format!("unknown task '{name}'")))?;

        if entry.state == TaskState::Running {
            return Ok(());
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            name.to_string(),
            entry.schedule,
            Arc::clone(&entry.body),
            cancel_rx,
        ));
        entry.cancel = Some(cancel_tx);
        entry.handle = Some(handle);
        entry.state = TaskState::Running;
        Ok(())
    }

    /// Cooperatively stop a task and wait for its loop to exit.
    pub async fn stop(&self, name: &str) -> Result<(), Error> {
        let handle = {
            let mut tasks = self.tasks.lock().await;
            let entry = tasks
                .get_mut(name)
                .ok_or_else(|| Error::Task(format!("unknown task '{name}'")))?;

            if entry.state != TaskState::Running {
                return Ok(());
            }
            if let Some(tx) = entry.cancel.take() {
                let _ = tx.send(true);
            }
            entry.state = TaskState::Stopped;
            entry.handle.take()
        };

        if let Some(handle) = handle {
            let _ = handle.await;
        }
        Ok(())
    }

    /// Cancel and immediately start again (running -> running).
    pub async fn restart(&self, name: &str) -> Result<(), Error> {
        self.stop(name).await?;
        self.start(name).await
    }

    /// Run the task body once, outside its schedule, without touching the
    /// loop's phase. Unlike scheduled iterations the error is returned to
    /// the (owner-command) caller.
    pub async fn force_run(&self, name: &str) -> Result<(), Error> {
        let body = {
            let tasks = self.tasks.lock().await;
            let entry = tasks
                .get(name)
                .ok_or_else(|| Error::Task(format!("unknown task '{name}'")))?;
            Arc::clone(&entry.body)
        };
        body.run().await
    }

    pub async fn state(&self, name: &str) -> Option<TaskState> {
        self.tasks.lock().await.get(name).map(|e| e.state)
    }

    pub async fn states(&self) -> Vec<(String, TaskState)> {
        let tasks = self.tasks.lock().await;
        let mut states: Vec<(String, TaskState)> = tasks
            .iter()
            .map(|(name, entry)| (name.clone(), entry.state))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    pub async fn start_all(&self) -> Result<(), Error> {
        let names: Vec<String> = {
            let tasks = self.tasks.lock().await;
            tasks.keys().cloned().collect()
        };
        for name in names {
            self.start(&name).await?;
        }
        Ok(())
    }

    pub async fn stop_all(&self) {
        let names: Vec<String> = {
            let tasks = self.tasks.lock().await;
            tasks.keys().cloned().collect()
        };
        for name in names {
            let _ = self.stop(&name).await;
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_loop(
    name: String,
    schedule: Schedule,
    body: Arc<dyn TaskBody>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let mut delay = schedule.delay_from(Utc::now());
    info!("task '{}' started, first run in {:?}", name, delay);

    loop {
        tokio::select! {
            _ = sleep(delay) => {},
            res = cancel_rx.changed() => {
                if res.is_err() || *cancel_rx.borrow() {
                    break;
                }
                continue;
            }
        }

        if let Err(e) = body.run().await {
            error!("task '{}' iteration failed: {:?}", name, e);
        }
        delay = schedule.delay_from(Utc::now());
    }

    info!("task '{}' stopped", name);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::TimeZone;

    use super::*;

    struct CountingTask {
        count: Arc<AtomicU32>,
        fail: bool,
    }

    #[async_trait]
    impl TaskBody for CountingTask {
        async fn run(&self) -> Result<(), Error> {
            self.count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::Task("intentional".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn delay_until_reset_hour() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 30, 0).unwrap();
        assert_eq!(
            time_until_utc_hour(now, 12),
            Duration::from_secs(90 * 60)
        );
        // already past today's occurrence => tomorrow
        assert_eq!(
            time_until_utc_hour(now, 10),
            Duration::from_secs(23 * 3600 + 30 * 60)
        );
        // exactly on the hour rolls to tomorrow
        let on_the_hour = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(
            time_until_utc_hour(on_the_hour, 0),
            Duration::from_secs(86400)
        );
    }

    #[tokio::test]
    async fn interval_task_runs_and_stops() {
        let mgr = TaskManager::new();
        let count = Arc::new(AtomicU32::new(0));
        mgr.register(
            "counter",
            Schedule::Every(Duration::from_millis(10)),
            Arc::new(CountingTask {
                count: Arc::clone(&count),
                fail: false,
            }),
        )
        .await
        .unwrap();

        assert_eq!(mgr.state("counter").await, Some(TaskState::NotStarted));
        mgr.start("counter").await.unwrap();
        assert_eq!(mgr.state("counter").await, Some(TaskState::Running));

        tokio::time::sleep(Duration::from_millis(80)).await;
        mgr.stop("counter").await.unwrap();
        assert_eq!(mgr.state("counter").await, Some(TaskState::Stopped));

        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop > 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn failing_body_does_not_kill_loop() {
        let mgr = TaskManager::new();
        let count = Arc::new(AtomicU32::new(0));
        mgr.register(
            "flaky",
            Schedule::Every(Duration::from_millis(10)),
            Arc::new(CountingTask {
                count: Arc::clone(&count),
                fail: true,
            }),
        )
        .await
        .unwrap();

        mgr.start("flaky").await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        mgr.stop("flaky").await.unwrap();

        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn force_run_executes_once_without_starting() {
        let mgr = TaskManager::new();
        let count = Arc::new(AtomicU32::new(0));
        mgr.register(
            "oneshot",
            Schedule::Every(Duration::from_secs(3600)),
            Arc::new(CountingTask {
                count: Arc::clone(&count),
                fail: false,
            }),
        )
        .await
        .unwrap();

        mgr.force_run("oneshot").await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.state("oneshot").await, Some(TaskState::NotStarted));

        // force_run surfaces the body error to the caller
        mgr.register(
            "failing",
            Schedule::Every(Duration::from_secs(3600)),
            Arc::new(CountingTask {
                count: Arc::new(AtomicU32::new(0)),
                fail: true,
            }),
        )
        .await
        .unwrap();
        assert!(mgr.force_run("failing").await.is_err());
    }

    #[tokio::test]
    async fn restart_keeps_task_running() {
        let mgr = TaskManager::new();
        let count = Arc::new(AtomicU32::new(0));
        mgr.register(
            "counter",
            Schedule::Every(Duration::from_millis(10)),
            Arc::new(CountingTask {
                count: Arc::clone(&count),
                fail: false,
            }),
        )
        .await
        .unwrap();

        mgr.start("counter").await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        mgr.restart("counter").await.unwrap();
        assert_eq!(mgr.state("counter").await, Some(TaskState::Running));

        let before = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(count.load(Ordering::SeqCst) > before);

        mgr.stop_all().await;
    }

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let mgr = TaskManager::new();
        let body = Arc::new(CountingTask {
            count: Arc::new(AtomicU32::new(0)),
            fail: false,
        });
        mgr.register("t", Schedule::Every(Duration::from_secs(1)), body.clone())
            .await
            .unwrap();
        assert!(mgr
            .register("t", Schedule::Every(Duration::from_secs(1)), body)
            .await
            .is_err());
    }
}
