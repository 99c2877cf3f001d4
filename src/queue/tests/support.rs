//! Shared clocks and builders for queue unit tests.

use crate::queue::domain::{EntityUuid, NewQueueTask, QueueTask, TaskType, TaskUuid, WorkerUuid};
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockall::mock;
use std::sync::Mutex;

mock! {
    pub Clock {}

    impl mockable::Clock for Clock {
        fn local(&self) -> DateTime<Local>;
        fn utc(&self) -> DateTime<Utc>;
    }
}

/// Clock that advances one second every time it is read.
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
}

impl SteppingClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            next: Mutex::new(start),
        }
    }

    /// Returns the instant the next read will observe without consuming it.
    pub fn peek(&self) -> DateTime<Utc> {
        *self.next.lock().expect("clock lock")
    }
}

impl Default for SteppingClock {
    fn default() -> Self {
        Self::starting_at(epoch())
    }
}

impl mockable::Clock for SteppingClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().expect("clock lock");
        let current = *next;
        *next = current + TimeDelta::seconds(1);
        current
    }
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .expect("valid instant")
}

pub fn at(seconds: i64) -> DateTime<Utc> {
    epoch() + TimeDelta::seconds(seconds)
}

pub fn task_uuid(value: &str) -> TaskUuid {
    TaskUuid::new(value).expect("valid task uuid")
}

pub fn worker(value: &str) -> WorkerUuid {
    WorkerUuid::new(value).expect("valid worker uuid")
}

pub fn entity(value: &str) -> EntityUuid {
    EntityUuid::new(value).expect("valid entity uuid")
}

/// Pending report task created at `created_at`.
pub fn pending_report(uuid: &str, created_at: DateTime<Utc>) -> QueueTask {
    pending_of_type(uuid, TaskType::report(), created_at)
}

/// Pending task of any type created at `created_at`.
pub fn pending_of_type(uuid: &str, task_type: TaskType, created_at: DateTime<Utc>) -> QueueTask {
    NewQueueTask::new(task_uuid(uuid), task_type)
        .with_created_at(created_at)
        .with_updated_at(created_at)
        .into_task(&SteppingClock::default())
        .expect("valid pending task")
}

/// Report task already claimed by `worker_uuid` at `started_at`.
pub fn claimed_report(uuid: &str, worker_uuid: &str, started_at: DateTime<Utc>) -> QueueTask {
    NewQueueTask::new(task_uuid(uuid), TaskType::report())
        .with_created_at(started_at)
        .with_updated_at(started_at)
        .in_progress(worker(worker_uuid), started_at)
        .into_task(&SteppingClock::default())
        .expect("valid in-progress task")
}
