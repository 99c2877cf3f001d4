//! Given steps for queue recovery BDD scenarios.

use super::world::{QueueRecoveryWorld, run_async};
use analysis_queue::queue::{
    domain::{NewQueueTask, TaskType, TaskUuid},
    ports::QueueRepository,
};
use chrono::{DateTime, TimeDelta, Utc};
use eyre::WrapErr;
use mockable::DefaultClock;
use rstest_bdd_macros::given;

#[given(r#"a queued report "{uuid}" created at {seconds:i64} seconds"#)]
fn queued_report(
    world: &mut QueueRecoveryWorld,
    uuid: String,
    seconds: i64,
) -> Result<(), eyre::Report> {
    queue_task(world, TaskType::report(), uuid, seconds)
}

#[given(r#"a queued "{task_type}" task "{uuid}" created at {seconds:i64} seconds"#)]
fn queued_task_of_type(
    world: &mut QueueRecoveryWorld,
    task_type: String,
    uuid: String,
    seconds: i64,
) -> Result<(), eyre::Report> {
    queue_task(world, TaskType::new(task_type)?, uuid, seconds)
}

fn queue_task(
    world: &QueueRecoveryWorld,
    task_type: TaskType,
    uuid: String,
    seconds: i64,
) -> Result<(), eyre::Report> {
    let created_at = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(seconds);
    let task = NewQueueTask::new(TaskUuid::new(uuid)?, task_type)
        .with_created_at(created_at)
        .with_updated_at(created_at)
        .into_task(&DefaultClock)?;
    run_async(world.repository.insert(&task, &[])).wrap_err("queue task in scenario setup")?;
    Ok(())
}
