//! When steps for queue recovery BDD scenarios.

use super::world::{QueueRecoveryWorld, run_async};
use analysis_queue::queue::domain::WorkerUuid;
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when(r#"worker "{worker}" peeks for a task"#)]
fn worker_peeks(world: &mut QueueRecoveryWorld, worker: String) -> Result<(), eyre::Report> {
    let worker_uuid = WorkerUuid::new(worker.as_str())?;
    let claimed = run_async(world.workers.peek(&worker_uuid, false))
        .wrap_err("peek for a task in scenario")?;
    world.claims.insert(worker, claimed);
    Ok(())
}

#[when(r#"recovery runs keeping worker "{worker}" alive"#)]
fn recovery_keeps_worker(
    world: &mut QueueRecoveryWorld,
    worker: String,
) -> Result<(), eyre::Report> {
    let alive = [WorkerUuid::new(worker)?];
    let reset = run_async(world.recovery.reset_tasks_with_unknown_workers(&alive))
        .wrap_err("run recovery sweep in scenario")?;
    world.last_reset_count = Some(reset);
    Ok(())
}

#[when("recovery runs with no alive workers")]
fn recovery_without_workers(world: &mut QueueRecoveryWorld) -> Result<(), eyre::Report> {
    let reset = run_async(world.recovery.reset_tasks_with_unknown_workers(&[]))
        .wrap_err("run recovery sweep in scenario")?;
    world.last_reset_count = Some(reset);
    Ok(())
}

#[when(r#"worker "{worker}" completes its task"#)]
fn worker_completes(world: &mut QueueRecoveryWorld, worker: String) -> Result<(), eyre::Report> {
    let task_uuid = world
        .claims
        .get(&worker)
        .and_then(Option::as_ref)
        .map(|task| task.uuid().clone())
        .ok_or_else(|| eyre::eyre!("worker {worker} holds no task in scenario world"))?;
    world.last_completion = Some(run_async(world.workers.complete(&task_uuid)));
    Ok(())
}
