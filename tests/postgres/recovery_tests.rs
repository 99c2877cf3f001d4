//! Reset and recovery sweep tests against `PostgreSQL`.

use super::helpers::{at, claimed, pending, task_uuid, test_schema, worker};
use analysis_queue::queue::{
    domain::{QueueTask, TaskStatus},
    ports::{ClaimOutcome, QueueRepository},
};
use eyre::{Result, ensure};
use rstest::rstest;
use std::collections::BTreeSet;

fn uuids(tasks: &[QueueTask]) -> BTreeSet<String> {
    tasks
        .iter()
        .map(|task| task.uuid().as_str().to_owned())
        .collect()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reset_by_uuid_keeps_start_and_siblings() -> Result<()> {
    let db = test_schema()?;
    db.repository.insert(&pending("uuid-1", None, 0)?, &[]).await?;
    db.repository.insert(&pending("uuid-2", None, 0)?, &[]).await?;
    db.repository
        .claim(&task_uuid("uuid-1")?, &worker("workerUuid")?, at(10))
        .await?;
    db.repository
        .claim(&task_uuid("uuid-2")?, &worker("workerUuid")?, at(10))
        .await?;

    let reset = db
        .repository
        .reset_to_pending_by_uuid(&task_uuid("uuid-1")?, at(20))
        .await?;
    let first = db
        .repository
        .select_by_uuid(&task_uuid("uuid-1")?)
        .await?
        .ok_or_else(|| eyre::eyre!("uuid-1 missing"))?;
    let second = db
        .repository
        .select_by_uuid(&task_uuid("uuid-2")?)
        .await?
        .ok_or_else(|| eyre::eyre!("uuid-2 missing"))?;

    ensure!(reset == 1);
    ensure!(first.status() == TaskStatus::Pending);
    ensure!(first.worker_uuid().is_none());
    ensure!(first.started_at() == Some(at(10)));
    ensure!(first.updated_at() == at(20));
    ensure!(second.status() == TaskStatus::InProgress);
    ensure!(second.updated_at() == at(10));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sweep_resets_only_unknown_workers() -> Result<()> {
    let db = test_schema()?;
    for task in [
        pending("p1", None, 0)?,
        claimed("alive", None, "w1", 1)?,
        claimed("dead", None, "w2", 2)?,
        claimed("also-dead", None, "w3", 3)?,
    ] {
        db.repository.insert(&task, &[]).await?;
    }

    let reset = db
        .repository
        .reset_tasks_with_unknown_worker_uuids(&[worker("w1")?], at(30))
        .await?;

    ensure!(reset == 2);
    let worn_out = db.repository.select_wornout().await?;
    ensure!(uuids(&worn_out) == BTreeSet::from(["also-dead".to_owned(), "dead".to_owned()]));
    ensure!(worn_out.iter().all(|task| task.updated_at() == at(30)));
    let owned = db
        .repository
        .select_not_pending_for_worker(&worker("w1")?)
        .await?;
    ensure!(uuids(&owned) == BTreeSet::from(["alive".to_owned()]));
    let untouched = db
        .repository
        .select_by_uuid(&task_uuid("p1")?)
        .await?
        .ok_or_else(|| eyre::eyre!("p1 missing"))?;
    ensure!(untouched.updated_at() == at(0));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sweep_without_alive_workers_resets_everything() -> Result<()> {
    let db = test_schema()?;
    db.repository
        .insert(&claimed("i1", None, "w1", 1)?, &[])
        .await?;
    db.repository
        .insert(&claimed("i2", None, "w2", 2)?, &[])
        .await?;

    let first = db
        .repository
        .reset_tasks_with_unknown_worker_uuids(&[], at(30))
        .await?;
    let second = db
        .repository
        .reset_tasks_with_unknown_worker_uuids(&[], at(31))
        .await?;

    ensure!(first == 2);
    ensure!(second == 0);
    ensure!(db.repository.count_by_status(TaskStatus::InProgress).await? == 0);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn started_before_threshold_is_strict() -> Result<()> {
    let db = test_schema()?;
    for task in [
        claimed("old", None, "w1", 5)?,
        claimed("edge", None, "w1", 10)?,
        claimed("new", None, "w1", 15)?,
    ] {
        db.repository.insert(&task, &[]).await?;
    }

    let stuck = db
        .repository
        .select_in_progress_started_before(at(10))
        .await?;

    ensure!(uuids(&stuck) == BTreeSet::from(["old".to_owned()]));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sweep_never_reverts_a_claim_by_an_alive_worker() -> Result<()> {
    let db = test_schema()?;
    let repository = std::sync::Arc::new(db.repository.clone());
    for index in 0..20 {
        let uuid = format!("t{index:02}");
        repository.insert(&claimed(&uuid, None, "dead", index)?, &[]).await?;
    }

    let mut handles = Vec::new();
    for index in 0..20 {
        let uuid = task_uuid(&format!("t{index:02}"))?;
        let sweeper = std::sync::Arc::clone(&repository);
        handles.push(tokio::spawn(async move {
            sweeper
                .reset_tasks_with_unknown_worker_uuids(&[worker("alive")?], at(100))
                .await?;
            Ok::<_, eyre::Report>(())
        }));
        let claimer = std::sync::Arc::clone(&repository);
        handles.push(tokio::spawn(async move {
            claimer.reset_to_pending_by_uuid(&uuid, at(100)).await?;
            let outcome = claimer.claim(&uuid, &worker("alive")?, at(101)).await?;
            ensure!(matches!(outcome, ClaimOutcome::Claimed(_)), "lost {uuid}");
            Ok::<_, eyre::Report>(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let owned = repository
        .select_not_pending_for_worker(&worker("alive")?)
        .await?;
    ensure!(owned.len() == 20, "only {} claims survived", owned.len());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stuck_reset_spares_tasks_reclaimed_since_detection() -> Result<()> {
    let db = test_schema()?;
    for task in [
        claimed("reclaimed", None, "w1", 5)?,
        claimed("stuck", None, "w1", 6)?,
    ] {
        db.repository.insert(&task, &[]).await?;
    }
    ensure!(
        db.repository
            .select_in_progress_started_before(at(10))
            .await?
            .len()
            == 2
    );
    db.repository
        .reset_to_pending_by_uuid(&task_uuid("reclaimed")?, at(20))
        .await?;
    db.repository
        .claim(&task_uuid("reclaimed")?, &worker("w2")?, at(21))
        .await?;

    let reset = db
        .repository
        .reset_in_progress_started_before(at(10), at(30))
        .await?;

    ensure!(reset == 1);
    let reclaimed = db
        .repository
        .select_by_uuid(&task_uuid("reclaimed")?)
        .await?
        .ok_or_else(|| eyre::eyre!("reclaimed missing"))?;
    ensure!(reclaimed.worker_uuid() == Some(&worker("w2")?));
    let stuck = db
        .repository
        .select_by_uuid(&task_uuid("stuck")?)
        .await?
        .ok_or_else(|| eyre::eyre!("stuck missing"))?;
    ensure!(stuck.status() == TaskStatus::Pending);
    ensure!(stuck.started_at() == Some(at(6)));
    ensure!(stuck.updated_at() == at(30));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn worker_reset_releases_only_that_workers_claims() -> Result<()> {
    let db = test_schema()?;
    for task in [
        claimed("a", None, "w1", 1)?,
        claimed("b", None, "w1", 2)?,
        claimed("c", None, "w2", 3)?,
        pending("d", None, 4)?,
    ] {
        db.repository.insert(&task, &[]).await?;
    }

    let reset = db
        .repository
        .reset_in_progress_for_worker(&worker("w1")?, at(10))
        .await?;

    ensure!(reset == 2);
    ensure!(uuids(&db.repository.select_wornout().await?) == BTreeSet::from(["a".to_owned(), "b".to_owned()]));
    ensure!(
        db.repository
            .select_not_pending_for_worker(&worker("w2")?)
            .await?
            .len()
            == 1
    );
    Ok(())
}
