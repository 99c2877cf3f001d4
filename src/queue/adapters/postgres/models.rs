//! Diesel row models for queue persistence.

use super::schema::{ce_queue, ce_task_characteristics};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for queued tasks.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ce_queue)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct QueueRow {
    pub uuid: String,
    pub task_type: String,
    pub status: String,
    pub entity_uuid: Option<String>,
    pub component_uuid: Option<String>,
    pub submitter_uuid: Option<String>,
    pub worker_uuid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub part_count: i32,
}

/// Insert model for queued tasks.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ce_queue)]
pub struct NewQueueRow {
    pub uuid: String,
    pub task_type: String,
    pub status: String,
    pub entity_uuid: Option<String>,
    pub component_uuid: Option<String>,
    pub submitter_uuid: Option<String>,
    pub worker_uuid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub part_count: i32,
}

/// Query result row for task characteristics.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ce_task_characteristics)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CharacteristicRow {
    pub uuid: String,
    pub task_uuid: String,
    pub kee: String,
    pub text_value: String,
}

/// Insert model for task characteristics.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ce_task_characteristics)]
pub struct NewCharacteristicRow {
    pub uuid: String,
    pub task_uuid: String,
    pub kee: String,
    pub text_value: String,
}
