//! Diesel schema for queue persistence.

diesel::table! {
    /// Queued tasks awaiting or undergoing processing.
    ce_queue (uuid) {
        /// Task identifier.
        #[max_length = 40]
        uuid -> Varchar,
        /// Task type tag.
        #[max_length = 40]
        task_type -> Varchar,
        /// Queue status (`PENDING` or `IN_PROGRESS`).
        #[max_length = 15]
        status -> Varchar,
        /// Owning entity.
        #[max_length = 40]
        entity_uuid -> Nullable<Varchar>,
        /// Branch or component.
        #[max_length = 40]
        component_uuid -> Nullable<Varchar>,
        /// Submitter identity.
        #[max_length = 255]
        submitter_uuid -> Nullable<Varchar>,
        /// Worker holding the claim.
        #[max_length = 40]
        worker_uuid -> Nullable<Varchar>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last mutation timestamp.
        updated_at -> Timestamptz,
        /// First-claim timestamp.
        started_at -> Nullable<Timestamptz>,
        /// Number of logical parts.
        part_count -> Int4,
    }
}

diesel::table! {
    /// Key/value tags attached to queued tasks.
    ce_task_characteristics (uuid) {
        /// Characteristic identifier.
        #[max_length = 40]
        uuid -> Varchar,
        /// Owning task.
        #[max_length = 40]
        task_uuid -> Varchar,
        /// Characteristic key.
        #[max_length = 512]
        kee -> Varchar,
        /// Characteristic value.
        #[max_length = 512]
        text_value -> Varchar,
        /// Insertion order.
        position -> Int8,
    }
}

diesel::joinable!(ce_task_characteristics -> ce_queue (task_uuid));

diesel::allow_tables_to_appear_in_same_query!(ce_queue, ce_task_characteristics);
