use uuid::Uuid;

/// Instance primary keys are UUIDv7, so they sort by creation time.
pub type InstanceId = Uuid;

/// Owning-user id as issued by the authentication layer.
pub type UserId = Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a new, time-ordered instance id.
pub fn new_instance_id() -> InstanceId {
    Uuid::now_v7()
}
