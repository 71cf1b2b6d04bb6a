use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(Uuid),

    /// The room is shutting down and no longer takes registrations.
    #[error("room {0} is closed")]
    Closed(Uuid),

    #[error("room {0} already exists")]
    AlreadyExists(Uuid),
}
