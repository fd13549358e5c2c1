use uuid::Uuid;

/// Failures surfaced by a Ledger Store implementation. Domain components
/// translate these into the caller-facing taxonomy via `From`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An optimistic write lost against a concurrent writer.
    #[error("stale version for {entity} {id}")]
    VersionConflict { entity: &'static str, id: Uuid },

    #[error("corrupt {entity} record {id}: {detail}")]
    Corrupt {
        entity: &'static str,
        id: Uuid,
        detail: String,
    },
}

impl From<StoreError> for crate::CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => crate::CoreError::StoreUnavailable(msg),
            StoreError::VersionConflict { entity, id } => {
                crate::CoreError::Conflict(format!("{} {} was updated concurrently", entity, id))
            }
            StoreError::Corrupt { entity, id, detail } => crate::CoreError::StoreUnavailable(
                format!("corrupt {} record {}: {}", entity, id, detail),
            ),
        }
    }
}

/// A record paired with the version stamp it was read at. Writes must
/// present the version back; a mismatch is a `VersionConflict`.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}
