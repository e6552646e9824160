use invdelta_core_types::RunId;
use thiserror::Error;

/// Result type alias using InvDeltaError
pub type Result<T> = std::result::Result<T, InvDeltaError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code. The driver decides retry vs abort
/// from the kind alone, never from message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    // Input / validation
    InvalidInput,
    NotFound,

    // Registry
    /// Entity family absent from the registry, or a registry entry is malformed
    Configuration,

    // Snapshot shape
    /// A staged record cannot be used (missing key field, not an object, ...)
    DataShape,
    /// A run timestamp / snapshot id does not follow the staging convention
    InvalidSnapshotId,

    // Writes
    /// Some but not all writes of a batch succeeded
    PartialWrite,
    /// Attempted update or delete against the append-only change log
    AppendOnlyViolation,

    // Integration/IO
    /// Store or staging I/O that is expected to succeed on retry
    TransientIo,
    Io,
    Serialization,
    Persistence,
    Concurrency,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Configuration => "ERR_CONFIGURATION",
            ExErrorKind::DataShape => "ERR_DATA_SHAPE",
            ExErrorKind::InvalidSnapshotId => "ERR_INVALID_SNAPSHOT_ID",
            ExErrorKind::PartialWrite => "ERR_PARTIAL_WRITE",
            ExErrorKind::AppendOnlyViolation => "ERR_APPEND_ONLY_VIOLATION",
            ExErrorKind::TransientIo => "ERR_TRANSIENT_IO",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether a failed family run with this kind may be retried against the
    /// same staged snapshot.
    ///
    /// Configuration and data errors are deterministic and would fail again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExErrorKind::TransientIo
                | ExErrorKind::Io
                | ExErrorKind::Persistence
                | ExErrorKind::Concurrency
                | ExErrorKind::PartialWrite
        )
    }
}

/// Canonical structured error type
///
/// Carries classification plus the context a reviewer needs to locate the
/// failing family, entity or snapshot.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_type: Option<String>,
    entity_id: Option<String>,
    snapshot_id: Option<String>,
    run_id: Option<RunId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_type: None,
            entity_id: None,
            snapshot_id: None,
            run_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity family context
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Add entity id context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add snapshot context
    pub fn with_snapshot_id(mut self, snapshot_id: impl Into<String>) -> Self {
        self.snapshot_id = Some(snapshot_id.into());
        self
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn snapshot_id(&self) -> Option<&str> {
        self.snapshot_id.as_deref()
    }

    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// Shorthand for `self.kind().is_retryable()`
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_type) = &self.entity_type {
            write!(f, " (entity_type: {})", entity_type)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(snapshot_id) = &self.snapshot_id {
            write!(f, " (snapshot_id: {})", snapshot_id)?;
        }
        if let Some(run_id) = &self.run_id {
            write!(f, " (run_id: {})", run_id)?;
        }
        if let Some(source) = &self.source {
            write!(f, " caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain errors raised by the registry, loader and reconciler
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvDeltaError {
    // ===== Registry =====
    /// Entity family was requested but is not declared in the registry
    #[error("Entity type not registered: {entity_type}")]
    UnknownEntityType { entity_type: String },

    /// A registry entry failed validation
    #[error("Invalid registry entry for {entity_type}: {reason}")]
    InvalidRegistryEntry { entity_type: String, reason: String },

    /// The registry document itself could not be parsed
    #[error("Registry parse error: {reason}")]
    RegistryParse { reason: String },

    /// Two entries share an entity type
    #[error("Duplicate entity type in registry: {entity_type}")]
    DuplicateEntityType { entity_type: String },

    // ===== Snapshot shape =====
    /// A staged record lacks the family's key field (or it is null/empty)
    #[error("Record at line {line} of {entity_type} is missing key field '{key_field}'")]
    MissingKeyField {
        entity_type: String,
        key_field: String,
        line: usize,
    },

    /// A staged line is not a JSON object
    #[error("Record at line {line} of {entity_type} is not a JSON object: {reason}")]
    MalformedRecord {
        entity_type: String,
        line: usize,
        reason: String,
    },

    /// Key value is neither a string nor an integral number
    #[error("Record at line {line} of {entity_type} has a key that is not a string or integer")]
    NonScalarKey { entity_type: String, line: usize },

    /// Record discriminator does not belong to this family
    #[error("Record at line {line} has discriminator '{value}' not declared for {entity_type}")]
    ForeignDiscriminator {
        entity_type: String,
        line: usize,
        value: String,
    },

    /// Snapshot id does not follow the run-timestamp convention
    #[error("Invalid snapshot id '{snapshot_id}': {reason}")]
    InvalidSnapshotId { snapshot_id: String, reason: String },

    // ===== Writes =====
    /// Some documents of the write-set could not be persisted
    #[error("{failed} of {attempted} current-state writes failed for {entity_type}")]
    PartialWrite {
        entity_type: String,
        attempted: usize,
        failed: usize,
    },

}

impl From<InvDeltaError> for ExError {
    fn from(err: InvDeltaError) -> Self {
        match err {
            InvDeltaError::UnknownEntityType { entity_type } => {
                ExError::new(ExErrorKind::Configuration)
                    .with_entity_type(entity_type)
                    .with_message("entity type is not declared in the registry")
            }

            InvDeltaError::InvalidRegistryEntry {
                entity_type,
                reason,
            } => ExError::new(ExErrorKind::Configuration)
                .with_entity_type(entity_type)
                .with_message(reason),

            InvDeltaError::RegistryParse { reason } => {
                ExError::new(ExErrorKind::Configuration).with_message(reason)
            }

            InvDeltaError::DuplicateEntityType { entity_type } => {
                ExError::new(ExErrorKind::Configuration)
                    .with_entity_type(entity_type)
                    .with_message("entity type declared more than once")
            }

            InvDeltaError::MissingKeyField {
                entity_type,
                key_field,
                line,
            } => ExError::new(ExErrorKind::DataShape)
                .with_entity_type(entity_type)
                .with_message(format!("line {}: missing key field '{}'", line, key_field)),

            InvDeltaError::MalformedRecord {
                entity_type,
                line,
                reason,
            } => ExError::new(ExErrorKind::DataShape)
                .with_entity_type(entity_type)
                .with_message(format!("line {}: {}", line, reason)),

            InvDeltaError::NonScalarKey { entity_type, line } => {
                ExError::new(ExErrorKind::DataShape)
                    .with_entity_type(entity_type)
                    .with_message(format!("line {}: key is not a string or integer", line))
            }

            InvDeltaError::ForeignDiscriminator {
                entity_type,
                line,
                value,
            } => ExError::new(ExErrorKind::DataShape)
                .with_entity_type(entity_type)
                .with_message(format!("line {}: foreign discriminator '{}'", line, value)),

            InvDeltaError::InvalidSnapshotId {
                snapshot_id,
                reason,
            } => ExError::new(ExErrorKind::InvalidSnapshotId)
                .with_snapshot_id(snapshot_id)
                .with_message(reason),

            InvDeltaError::PartialWrite {
                entity_type,
                attempted,
                failed,
            } => ExError::new(ExErrorKind::PartialWrite)
                .with_entity_type(entity_type)
                .with_message(format!("{} of {} writes failed", failed, attempted)),
        }
    }
}
