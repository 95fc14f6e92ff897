//! Error types for the bridge.
//!
//! Faults never cross the host boundary as exceptions. Every core entry
//! point returns a [`BridgeResult`], and the ABI layer maps each
//! [`BridgeError`] to the sentinel of the entry point that produced it.

use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Everything that can go wrong between the host and the implementation.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// An uncaught Python exception surfaced during an invocation.
    #[error("Python fault in {operation}: {message}")]
    RuntimeFault { operation: String, message: String },

    /// The host callback table could not be registered.
    #[error("Host registration failed: {0}")]
    RegistrationFailure(String),

    /// The implementation module could not be imported.
    #[error("Failed to import implementation module '{module}': {message}")]
    ImportFailure { module: String, message: String },

    /// A value from the implementation did not match its contract.
    #[error(transparent)]
    MarshalMismatch(#[from] MarshalError),

    /// The implementation asked for native I/O but the host could not open the file.
    #[error("Host could not open '{path}' natively")]
    NativeIoFailure { path: String },

    /// The execution context does not exist (before Create or after Destroy).
    #[error("Execution context has not been created")]
    NotCreated,
}

impl BridgeError {
    /// Create a runtime fault error.
    pub fn runtime_fault(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RuntimeFault {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an import failure error.
    pub fn import_failure(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ImportFailure {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from the implementation rather than the bridge.
    pub fn is_runtime_fault(&self) -> bool {
        matches!(self, Self::RuntimeFault { .. })
    }
}

/// A Python value that does not fit the shape the bridge expects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    /// A required field is absent.
    #[error("{record} is missing field '{field}'")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    /// A field is present with the wrong type.
    #[error("{record}.{field} must be {expected}")]
    WrongType {
        record: &'static str,
        field: &'static str,
        expected: &'static str,
    },

    /// A return value has the wrong overall shape.
    #[error("{operation} returned an unexpected value, expected {expected}")]
    UnexpectedShape {
        operation: &'static str,
        expected: &'static str,
    },
}

impl MarshalError {
    pub fn missing(record: &'static str, field: &'static str) -> Self {
        Self::MissingField { record, field }
    }

    pub fn wrong_type(record: &'static str, field: &'static str, expected: &'static str) -> Self {
        Self::WrongType {
            record,
            field,
            expected,
        }
    }

    pub fn shape(operation: &'static str, expected: &'static str) -> Self {
        Self::UnexpectedShape {
            operation,
            expected,
        }
    }
}

/// Host PVR error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PvrError {
    NoError = 0,
    Unknown = -1,
    NotImplemented = -2,
    ServerError = -3,
    ServerTimeout = -4,
    Rejected = -5,
    AlreadyPresent = -6,
    InvalidParameters = -7,
    RecordingRunning = -8,
    Failed = -9,
}

impl PvrError {
    /// Interpret an integer reported by the implementation.
    ///
    /// Values outside the host enumeration become [`PvrError::Unknown`].
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::NoError,
            -2 => Self::NotImplemented,
            -3 => Self::ServerError,
            -4 => Self::ServerTimeout,
            -5 => Self::Rejected,
            -6 => Self::AlreadyPresent,
            -7 => Self::InvalidParameters,
            -8 => Self::RecordingRunning,
            -9 => Self::Failed,
            _ => Self::Unknown,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == Self::NoError
    }
}

/// Host add-on status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum AddonStatus {
    Ok = 0,
    LostConnection = 1,
    NeedRestart = 2,
    NeedSettings = 3,
    #[default]
    Unknown = 4,
    NeedSavedSettings = 5,
    PermanentFailure = 6,
    NotImplemented = 7,
}

impl AddonStatus {
    /// Interpret an integer reported by the implementation's `ADDON_Create`.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::LostConnection,
            2 => Self::NeedRestart,
            3 => Self::NeedSettings,
            5 => Self::NeedSavedSettings,
            6 => Self::PermanentFailure,
            7 => Self::NotImplemented,
            _ => Self::Unknown,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}
