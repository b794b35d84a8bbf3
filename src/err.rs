pub type ControllerResult<T> = Result<T, ControllerError>;

/// How a failure should be treated by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced object doesn't exist.
    NotFound,
    /// The ingress or one of its annotations is malformed.
    /// Retrying only helps once somebody fixes the object.
    Structural,
    /// A VirtualService with the expected name belongs to something else.
    Conflict,
    /// Write calls against the API server.
    Transient,
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },
    #[error("Failed to parse annotation {key}={value:?}: {reason}")]
    InvalidAnnotation {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("Unexpected number of parts in gateway identifier {id:?}: {parts}")]
    InvalidGatewayId { id: String, parts: usize },
    #[error("Invalid ingress rule in {0}: no http definition")]
    MissingHttp(String),
    #[error("Service {service} doesn't declare a port named {port}")]
    UnknownPortName { service: String, port: String },
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),
    #[error("Object is missing required field: {0}")]
    MissingField(&'static str),
    #[error("Host {host} doesn't translate to a valid authority pattern: {source}")]
    InvalidHostPattern {
        host: String,
        #[source]
        source: regex::Error,
    },
    #[error("VirtualService {0} already exists and is not owned by ingress {1}")]
    Conflict(String, String),
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),
}

impl ControllerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControllerError::NotFound { .. } => ErrorKind::NotFound,
            ControllerError::InvalidAnnotation { .. }
            | ControllerError::InvalidGatewayId { .. }
            | ControllerError::MissingHttp(_)
            | ControllerError::UnknownPortName { .. }
            | ControllerError::UnsupportedBackend(_)
            | ControllerError::MissingField(_)
            | ControllerError::InvalidHostPattern { .. } => ErrorKind::Structural,
            ControllerError::Conflict(..) => ErrorKind::Conflict,
            ControllerError::KubeError(_) => ErrorKind::Transient,
        }
    }
}
