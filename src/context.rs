use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one observed operation.
///
/// An `OperationContext` names the service and operation under which
/// captures are taken. It never carries payload and is immutable once built;
/// callers typically build one per invocation, wrap it in an `Arc`, and hand
/// clones of that `Arc` to the request and response capture units.
///
/// # Examples
///
/// ```
/// use payload_capture::OperationContext;
///
/// let ctx = OperationContext::new("ServerService", "getMessageFromServer");
///
/// assert_eq!(ctx.service_name(), "ServerService");
/// assert_eq!(ctx.operation_name(), "getMessageFromServer");
/// assert_eq!(ctx.to_string(), "ServerService/getMessageFromServer");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationContext {
    service_name: String,
    operation_name: String,
}

impl OperationContext {
    /// Creates a context for the given service and operation.
    pub fn new(service_name: impl Into<String>, operation_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            operation_name: operation_name.into(),
        }
    }

    /// Returns the service name.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Returns the operation name.
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }
}

impl fmt::Display for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service_name, self.operation_name)
    }
}
