use std::fmt;

use crate::content::CaptureKind;
use crate::context::OperationContext;

/// Logging handle bound to one capture.
///
/// Every event carries the service, operation and capture kind so log lines
/// from concurrent captures can be told apart.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CaptureLog<'a> {
    context: &'a OperationContext,
    kind: Option<CaptureKind>,
}

impl<'a> CaptureLog<'a> {
    /// Creates a handle for a capture attempt whose kind is not known yet.
    pub(crate) fn new(context: &'a OperationContext) -> Self {
        Self {
            context,
            kind: None,
        }
    }

    /// Creates a handle for a capture of the given kind.
    pub(crate) fn for_kind(context: &'a OperationContext, kind: CaptureKind) -> Self {
        Self {
            context,
            kind: Some(kind),
        }
    }

    fn kind(&self) -> &'static str {
        self.kind.map_or("-", |k| k.as_str())
    }

    /// Logs a trace-level message.
    pub(crate) fn trace(&self, args: fmt::Arguments<'_>) {
        tracing::trace!(
            service = %self.context.service_name(),
            operation = %self.context.operation_name(),
            kind = self.kind(),
            "{}",
            args
        );
    }

    /// Logs a debug-level message.
    pub(crate) fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(
            service = %self.context.service_name(),
            operation = %self.context.operation_name(),
            kind = self.kind(),
            "{}",
            args
        );
    }

    /// Logs a warning-level message.
    pub(crate) fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(
            service = %self.context.service_name(),
            operation = %self.context.operation_name(),
            kind = self.kind(),
            "{}",
            args
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_placeholder_when_unknown() {
        let ctx = OperationContext::new("svc", "op");
        assert_eq!(CaptureLog::new(&ctx).kind(), "-");
        assert_eq!(
            CaptureLog::for_kind(&ctx, CaptureKind::Response).kind(),
            "response"
        );
    }

    #[test]
    fn logging_without_subscriber_is_harmless() {
        let ctx = OperationContext::new("svc", "op");
        let log = CaptureLog::for_kind(&ctx, CaptureKind::Request);
        log.trace(format_args!("trace {}", 1));
        log.debug(format_args!("debug {}", 2));
        log.warn(format_args!("warn {}", 3));
    }
}
