use uuid::Uuid;

/// 32 hex characters, OpenTelemetry trace-id sized.
pub fn generate_trace_id() -> String {
    Uuid::new_v4().as_simple().to_string()
}

/// 16 hex characters.
pub fn generate_span_id() -> String {
    let mut id = Uuid::new_v4().as_simple().to_string();
    id.truncate(16);
    id
}

/// Span for one top-level operation plus the trace id its children share.
#[derive(Debug, Clone)]
pub struct OperationSpan {
    pub span: tracing::Span,
    pub trace_id: String,
}

impl OperationSpan {
    /// Child span under the same trace id.
    pub fn child(&self, operation: &str) -> tracing::Span {
        tracing::info_span!(
            parent: &self.span,
            "operation",
            trace_id = %self.trace_id,
            span_id = %generate_span_id(),
            operation = %operation,
        )
    }
}

pub fn create_operation_span(operation: &str) -> OperationSpan {
    let trace_id = generate_trace_id();
    let span = tracing::info_span!(
        "operation",
        trace_id = %trace_id,
        span_id = %generate_span_id(),
        operation = %operation,
    );
    OperationSpan { span, trace_id }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_format() {
        let id = generate_trace_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn span_id_format() {
        let id = generate_span_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
