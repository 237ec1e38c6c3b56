use std::collections::VecDeque;
use std::sync::LazyLock;

use hd_telemetry::logging::AUDIT_TARGET;
use regex::Regex;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// OutputBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity scrollback of a PTY's output. Oldest bytes fall off first.
#[derive(Debug)]
pub struct OutputBuffer {
    bytes: VecDeque<u8>,
    capacity: usize,
    truncated: bool,
    written: u64,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: VecDeque::with_capacity(capacity.min(64 * 1024)),
            capacity,
            truncated: false,
            written: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.written += chunk.len() as u64;
        if chunk.len() > self.capacity {
            self.bytes.clear();
            self.bytes.extend(&chunk[chunk.len() - self.capacity..]);
            self.truncated = true;
            return;
        }
        let overflow = (self.bytes.len() + chunk.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.bytes.drain(..overflow);
            self.truncated = true;
        }
        self.bytes.extend(chunk);
    }

    /// Current contents and whether anything was dropped.
    pub fn snapshot(&self) -> (Vec<u8>, bool) {
        (self.bytes.iter().copied().collect(), self.truncated)
    }

    /// Total bytes ever pushed, including those already dropped.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Sanitisation
// ---------------------------------------------------------------------------

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("static ANSI pattern compiles")
});

static SECRET_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"sk-[A-Za-z0-9_\-]{16,}|hf_[A-Za-z0-9]{30,}|gh[pousr]_[A-Za-z0-9]{20,}|xox[abp]-[A-Za-z0-9\-]{10,}")
        .expect("static secret pattern compiles")
});

static SECRET_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([A-Z0-9_]*(?:api[_-]?key|token|secret|password))\s*([=:])\s*\S+")
        .expect("static assignment pattern compiles")
});

pub const REDACTED: &str = "[REDACTED]";

/// Strip terminal escape sequences and redact credential-looking tokens.
pub fn sanitize(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let stripped = ANSI_ESCAPE.replace_all(&text, "");
    let assignments = SECRET_ASSIGNMENT.replace_all(&stripped, format!("$1$2{REDACTED}"));
    SECRET_TOKEN.replace_all(&assignments, REDACTED).into_owned()
}

// ---------------------------------------------------------------------------
// RawAccessPolicy
// ---------------------------------------------------------------------------

/// Session-scoped switch for raw buffer reads.
///
/// Never persisted: a new process always starts with raw access revoked.
/// Grants, revocations and each raw read are logged under [`AUDIT_TARGET`].
#[derive(Debug)]
pub struct RawAccessPolicy {
    allowed_by_config: bool,
    grant: Option<String>,
}

impl RawAccessPolicy {
    pub fn new(allowed_by_config: bool) -> Self {
        Self {
            allowed_by_config,
            grant: None,
        }
    }

    /// Returns `false` when configuration forbids raw access entirely.
    pub fn grant(&mut self, reason: &str) -> bool {
        if !self.allowed_by_config {
            warn!(target: AUDIT_TARGET, reason, "raw buffer access requested but disabled by config");
            return false;
        }
        info!(target: AUDIT_TARGET, reason, "raw buffer access granted");
        self.grant = Some(reason.to_string());
        true
    }

    pub fn revoke(&mut self) {
        if self.grant.take().is_some() {
            info!(target: AUDIT_TARGET, "raw buffer access revoked");
        }
    }

    pub fn is_granted(&self) -> bool {
        self.grant.is_some()
    }

    /// Check and log one raw read.
    pub fn authorize_read(&self, pty: &str) -> bool {
        match &self.grant {
            Some(reason) => {
                warn!(target: AUDIT_TARGET, pty, reason = %reason, "raw buffer read");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_drops_oldest_bytes() {
        let mut buf = OutputBuffer::new(8);
        buf.push(b"abcdef");
        buf.push(b"ghij");
        let (bytes, truncated) = buf.snapshot();
        assert_eq!(bytes, b"cdefghij");
        assert!(truncated);
        assert_eq!(buf.written(), 10);
    }

    #[test]
    fn oversized_chunk_keeps_tail() {
        let mut buf = OutputBuffer::new(4);
        buf.push(b"0123456789");
        assert_eq!(buf.snapshot().0, b"6789");
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn small_writes_are_not_truncated() {
        let mut buf = OutputBuffer::new(64);
        buf.push(b"hello");
        assert_eq!(buf.snapshot(), (b"hello".to_vec(), false));
    }

    #[test]
    fn sanitize_strips_escape_sequences() {
        let out = sanitize(b"\x1b[1;32mok\x1b[0m done\x1b]0;title\x07");
        assert_eq!(out, "ok done");
    }

    #[test]
    fn sanitize_redacts_tokens() {
        let out = sanitize(b"export ANTHROPIC_API_KEY=abc123 and sk-ant-0123456789abcdefXYZ");
        assert!(!out.contains("abc123"));
        assert!(!out.contains("sk-ant-0123456789abcdefXYZ"));
        assert!(out.contains("ANTHROPIC_API_KEY=[REDACTED]"));
    }

    #[test]
    fn raw_access_requires_config_and_grant() {
        let mut locked = RawAccessPolicy::new(false);
        assert!(!locked.grant("debugging"));
        assert!(!locked.authorize_read("p1"));

        let mut policy = RawAccessPolicy::new(true);
        assert!(!policy.authorize_read("p1"));
        assert!(policy.grant("debugging"));
        assert!(policy.authorize_read("p1"));
        policy.revoke();
        assert!(!policy.is_granted());
        assert!(!policy.authorize_read("p1"));
    }

    #[test]
    fn raw_access_events_use_the_audit_target() {
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::layer::{Context, SubscriberExt};
        use tracing_subscriber::Layer;

        #[derive(Clone, Default)]
        struct Targets(Arc<Mutex<Vec<String>>>);

        impl<S: tracing::Subscriber> Layer<S> for Targets {
            fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
                self.0
                    .lock()
                    .expect("targets lock")
                    .push(event.metadata().target().to_string());
            }
        }

        let targets = Targets::default();
        let subscriber = tracing_subscriber::registry().with(targets.clone());
        tracing::subscriber::with_default(subscriber, || {
            let mut policy = RawAccessPolicy::new(true);
            policy.grant("debugging");
            policy.authorize_read("p1");
            policy.revoke();
        });

        let seen = targets.0.lock().expect("targets lock").clone();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|t| t == AUDIT_TARGET), "got: {seen:?}");
    }
}
