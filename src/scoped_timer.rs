use tokio::time::Instant;
use tracing::trace;

use crate::OPERATION_LATENCY_MS;

/// Times one future-backed operation until dropped.
pub(crate) struct ScopedTimer {
    start: Instant,
    op: &'static str,
}

impl ScopedTimer {
    pub(crate) fn new(op: &'static str) -> Self {
        Self {
            start: Instant::now(),
            op,
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        OPERATION_LATENCY_MS
            .with_label_values(&[self.op])
            .observe(elapsed.as_secs_f64() * 1000.0);
        trace!(target: "timing", "[TIMING] {} took {} ms", self.op, elapsed.as_millis());
    }
}
