use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Issues process ids derived from the wall clock in milliseconds.
///
/// Two submissions within the same millisecond still get distinct ids: each
/// id is at least one greater than the previous one.
#[derive(Debug, Default)]
pub struct ProcessIdGenerator {
    last: AtomicI64,
}

impl ProcessIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate.to_string(),
                Err(actual) => prev = actual,
            }
        }
    }
}
