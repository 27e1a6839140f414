use std::sync::atomic::{AtomicU8, Ordering};

const RUNNING: u8 = 0;
const REQUESTED: u8 = 1;
const COMMITTED: u8 = 2;

/// Stop flag shared by the supervisor and one worker.
///
/// A stop request and the worker's final commit race on a single atomic,
/// so exactly one of them wins: either the job ends `stopped` with the
/// registry untouched, or the stop is refused and the job completes.
#[derive(Debug, Default)]
pub(crate) struct CancelToken(AtomicU8);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire) == REQUESTED
    }

    /// Ask the worker to stop. Returns false once it has committed.
    pub fn request(&self) -> bool {
        match self
            .0
            .compare_exchange(RUNNING, REQUESTED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) | Err(REQUESTED) => true,
            Err(_) => false,
        }
    }

    /// Claim the commit point. Returns false if a stop got there first.
    pub fn commit(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, COMMITTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_then_commit() {
        let token = CancelToken::new();
        assert!(!token.is_requested());
        assert!(token.request());
        assert!(token.request());
        assert!(token.is_requested());
        assert!(!token.commit());
    }

    #[test]
    fn test_commit_then_request() {
        let token = CancelToken::new();
        assert!(token.commit());
        assert!(!token.request());
        assert!(!token.is_requested());
    }
}
