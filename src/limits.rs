// ABOUTME: Execution quotas and the cooperative resource limiter that
// enforces them at statement, loop and call checkpoints

use crate::error::ExecutionError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative cancellation flag shared between the host and a running
/// script. The interpreter observes it at every limiter checkpoint; host
/// functions should observe it inside blocking operations.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Hard quotas for one script run. All loop iterations are cumulative across
/// every loop in the script.
#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    pub max_execution_time: Duration,
    pub max_statements: u64,
    pub max_loop_iterations: u64,
    pub max_call_depth: u32,
    pub max_script_call_depth: u32,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        ExecutionLimits {
            max_execution_time: Duration::from_secs(10),
            max_statements: 1_000_000,
            max_loop_iterations: 10_000_000,
            max_call_depth: 256,
            max_script_call_depth: 8,
        }
    }
}

impl ExecutionLimits {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_execution_time(mut self, limit: Duration) -> Self {
        self.max_execution_time = limit;
        self
    }

    #[must_use]
    pub fn max_statements(mut self, limit: u64) -> Self {
        self.max_statements = limit;
        self
    }

    #[must_use]
    pub fn max_loop_iterations(mut self, limit: u64) -> Self {
        self.max_loop_iterations = limit;
        self
    }

    #[must_use]
    pub fn max_call_depth(mut self, limit: u32) -> Self {
        self.max_call_depth = limit;
        self
    }

    #[must_use]
    pub fn max_script_call_depth(mut self, limit: u32) -> Self {
        self.max_script_call_depth = limit;
        self
    }
}

/// Enforces [`ExecutionLimits`] and records the counters surfaced in run
/// metadata.
///
/// The limiter is started by `execute` and consulted at every statement,
/// loop iteration and function call. There is no timer thread: the deadline
/// and the host token are both evaluated inside the checks, which are the
/// only points a single-threaded run can observe cancellation anyway.
#[derive(Debug)]
pub struct ResourceLimiter {
    limits: ExecutionLimits,
    token: CancellationToken,
    started: Option<Instant>,
    statement_count: u64,
    loop_iterations: u64,
    call_depth: u32,
    max_call_depth_seen: u32,
    function_call_count: u64,
}

impl ResourceLimiter {
    pub fn new(limits: ExecutionLimits) -> Self {
        ResourceLimiter::with_token(limits, CancellationToken::new())
    }

    /// Creates a limiter linked to a host-provided cancellation token.
    pub fn with_token(limits: ExecutionLimits, token: CancellationToken) -> Self {
        ResourceLimiter {
            limits,
            token,
            started: None,
            statement_count: 0,
            loop_iterations: 0,
            call_depth: 0,
            max_call_depth_seen: 0,
            function_call_count: 0,
        }
    }

    /// Records the wall-clock mark. Call immediately before execution.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn elapsed(&self) -> Duration {
        self.started.map(|t| t.elapsed()).unwrap_or_default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn statement_count(&self) -> u64 {
        self.statement_count
    }

    pub fn loop_iterations(&self) -> u64 {
        self.loop_iterations
    }

    pub fn function_call_count(&self) -> u64 {
        self.function_call_count
    }

    pub fn max_call_depth_seen(&self) -> u32 {
        self.max_call_depth_seen
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Cancellation and wall-clock check, cheap enough for tight stdlib
    /// loops.
    pub fn check_execution_time(&self) -> Result<(), ExecutionError> {
        if self.token.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        if let Some(started) = self.started {
            if started.elapsed() > self.limits.max_execution_time {
                return Err(ExecutionError::ExecutionTimeLimitExceeded(
                    self.limits.max_execution_time.as_millis(),
                ));
            }
        }
        Ok(())
    }

    /// Invoked before every statement.
    pub fn check_and_count_statement(&mut self) -> Result<(), ExecutionError> {
        self.check_execution_time()?;
        self.statement_count += 1;
        if self.statement_count > self.limits.max_statements {
            return Err(ExecutionError::StatementLimitExceeded(
                self.limits.max_statements,
            ));
        }
        Ok(())
    }

    /// Invoked before every iteration of every loop; the budget is shared by
    /// all loops in the run.
    pub fn check_and_enter_loop(&mut self) -> Result<(), ExecutionError> {
        self.check_execution_time()?;
        self.loop_iterations += 1;
        if self.loop_iterations > self.limits.max_loop_iterations {
            return Err(ExecutionError::LoopIterationLimitExceeded(
                self.limits.max_loop_iterations,
            ));
        }
        Ok(())
    }

    /// Invoked before dispatching any function call, including lambdas.
    pub fn check_and_enter_call(&mut self) -> Result<(), ExecutionError> {
        self.check_execution_time()?;
        if self.call_depth >= self.limits.max_call_depth {
            return Err(ExecutionError::CallDepthLimitExceeded(
                self.limits.max_call_depth,
            ));
        }
        self.call_depth += 1;
        self.function_call_count += 1;
        if self.call_depth > self.max_call_depth_seen {
            self.max_call_depth_seen = self.call_depth;
        }
        Ok(())
    }

    /// Must pair with every successful `check_and_enter_call`.
    pub fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    pub fn max_script_call_depth(&self) -> u32 {
        self.limits.max_script_call_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_limit() {
        let mut limiter = ResourceLimiter::new(ExecutionLimits::new().max_statements(2));
        limiter.start();
        assert!(limiter.check_and_count_statement().is_ok());
        assert!(limiter.check_and_count_statement().is_ok());
        assert!(matches!(
            limiter.check_and_count_statement(),
            Err(ExecutionError::StatementLimitExceeded(2))
        ));
    }

    #[test]
    fn test_loop_budget_is_cumulative() {
        let mut limiter = ResourceLimiter::new(ExecutionLimits::new().max_loop_iterations(3));
        limiter.start();
        for _ in 0..3 {
            assert!(limiter.check_and_enter_loop().is_ok());
        }
        assert!(matches!(
            limiter.check_and_enter_loop(),
            Err(ExecutionError::LoopIterationLimitExceeded(3))
        ));
    }

    #[test]
    fn test_call_depth_tracks_high_water_mark() {
        let mut limiter = ResourceLimiter::new(ExecutionLimits::new().max_call_depth(2));
        limiter.start();
        limiter.check_and_enter_call().unwrap();
        limiter.check_and_enter_call().unwrap();
        assert!(matches!(
            limiter.check_and_enter_call(),
            Err(ExecutionError::CallDepthLimitExceeded(2))
        ));
        limiter.exit_call();
        limiter.exit_call();
        assert_eq!(limiter.max_call_depth_seen(), 2);
        assert_eq!(limiter.function_call_count(), 2);
    }

    #[test]
    fn test_time_limit() {
        let mut limiter = ResourceLimiter::new(
            ExecutionLimits::new().max_execution_time(Duration::from_millis(0)),
        );
        limiter.start();
        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(
            limiter.check_execution_time(),
            Err(ExecutionError::ExecutionTimeLimitExceeded(_))
        ));
    }

    #[test]
    fn test_cancellation_reported_before_quotas() {
        let token = CancellationToken::new();
        let mut limiter =
            ResourceLimiter::with_token(ExecutionLimits::new().max_statements(0), token.clone());
        limiter.start();
        token.cancel();
        assert!(matches!(
            limiter.check_and_count_statement(),
            Err(ExecutionError::Cancelled)
        ));
    }

    #[test]
    fn test_unstarted_limiter_ignores_deadline() {
        let limiter = ResourceLimiter::new(
            ExecutionLimits::new().max_execution_time(Duration::from_millis(0)),
        );
        assert!(limiter.check_execution_time().is_ok());
    }
}
