/// Sweep runner
///
/// Runs every registered [`Sweep`] once per tick, starting immediately,
/// until the shutdown token is cancelled. A failing sweep is logged and
/// retried on the next tick; it never stops the loop or the sweeps after it.
///
/// # Example
///
/// ```no_run
/// use tallyboard_worker::{runner::SweepRunner, sweeps::default_sweeps};
/// use sqlx::PgPool;
/// use std::time::Duration;
///
/// # async fn example(pool: PgPool) {
/// let runner = SweepRunner::new(pool, default_sweeps(), Duration::from_secs(300));
/// let shutdown = runner.shutdown_token();
///
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     shutdown.cancel();
/// });
///
/// runner.run().await;
/// # }
/// ```

use crate::sweeps::{Sweep, SweepError};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Outcome of one sweep during a tick
#[derive(Debug)]
pub struct SweepOutcome {
    pub name: &'static str,
    pub result: Result<u64, SweepError>,
}

pub struct SweepRunner {
    pool: PgPool,
    sweeps: Vec<Arc<dyn Sweep>>,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl SweepRunner {
    pub fn new(pool: PgPool, sweeps: Vec<Arc<dyn Sweep>>, interval: Duration) -> Self {
        SweepRunner {
            pool,
            sweeps,
            interval,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops [`SweepRunner::run`] after the current tick
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs each sweep once, in registration order
    pub async fn run_once(&self) -> Vec<SweepOutcome> {
        let mut outcomes = Vec::with_capacity(self.sweeps.len());

        for sweep in &self.sweeps {
            let started = Instant::now();
            let result = sweep.run(&self.pool).await;

            match &result {
                Ok(touched) if *touched > 0 => tracing::info!(
                    sweep = sweep.name(),
                    touched,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Sweep updated rows"
                ),
                Ok(_) => tracing::debug!(sweep = sweep.name(), "Sweep found nothing to do"),
                Err(e) => tracing::error!(sweep = sweep.name(), error = %e, "Sweep failed"),
            }

            outcomes.push(SweepOutcome {
                name: sweep.name(),
                result,
            });
        }

        outcomes
    }

    /// Ticks until shutdown
    pub async fn run(&self) {
        tracing::info!(
            sweeps = self.sweeps.len(),
            interval_secs = self.interval.as_secs(),
            "Sweep runner starting"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }

        tracing::info!("Sweep runner stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Pool that is never connected; the fake sweeps do not touch it
    fn idle_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgresql://tallyboard@127.0.0.1:1/unused")
            .unwrap()
    }

    struct CountingSweep {
        name: &'static str,
        runs: AtomicUsize,
        log: Arc<Mutex<Vec<&'static str>>>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl CountingSweep {
        fn new(name: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> Self {
            CountingSweep {
                name,
                runs: AtomicUsize::new(0),
                log,
                cancel_after: None,
            }
        }
    }

    #[async_trait]
    impl Sweep for CountingSweep {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn run(&self, _pool: &PgPool) -> Result<u64, SweepError> {
            let runs = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            self.log.lock().unwrap().push(self.name);

            if let Some((limit, token)) = &self.cancel_after {
                if runs >= *limit {
                    token.cancel();
                }
            }
            Ok(1)
        }
    }

    struct FailingSweep;

    #[async_trait]
    impl Sweep for FailingSweep {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run(&self, _pool: &PgPool) -> Result<u64, SweepError> {
            Err(SweepError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn test_run_once_keeps_going_after_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let after = Arc::new(CountingSweep::new("after", log.clone()));
        let runner = SweepRunner::new(
            idle_pool(),
            vec![Arc::new(FailingSweep), after.clone()],
            Duration::from_secs(60),
        );

        let outcomes = runner.run_once().await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].name, "failing");
        assert!(outcomes[0].result.is_err());
        assert_eq!(outcomes[1].name, "after");
        assert_eq!(outcomes[1].result.as_ref().unwrap(), &1);
        assert_eq!(after.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_once_preserves_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = SweepRunner::new(
            idle_pool(),
            vec![
                Arc::new(CountingSweep::new("first", log.clone())),
                Arc::new(CountingSweep::new("second", log.clone())),
            ],
            Duration::from_secs(60),
        );

        runner.run_once().await;
        runner.run_once().await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_cancelled() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let token = CancellationToken::new();
        let mut sweep = CountingSweep::new("counting", log.clone());
        sweep.cancel_after = Some((3, token.clone()));
        let sweep = Arc::new(sweep);

        let mut runner = SweepRunner::new(idle_pool(), vec![sweep.clone()], Duration::from_secs(60));
        runner.shutdown_token = token;

        let started = tokio::time::Instant::now();
        runner.run().await;

        assert_eq!(sweep.runs.load(Ordering::SeqCst), 3);
        // First tick is immediate, then one per interval
        assert!(started.elapsed() >= Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_run_returns_when_already_cancelled() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = SweepRunner::new(
            idle_pool(),
            vec![Arc::new(CountingSweep::new("counting", log.clone()))],
            Duration::from_secs(3600),
        );
        runner.shutdown_token().cancel();

        tokio::time::timeout(Duration::from_secs(5), runner.run())
            .await
            .unwrap();

        // Either branch may win the first select; at most one tick runs
        assert!(log.lock().unwrap().len() <= 1);
    }
}
