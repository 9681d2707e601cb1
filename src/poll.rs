//! Feed polling and announcement.
//!
//! Everything runs on the calling thread: fetch, compare against the seen
//! set, publish, persist, sleep, repeat. Because an id is inserted into the
//! seen set only after the publisher reports success, and the set is saved
//! before the next item is looked at, a crash can lose at most the item in
//! flight (which is then posted again after restart).
//!
//! There are two entry points: [`run_bulk_registration`] records everything
//! currently in the feed without posting, and [`run_monitoring`] loops until
//! the [`RunState`] is told to stop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::publish::Publisher;
use crate::source::FeedSource;
use crate::store::{SeenSet, SeenStore};

/// Pause between two publishes in the same cycle, to stay clear of the
/// backend's rate limiter.
pub const PUBLISH_DELAY: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Running,
    Stopping,
}

/// Shared Running/Stopping flag.
///
/// The interrupt handler calls [`stop`](RunState::stop); the poll loop looks
/// at the flag after each published item and while sleeping. A sleep in
/// progress is woken immediately.
#[derive(Debug, Clone)]
pub struct RunState {
    inner: Arc<(Mutex<RunMode>, Condvar)>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(RunMode::Running), Condvar::new())),
        }
    }

    pub fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = RunMode::Stopping;
        cvar.notify_all();
    }

    pub fn mode(&self) -> RunMode {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_stopping(&self) -> bool {
        self.mode() == RunMode::Stopping
    }

    /// Block for up to `duration`, returning early if a stop is requested.
    pub fn sleep(&self, duration: Duration) -> RunMode {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, duration, |mode| *mode == RunMode::Running)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

// ---------------------------------------------------------------------------
// Bulk registration
// ---------------------------------------------------------------------------

/// Counts reported at the end of a bulk registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub previously_known: usize,
    pub newly_registered: usize,
    pub total: usize,
}

/// Mark every item currently in the feed as seen, without publishing.
///
/// Used to baseline a channel so only future uploads get announced.
pub fn run_bulk_registration(
    config: &Config,
    seen: &mut SeenSet,
    source: &dyn FeedSource,
    store: &SeenStore,
) -> Registration {
    info!(
        channel = %config.youtube_channel_id,
        source = source.name(),
        "database build mode: registering current videos without posting"
    );
    let previously_known = seen.len();
    info!(count = previously_known, "videos already in database");

    let mut items = source.fetch();
    if items.is_empty() {
        warn!("no entries found in feed");
        return Registration {
            previously_known,
            newly_registered: 0,
            total: previously_known,
        };
    }
    info!(count = items.len(), "found videos in feed");
    items.sort();

    let mut newly_registered = 0;
    for item in &items {
        if item.id.is_empty() {
            warn!(title = %item.title, "skipped entry with no video id");
        } else if seen.insert(item.id.clone()) {
            newly_registered += 1;
            info!(outcome = "success", title = %item.title, "registered");
        } else {
            debug!(title = %item.title, "already known");
        }
    }

    if let Err(e) = store.save(seen) {
        error!(error = %e, "could not save seen videos; duplicate posts could occur on next run");
    }

    let registration = Registration {
        previously_known,
        newly_registered,
        total: seen.len(),
    };
    info!(
        outcome = "success",
        previously_known,
        newly_registered,
        total = registration.total,
        "database build complete; run normally to post only new videos"
    );
    registration
}

// ---------------------------------------------------------------------------
// Monitoring
// ---------------------------------------------------------------------------

/// Per-cycle counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub new: usize,
    pub posted: usize,
    pub failed: usize,
}

/// The monitoring loop and its collaborators.
pub struct Monitor<'a> {
    source: &'a dyn FeedSource,
    publisher: &'a mut dyn Publisher,
    store: &'a SeenStore,
    run_state: RunState,
    interval: Duration,
    publish_delay: Duration,
}

impl<'a> Monitor<'a> {
    pub fn new(
        config: &Config,
        source: &'a dyn FeedSource,
        publisher: &'a mut dyn Publisher,
        store: &'a SeenStore,
        run_state: RunState,
    ) -> Self {
        Self {
            source,
            publisher,
            store,
            run_state,
            interval: config.check_interval(),
            publish_delay: PUBLISH_DELAY,
        }
    }

    #[cfg(test)]
    pub fn with_publish_delay(mut self, delay: Duration) -> Self {
        self.publish_delay = delay;
        self
    }

    /// Cycle and sleep until stopped.
    pub fn run(&mut self, seen: &mut SeenSet) {
        info!(
            source = self.source.name(),
            interval_secs = self.interval.as_secs_f64(),
            known = seen.len(),
            "monitoring started"
        );
        loop {
            self.guarded_cycle(seen);
            if self.run_state.is_stopping() {
                break;
            }
            info!(secs = self.interval.as_secs_f64(), "sleeping until next check");
            if self.run_state.sleep(self.interval) == RunMode::Stopping {
                break;
            }
        }
        info!("interrupt received, monitoring stopped");
    }

    /// Run one cycle, turning a panic anywhere inside it into a log line.
    pub fn guarded_cycle(&mut self, seen: &mut SeenSet) -> Option<CycleSummary> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle(seen))) {
            Ok(summary) => Some(summary),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(reason, "unexpected error during check cycle; monitoring continues");
                None
            }
        }
    }

    /// Fetch once and publish everything not yet seen.
    pub fn run_cycle(&mut self, seen: &mut SeenSet) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let items = self.source.fetch();
        if items.is_empty() {
            warn!("no entries found in feed");
            return summary;
        }
        info!(count = items.len(), "found videos in feed");

        for item in &items {
            if seen.contains(&item.id) {
                continue;
            }
            if item.id.is_empty() {
                warn!(title = %item.title, "skipping entry with no video id");
                continue;
            }
            if item.url.is_empty() {
                warn!(title = %item.title, id = %item.id, "skipping entry with no url");
                continue;
            }

            summary.new += 1;
            info!(title = %item.title, id = %item.id, published = ?item.published_at, "new video found");

            if self.publisher.publish(&item.title, &item.url) {
                summary.posted += 1;
                seen.insert(item.id.clone());
                if let Err(e) = self.store.save(seen) {
                    warn!(error = %e, "could not save seen videos; duplicate posts could occur after a restart");
                }
            } else {
                summary.failed += 1;
                warn!(title = %item.title, "will retry posting on next check cycle");
            }

            if self.run_state.sleep(self.publish_delay) == RunMode::Stopping {
                info!("stop requested, ending cycle early");
                break;
            }
        }

        if summary.new > 0 {
            info!(
                new = summary.new,
                posted = summary.posted,
                failed = summary.failed,
                "check cycle summary"
            );
        } else {
            debug!("no new videos this cycle");
        }
        summary
    }
}

/// Announce new items forever, or until `run_state` is stopped.
pub fn run_monitoring<'a>(
    config: &Config,
    seen: &mut SeenSet,
    source: &'a dyn FeedSource,
    publisher: &'a mut dyn Publisher,
    store: &'a SeenStore,
    run_state: RunState,
) {
    Monitor::new(config, source, publisher, store, run_state).run(seen);
}
