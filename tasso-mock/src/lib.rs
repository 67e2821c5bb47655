//! tasso-mock
//!
//! In-memory `DailySource` for tests and demos. Days are registered up front;
//! per-day behaviors (failures, latency, hangs, gates) can be scripted and
//! every call is counted so tests can assert on fetch patterns.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, watch};

use tasso_core::{DailySource, DayRecord, TassoError, parse_daily_csv};

pub mod fixtures;

/// Instruction for how `fetch_day` should behave for a given date.
#[derive(Clone, Debug)]
pub enum DayBehavior {
    /// Fail every time with the provided error.
    Fail(TassoError),
    /// Fail the first `n` calls with the provided error, then serve the day.
    FailTimes(u32, TassoError),
    /// Hang indefinitely (simulate a stalled download).
    Hang,
    /// Panic inside the fetch (simulate a connector bug).
    Panic,
    /// Serve the day after the given delay.
    Delay(Duration),
    /// Serve the day once the gate is opened.
    WaitFor(MockGate),
}

/// A latch that holds back gated fetches until `open` is called.
#[derive(Clone, Debug)]
pub struct MockGate {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for MockGate {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGate {
    /// A closed gate.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Release every fetch waiting on this gate, now and in the future.
    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true once `open` has been called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[derive(Default)]
struct Rules {
    behaviors: HashMap<NaiveDate, DayBehavior>,
    fetches_by_date: BTreeMap<NaiveDate, usize>,
}

/// Scriptable daily source.
pub struct MockSource {
    name: &'static str,
    days: BTreeMap<NaiveDate, Vec<DayRecord>>,
    stalled_exists: BTreeSet<NaiveDate>,
    latency: Duration,
    rules: Mutex<Rules>,
    fetches: AtomicUsize,
    probes: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSource {
    /// An empty source: every day is `NotFound`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "tasso-mock",
            days: BTreeMap::new(),
            stalled_exists: BTreeSet::new(),
            latency: Duration::ZERO,
            rules: Mutex::new(Rules::default()),
            fetches: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Override the connector name reported by `name()`.
    #[must_use]
    pub const fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Publish `records` as the daily file for `date`.
    #[must_use]
    pub fn with_day(mut self, date: NaiveDate, records: Vec<DayRecord>) -> Self {
        self.days.insert(date, records);
        self
    }

    /// Publish a raw daily CSV for `date`, parsed the way a real connector would.
    #[must_use]
    pub fn with_csv(self, date: NaiveDate, csv: &str) -> Self {
        let parsed = parse_daily_csv(date, csv.as_bytes());
        self.with_day(date, parsed.records)
    }

    /// Publish deterministic data for every day in `[first, last]`.
    #[must_use]
    pub fn with_synthetic_days(mut self, first: NaiveDate, last: NaiveDate) -> Self {
        for date in first.iter_days().take_while(|d| *d <= last) {
            self.days.insert(date, fixtures::synthetic_day(date));
        }
        self
    }

    /// Remove a published day, leaving a hole.
    #[must_use]
    pub fn without_day(mut self, date: NaiveDate) -> Self {
        self.days.remove(&date);
        self
    }

    /// Latency applied to every fetch that has no `Delay` behavior of its own.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Script `fetch_day` for `date`.
    #[must_use]
    pub fn with_behavior(mut self, date: NaiveDate, behavior: DayBehavior) -> Self {
        self.rules.get_mut().behaviors.insert(date, behavior);
        self
    }

    /// Make `exists(date)` hang indefinitely (simulate a stalled status check).
    #[must_use]
    pub fn with_stalled_exists(mut self, date: NaiveDate) -> Self {
        self.stalled_exists.insert(date);
        self
    }

    /// Replace the behavior for `date` after construction.
    pub async fn set_behavior(&self, date: NaiveDate, behavior: DayBehavior) {
        self.rules.lock().await.behaviors.insert(date, behavior);
    }

    /// Every published date, ascending.
    #[must_use]
    pub fn published_days(&self) -> Vec<NaiveDate> {
        self.days.keys().copied().collect()
    }

    /// Number of `fetch_day` calls so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of `exists` calls so far.
    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Number of `fetch_day` calls for `date`.
    pub async fn fetches_of(&self, date: NaiveDate) -> usize {
        self.rules
            .lock()
            .await
            .fetches_by_date
            .get(&date)
            .copied()
            .unwrap_or(0)
    }

    /// Dates fetched at least once, ascending.
    pub async fn fetched_dates(&self) -> Vec<NaiveDate> {
        self.rules
            .lock()
            .await
            .fetches_by_date
            .keys()
            .copied()
            .collect()
    }

    /// Fetches currently in progress.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous fetches observed.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlight {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight {
            counter: Arc::clone(&self.in_flight),
        }
    }

    fn serve(&self, date: NaiveDate) -> Result<Vec<DayRecord>, TassoError> {
        self.days
            .get(&date)
            .cloned()
            .ok_or_else(|| TassoError::not_found(format!("daily report {date}")))
    }
}

/// Decrements the in-flight counter on drop, including when the fetch is cancelled.
struct InFlight {
    counter: Arc<AtomicUsize>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DailySource for MockSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_day(&self, date: NaiveDate) -> Result<Vec<DayRecord>, TassoError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter();

        // Resolve the behavior without holding the lock across await points.
        let behavior = {
            let mut rules = self.rules.lock().await;
            *rules.fetches_by_date.entry(date).or_insert(0) += 1;
            match rules.behaviors.get_mut(&date) {
                Some(DayBehavior::FailTimes(n, err)) => {
                    if *n > 0 {
                        *n -= 1;
                        Some(DayBehavior::Fail(err.clone()))
                    } else {
                        None
                    }
                }
                other => other.cloned(),
            }
        };

        match behavior {
            Some(DayBehavior::Fail(e)) => Err(e),
            Some(DayBehavior::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Some(DayBehavior::Panic) => panic!("tasso-mock: scripted panic for {date}"),
            Some(DayBehavior::Delay(d)) => {
                tokio::time::sleep(d).await;
                self.serve(date)
            }
            Some(DayBehavior::WaitFor(gate)) => {
                gate.wait().await;
                if !self.latency.is_zero() {
                    tokio::time::sleep(self.latency).await;
                }
                self.serve(date)
            }
            Some(DayBehavior::FailTimes(..)) | None => {
                if !self.latency.is_zero() {
                    tokio::time::sleep(self.latency).await;
                }
                self.serve(date)
            }
        }
    }

    async fn exists(&self, date: NaiveDate) -> Result<bool, TassoError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.stalled_exists.contains(&date) {
            std::future::pending::<()>().await;
        }
        Ok(self.days.contains_key(&date))
    }
}
