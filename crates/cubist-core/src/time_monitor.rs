//! Time monitor. Periodically refreshes the "latest event time" of data cubes
//! whose refresh rule is `query`.
//!
//! Checks are registered by name. A fixed tick drives rounds; a round runs
//! every stale check concurrently and never overlaps with another round. Ticks
//! arriving while a round is in flight are dropped.

use chrono::{DateTime, Utc};
use futures::{
	FutureExt,
	future::{BoxFuture, join_all},
};
use parking_lot::{Mutex, RwLock};
use std::{
	collections::HashMap,
	panic::AssertUnwindSafe,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use cubist_types::Timekeeper;

use crate::prelude::*;

pub const DEFAULT_TICK: Duration = Duration::from_millis(1000);
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(60_000);

/// Produces the latest event time of one data cube
pub type TimeCheck = Arc<dyn Fn() -> BoxFuture<'static, CuResult<DateTime<Utc>>> + Send + Sync>;

struct Inner {
	checks: RwLock<HashMap<String, TimeCheck>>,
	timekeeper: RwLock<Arc<Timekeeper>>,
	doing_checks: AtomicBool,
	check_interval: Duration,
}

pub struct TimeMonitor {
	inner: Arc<Inner>,
	tick: Duration,
	ticker: Mutex<Option<JoinHandle<()>>>,
}

impl TimeMonitor {
	pub fn new() -> Self {
		Self::with_intervals(DEFAULT_TICK, DEFAULT_CHECK_INTERVAL)
	}

	pub fn with_intervals(tick: Duration, check_interval: Duration) -> Self {
		Self {
			inner: Arc::new(Inner {
				checks: RwLock::new(HashMap::new()),
				timekeeper: RwLock::new(Arc::new(Timekeeper::new())),
				doing_checks: AtomicBool::new(false),
				check_interval,
			}),
			tick,
			ticker: Mutex::new(None),
		}
	}

	/// Current timekeeper snapshot
	pub fn timekeeper(&self) -> Arc<Timekeeper> {
		self.inner.timekeeper.read().clone()
	}

	/// Registers (or replaces) the check for `name`. The tag starts out stale.
	pub fn add_check(&self, name: &str, check: TimeCheck) {
		debug!(data_cube = %name, "Adding time check");
		self.inner.checks.write().insert(name.to_string(), check);
		let mut timekeeper = self.inner.timekeeper.write();
		*timekeeper = Arc::new(timekeeper.add_time_tag_for(name));
	}

	pub fn remove_check(&self, name: &str) {
		debug!(data_cube = %name, "Removing time check");
		self.inner.checks.write().remove(name);
		let mut timekeeper = self.inner.timekeeper.write();
		*timekeeper = Arc::new(timekeeper.remove_time_tag_for(name));
	}

	pub fn has_check(&self, name: &str) -> bool {
		self.inner.checks.read().contains_key(name)
	}

	/// Starts the background ticker. Must be called from a tokio runtime.
	pub fn start(&self) {
		let mut ticker = self.ticker.lock();
		if ticker.is_some() {
			return;
		}
		let inner = self.inner.clone();
		let tick = self.tick;
		*ticker = Some(tokio::spawn(async move {
			let mut interval = tokio::time::interval(tick);
			interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
			loop {
				interval.tick().await;
				if inner.doing_checks.load(Ordering::Acquire) {
					continue;
				}
				let inner = inner.clone();
				tokio::spawn(async move {
					inner.run_round().await;
				});
			}
		}));
		info!("Time monitor started (tick {:?})", tick);
	}

	/// Stops the ticker. A round already in flight runs to completion.
	pub fn stop(&self) {
		if let Some(handle) = self.ticker.lock().take() {
			handle.abort();
			info!("Time monitor stopped");
		}
	}

	/// Runs one round right now. Returns `false` if a round was already in flight.
	pub async fn check_now(&self) -> bool {
		self.inner.run_round().await
	}
}

impl Default for TimeMonitor {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for TimeMonitor {
	fn drop(&mut self) {
		if let Some(handle) = self.ticker.get_mut().take() {
			handle.abort();
		}
	}
}

/// Clears the in-flight flag when a round settles, however it settles
struct RoundGuard<'a>(&'a AtomicBool);

impl Drop for RoundGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

impl Inner {
	async fn run_round(&self) -> bool {
		if self.doing_checks.swap(true, Ordering::AcqRel) {
			debug!("Time check round already in flight, skipping");
			return false;
		}
		let _guard = RoundGuard(&self.doing_checks);

		let stale = self.timekeeper.read().stale_tags(Utc::now(), self.check_interval);
		let due: Vec<(String, TimeCheck)> = {
			let checks = self.checks.read();
			stale
				.into_iter()
				.filter_map(|name| checks.get(&name).map(|check| (name, check.clone())))
				.collect()
		};

		let results = join_all(due.into_iter().map(|(name, check)| async move {
			let res = match AssertUnwindSafe(async move { check().await }).catch_unwind().await {
				Ok(res) => res,
				Err(_) => Err(Error::Internal("time check panicked".into())),
			};
			(name, res)
		}))
		.await;

		for (name, res) in results {
			match res {
				Ok(time) => {
					// The check may have been removed while it was running
					if !self.checks.read().contains_key(&name) {
						debug!(data_cube = %name, "Discarding time check result for removed check");
						continue;
					}
					let mut timekeeper = self.timekeeper.write();
					*timekeeper = Arc::new(timekeeper.update_time(&name, time, Utc::now()));
					debug!(data_cube = %name, time = %time, "Max time updated");
				}
				Err(err) => {
					warn!(data_cube = %name, "Time check failed: {}", err);
				}
			}
		}

		true
	}
}


// vim: ts=4
