//! Per-subscriber trailing-edge debouncing of refresh signals.
//!
//! Each armed subscriber owns one task. `schedule` only pokes that task's
//! `Notify`; the task waits until no poke has arrived for a full window and
//! then runs the refresh. Pokes that land while a refresh is running are kept
//! as a single pending permit, so the next refresh follows the current one
//! instead of overlapping it.

use dashmap::DashMap;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Callback run when a subscriber's window closes.
pub type RefreshFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Wraps an async closure as a [`RefreshFn`].
pub fn refresh_fn<F, Fut>(f: F) -> RefreshFn
where
	F: Fn() -> Fut + Send + Sync + 'static,
	Fut: Future<Output = ()> + Send + 'static,
{
	Arc::new(move || Box::pin(f()))
}

struct Slot {
	notify: Arc<Notify>,
	task: JoinHandle<()>,
}

pub struct Debouncer {
	window: Duration,
	slots: DashMap<String, Slot>,
}

impl Debouncer {
	pub fn new(window: Duration) -> Self {
		Self {
			window,
			slots: DashMap::new(),
		}
	}

	pub fn window(&self) -> Duration {
		self.window
	}

	/// Starts the refresh task for `id`. Arming an id twice keeps the first
	/// task and returns `false`.
	pub fn arm(&self, id: &str, refresh: RefreshFn) -> bool {
		match self.slots.entry(id.to_string()) {
			dashmap::mapref::entry::Entry::Occupied(_) => false,
			dashmap::mapref::entry::Entry::Vacant(slot) => {
				let notify = Arc::new(Notify::new());
				let task = tokio::spawn(run(
					id.to_string(),
					self.window,
					notify.clone(),
					refresh,
				));
				slot.insert(Slot { notify, task });
				true
			},
		}
	}

	/// Requests a refresh for `id` at the end of the current window.
	///
	/// Returns `false` if `id` is not armed.
	pub fn schedule(&self, id: &str) -> bool {
		match self.slots.get(id) {
			Some(slot) => {
				slot.notify.notify_one();
				true
			},
			None => false,
		}
	}

	/// Stops the task for `id`. Pending and in-flight refreshes are dropped.
	pub fn cancel(&self, id: &str) -> bool {
		match self.slots.remove(id) {
			Some((_, slot)) => {
				slot.task.abort();
				true
			},
			None => false,
		}
	}

	pub fn cancel_all(&self) {
		self.slots.retain(|_, slot| {
			slot.task.abort();
			false
		});
	}

	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}
}

impl Drop for Debouncer {
	fn drop(&mut self) {
		self.cancel_all();
	}
}

async fn run(id: String, window: Duration, notify: Arc<Notify>, refresh: RefreshFn) {
	loop {
		notify.notified().await;
		// Trailing edge: every poke restarts the window.
		loop {
			tokio::select! {
				_ = notify.notified() => continue,
				_ = tokio::time::sleep(window) => break,
			}
		}
		tracing::debug!(subscriber = %id, "Refreshing view");
		refresh().await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	const WINDOW: Duration = Duration::from_millis(120);

	fn counting() -> (Arc<AtomicUsize>, RefreshFn) {
		let count = Arc::new(AtomicUsize::new(0));
		let refresh = refresh_fn({
			let count = count.clone();
			move || {
				let count = count.clone();
				async move {
					count.fetch_add(1, Ordering::SeqCst);
				}
			}
		});
		(count, refresh)
	}

	#[tokio::test(start_paused = true)]
	async fn test_burst_within_window_refreshes_once() {
		let debouncer = Debouncer::new(WINDOW);
		let (count, refresh) = counting();
		debouncer.arm("x", refresh);

		for _ in 0..10 {
			assert!(debouncer.schedule("x"));
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		tokio::time::sleep(Duration::from_millis(500)).await;

		assert_eq!(count.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_spaced_schedules_refresh_separately() {
		let debouncer = Debouncer::new(WINDOW);
		let (count, refresh) = counting();
		debouncer.arm("x", refresh);

		debouncer.schedule("x");
		tokio::time::sleep(Duration::from_millis(300)).await;
		debouncer.schedule("x");
		tokio::time::sleep(Duration::from_millis(300)).await;

		assert_eq!(count.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_window_is_trailing_edge() {
		let debouncer = Debouncer::new(WINDOW);
		let (count, refresh) = counting();
		debouncer.arm("x", refresh);

		debouncer.schedule("x");
		tokio::time::sleep(Duration::from_millis(100)).await;
		debouncer.schedule("x");
		tokio::time::sleep(Duration::from_millis(100)).await;
		// 200ms after the first poke but only 100ms after the last one
		assert_eq!(count.load(Ordering::SeqCst), 0);

		tokio::time::sleep(Duration::from_millis(50)).await;
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_refreshes_never_overlap() {
		let debouncer = Debouncer::new(WINDOW);
		let running = Arc::new(AtomicUsize::new(0));
		let peak = Arc::new(AtomicUsize::new(0));
		let done = Arc::new(AtomicUsize::new(0));
		let refresh = refresh_fn({
			let (running, peak, done) = (running.clone(), peak.clone(), done.clone());
			move || {
				let (running, peak, done) = (running.clone(), peak.clone(), done.clone());
				async move {
					let now = running.fetch_add(1, Ordering::SeqCst) + 1;
					peak.fetch_max(now, Ordering::SeqCst);
					tokio::time::sleep(Duration::from_millis(300)).await;
					running.fetch_sub(1, Ordering::SeqCst);
					done.fetch_add(1, Ordering::SeqCst);
				}
			}
		});
		debouncer.arm("x", refresh);

		debouncer.schedule("x");
		// First refresh starts at 120ms and runs until 420ms
		tokio::time::sleep(Duration::from_millis(200)).await;
		debouncer.schedule("x");
		debouncer.schedule("x");
		tokio::time::sleep(Duration::from_millis(1000)).await;

		assert_eq!(done.load(Ordering::SeqCst), 2);
		assert_eq!(peak.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_cancel_drops_pending_refresh() {
		let debouncer = Debouncer::new(WINDOW);
		let (count, refresh) = counting();
		debouncer.arm("x", refresh);

		debouncer.schedule("x");
		tokio::time::sleep(Duration::from_millis(50)).await;
		assert!(debouncer.cancel("x"));
		tokio::time::sleep(Duration::from_millis(500)).await;

		assert_eq!(count.load(Ordering::SeqCst), 0);
		assert!(!debouncer.schedule("x"));
		assert!(debouncer.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_arm_twice_keeps_first_callback() {
		let debouncer = Debouncer::new(WINDOW);
		let (first, refresh_a) = counting();
		let (second, refresh_b) = counting();
		assert!(debouncer.arm("x", refresh_a));
		assert!(!debouncer.arm("x", refresh_b));

		debouncer.schedule("x");
		tokio::time::sleep(Duration::from_millis(300)).await;

		assert_eq!(first.load(Ordering::SeqCst), 1);
		assert_eq!(second.load(Ordering::SeqCst), 0);
		assert_eq!(debouncer.len(), 1);
	}
}
