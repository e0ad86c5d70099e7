//! Subscriber registry joined with per-subscriber debouncing.

use super::debounce::{Debouncer, RefreshFn};
use super::router::ChangeRouter;
use super::scope::Subscriber;
use freight_types::ChangeEvent;
use std::time::Duration;
use tracing::instrument;

/// Routes change events to subscribers and coalesces their refreshes.
pub struct RealtimeHub {
	router: ChangeRouter,
	debouncer: Debouncer,
}

impl RealtimeHub {
	pub fn new(window: Duration) -> Self {
		Self {
			router: ChangeRouter::new(),
			debouncer: Debouncer::new(window),
		}
	}

	/// Registers a subscriber with the callback run after each debounced burst.
	///
	/// Returns `false` if the id is already subscribed.
	#[instrument(skip_all, fields(subscriber = %subscriber.id, role = %subscriber.role))]
	pub fn subscribe(&self, subscriber: Subscriber, refresh: RefreshFn) -> bool {
		// Armed before routable so every routed id has a live task.
		if !self.debouncer.arm(&subscriber.id, refresh) {
			return false;
		}
		let id = subscriber.id.clone();
		if !self.router.register(subscriber) {
			self.debouncer.cancel(&id);
			return false;
		}
		tracing::info!(subscribers = self.router.len(), "Subscriber registered");
		true
	}

	/// Removes a subscriber. No refresh fires for it afterwards.
	pub fn unsubscribe(&self, id: &str) -> bool {
		let removed = self.router.deregister(id).is_some();
		let cancelled = self.debouncer.cancel(id);
		if removed {
			tracing::info!(subscriber = %id, subscribers = self.router.len(), "Subscriber removed");
		}
		removed || cancelled
	}

	/// Schedules a refresh for every subscriber the event concerns.
	///
	/// Returns how many subscribers were signalled.
	pub fn dispatch(&self, event: &ChangeEvent) -> usize {
		let targets = self.router.route(event);
		let signalled = targets
			.iter()
			.filter(|id| self.debouncer.schedule(id))
			.count();
		tracing::trace!(
			table = %event.table,
			operation = ?event.operation,
			signalled,
			"Dispatched change"
		);
		signalled
	}

	/// Schedules a refresh for one subscriber regardless of events.
	pub fn refresh(&self, id: &str) -> bool {
		self.debouncer.schedule(id)
	}

	/// Schedules a refresh for every subscriber, used after events may have been
	/// lost.
	pub fn resync_all(&self) -> usize {
		let ids = self.router.ids();
		let signalled = ids.iter().filter(|id| self.debouncer.schedule(id)).count();
		tracing::info!(signalled, "Resyncing all subscribers");
		signalled
	}

	/// Drops every subscriber and its pending refresh.
	pub fn clear(&self) {
		for id in self.router.ids() {
			self.router.deregister(&id);
		}
		self.debouncer.cancel_all();
	}

	pub fn router(&self) -> &ChangeRouter {
		&self.router
	}

	pub fn subscriber_count(&self) -> usize {
		self.router.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::realtime::debounce::refresh_fn;
	use freight_types::{Order, Record, Role, Table};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	fn counter() -> (Arc<AtomicUsize>, RefreshFn) {
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

	fn order_insert(client: &str) -> ChangeEvent {
		ChangeEvent::insert(Table::Orders, Record::Order(Order::new(1, client, "lamp")))
	}

	#[tokio::test(start_paused = true)]
	async fn test_dispatch_refreshes_relevant_subscribers_once_per_burst() {
		let hub = RealtimeHub::new(Duration::from_millis(120));
		let (mine, refresh_mine) = counter();
		let (other, refresh_other) = counter();
		hub.subscribe(Subscriber::for_role("a", Role::Client, "c-1"), refresh_mine);
		hub.subscribe(Subscriber::for_role("b", Role::Client, "c-2"), refresh_other);

		for _ in 0..5 {
			assert_eq!(hub.dispatch(&order_insert("c-1")), 1);
		}
		tokio::time::sleep(Duration::from_millis(500)).await;

		assert_eq!(mine.load(Ordering::SeqCst), 1);
		assert_eq!(other.load(Ordering::SeqCst), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_unsubscribe_drops_pending_refresh() {
		let hub = RealtimeHub::new(Duration::from_millis(120));
		let (count, refresh) = counter();
		hub.subscribe(Subscriber::for_role("a", Role::Admin, "root"), refresh);

		hub.dispatch(&order_insert("c-1"));
		assert!(hub.unsubscribe("a"));
		tokio::time::sleep(Duration::from_millis(500)).await;

		assert_eq!(count.load(Ordering::SeqCst), 0);
		assert_eq!(hub.dispatch(&order_insert("c-1")), 0);
		assert!(!hub.unsubscribe("a"));
	}

	#[tokio::test(start_paused = true)]
	async fn test_duplicate_subscribe_is_rejected() {
		let hub = RealtimeHub::new(Duration::from_millis(120));
		let (_, first) = counter();
		let (_, second) = counter();

		assert!(hub.subscribe(Subscriber::for_role("a", Role::Admin, "root"), first));
		assert!(!hub.subscribe(Subscriber::for_role("a", Role::Client, "c"), second));
		assert_eq!(hub.subscriber_count(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_resync_reaches_everyone() {
		let hub = RealtimeHub::new(Duration::from_millis(120));
		let (a, refresh_a) = counter();
		let (b, refresh_b) = counter();
		hub.subscribe(Subscriber::for_role("a", Role::Payments, "p"), refresh_a);
		hub.subscribe(Subscriber::for_role("b", Role::Client, "c-9"), refresh_b);

		assert_eq!(hub.resync_all(), 2);
		tokio::time::sleep(Duration::from_millis(500)).await;

		assert_eq!(a.load(Ordering::SeqCst), 1);
		assert_eq!(b.load(Ordering::SeqCst), 1);

		assert!(hub.refresh("a"));
		tokio::time::sleep(Duration::from_millis(500)).await;
		assert_eq!(a.load(Ordering::SeqCst), 2);
		assert_eq!(b.load(Ordering::SeqCst), 1);

		hub.clear();
		assert_eq!(hub.subscriber_count(), 0);
		assert_eq!(hub.resync_all(), 0);
	}
}
