//! # Event fan-out to subscribers.
//!
//! The subscriber listener hands every bus event to [`SubscriberSet::emit`], which
//! copies it into one bounded queue per subscriber. Each queue is drained by its
//! own worker, so a slow log shipper never delays the control loop or its peers.
//!
//! ```text
//! emit(ev) ─┬─ try_send ─► queue(LogWriter) ─► worker ─► on_event
//!           ├─ try_send ─► queue(custom)    ─► worker ─► on_event ─ panic ─► SubscriberPanicked
//!           └─ full/closed ─► SubscriberOverflow (never for an overflow event)
//! ```
//!
//! Order is preserved per subscriber only.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Lane {
    name: &'static str,
    queue: mpsc::Sender<Arc<Event>>,
}

/// Owns one queue and one worker task per subscriber.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns the workers. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (lanes, workers) = subs
            .into_iter()
            .map(|sub| {
                let (queue, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let lane = Lane {
                    name: sub.name(),
                    queue,
                };
                (lane, spawn_worker(sub, rx, bus.clone()))
            })
            .unzip();

        Self {
            lanes,
            workers,
            bus,
        }
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Queues `event` for every subscriber; never waits.
    pub fn emit(&self, event: Event) {
        let overflow = event.kind == EventKind::SubscriberOverflow;
        let event = Arc::new(event);

        for lane in &self.lanes {
            let reason = match lane.queue.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "queue full",
                Err(TrySendError::Closed(_)) => "worker gone",
            };
            if !overflow {
                self.bus.publish(Event::subscriber_overflow(lane.name, reason));
            }
        }
    }

    /// Closes the queues and waits until every worker has drained its backlog.
    pub async fn shutdown(self) {
        drop(self.lanes);
        futures::future::join_all(self.workers).await;
    }
}

fn spawn_worker(
    sub: Arc<dyn Subscribe>,
    mut rx: mpsc::Receiver<Arc<Event>>,
    bus: Bus,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            let handled = AssertUnwindSafe(sub.on_event(&ev)).catch_unwind().await;
            if let Err(payload) = handled {
                bus.publish(Event::subscriber_panicked(sub.name(), panic_message(&*payload)));
            }
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Exploder;

    #[async_trait]
    impl Subscribe for Exploder {
        async fn on_event(&self, ev: &Event) {
            if ev.kind == EventKind::ProcessCrashed {
                panic!("boom");
            }
        }
        fn name(&self) -> &'static str {
            "exploder"
        }
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![rec.clone()], Bus::new(16));
        assert_eq!(set.len(), 1);

        set.emit(Event::new(EventKind::ProcessStarting));
        set.emit(Event::new(EventKind::ProcessRunning));
        set.emit(Event::new(EventKind::StopRequested));
        set.shutdown().await;

        assert_eq!(
            *rec.0.lock().unwrap(),
            vec![
                EventKind::ProcessStarting,
                EventKind::ProcessRunning,
                EventKind::StopRequested
            ]
        );
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_reported_and_survives() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Exploder)], bus);

        set.emit(Event::new(EventKind::ProcessCrashed));
        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.reason.as_deref(), Some("boom"));

        set.emit(Event::new(EventKind::ProcessRunning));
        set.shutdown().await;
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "non-string panic payload");
    }
}
