use std::collections::HashMap;
use std::future::Future;

use futures::channel::mpsc;
use futures::StreamExt;
use schema::FlightEvent;
use ulid::Ulid;

type Subscriber = mpsc::UnboundedSender<FlightEvent>;

#[derive(Debug)]
enum Event {
    Published(FlightEvent),
    NewSubscription(Ulid, Subscriber),
}

/// Handle for publishing flight changes and subscribing to them.
///
/// Publications and subscriptions travel on one channel, so a subscriber only sees events
/// published after it subscribed.
#[derive(Clone, Debug)]
pub struct FlightEvents {
    sender: mpsc::UnboundedSender<Event>,
}

impl FlightEvents {
    /// Creates the handle along with the loop that fans events out, which must be polled
    pub fn new() -> (Self, impl Future<Output = ()> + Send) {
        let (sender, receiver) = mpsc::unbounded();
        (Self { sender }, fan_out(receiver))
    }

    pub fn publish(&self, event: FlightEvent) {
        if self.sender.unbounded_send(Event::Published(event)).is_err() {
            log::warn!("flight event loop has stopped, dropping event");
        }
    }

    pub fn subscribe(&self) -> Option<(Ulid, mpsc::UnboundedReceiver<FlightEvent>)> {
        let id = Ulid::new();
        let (tx, rx) = mpsc::unbounded();
        self.sender
            .unbounded_send(Event::NewSubscription(id, tx))
            .ok()?;
        Some((id, rx))
    }
}

async fn fan_out(receiver: mpsc::UnboundedReceiver<Event>) {
    receiver
        .fold(HashMap::<Ulid, Subscriber>::new(), |mut subscriptions, event| {
            match event {
                // Send each event to all of the subscribers
                Event::Published(event) => {
                    let disconnected = subscriptions
                        .iter()
                        .filter_map(|(id, tx)| match tx.unbounded_send(event.clone()) {
                            Err(e) if e.is_disconnected() => Some(*id),
                            _ => None,
                        })
                        .collect::<Vec<_>>();

                    for id in disconnected {
                        log::info!("dropping watcher {id}");
                        subscriptions.remove(&id);
                    }
                }
                Event::NewSubscription(id, tx) => {
                    log::info!("new watcher {id}");
                    subscriptions.insert(id, tx);
                }
            }

            futures::future::ready(subscriptions)
        })
        .await;

    log::info!("flight event loop finished");
}
