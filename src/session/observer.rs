// src/session/observer.rs — Synchronous snapshot subscribers

use super::types::Session;

pub type Observer = Box<dyn Fn(&Session) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Observer list notified in subscription order on every change.
#[derive(Default)]
pub struct Observers {
    next_id: u64,
    entries: Vec<(SubscriptionId, Observer)>,
}

impl Observers {
    pub fn subscribe(&mut self, observer: impl Fn(&Session) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(sid, _)| *sid != id);
        self.entries.len() != before
    }

    pub fn notify(&self, session: &Session) {
        for (_, observer) in &self.entries {
            observer(session);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
