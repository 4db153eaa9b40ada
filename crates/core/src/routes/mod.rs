use std::{
    collections::HashMap,
    sync::{Arc, atomic::AtomicU64},
};

use crate::{
    events::EnrichedEvent,
    queues::{BoundedDropNewestQueue, FifoDropOldestQueue, IsolatedForwarder, Latest1Queue},
};

/// Event type to the inboxes subscribed to it.
pub struct Routes {
    pub table: HashMap<&'static str, Vec<Route>>,
}

pub struct Route {
    pub subscriber_id: &'static str,
    pub inbox: RouteInbox,
    pub drops_total: Arc<AtomicU64>,
    pub coalesced_total: Arc<AtomicU64>,
}

pub enum RouteInbox {
    Latest1(Arc<Latest1Queue<Arc<EnrichedEvent>>>),
    FifoDropOldest(FifoDropOldestQueue<Arc<EnrichedEvent>>),
    BoundedDropNewest(BoundedDropNewestQueue<Arc<EnrichedEvent>>),
    Isolated(IsolatedForwarder<Arc<EnrichedEvent>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queued, displacing an undelivered older event.
    Replaced,
    /// The event did not reach the subscriber.
    Dropped,
}

impl RouteInbox {
    pub fn try_deliver(&self, event: Arc<EnrichedEvent>) -> Delivery {
        match self {
            RouteInbox::Latest1(q) => {
                if q.set(event) {
                    Delivery::Replaced
                } else {
                    Delivery::Queued
                }
            }
            RouteInbox::FifoDropOldest(q) => match q.push_overwrite(event) {
                Some(_) => Delivery::Replaced,
                None => Delivery::Queued,
            },
            RouteInbox::BoundedDropNewest(q) => match q.try_push(event) {
                Ok(()) => Delivery::Queued,
                Err(_) => Delivery::Dropped,
            },
            RouteInbox::Isolated(fwd) => match fwd.try_send(event) {
                Ok(()) => Delivery::Queued,
                Err(_) => Delivery::Dropped,
            },
        }
    }
}
