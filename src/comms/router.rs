//! Inbound message routing by MQTT topic filter.
//!
//! The transport delivers every PUBLISH it receives to [`Router::deliver`],
//! which hands the payload to each handler whose filter matches. Filters use
//! the MQTT wildcards: `+` for one level and a trailing `#` for any number
//! of levels (including none).

use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};

use crate::config::Topic;
use crate::error::{CommsError, Error};

/// Most filters registered at once.
pub const MAX_ROUTES: usize = 8;

/// Receives payloads for a subscribed topic filter.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, topic: &str, payload: &[u8]);
}

struct Route {
    filter: Topic,
    handler: Arc<dyn MessageHandler>,
}

#[derive(Default)]
pub struct Router {
    routes: Mutex<heapless::Vec<Route, MAX_ROUTES>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, filter: &str, handler: Arc<dyn MessageHandler>) -> Result<(), Error> {
        let filter = Topic::try_from(filter)
            .map_err(|()| Error::InvalidArgument("topic filter too long"))?;
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes
            .push(Route { filter, handler })
            .map_err(|_| Error::Comms(CommsError::RouteTableFull))
    }

    /// Drop every handler registered for exactly `filter`.
    pub fn remove(&self, filter: &str) {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.retain(|r| r.filter.as_str() != filter);
    }

    pub fn len(&self) -> usize {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand `payload` to every matching handler. Returns how many ran.
    pub fn deliver(&self, topic: &str, payload: &[u8]) -> usize {
        // Collect first so handlers run without the table locked.
        let matched: heapless::Vec<Arc<dyn MessageHandler>, MAX_ROUTES> = {
            let routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            routes
                .iter()
                .filter(|r| topic_matches(&r.filter, topic))
                .map(|r| Arc::clone(&r.handler))
                .collect()
        };
        if matched.is_empty() {
            warn!("No handler for message on '{}' ({} bytes)", topic, payload.len());
        } else {
            debug!("Routing {} bytes on '{}' to {} handler(s)", payload.len(), topic, matched.len());
        }
        for handler in &matched {
            handler.on_message(topic, payload);
        }
        matched.len()
    }
}

/// MQTT filter matching. Wildcards never match topics starting with `$`
/// at the first level.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }
    let mut f = filter.split('/');
    let mut t = topic.split('/');
    loop {
        match (f.next(), t.next()) {
            (Some("#"), _) => return f.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(a), Some(b)) if a == b => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
