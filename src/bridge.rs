//! Event fan-out between services and connected subscribers.
//!
//! Producers publish into a category; every channel subscribed to that
//! category at publish time receives its own copy, in subscription order.
//! There is no buffering beyond the subscriber channels themselves, and a
//! subscriber whose receiving end has gone away is dropped silently on the
//! next publish.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Event categories the bridge routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    DetectionUpdate,
    ImageSaved,
    TestSaved,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::DetectionUpdate => "detection-update",
            Category::ImageSaved => "image-saved",
            Category::TestSaved => "test-saved",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detection-update" => Ok(Category::DetectionUpdate),
            "image-saved" => Ok(Category::ImageSaved),
            "test-saved" => Ok(Category::TestSaved),
            other => Err(format!("unknown event category: {}", other)),
        }
    }
}

/// Routes published events to per-category subscriber channels.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<Category, Vec<mpsc::UnboundedSender<serde_json::Value>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel for a category. Events published after this call
    /// are delivered; there is no replay of earlier ones.
    pub fn subscribe(&self, category: Category, sender: mpsc::UnboundedSender<serde_json::Value>) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.entry(category).or_default().push(sender);
    }

    /// Serialize `event` once and deliver it to every live subscriber of
    /// `category`. Subscribers with a closed receiver are pruned here.
    pub fn publish<T: Serialize>(&self, category: Category, event: &T) {
        let payload = match serde_json::to_value(event) {
            Ok(value) => value,
            Err(e) => {
                debug!(category = category.as_str(), error = %e, "Dropping unserializable event");
                return;
            }
        };

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(channels) = subscribers.get_mut(&category) {
            channels.retain(|sender| sender.send(payload.clone()).is_ok());
        }
    }

    /// Drop every subscriber of one category.
    pub fn unsubscribe_all(&self, category: Category) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.remove(&category);
    }

    /// Drop every subscriber across all categories.
    pub fn clear(&self) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.clear();
    }

    pub fn subscriber_count(&self, category: Category) -> usize {
        let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.get(&category).map_or(0, Vec::len)
    }
}
