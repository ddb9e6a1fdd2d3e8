//! Typed in-process publish/subscribe.
//!
//! Every topic is a marker type implementing [`Topic`] with its own payload
//! type, so publishers and subscribers agree on the payload at compile time.
//! A subscriber is identified by a [`SubscriberId`]; each (topic, subscriber)
//! pair holds at most one active handler and subscribing again replaces it.
//! Dropping the returned [`Subscription`] unsubscribes.
//!
//! Handlers run synchronously on the publishing thread. The registry lock is
//! released before handlers are invoked, so a handler may publish or
//! (un)subscribe itself.

use std::{
  any::{
    Any,
    TypeId,
  },
  collections::HashMap,
  sync::{
    Arc,
    Weak,
    atomic::{
      AtomicU64,
      Ordering,
    },
  },
};

use parking_lot::Mutex;

/// A named event channel with a typed payload.
pub trait Topic: 'static {
  type Payload: Send + Sync + 'static;
  const NAME: &'static str;
}

/// Declare topic marker types.
///
/// ```
/// the_editor_event::topics! {
///   /// Fired whenever something happens.
///   SomethingHappened("something-happened") => String;
/// }
/// ```
#[macro_export]
macro_rules! topics {
  ($($(#[$attr:meta])* $name:ident($label:literal) => $payload:ty;)*) => {
    $(
      $(#[$attr])*
      #[derive(Debug, Clone, Copy, PartialEq, Eq)]
      pub enum $name {}

      impl $crate::Topic for $name {
        type Payload = $payload;
        const NAME: &'static str = $label;
      }
    )*
  };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
  /// Allocate a process-unique subscriber id.
  pub fn next() -> Self {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    Self(NEXT.fetch_add(1, Ordering::Relaxed))
  }

  pub fn get(self) -> u64 {
    self.0
  }
}

type Handler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

struct Entry {
  key:     u64,
  owner:   SubscriberId,
  handler: Handler,
}

#[derive(Default)]
struct Registry {
  next_key: u64,
  topics:   HashMap<TypeId, Vec<Entry>>,
}

impl Registry {
  fn remove(&mut self, topic: TypeId, key: u64) {
    if let Some(entries) = self.topics.get_mut(&topic) {
      entries.retain(|entry| entry.key != key);
      if entries.is_empty() {
        self.topics.remove(&topic);
      }
    }
  }
}

#[derive(Clone, Default)]
pub struct EventBus {
  registry: Arc<Mutex<Registry>>,
}

impl EventBus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Subscribe `owner` to `T`, replacing any handler `owner` already had for
  /// this topic.
  pub fn subscribe<T, F>(&self, owner: SubscriberId, handler: F) -> Subscription
  where
    T: Topic,
    F: Fn(&T::Payload) + Send + Sync + 'static,
  {
    let handler: Handler = Arc::new(move |payload: &dyn Any| {
      if let Some(payload) = payload.downcast_ref::<T::Payload>() {
        handler(payload);
      }
    });

    let topic = TypeId::of::<T>();
    let mut registry = self.registry.lock();
    registry.next_key += 1;
    let key = registry.next_key;
    let entries = registry.topics.entry(topic).or_default();
    if let Some(existing) = entries.iter_mut().find(|entry| entry.owner == owner) {
      log::debug!(
        "replacing subscription of {:?} to {}",
        owner,
        T::NAME
      );
      existing.key = key;
      existing.handler = handler;
    } else {
      entries.push(Entry {
        key,
        owner,
        handler,
      });
    }

    Subscription {
      registry: Arc::downgrade(&self.registry),
      topic,
      key,
      name: T::NAME,
    }
  }

  /// Deliver `payload` to every current subscriber of `T`.
  pub fn publish<T: Topic>(&self, payload: T::Payload) {
    let handlers: Vec<Handler> = {
      let registry = self.registry.lock();
      match registry.topics.get(&TypeId::of::<T>()) {
        Some(entries) => entries.iter().map(|entry| entry.handler.clone()).collect(),
        None => Vec::new(),
      }
    };

    log::trace!("publish {} to {} subscriber(s)", T::NAME, handlers.len());
    for handler in handlers {
      handler(&payload);
    }
  }

  pub fn subscriber_count<T: Topic>(&self) -> usize {
    self
      .registry
      .lock()
      .topics
      .get(&TypeId::of::<T>())
      .map_or(0, Vec::len)
  }
}

impl std::fmt::Debug for EventBus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let topics = self.registry.lock().topics.len();
    f.debug_struct("EventBus").field("topics", &topics).finish()
  }
}

/// Active subscription; unsubscribes when dropped.
///
/// A subscription that was replaced by a newer one for the same owner is
/// inert: dropping it leaves the replacement in place.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
  registry: Weak<Mutex<Registry>>,
  topic:    TypeId,
  key:      u64,
  name:     &'static str,
}

impl Subscription {
  pub fn topic_name(&self) -> &'static str {
    self.name
  }

  pub fn unsubscribe(self) {}
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("topic", &self.name)
      .field("key", &self.key)
      .finish()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(registry) = self.registry.upgrade() {
      registry.lock().remove(self.topic, self.key);
    }
  }
}
