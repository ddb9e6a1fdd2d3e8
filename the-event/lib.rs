//! Event plumbing shared by the editor sync core.
//!
//! Two small building blocks live here:
//!
//! - [`DebouncedTask`], the single timer primitive every debounced feature
//!   (range fetches, edit commits, diff refreshes, preview metadata, held
//!   result polling) is built on.
//! - [`EventBus`], a typed in-process publish/subscribe channel that replaces
//!   stringly-typed window events between otherwise unconnected components.

mod bus;
mod debounce;

pub use bus::{
  EventBus,
  SubscriberId,
  Subscription,
  Topic,
};
pub use debounce::DebouncedTask;
