// UI module - the consumer side of the loader
//
// This module contains:
// - bridge: NotificationChannel (engine -> consumer) and the UiEvent channel
//   used by import wakes and import workers
// - router: NotificationRouter state machine and the soft-error buffer
// - controller: Controller, the single consumer loop plus user intents

pub mod bridge;
pub mod controller;
pub mod router;

pub use bridge::{
    ChannelClosed, NotificationReceiver, NotificationSender, UiEvent, UiEventSender, notification_channel,
    ui_event_channel,
};
pub use controller::Controller;
pub use router::{ErrorBuffer, NotificationRouter, RouterState};
