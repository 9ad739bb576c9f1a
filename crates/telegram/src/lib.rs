//! Telegram interface for paygate
//!
//! This crate connects the conversation core to the Telegram Bot API:
//! - **Polling** (`polling`) - long-polling loop with reconnect backoff, one task per update
//! - **Events** (`events`) - inbound event model and the dispatcher
//! - **Actions** (`actions`) - `/start`, `/help`, `/cancel` and button tag parsing
//! - **Dialog** (`dialog`) - approval gate and dialog execution per identity
//! - **Messages** (`messages`) - message templates with inline keyboards
//! - **Bot** (`bot`) - teloxide-backed transport and gateway
//!
//! # Architecture
//!
//! ```text
//! getUpdates → PollingRunner → EventDispatcher → DialogService → DialogEngine
//!                                                     ↓
//!                                     Gateway (send / edit / acknowledge)
//! ```
//!
//! # Key Types
//!
//! - `PollingRunner` - update loop with reconnection logic
//! - `DialogService` - session registry, approval gate, admin decisions
//! - `Gateway` - outbound boundary; `TelegramGateway` in production, `RecordingGateway` in tests
//! - `MessageBuilder` - constructs messages with keyboards

pub mod actions;
pub mod bot;
pub mod dialog;
pub mod events;
pub mod gateway;
pub mod messages;
pub mod polling;
pub mod session;

pub use dialog::{DialogService, DialogSettings};
pub use events::{conversation_dispatcher, EventDispatcher};
pub use gateway::{DeliveryError, Gateway, RecordingGateway};
pub use polling::{PollingRunner, ReconnectPolicy};
