use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use paygate_core::Identity;
use serde::Serialize;
use thiserror::Error;

use crate::messages::MessageTemplate;

/// Location of a previously delivered message, used to replace its content in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("recipient {0} cannot be reached")]
    Unreachable(Identity),
    #[error("gateway rejected the request: {0}")]
    Rejected(String),
    #[error("gateway transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send(
        &self,
        recipient: Identity,
        message: &MessageTemplate,
    ) -> Result<(), DeliveryError>;
    async fn edit(&self, target: MessageRef, message: &MessageTemplate)
        -> Result<(), DeliveryError>;
    async fn acknowledge(&self, callback_id: &str) -> Result<(), DeliveryError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent { recipient: Identity, message: MessageTemplate },
    Edited { target: MessageRef, message: MessageTemplate },
    Acknowledged { callback_id: String },
}

#[derive(Default)]
struct RecordingState {
    deliveries: Vec<Delivery>,
    unreachable: Vec<Identity>,
}

/// Gateway that keeps every delivery in memory. Recipients marked unreachable fail with
/// [`DeliveryError::Unreachable`].
#[derive(Clone, Default)]
pub struct RecordingGateway {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unreachable(&self, identity: Identity) {
        self.lock().unreachable.push(identity);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.lock().deliveries.clone()
    }

    pub fn sent_to(&self, recipient: Identity) -> Vec<MessageTemplate> {
        self.lock()
            .deliveries
            .iter()
            .filter_map(|delivery| match delivery {
                Delivery::Sent { recipient: to, message } if *to == recipient => {
                    Some(message.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<(MessageRef, MessageTemplate)> {
        self.lock()
            .deliveries
            .iter()
            .filter_map(|delivery| match delivery {
                Delivery::Edited { target, message } => Some((*target, message.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.lock()
            .deliveries
            .iter()
            .filter_map(|delivery| match delivery {
                Delivery::Acknowledged { callback_id } => Some(callback_id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().deliveries.clear();
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn send(
        &self,
        recipient: Identity,
        message: &MessageTemplate,
    ) -> Result<(), DeliveryError> {
        let mut state = self.lock();
        if state.unreachable.contains(&recipient) {
            return Err(DeliveryError::Unreachable(recipient));
        }
        state.deliveries.push(Delivery::Sent { recipient, message: message.clone() });
        Ok(())
    }

    async fn edit(
        &self,
        target: MessageRef,
        message: &MessageTemplate,
    ) -> Result<(), DeliveryError> {
        self.lock().deliveries.push(Delivery::Edited { target, message: message.clone() });
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str) -> Result<(), DeliveryError> {
        self.lock()
            .deliveries
            .push(Delivery::Acknowledged { callback_id: callback_id.to_owned() });
        Ok(())
    }
}
