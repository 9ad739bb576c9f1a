use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use paygate_core::{ApplicationError, Identity, Profile};
use thiserror::Error;

use crate::{
    actions::{BotCommand, CallbackAction},
    gateway::MessageRef,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateEnvelope {
    pub update_id: u64,
    pub event: InboundEvent,
}

impl UpdateEnvelope {
    pub fn correlation_id(&self) -> String {
        format!("update-{}", self.update_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Command(CommandEvent),
    ButtonPress(ButtonPressEvent),
    Text(TextMessageEvent),
    Unsupported { kind: String },
}

impl InboundEvent {
    pub fn event_type(&self) -> InboundEventType {
        match self {
            Self::Command(_) => InboundEventType::Command,
            Self::ButtonPress(_) => InboundEventType::ButtonPress,
            Self::Text(_) => InboundEventType::Text,
            Self::Unsupported { kind } => InboundEventType::Unsupported(kind.clone()),
        }
    }

    pub fn sender(&self) -> Option<&Sender> {
        match self {
            Self::Command(event) => Some(&event.sender),
            Self::ButtonPress(event) => Some(&event.sender),
            Self::Text(event) => Some(&event.sender),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InboundEventType {
    Command,
    ButtonPress,
    Text,
    Unsupported(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub identity: Identity,
    pub profile: Profile,
}

impl Sender {
    pub fn new(identity: Identity, profile: Profile) -> Self {
        Self { identity, profile }
    }
}

/// A slash command. `command` is `None` for commands the bot does not know; those are never
/// treated as dialog input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEvent {
    pub sender: Sender,
    pub command: Option<BotCommand>,
    pub text: String,
}

/// A press on an inline keyboard button. `action` is `None` when the tag is unrecognized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonPressEvent {
    pub sender: Sender,
    pub callback_id: String,
    pub tag: String,
    pub action: Option<CallbackAction>,
    pub origin: Option<MessageRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessageEvent {
    pub sender: Sender,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("conversation service failure: {0}")]
    Service(#[from] ApplicationError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

/// Conversation entry points invoked by the dispatcher, one per inbound event kind.
#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn handle_command(
        &self,
        event: &CommandEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;

    async fn handle_button_press(
        &self,
        event: &ButtonPressEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;

    async fn handle_text(
        &self,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> InboundEventType;
    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<InboundEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher routing commands, button presses and free text to one conversation service.
pub fn conversation_dispatcher<S>(service: Arc<S>) -> EventDispatcher
where
    S: ConversationService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler::new(Arc::clone(&service)));
    dispatcher.register(ButtonPressHandler::new(Arc::clone(&service)));
    dispatcher.register(TextMessageHandler::new(service));
    dispatcher
}

pub struct CommandHandler<S> {
    service: Arc<S>,
}

impl<S> CommandHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for CommandHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> InboundEventType {
        InboundEventType::Command
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::Command(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.command.is_none() {
            return Ok(HandlerResult::Ignored);
        }

        self.service.handle_command(event, ctx).await
    }
}

pub struct ButtonPressHandler<S> {
    service: Arc<S>,
}

impl<S> ButtonPressHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ButtonPressHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> InboundEventType {
        InboundEventType::ButtonPress
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::ButtonPress(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_button_press(event, ctx).await
    }
}

pub struct TextMessageHandler<S> {
    service: Arc<S>,
}

impl<S> TextMessageHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for TextMessageHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> InboundEventType {
        InboundEventType::Text
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::Text(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_text(event, ctx).await
    }
}
