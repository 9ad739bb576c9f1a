//! Telegram Bot API implementations of [`UpdateTransport`] and [`Gateway`].

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use paygate_core::{Identity, Profile};
use secrecy::{ExposeSecret, SecretString};
use teloxide::{
    prelude::*,
    types::{
        CallbackQuery, ChatId, InlineKeyboardButton, InlineKeyboardMarkup,
        MaybeInaccessibleMessage, Message, MessageId, ParseMode, Update, UpdateKind, User,
    },
    utils::markdown,
    ApiError, RequestError,
};
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

use crate::{
    actions::{looks_like_command, parse_callback, parse_command},
    events::{
        ButtonPressEvent, CommandEvent, InboundEvent, Sender, TextMessageEvent, UpdateEnvelope,
    },
    gateway::{DeliveryError, Gateway, MessageRef},
    messages::{ButtonTarget, MessageTemplate, TextPart},
    polling::{TransportError, UpdateTransport},
};

/// Extra time the HTTP client waits beyond the long-poll timeout before giving up.
const CLIENT_TIMEOUT_MARGIN_SECS: u64 = 10;

pub fn build_bot(token: &SecretString, poll_timeout_secs: u32) -> Result<Bot, TransportError> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(poll_timeout_secs) + CLIENT_TIMEOUT_MARGIN_SECS))
        .build()
        .map_err(|error| TransportError::Connect(error.to_string()))?;
    Ok(Bot::with_client(token.expose_secret(), client))
}

/// Verifies the token with `getMe` and returns the bot's username.
pub async fn probe(bot: &Bot) -> Result<String, TransportError> {
    let me = bot.get_me().await.map_err(|error| TransportError::Connect(error.to_string()))?;
    Ok(me.username.clone().unwrap_or_else(|| format!("id:{}", me.id.0)))
}

struct PollState {
    offset: i32,
    buffered: VecDeque<UpdateEnvelope>,
}

/// Long-polling transport. Acknowledging an update advances the `getUpdates` offset past it.
pub struct TelegramTransport {
    bot: Bot,
    timeout_secs: u32,
    state: Mutex<PollState>,
}

impl TelegramTransport {
    pub fn new(bot: Bot, timeout_secs: u32) -> Self {
        Self { bot, timeout_secs, state: Mutex::new(PollState { offset: 0, buffered: VecDeque::new() }) }
    }
}

#[async_trait]
impl UpdateTransport for TelegramTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let username = probe(&self.bot).await?;
        info!(
            event_name = "ingress.telegram.authenticated",
            bot_username = %username,
            "bot authenticated"
        );

        self.bot
            .delete_webhook()
            .drop_pending_updates(true)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        info!(event_name = "ingress.telegram.pending_dropped", "pending updates dropped");
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<UpdateEnvelope>, TransportError> {
        let mut state = self.state.lock().await;
        loop {
            if let Some(envelope) = state.buffered.pop_front() {
                return Ok(Some(envelope));
            }

            let updates = self
                .bot
                .get_updates()
                .offset(state.offset)
                .timeout(self.timeout_secs)
                .await
                .map_err(|error| TransportError::Receive(error.to_string()))?;
            state.buffered.extend(updates.into_iter().map(envelope_from_update));
        }
    }

    async fn acknowledge(&self, update_id: u64) -> Result<(), TransportError> {
        let next = i32::try_from(update_id.saturating_add(1)).map_err(|_| {
            TransportError::Acknowledge(format!("update id {update_id} exceeds offset range"))
        })?;
        let mut state = self.state.lock().await;
        state.offset = state.offset.max(next);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub fn envelope_from_update(update: Update) -> UpdateEnvelope {
    let update_id = u64::from(update.id.0);
    let event = match update.kind {
        UpdateKind::Message(message) => event_from_message(&message),
        UpdateKind::CallbackQuery(query) => event_from_callback(query),
        _ => InboundEvent::Unsupported { kind: "unhandled_update".to_owned() },
    };
    UpdateEnvelope { update_id, event }
}

fn event_from_message(message: &Message) -> InboundEvent {
    let Some(user) = message.from.as_ref() else {
        return InboundEvent::Unsupported { kind: "message_without_sender".to_owned() };
    };
    let Some(text) = message.text() else {
        return InboundEvent::Unsupported { kind: "non_text_message".to_owned() };
    };

    let sender = sender_from_user(user);
    if looks_like_command(text) {
        return InboundEvent::Command(CommandEvent {
            sender,
            command: parse_command(text).ok(),
            text: text.to_owned(),
        });
    }
    InboundEvent::Text(TextMessageEvent { sender, text: text.to_owned() })
}

fn event_from_callback(query: CallbackQuery) -> InboundEvent {
    let origin = match &query.message {
        Some(MaybeInaccessibleMessage::Regular(message)) => {
            Some(MessageRef { chat_id: message.chat.id.0, message_id: message.id.0 })
        }
        _ => None,
    };
    let tag = query.data.unwrap_or_default();

    InboundEvent::ButtonPress(ButtonPressEvent {
        sender: sender_from_user(&query.from),
        callback_id: query.id,
        action: parse_callback(&tag).ok(),
        tag,
        origin,
    })
}

fn sender_from_user(user: &User) -> Sender {
    Sender::new(
        Identity(user.id.0),
        Profile {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            handle: user.username.clone(),
        },
    )
}

/// Renders a template as MarkdownV2 with every literal escaped.
pub fn render_markdown(message: &MessageTemplate) -> String {
    message
        .parts
        .iter()
        .map(|part| match part {
            TextPart::Plain(text) => markdown::escape(text),
            TextPart::Bold(text) => markdown::bold(&markdown::escape(text)),
            TextPart::Code(text) => markdown::code_inline(text),
            TextPart::Preformatted(text) => markdown::code_block(text),
        })
        .collect()
}

pub fn render_keyboard(message: &MessageTemplate) -> Result<Option<InlineKeyboardMarkup>, DeliveryError> {
    if message.keyboard.is_empty() {
        return Ok(None);
    }

    let rows = message
        .keyboard
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match &button.target {
                    ButtonTarget::Callback(tag) => {
                        Ok(InlineKeyboardButton::callback(button.label.clone(), tag.clone()))
                    }
                    ButtonTarget::Url(raw) => Url::parse(raw)
                        .map(|url| InlineKeyboardButton::url(button.label.clone(), url))
                        .map_err(|error| {
                            DeliveryError::Rejected(format!("invalid button url `{raw}`: {error}"))
                        }),
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(InlineKeyboardMarkup::new(rows)))
}

fn delivery_error(recipient: Option<Identity>, error: RequestError) -> DeliveryError {
    match (error, recipient) {
        (
            RequestError::Api(ApiError::BotBlocked | ApiError::UserDeactivated | ApiError::ChatNotFound),
            Some(recipient),
        ) => DeliveryError::Unreachable(recipient),
        (RequestError::Api(api_error), _) => DeliveryError::Rejected(api_error.to_string()),
        (other, _) => DeliveryError::Transport(other.to_string()),
    }
}

/// Outbound side of the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Gateway for TelegramGateway {
    async fn send(
        &self,
        recipient: Identity,
        message: &MessageTemplate,
    ) -> Result<(), DeliveryError> {
        let chat_id = i64::try_from(recipient.0)
            .map(ChatId)
            .map_err(|_| DeliveryError::Unreachable(recipient))?;
        let mut request =
            self.bot.send_message(chat_id, render_markdown(message)).parse_mode(ParseMode::MarkdownV2);
        if let Some(keyboard) = render_keyboard(message)? {
            request = request.reply_markup(keyboard);
        }

        request.await.map(|_| ()).map_err(|error| delivery_error(Some(recipient), error))
    }

    async fn edit(
        &self,
        target: MessageRef,
        message: &MessageTemplate,
    ) -> Result<(), DeliveryError> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(target.chat_id), MessageId(target.message_id), render_markdown(message))
            .parse_mode(ParseMode::MarkdownV2);
        if let Some(keyboard) = render_keyboard(message)? {
            request = request.reply_markup(keyboard);
        }

        match request.await {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(error) => {
                warn!(
                    event_name = "delivery.telegram.edit_rejected",
                    chat_id = target.chat_id,
                    message_id = target.message_id,
                    error = %error,
                    "edit request failed"
                );
                Err(delivery_error(None, error))
            }
        }
    }

    async fn acknowledge(&self, callback_id: &str) -> Result<(), DeliveryError> {
        self.bot
            .answer_callback_query(callback_id.to_owned())
            .await
            .map(|_| ())
            .map_err(|error| delivery_error(None, error))
    }
}
