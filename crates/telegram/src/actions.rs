use paygate_core::{Identity, Verdict};
use thiserror::Error;

pub const PAYMENT_FORMAT_TAG: &str = "payment_format";
pub const MESSAGE_USER_TAG: &str = "message_user";
const APPROVE_PREFIX: &str = "approve_";
const REJECT_PREFIX: &str = "reject_";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Cancel,
}

impl BotCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Cancel => "cancel",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    PaymentFormat,
    MessageUser,
    Decision { identity: Identity, verdict: Verdict },
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            Self::PaymentFormat => PAYMENT_FORMAT_TAG.to_owned(),
            Self::MessageUser => MESSAGE_USER_TAG.to_owned(),
            Self::Decision { identity, verdict: Verdict::Approve } => {
                format!("{APPROVE_PREFIX}{identity}")
            }
            Self::Decision { identity, verdict: Verdict::Reject } => {
                format!("{REJECT_PREFIX}{identity}")
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionParseError {
    #[error("not a command: {0}")]
    NotACommand(String),
    #[error("unsupported command: /{0}")]
    UnsupportedCommand(String),
    #[error("unknown button tag: {0}")]
    UnknownTag(String),
    #[error("malformed identity in button tag: {0}")]
    MalformedIdentity(String),
}

/// Parses the leading `/command` token of a message. A trailing `@botname` is tolerated.
pub fn parse_command(text: &str) -> Result<BotCommand, ActionParseError> {
    let token = text.split_whitespace().next().unwrap_or_default();
    let Some(name) = token.strip_prefix('/') else {
        return Err(ActionParseError::NotACommand(token.to_owned()));
    };
    let name = name.split_once('@').map_or(name, |(name, _)| name);

    match name.to_ascii_lowercase().as_str() {
        "start" => Ok(BotCommand::Start),
        "help" => Ok(BotCommand::Help),
        "cancel" => Ok(BotCommand::Cancel),
        other => Err(ActionParseError::UnsupportedCommand(other.to_owned())),
    }
}

/// Telegram only treats a `/` at offset zero as a command.
pub fn looks_like_command(text: &str) -> bool {
    text.starts_with('/')
}

pub fn parse_callback(tag: &str) -> Result<CallbackAction, ActionParseError> {
    match tag {
        PAYMENT_FORMAT_TAG => return Ok(CallbackAction::PaymentFormat),
        MESSAGE_USER_TAG => return Ok(CallbackAction::MessageUser),
        _ => {}
    }

    let (verdict, raw_identity) = if let Some(rest) = tag.strip_prefix(APPROVE_PREFIX) {
        (Verdict::Approve, rest)
    } else if let Some(rest) = tag.strip_prefix(REJECT_PREFIX) {
        (Verdict::Reject, rest)
    } else {
        return Err(ActionParseError::UnknownTag(tag.to_owned()));
    };

    if raw_identity.is_empty() || !raw_identity.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ActionParseError::MalformedIdentity(tag.to_owned()));
    }
    let identity = raw_identity
        .parse::<Identity>()
        .map_err(|_| ActionParseError::MalformedIdentity(tag.to_owned()))?;
    Ok(CallbackAction::Decision { identity, verdict })
}
