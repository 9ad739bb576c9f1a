use serde::{Deserialize, Serialize};

use crate::domain::identity::Identity;

/// Per-identity dialog position. Only the amount stage carries working data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingIds,
    AwaitingAmount { identifiers: Vec<String> },
    AwaitingTargetId,
}

impl SessionState {
    pub fn stage(&self) -> DialogStage {
        match self {
            Self::Idle => DialogStage::Idle,
            Self::AwaitingIds => DialogStage::AwaitingIds,
            Self::AwaitingAmount { .. } => DialogStage::AwaitingAmount,
            Self::AwaitingTargetId => DialogStage::AwaitingTargetId,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialogStage {
    Idle,
    AwaitingIds,
    AwaitingAmount,
    AwaitingTargetId,
}

impl DialogStage {
    pub fn accepts_text(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogEvent {
    EntryRequested,
    PaymentFormatSelected,
    MessageUserSelected,
    TextReceived(String),
    CancelRequested,
}

impl DialogEvent {
    pub fn kind(&self) -> DialogEventKind {
        match self {
            Self::EntryRequested => DialogEventKind::EntryRequested,
            Self::PaymentFormatSelected => DialogEventKind::PaymentFormatSelected,
            Self::MessageUserSelected => DialogEventKind::MessageUserSelected,
            Self::TextReceived(_) => DialogEventKind::TextReceived,
            Self::CancelRequested => DialogEventKind::CancelRequested,
        }
    }
}

/// Payload-free view of [`DialogEvent`], safe to log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogEventKind {
    EntryRequested,
    PaymentFormatSelected,
    MessageUserSelected,
    TextReceived,
    CancelRequested,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogContext {
    pub is_admin: bool,
}

impl DialogContext {
    pub fn admin() -> Self {
        Self { is_admin: true }
    }

    pub fn member() -> Self {
        Self { is_admin: false }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepromptReason {
    NoIdentifiersFound,
    EmptyAmount,
    InvalidTargetIdentity,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogAction {
    /// Gate the caller: admin menu, format prompt, or an access request.
    ResolveEntry,
    ShowFormatInstructions,
    PromptForTargetIdentity,
    Reprompt(RepromptReason),
    ConfirmIdentifiers { identifiers: Vec<String> },
    EmitFormattedOutput { output: String },
    ShowDirectMessageLink { target: Identity },
    ShowAdminMenu,
    ShowFormatMoreButton,
    RestartRequired,
    DenyAdminOnly,
    ConfirmCancellation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: DialogStage,
    pub to: SessionState,
    pub event: DialogEventKind,
    pub actions: Vec<DialogAction>,
}
