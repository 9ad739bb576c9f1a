use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::identity::Identity;
use crate::flows::states::{
    DialogAction, DialogContext, DialogEvent, RepromptReason, SessionState, TransitionOutcome,
};
use crate::payment::{extract_identifiers, format_payment_lines, is_identifier_token};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DialogTransitionError {
    #[error("no dialog is waiting for text input")]
    NoActiveDialog,
}

/// Pure transition function for the payment-format and message-user dialogs.
///
/// The engine never touches approval state or the gateway; side effects are
/// described by the returned [`DialogAction`]s and executed by the caller.
#[derive(Clone, Copy, Debug, Default)]
pub struct DialogEngine;

impl DialogEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(
        &self,
        current: &SessionState,
        event: &DialogEvent,
        context: &DialogContext,
    ) -> Result<TransitionOutcome, DialogTransitionError> {
        use DialogAction::{
            ConfirmCancellation, DenyAdminOnly, PromptForTargetIdentity, ResolveEntry,
            ShowFormatInstructions,
        };

        let from = current.stage();
        let (to, actions) = match (current, event) {
            (_, DialogEvent::CancelRequested) => (SessionState::Idle, vec![ConfirmCancellation]),
            (_, DialogEvent::EntryRequested) => (SessionState::Idle, vec![ResolveEntry]),
            (_, DialogEvent::PaymentFormatSelected) => {
                (SessionState::AwaitingIds, vec![ShowFormatInstructions])
            }
            (_, DialogEvent::MessageUserSelected) if !context.is_admin => {
                (current.clone(), vec![DenyAdminOnly])
            }
            (_, DialogEvent::MessageUserSelected) => {
                (SessionState::AwaitingTargetId, vec![PromptForTargetIdentity])
            }
            (SessionState::Idle, DialogEvent::TextReceived(_)) => {
                return Err(DialogTransitionError::NoActiveDialog);
            }
            (SessionState::AwaitingIds, DialogEvent::TextReceived(text)) => collect_identifiers(text),
            (SessionState::AwaitingAmount { identifiers }, DialogEvent::TextReceived(text)) => {
                collect_amount(identifiers, text, context)
            }
            (SessionState::AwaitingTargetId, DialogEvent::TextReceived(text)) => {
                collect_target(text)
            }
        };

        Ok(TransitionOutcome { from, to, event: event.kind(), actions })
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &SessionState,
        event: &DialogEvent,
        context: &DialogContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, DialogTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "dialog.transition_applied",
                        AuditCategory::Dialog,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to.stage()))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "dialog.transition_rejected",
                        AuditCategory::Dialog,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("from", format!("{:?}", current.stage()))
                    .with_metadata("event", format!("{:?}", event.kind()))
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

fn collect_identifiers(text: &str) -> (SessionState, Vec<DialogAction>) {
    let identifiers = extract_identifiers(text);
    if identifiers.is_empty() {
        return (
            SessionState::AwaitingIds,
            vec![DialogAction::Reprompt(RepromptReason::NoIdentifiersFound)],
        );
    }

    (
        SessionState::AwaitingAmount { identifiers: identifiers.clone() },
        vec![DialogAction::ConfirmIdentifiers { identifiers }],
    )
}

fn collect_amount(
    identifiers: &[String],
    text: &str,
    context: &DialogContext,
) -> (SessionState, Vec<DialogAction>) {
    let amount = text.trim();
    if amount.is_empty() {
        return (
            SessionState::AwaitingAmount { identifiers: identifiers.to_vec() },
            vec![DialogAction::Reprompt(RepromptReason::EmptyAmount)],
        );
    }

    let Ok(output) = format_payment_lines(identifiers, amount) else {
        return (SessionState::Idle, vec![DialogAction::RestartRequired]);
    };

    let follow_up =
        if context.is_admin { DialogAction::ShowAdminMenu } else { DialogAction::ShowFormatMoreButton };
    (SessionState::Idle, vec![DialogAction::EmitFormattedOutput { output }, follow_up])
}

fn collect_target(text: &str) -> (SessionState, Vec<DialogAction>) {
    let target = if is_identifier_token(text) { text.parse::<Identity>().ok() } else { None };

    match target {
        Some(target) => (
            SessionState::Idle,
            vec![DialogAction::ShowDirectMessageLink { target }, DialogAction::ShowAdminMenu],
        ),
        None => (
            SessionState::AwaitingTargetId,
            vec![DialogAction::Reprompt(RepromptReason::InvalidTargetIdentity)],
        ),
    }
}
