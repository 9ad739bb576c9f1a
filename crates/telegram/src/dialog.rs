use std::sync::Arc;

use async_trait::async_trait;
use paygate_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use paygate_core::flows::{
    DialogAction, DialogContext, DialogEvent, RepromptReason, SessionState, TransitionOutcome,
};
use paygate_core::{
    ApplicationError, ApprovalStore, DialogEngine, DialogTransitionError, DomainError, Identity,
    Verdict,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    actions::{BotCommand, CallbackAction},
    events::{
        ButtonPressEvent, CommandEvent, ConversationService, EventContext, EventHandlerError,
        HandlerResult, Sender, TextMessageEvent,
    },
    gateway::{Gateway, MessageRef},
    messages::{self, MessageTemplate},
    session::SessionRegistry,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DialogError {
    #[error(transparent)]
    Transition(#[from] DialogTransitionError),
}

impl From<DialogError> for ApplicationError {
    fn from(value: DialogError) -> Self {
        match value {
            DialogError::Transition(error) => {
                ApplicationError::Domain(DomainError::DialogTransition(error))
            }
        }
    }
}

/// One outbound effect of a processed event.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Outbound {
    /// New message to the identity that caused the event.
    Reply(MessageTemplate),
    /// Replaces the message carrying the pressed button, or replies when there is none.
    ReplaceOrigin(MessageTemplate),
    /// Message to a third party; failure never affects the sender.
    Notify { recipient: Identity, message: MessageTemplate },
}

enum Input {
    Command(BotCommand),
    Button(CallbackAction),
    Text(String),
}

#[derive(Clone, Debug)]
pub struct DialogSettings {
    pub admin: Identity,
    pub owner_handle: String,
}

/// Executes conversation events for every identity.
///
/// Each event holds the sender's session slot from the first state read until its last
/// delivery. The polling runner hands one identity's events over in arrival order.
/// Transition failures reset the session and surface as [`EventHandlerError`]; the runner
/// answers the sender.
pub struct DialogService {
    settings: DialogSettings,
    engine: DialogEngine,
    store: Arc<dyn ApprovalStore>,
    gateway: Arc<dyn Gateway>,
    sessions: Arc<SessionRegistry>,
    audit: Arc<dyn AuditSink>,
}

impl DialogService {
    pub fn new(
        settings: DialogSettings,
        store: Arc<dyn ApprovalStore>,
        gateway: Arc<dyn Gateway>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            settings,
            engine: DialogEngine::new(),
            store,
            gateway,
            sessions: Arc::new(SessionRegistry::new()),
            audit,
        }
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.sessions)
    }

    pub fn store(&self) -> Arc<dyn ApprovalStore> {
        Arc::clone(&self.store)
    }

    fn is_admin(&self, identity: Identity) -> bool {
        identity == self.settings.admin
    }

    async fn run(
        &self,
        sender: &Sender,
        input: Input,
        origin: Option<MessageRef>,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let mut session = self.sessions.acquire(sender.identity).await;

        let result = match self.step(&mut session, sender, input, ctx) {
            Ok(None) => Ok(HandlerResult::Ignored),
            Ok(Some(outbound)) => {
                for item in outbound {
                    self.deliver(sender.identity, origin, item, ctx).await;
                }
                Ok(HandlerResult::Processed)
            }
            Err(dialog_error) => {
                error!(
                    event_name = "dialog.transition_failed",
                    correlation_id = %ctx.correlation_id,
                    identity = sender.identity.0,
                    stage = ?session.stage(),
                    error = %dialog_error,
                    "dialog transition failed; resetting session"
                );
                *session = SessionState::Idle;
                Err(EventHandlerError::from(ApplicationError::from(dialog_error)))
            }
        };

        self.sessions.release(sender.identity, session);
        result
    }

    fn step(
        &self,
        session: &mut SessionState,
        sender: &Sender,
        input: Input,
        ctx: &EventContext,
    ) -> Result<Option<Vec<Outbound>>, DialogError> {
        let event = match input {
            Input::Command(BotCommand::Help) => {
                let help = messages::help_message(
                    self.is_admin(sender.identity),
                    &self.settings.owner_handle,
                );
                return Ok(Some(vec![Outbound::Reply(help)]));
            }
            Input::Command(BotCommand::Start) => DialogEvent::EntryRequested,
            Input::Command(BotCommand::Cancel) => DialogEvent::CancelRequested,
            Input::Button(CallbackAction::PaymentFormat) => DialogEvent::PaymentFormatSelected,
            Input::Button(CallbackAction::MessageUser) => DialogEvent::MessageUserSelected,
            Input::Button(CallbackAction::Decision { identity, verdict }) => {
                return Ok(Some(self.decide(sender, identity, verdict, ctx)));
            }
            Input::Text(text) => {
                if !session.stage().accepts_text() {
                    debug!(
                        event_name = "dialog.text_dropped",
                        correlation_id = %ctx.correlation_id,
                        identity = sender.identity.0,
                        "text received outside of a dialog"
                    );
                    return Ok(None);
                }
                DialogEvent::TextReceived(text)
            }
        };

        let context = if self.is_admin(sender.identity) {
            DialogContext::admin()
        } else {
            DialogContext::member()
        };
        let outcome = self.engine.apply_with_audit(
            session,
            &event,
            &context,
            self.audit.as_ref(),
            &self.audit_context(sender.identity, ctx),
        )?;
        info!(
            event_name = "dialog.transition_applied",
            correlation_id = %ctx.correlation_id,
            identity = sender.identity.0,
            from = ?outcome.from,
            to = ?outcome.to.stage(),
            "dialog transition applied"
        );

        let TransitionOutcome { to, actions, .. } = outcome;
        *session = to;
        Ok(Some(actions.into_iter().flat_map(|action| self.render(action, sender, ctx)).collect()))
    }

    fn render(&self, action: DialogAction, sender: &Sender, ctx: &EventContext) -> Vec<Outbound> {
        let message = match action {
            DialogAction::ResolveEntry => return self.resolve_entry(sender, ctx),
            DialogAction::ShowFormatInstructions => {
                return vec![Outbound::ReplaceOrigin(messages::format_instructions())];
            }
            DialogAction::PromptForTargetIdentity => {
                return vec![Outbound::ReplaceOrigin(messages::target_identity_prompt())];
            }
            DialogAction::DenyAdminOnly => {
                return vec![Outbound::ReplaceOrigin(messages::admin_only())];
            }
            DialogAction::Reprompt(RepromptReason::NoIdentifiersFound) => {
                messages::no_identifiers_found()
            }
            DialogAction::Reprompt(RepromptReason::EmptyAmount) => messages::amount_required(),
            DialogAction::Reprompt(RepromptReason::InvalidTargetIdentity) => {
                messages::invalid_target_identity()
            }
            DialogAction::ConfirmIdentifiers { identifiers } => {
                messages::identifiers_found(&identifiers)
            }
            DialogAction::EmitFormattedOutput { output } => messages::formatted_output(&output),
            DialogAction::ShowDirectMessageLink { target } => messages::direct_message_link(target),
            DialogAction::ShowAdminMenu => messages::admin_menu(),
            DialogAction::ShowFormatMoreButton => messages::format_more(),
            DialogAction::RestartRequired => messages::restart_required(),
            DialogAction::ConfirmCancellation => messages::cancelled(),
        };
        vec![Outbound::Reply(message)]
    }

    fn resolve_entry(&self, sender: &Sender, ctx: &EventContext) -> Vec<Outbound> {
        if self.is_admin(sender.identity) {
            return vec![Outbound::Reply(messages::admin_menu())];
        }
        if self.store.is_approved(sender.identity) {
            return vec![Outbound::Reply(messages::payment_format_prompt())];
        }

        self.store.request_access(sender.identity, sender.profile.clone());
        self.audit.emit(
            AuditEvent::from_context(
                &self.audit_context(sender.identity, ctx),
                "approval.requested",
                AuditCategory::Approval,
                AuditOutcome::Success,
            )
            .with_metadata("handle", sender.profile.handle_label()),
        );
        info!(
            event_name = "approval.requested",
            correlation_id = %ctx.correlation_id,
            identity = sender.identity.0,
            "access requested"
        );

        vec![
            Outbound::Notify {
                recipient: self.settings.admin,
                message: messages::approval_request(sender.identity, &sender.profile),
            },
            Outbound::Reply(messages::access_requested()),
        ]
    }

    fn decide(
        &self,
        sender: &Sender,
        target: Identity,
        verdict: Verdict,
        ctx: &EventContext,
    ) -> Vec<Outbound> {
        let audit_context = self.audit_context(sender.identity, ctx);
        if !self.is_admin(sender.identity) {
            warn!(
                event_name = "approval.decision_denied",
                correlation_id = %ctx.correlation_id,
                identity = sender.identity.0,
                target = target.0,
                "decision attempted by non-administrator"
            );
            self.audit.emit(
                AuditEvent::from_context(
                    &audit_context,
                    "approval.decision_denied",
                    AuditCategory::Approval,
                    AuditOutcome::Rejected,
                )
                .with_metadata("target", target.to_string()),
            );
            return vec![Outbound::Reply(messages::admin_only())];
        }

        let outcome = self.store.decide(target, verdict);
        self.audit.emit(
            AuditEvent::from_context(
                &audit_context,
                "approval.decided",
                AuditCategory::Approval,
                AuditOutcome::Success,
            )
            .with_metadata("target", target.to_string())
            .with_metadata("verdict", verdict.label())
            .with_metadata("had_pending", outcome.had_pending.to_string())
            .with_metadata("applied", outcome.applied.to_string()),
        );
        info!(
            event_name = "approval.decided",
            correlation_id = %ctx.correlation_id,
            target = target.0,
            verdict = verdict.label(),
            had_pending = outcome.had_pending,
            applied = outcome.applied,
            "administrator decision recorded"
        );

        let mut outbound = vec![Outbound::ReplaceOrigin(messages::decision_summary(&outcome))];
        if outcome.applied {
            let notice = match verdict {
                Verdict::Approve => messages::approval_notice(),
                Verdict::Reject => messages::rejection_notice(&self.settings.owner_handle),
            };
            outbound.push(Outbound::Notify { recipient: target, message: notice });
        }
        outbound
    }

    async fn deliver(
        &self,
        sender: Identity,
        origin: Option<MessageRef>,
        outbound: Outbound,
        ctx: &EventContext,
    ) {
        let (recipient, result) = match (outbound, origin) {
            (Outbound::ReplaceOrigin(message), Some(target)) => {
                match self.gateway.edit(target, &message).await {
                    Ok(()) => return,
                    Err(edit_error) => {
                        warn!(
                            event_name = "delivery.edit_failed",
                            correlation_id = %ctx.correlation_id,
                            identity = sender.0,
                            error = %edit_error,
                            "failed to replace message; sending a new one"
                        );
                        (sender, self.gateway.send(sender, &message).await)
                    }
                }
            }
            (Outbound::ReplaceOrigin(message) | Outbound::Reply(message), _) => {
                (sender, self.gateway.send(sender, &message).await)
            }
            (Outbound::Notify { recipient, message }, _) => {
                (recipient, self.gateway.send(recipient, &message).await)
            }
        };

        if let Err(delivery_error) = result {
            warn!(
                event_name = "delivery.failed",
                correlation_id = %ctx.correlation_id,
                identity = recipient.0,
                error = %delivery_error,
                "outbound message was not delivered"
            );
            self.audit.emit(
                AuditEvent::from_context(
                    &self.audit_context(sender, ctx),
                    "delivery.failed",
                    AuditCategory::Delivery,
                    AuditOutcome::Failed,
                )
                .with_metadata("recipient", recipient.to_string())
                .with_metadata("error", delivery_error.to_string()),
            );
        }
    }

    fn audit_context(&self, identity: Identity, ctx: &EventContext) -> AuditContext {
        let actor = if self.is_admin(identity) { "admin" } else { "member" };
        AuditContext::new(Some(identity), ctx.correlation_id.clone(), actor)
    }
}

#[async_trait]
impl ConversationService for DialogService {
    async fn handle_command(
        &self,
        event: &CommandEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let Some(command) = event.command else {
            return Ok(HandlerResult::Ignored);
        };
        self.run(&event.sender, Input::Command(command), None, ctx).await
    }

    async fn handle_button_press(
        &self,
        event: &ButtonPressEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if let Err(ack_error) = self.gateway.acknowledge(&event.callback_id).await {
            warn!(
                event_name = "delivery.ack_failed",
                correlation_id = %ctx.correlation_id,
                identity = event.sender.identity.0,
                error = %ack_error,
                "failed to acknowledge button press"
            );
        }

        let Some(action) = event.action.clone() else {
            debug!(
                event_name = "dialog.unknown_button",
                correlation_id = %ctx.correlation_id,
                identity = event.sender.identity.0,
                tag = %event.tag,
                "ignoring button with unknown tag"
            );
            return Ok(HandlerResult::Ignored);
        };
        self.run(&event.sender, Input::Button(action), event.origin, ctx).await
    }

    async fn handle_text(
        &self,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        self.run(&event.sender, Input::Text(event.text.clone()), None, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use paygate_core::audit::InMemoryAuditSink;
    use paygate_core::flows::SessionState;
    use paygate_core::{
        ApplicationError, ApprovalStore, DialogTransitionError, Identity, InMemoryApprovalStore,
        Profile,
    };

    use super::{DialogError, DialogService, DialogSettings};
    use crate::actions::{parse_callback, BotCommand};
    use crate::events::{
        ButtonPressEvent, CommandEvent, ConversationService, EventContext, HandlerResult, Sender,
        TextMessageEvent,
    };
    use crate::gateway::{MessageRef, RecordingGateway};
    use crate::messages;

    const ADMIN: Identity = Identity(1_000_001);
    const USER: Identity = Identity(2_000_002);

    struct Harness {
        service: DialogService,
        gateway: RecordingGateway,
        store: Arc<InMemoryApprovalStore>,
        audit: InMemoryAuditSink,
    }

    fn harness() -> Harness {
        let gateway = RecordingGateway::new();
        let store = Arc::new(InMemoryApprovalStore::new());
        let audit = InMemoryAuditSink::default();
        let service = DialogService::new(
            DialogSettings { admin: ADMIN, owner_handle: "@owner".to_owned() },
            store.clone(),
            Arc::new(gateway.clone()),
            Arc::new(audit.clone()),
        );
        Harness { service, gateway, store, audit }
    }

    fn sender(identity: Identity) -> Sender {
        Sender::new(identity, Profile::new("Ada").with_handle("ada"))
    }

    async fn command(h: &Harness, identity: Identity, command: BotCommand) -> HandlerResult {
        let event = CommandEvent {
            sender: sender(identity),
            command: Some(command),
            text: format!("/{}", command.as_str()),
        };
        h.service.handle_command(&event, &EventContext::default()).await.expect("command")
    }

    async fn press(h: &Harness, identity: Identity, tag: &str) -> HandlerResult {
        let event = ButtonPressEvent {
            sender: sender(identity),
            callback_id: format!("cb-{tag}"),
            tag: tag.to_owned(),
            action: parse_callback(tag).ok(),
            origin: Some(MessageRef { chat_id: 1, message_id: 7 }),
        };
        h.service.handle_button_press(&event, &EventContext::default()).await.expect("button")
    }

    async fn text(h: &Harness, identity: Identity, body: &str) -> HandlerResult {
        let event = TextMessageEvent { sender: sender(identity), text: body.to_owned() };
        h.service.handle_text(&event, &EventContext::default()).await.expect("text")
    }

    fn state(h: &Harness, identity: Identity) -> Option<SessionState> {
        h.service.sessions().peek(identity)
    }

    #[tokio::test]
    async fn unknown_user_entry_requests_access_and_notifies_admin() {
        let h = harness();

        command(&h, USER, BotCommand::Start).await;

        assert!(h.store.is_pending(USER));
        assert_eq!(h.gateway.sent_to(USER), vec![messages::access_requested()]);
        assert_eq!(h.gateway.sent_to(ADMIN), vec![messages::approval_request(
            USER,
            &Profile::new("Ada").with_handle("ada")
        )]);
        assert!(h.audit.events().iter().any(|event| event.event_type == "approval.requested"));
    }

    #[tokio::test]
    async fn admin_entry_shows_menu_without_approval_workflow() {
        let h = harness();

        command(&h, ADMIN, BotCommand::Start).await;

        assert_eq!(h.gateway.sent_to(ADMIN), vec![messages::admin_menu()]);
        assert_eq!(h.store.snapshot().pending, 0);
    }

    #[tokio::test]
    async fn approved_user_entry_skips_pending_request() {
        let h = harness();
        h.store.decide(USER, paygate_core::Verdict::Approve);

        command(&h, USER, BotCommand::Start).await;

        assert!(!h.store.is_pending(USER));
        assert_eq!(h.gateway.sent_to(USER), vec![messages::payment_format_prompt()]);
        assert!(h.gateway.sent_to(ADMIN).is_empty());
    }

    #[tokio::test]
    async fn approval_edits_admin_prompt_and_notifies_user_once() {
        let h = harness();
        command(&h, USER, BotCommand::Start).await;
        h.gateway.clear();

        press(&h, ADMIN, &format!("approve_{USER}")).await;
        press(&h, ADMIN, &format!("approve_{USER}")).await;

        assert!(h.store.is_approved(USER));
        assert_eq!(h.gateway.sent_to(USER), vec![messages::approval_notice()]);
        let edits = h.gateway.edits();
        assert_eq!(edits.len(), 2);
        assert!(edits[0].1.plain_text().starts_with("✅ User Approved:"));
        assert_eq!(h.gateway.acknowledged().len(), 2);
    }

    #[tokio::test]
    async fn rejection_notifies_with_owner_handle() {
        let h = harness();
        command(&h, USER, BotCommand::Start).await;
        h.gateway.clear();

        press(&h, ADMIN, &format!("reject_{USER}")).await;

        assert!(!h.store.is_approved(USER));
        assert!(!h.store.is_pending(USER));
        assert_eq!(h.gateway.sent_to(USER), vec![messages::rejection_notice("@owner")]);
    }

    #[tokio::test]
    async fn non_admin_cannot_decide() {
        let h = harness();
        let other = Identity(3_000_003);
        command(&h, USER, BotCommand::Start).await;
        h.gateway.clear();

        press(&h, other, &format!("approve_{USER}")).await;

        assert!(h.store.is_pending(USER));
        assert_eq!(h.gateway.sent_to(other), vec![messages::admin_only()]);
    }

    #[tokio::test]
    async fn payment_format_round_trip_for_member() {
        let h = harness();
        h.store.decide(USER, paygate_core::Verdict::Approve);

        press(&h, USER, "payment_format").await;
        assert_eq!(state(&h, USER), Some(SessionState::AwaitingIds));
        assert_eq!(h.gateway.edits()[0].1, messages::format_instructions());

        text(&h, USER, "6486714430 Got Invited\nbad 12\n6486714430 again\n7944746107").await;
        assert_eq!(
            state(&h, USER),
            Some(SessionState::AwaitingAmount {
                identifiers: vec!["6486714430".to_owned(), "7944746107".to_owned()]
            })
        );

        text(&h, USER, " 2.1 ").await;
        assert_eq!(state(&h, USER), Some(SessionState::Idle));

        let replies = h.gateway.sent_to(USER);
        assert_eq!(replies[replies.len() - 2], messages::formatted_output(
            "6486714430 2.1\n7944746107 2.1"
        ));
        assert_eq!(replies[replies.len() - 1], messages::format_more());
    }

    #[tokio::test]
    async fn text_without_identifiers_reprompts_and_stays() {
        let h = harness();
        press(&h, ADMIN, "payment_format").await;

        text(&h, ADMIN, "nothing useful 1234").await;

        assert_eq!(state(&h, ADMIN), Some(SessionState::AwaitingIds));
        assert_eq!(h.gateway.sent_to(ADMIN), vec![messages::no_identifiers_found()]);
    }

    #[tokio::test]
    async fn admin_finishing_format_gets_menu_again() {
        let h = harness();
        press(&h, ADMIN, "payment_format").await;
        text(&h, ADMIN, "11111").await;

        text(&h, ADMIN, "   ").await;
        assert!(matches!(state(&h, ADMIN), Some(SessionState::AwaitingAmount { .. })));

        text(&h, ADMIN, "5").await;
        let replies = h.gateway.sent_to(ADMIN);
        assert_eq!(replies.last(), Some(&messages::admin_menu()));
        assert!(replies.contains(&messages::amount_required()));
    }

    #[tokio::test]
    async fn message_user_flow_validates_target() {
        let h = harness();

        press(&h, ADMIN, "message_user").await;
        assert_eq!(state(&h, ADMIN), Some(SessionState::AwaitingTargetId));

        text(&h, ADMIN, "12ab").await;
        assert_eq!(state(&h, ADMIN), Some(SessionState::AwaitingTargetId));

        text(&h, ADMIN, " 1234567890 ").await;
        assert_eq!(state(&h, ADMIN), Some(SessionState::Idle));
        assert_eq!(h.gateway.sent_to(ADMIN), vec![
            messages::invalid_target_identity(),
            messages::direct_message_link(Identity(1_234_567_890)),
            messages::admin_menu(),
        ]);
    }

    #[tokio::test]
    async fn message_user_is_admin_only() {
        let h = harness();

        press(&h, USER, "message_user").await;

        assert_eq!(state(&h, USER), Some(SessionState::Idle));
        assert_eq!(h.gateway.edits()[0].1, messages::admin_only());
    }

    #[tokio::test]
    async fn cancel_clears_working_data() {
        let h = harness();
        press(&h, ADMIN, "payment_format").await;
        text(&h, ADMIN, "11111 22222").await;

        command(&h, ADMIN, BotCommand::Cancel).await;

        assert_eq!(state(&h, ADMIN), Some(SessionState::Idle));
        assert_eq!(h.gateway.sent_to(ADMIN).last(), Some(&messages::cancelled()));
    }

    #[tokio::test]
    async fn approved_user_reentry_gets_format_prompt_instead_of_new_request() {
        let h = harness();
        command(&h, USER, BotCommand::Start).await;
        assert_eq!(h.gateway.sent_to(ADMIN).len(), 1);

        press(&h, ADMIN, &format!("approve_{USER}")).await;
        assert!(h.store.is_approved(USER));
        assert_eq!(h.gateway.sent_to(USER).last(), Some(&messages::approval_notice()));
        h.gateway.clear();

        command(&h, USER, BotCommand::Start).await;

        assert_eq!(h.gateway.sent_to(USER), vec![messages::payment_format_prompt()]);
        assert!(h.gateway.sent_to(ADMIN).is_empty());
        assert!(!h.store.is_pending(USER));
    }

    #[tokio::test]
    async fn flow_after_cancel_starts_from_an_empty_list() {
        let h = harness();
        press(&h, ADMIN, "payment_format").await;
        text(&h, ADMIN, "11111 22222").await;
        command(&h, ADMIN, BotCommand::Cancel).await;
        h.gateway.clear();

        press(&h, ADMIN, "payment_format").await;
        assert_eq!(state(&h, ADMIN), Some(SessionState::AwaitingIds));
        text(&h, ADMIN, "33333").await;
        assert_eq!(
            state(&h, ADMIN),
            Some(SessionState::AwaitingAmount { identifiers: vec!["33333".to_owned()] })
        );
        text(&h, ADMIN, "7").await;

        let replies = h.gateway.sent_to(ADMIN);
        assert!(replies.contains(&messages::formatted_output("33333 7")));
        assert!(!replies.iter().any(|reply| reply.plain_text().contains("11111")));
    }

    #[tokio::test]
    async fn finished_dialogs_leave_no_session_slots() {
        let h = harness();
        let sessions = h.service.sessions();

        text(&h, USER, "hello 12345").await;
        command(&h, USER, BotCommand::Help).await;
        assert_eq!(sessions.slot_count(), 0);

        press(&h, ADMIN, "payment_format").await;
        text(&h, ADMIN, "11111").await;
        assert_eq!(sessions.slot_count(), 1);

        text(&h, ADMIN, "5").await;
        assert_eq!(sessions.slot_count(), 0);

        press(&h, ADMIN, "message_user").await;
        command(&h, ADMIN, BotCommand::Cancel).await;
        assert_eq!(sessions.slot_count(), 0);
    }

    #[tokio::test]
    async fn idle_text_and_unknown_buttons_are_ignored() {
        let h = harness();

        assert_eq!(text(&h, USER, "hello 12345").await, HandlerResult::Ignored);
        assert_eq!(press(&h, USER, "mystery").await, HandlerResult::Ignored);

        assert!(h.gateway.sent_to(USER).is_empty());
        assert_eq!(h.gateway.acknowledged(), vec!["cb-mystery".to_owned()]);
    }

    #[tokio::test]
    async fn unreachable_requester_still_leaves_decision_applied() {
        let h = harness();
        command(&h, USER, BotCommand::Start).await;
        h.gateway.mark_unreachable(USER);

        let result = press(&h, ADMIN, &format!("approve_{USER}")).await;

        assert_eq!(result, HandlerResult::Processed);
        assert!(h.store.is_approved(USER));
        assert!(h.audit.events().iter().any(|event| event.event_type == "delivery.failed"));
    }

    #[tokio::test]
    async fn help_lists_commands_with_owner() {
        let h = harness();

        command(&h, USER, BotCommand::Help).await;

        assert_eq!(h.gateway.sent_to(USER), vec![messages::help_message(false, "@owner")]);
    }

    #[test]
    fn dialog_errors_map_to_restart_hint() {
        let error = ApplicationError::from(DialogError::from(DialogTransitionError::NoActiveDialog))
            .into_interface("corr-1");

        assert_eq!(error.user_message(), "⚠️ An error occurred. Please try again with /start");
        assert_eq!(error.correlation_id(), "corr-1");
    }
}
