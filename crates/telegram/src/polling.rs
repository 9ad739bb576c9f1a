use std::{
    any::Any, collections::HashMap, future::Future, panic::AssertUnwindSafe, sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use futures::FutureExt;
use paygate_core::{Identity, InterfaceError};
use thiserror::Error;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::{
    events::{
        DispatchError, EventContext, EventDispatcher, EventHandlerError, HandlerResult, Sender,
        UpdateEnvelope,
    },
    gateway::Gateway,
    messages,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Debug, Error)]
pub enum PollingError {
    #[error("update transport gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: TransportError },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 500, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Source of inbound updates. `next_envelope` returning `Ok(None)` means the stream ended.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<UpdateEnvelope>, TransportError>;
    async fn acknowledge(&self, update_id: u64) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopUpdateTransport;

#[async_trait]
impl UpdateTransport for NoopUpdateTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<UpdateEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _update_id: u64) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Completion signal of the newest in-flight event per identity. An event waits for its
/// predecessor's sender to drop before it is dispatched.
#[derive(Default)]
struct IdentityLanes {
    tails: HashMap<Identity, oneshot::Receiver<()>>,
}

impl IdentityLanes {
    fn enqueue(
        &mut self,
        identity: Identity,
    ) -> (Option<oneshot::Receiver<()>>, oneshot::Sender<()>) {
        let (done, tail) = oneshot::channel();
        (self.tails.insert(identity, tail), done)
    }

    fn prune(&mut self) {
        self.tails.retain(|_, tail| matches!(tail.try_recv(), Err(TryRecvError::Empty)));
    }
}

/// Pulls updates from a transport and dispatches each on its own task.
///
/// Distinct identities run concurrently; one identity's events are dispatched one at a time
/// in arrival order.
pub struct PollingRunner {
    transport: Arc<dyn UpdateTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
    shutdown_grace: Duration,
    failure_notices: Option<Arc<dyn Gateway>>,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn UpdateTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self {
            transport,
            dispatcher: Arc::new(dispatcher),
            reconnect_policy,
            shutdown_grace: Duration::from_secs(15),
            failure_notices: None,
        }
    }

    /// Gateway used to tell the sender when handling their event failed.
    pub fn with_failure_notices(mut self, gateway: Arc<dyn Gateway>) -> Self {
        self.failure_notices = Some(gateway);
        self
    }

    /// Time in-flight events get to finish once intake stops.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Runs until the transport stream ends.
    pub async fn start(&self) -> Result<(), PollingError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs until the transport stream ends or `shutdown` resolves, then waits up to the
    /// shutdown grace for in-flight events before aborting them.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), PollingError>
    where
        F: Future<Output = ()> + Send,
    {
        let mut in_flight = JoinSet::new();
        let mut lanes = IdentityLanes::default();
        let result = tokio::select! {
            result = self.pump_with_retries(&mut in_flight, &mut lanes) => result,
            () = shutdown => {
                info!(event_name = "ingress.telegram.shutdown", "stopping update intake");
                Ok(())
            }
        };

        if tokio::time::timeout(self.shutdown_grace, drain(&mut in_flight)).await.is_err() {
            warn!(
                in_flight = in_flight.len(),
                "shutdown grace elapsed; aborting unfinished events"
            );
            in_flight.shutdown().await;
        }
        result
    }

    /// Retries count consecutive failures only; a successful connection resets the budget.
    async fn pump_with_retries(
        &self,
        in_flight: &mut JoinSet<()>,
        lanes: &mut IdentityLanes,
    ) -> Result<(), PollingError> {
        let mut attempt = 0;

        loop {
            let result = self.connect_and_pump(&mut attempt, in_flight, lanes).await;
            match result {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        event_name = "ingress.telegram.transport_failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "update transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        return Err(PollingError::RetriesExhausted {
                            attempts: attempt + 1,
                            last_error: transport_error,
                        });
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: &mut u32,
        in_flight: &mut JoinSet<()>,
        lanes: &mut IdentityLanes,
    ) -> Result<(), TransportError> {
        info!(attempt = *attempt, "opening update transport");
        self.transport.connect().await?;
        info!(attempt = *attempt, "update transport connected");
        *attempt = 0;

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                log_abnormal_exit(joined);
            }
            lanes.prune();

            let Some(envelope) = self.transport.next_envelope().await? else {
                info!("update stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let correlation_id = envelope.correlation_id();

            info!(
                event_name = "ingress.telegram.update_received",
                update_id = envelope.update_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %correlation_id,
                identity = envelope.event.sender().map(|sender| sender.identity.0),
                "received update"
            );

            if let Err(error) = self.transport.acknowledge(envelope.update_id).await {
                warn!(
                    event_name = "ingress.telegram.ack_sent",
                    update_id = envelope.update_id,
                    correlation_id = %correlation_id,
                    error = %error,
                    "failed to acknowledge update"
                );
            } else {
                debug!(
                    event_name = "ingress.telegram.ack_sent",
                    update_id = envelope.update_id,
                    correlation_id = %correlation_id,
                    "acknowledged update"
                );
            }

            let lane = envelope.event.sender().map(|sender| lanes.enqueue(sender.identity));
            let dispatcher = Arc::clone(&self.dispatcher);
            let notices = self.failure_notices.clone();
            in_flight.spawn(async move {
                let _done = match lane {
                    Some((previous, done)) => {
                        if let Some(previous) = previous {
                            let _ = previous.await;
                        }
                        Some(done)
                    }
                    None => None,
                };
                let context = EventContext { correlation_id };
                dispatch_guarded(&dispatcher, notices.as_deref(), &envelope, &context).await;
            });
        }
    }
}

/// Dispatches one event and answers its sender when handling fails or panics.
async fn dispatch_guarded(
    dispatcher: &EventDispatcher,
    notices: Option<&dyn Gateway>,
    envelope: &UpdateEnvelope,
    context: &EventContext,
) {
    let outcome = AssertUnwindSafe(dispatcher.dispatch(envelope, context)).catch_unwind().await;
    let failure = match outcome {
        Ok(Ok(HandlerResult::Processed)) => return,
        Ok(Ok(HandlerResult::Ignored)) => {
            debug!(correlation_id = %context.correlation_id, "update ignored");
            return;
        }
        Ok(Err(DispatchError::Handler(EventHandlerError::Service(application_error)))) => {
            error!(
                event_name = "ingress.telegram.dispatch_failed",
                correlation_id = %context.correlation_id,
                error = %application_error,
                "event handling failed"
            );
            application_error.into_interface(&context.correlation_id)
        }
        Err(payload) => {
            let detail = panic_detail(payload.as_ref());
            error!(
                event_name = "ingress.telegram.handler_panicked",
                correlation_id = %context.correlation_id,
                panic = %detail,
                "event handler panicked"
            );
            InterfaceError::internal(detail, &context.correlation_id)
        }
    };

    if let (Some(gateway), Some(sender)) = (notices, envelope.event.sender()) {
        notify_failure(gateway, sender, &failure).await;
    }
}

async fn notify_failure(gateway: &dyn Gateway, sender: &Sender, failure: &InterfaceError) {
    let notice = messages::error_message(failure.user_message());
    if let Err(delivery_error) = gateway.send(sender.identity, &notice).await {
        warn!(
            event_name = "delivery.failed",
            correlation_id = %failure.correlation_id(),
            identity = sender.identity.0,
            error = %delivery_error,
            "failure notice was not delivered"
        );
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

fn log_abnormal_exit(joined: Result<(), JoinError>) {
    if let Err(join_error) = joined {
        warn!(error = %join_error, "event task ended abnormally");
    }
}

async fn drain(in_flight: &mut JoinSet<()>) {
    while let Some(joined) = in_flight.join_next().await {
        log_abnormal_exit(joined);
    }
}
