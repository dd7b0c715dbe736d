//! Trigger handler: validation in front of the privileged operation.
//!
//! A matched trigger is dispatched on its own task. The outcome is recorded
//! there, so a caller that disconnects or times out cannot cancel the
//! invocation half way or leave it out of the ledger.

use crate::domain::validator::RejectReason;
use crate::domain::{
    OperationError, TokenValidator, TriggerContext, TriggerError, TriggerLedger, TriggerOutcome,
    TriggerRecord, Triggered,
};
use crate::middleware::metrics::TriggerMetrics;
use crate::ports::{PrivilegedOperation, SystemTimeSource, TimeSource, TriggerApi};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument, Span};
use uuid::Uuid;

/// Implements [`TriggerApi`] over a validator and one privileged operation.
pub struct TriggerHandler {
    validator: Arc<TokenValidator>,
    dispatcher: Arc<Dispatcher>,
}

/// State shared with the dispatch task
struct Dispatcher {
    operation: Arc<dyn PrivilegedOperation>,
    metrics: Arc<TriggerMetrics>,
    ledger: Arc<TriggerLedger>,
    clock: Arc<dyn TimeSource>,
}

impl TriggerHandler {
    pub fn new(
        validator: Arc<TokenValidator>,
        operation: Arc<dyn PrivilegedOperation>,
        metrics: Arc<TriggerMetrics>,
        ledger: Arc<TriggerLedger>,
    ) -> Self {
        Self {
            validator,
            dispatcher: Arc::new(Dispatcher {
                operation,
                metrics,
                ledger,
                clock: Arc::new(SystemTimeSource),
            }),
        }
    }

    /// Replace the clock (tests)
    pub fn with_clock(self, clock: Arc<dyn TimeSource>) -> Self {
        let d = &self.dispatcher;
        let dispatcher = Arc::new(Dispatcher {
            operation: Arc::clone(&d.operation),
            metrics: Arc::clone(&d.metrics),
            ledger: Arc::clone(&d.ledger),
            clock,
        });
        Self {
            validator: self.validator,
            dispatcher,
        }
    }

    pub fn operation_name(&self) -> &str {
        self.dispatcher.operation.name()
    }

    pub fn metrics(&self) -> Arc<TriggerMetrics> {
        Arc::clone(&self.dispatcher.metrics)
    }

    pub fn ledger(&self) -> Arc<TriggerLedger> {
        Arc::clone(&self.dispatcher.ledger)
    }
}

impl Dispatcher {
    fn record(&self, trigger_id: Uuid, outcome: TriggerOutcome, ctx: &TriggerContext) {
        self.ledger.record(TriggerRecord {
            trigger_id,
            at: self.clock.now(),
            outcome,
            client_ip: ctx.client_ip,
            source: ctx.source,
        });
    }

    /// Invoke once and record the result.
    async fn dispatch(
        &self,
        trigger_id: Uuid,
        ctx: TriggerContext,
    ) -> Result<Triggered, TriggerError> {
        match self.operation.invoke().await {
            Ok(invocation) => {
                self.metrics.record_triggered();
                self.record(trigger_id, TriggerOutcome::Triggered, &ctx);
                info!(
                    trigger_id = %trigger_id,
                    operation = self.operation.name(),
                    detail = ?invocation.detail,
                    "Privileged operation triggered"
                );

                Ok(Triggered {
                    trigger_id,
                    triggered_at: self.clock.now(),
                    operation: self.operation.name().to_string(),
                    detail: invocation.detail,
                })
            }
            Err(e) => self.fail(trigger_id, &ctx, e),
        }
    }

    fn fail(
        &self,
        trigger_id: Uuid,
        ctx: &TriggerContext,
        e: OperationError,
    ) -> Result<Triggered, TriggerError> {
        self.metrics.record_dispatch_failure();
        self.record(trigger_id, TriggerOutcome::DispatchFailed, ctx);
        error!(
            trigger_id = %trigger_id,
            operation = self.operation.name(),
            error = %e,
            "Privileged operation failed"
        );
        Err(e.into())
    }
}

#[async_trait]
impl TriggerApi for TriggerHandler {
    async fn validate_and_trigger(
        &self,
        presented: &str,
        ctx: TriggerContext,
    ) -> Result<Triggered, TriggerError> {
        let trigger_id = Uuid::now_v7();
        let dispatcher = &self.dispatcher;

        if let Err(rejected) = self.validator.check(presented) {
            match rejected.reason() {
                RejectReason::TokenMismatch => dispatcher.metrics.record_mismatch(),
                RejectReason::SecretUnavailable => dispatcher.metrics.record_unavailable(),
            }
            warn!(
                trigger_id = %trigger_id,
                reason = rejected.reason().as_str(),
                source = ?ctx.source,
                client_ip = ?ctx.client_ip,
                "Trigger rejected"
            );
            dispatcher.record(trigger_id, TriggerOutcome::Rejected, &ctx);
            return Err(rejected.into());
        }

        let task = {
            let dispatcher = Arc::clone(dispatcher);
            tokio::spawn(
                async move { dispatcher.dispatch(trigger_id, ctx).await }
                    .instrument(Span::current()),
            )
        };

        match task.await {
            Ok(result) => result,
            // the task panicked before recording anything
            Err(e) => dispatcher.fail(trigger_id, &ctx, OperationError::Aborted(e.to_string())),
        }
    }
}
