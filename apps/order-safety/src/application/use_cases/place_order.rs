//! Place Order Use Case
//!
//! Runs one order intent through every safety check before it reaches the
//! exchange:
//!
//! 1. Normalize price/quantity against the symbol's filters
//! 2. Derive the client order id
//! 3. Acquire rate-limit capacity for the first attempt
//! 4. Reserve the id for the intent (a known intent is never resent)
//! 5. Submit, retrying transient failures with the same client order id
//! 6. Audit the outcome
//!
//! Audit failures before anything is sent are returned as errors. After a
//! submission the exchange outcome stands, and the failed audit write is
//! reported through [`PlaceOrderOutcome::audit_error`] or
//! [`OrderSafetyError::Unaudited`].

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::application::ports::{ExchangeError, ExchangePort, OrderAck, SubmitOrderRequest};
use crate::audit::{AuditError, AuditLogger, OrderEventKind};
use crate::error::{ErrorCode, OrderSafetyError};
use crate::idempotency::{ClientOrderIdFactory, IdempotencyStore, Reservation};
use crate::models::{MarketFilterSnapshot, OrderIntent};
use crate::precision::{NormalizedOrder, PrecisionGate};
use crate::resilience::{ExchangeRetryPolicy, ExponentialBackoffCalculator, RateLimiter};

/// Default rate-limit weight of one order submission.
pub const DEFAULT_ORDER_WEIGHT: u32 = 1;

/// Result of placing an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceOrderOutcome {
    /// Order accepted by the exchange.
    Submitted {
        /// Exchange acknowledgment.
        ack: OrderAck,
        /// Values that were sent.
        normalized: NormalizedOrder,
        /// Attempts made, including the first.
        attempts: u32,
        /// Set when the `ORDER_SUBMITTED` record could not be written.
        audit_error: Option<String>,
    },
    /// Intent was already submitted; nothing new was accepted.
    Duplicate {
        /// Client order id bound to the intent.
        client_order_id: String,
        /// Set when the `ORDER_DUPLICATE` record could not be written.
        audit_error: Option<String>,
    },
}

impl PlaceOrderOutcome {
    /// Client order id of the order.
    #[must_use]
    pub fn client_order_id(&self) -> &str {
        match self {
            Self::Submitted { ack, .. } => &ack.client_order_id,
            Self::Duplicate { client_order_id, .. } => client_order_id,
        }
    }

    /// Whether a new order was sent.
    #[must_use]
    pub const fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted { .. })
    }

    /// Audit write failure for this outcome, if any.
    #[must_use]
    pub fn audit_error(&self) -> Option<&str> {
        match self {
            Self::Submitted { audit_error, .. } | Self::Duplicate { audit_error, .. } => {
                audit_error.as_deref()
            }
        }
    }
}

/// Use case for placing orders safely.
pub struct PlaceOrderUseCase<E>
where
    E: ExchangePort,
{
    exchange: Arc<E>,
    store: Arc<IdempotencyStore>,
    limiter: Arc<RateLimiter>,
    audit: Arc<AuditLogger>,
    gate: PrecisionGate,
    ids: ClientOrderIdFactory,
    retry_policy: ExchangeRetryPolicy,
    order_weight: u32,
}

impl<E> PlaceOrderUseCase<E>
where
    E: ExchangePort,
{
    /// Create a new `PlaceOrderUseCase` with default id, retry and weight settings.
    pub fn new(
        exchange: Arc<E>,
        store: Arc<IdempotencyStore>,
        limiter: Arc<RateLimiter>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            exchange,
            store,
            limiter,
            audit,
            gate: PrecisionGate::new().with_tracing(),
            ids: ClientOrderIdFactory::default(),
            retry_policy: ExchangeRetryPolicy::default(),
            order_weight: DEFAULT_ORDER_WEIGHT,
        }
    }

    /// Use a custom id factory.
    #[must_use]
    pub fn with_id_factory(mut self, ids: ClientOrderIdFactory) -> Self {
        self.ids = ids;
        self
    }

    /// Use a custom retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: ExchangeRetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Declare the rate-limit weight of one submission.
    #[must_use]
    pub const fn with_order_weight(mut self, weight: u32) -> Self {
        self.order_weight = weight;
        self
    }

    /// Place `intent` now.
    pub async fn place(
        &self,
        intent: &OrderIntent,
        filters: &MarketFilterSnapshot,
        current_price: Option<Decimal>,
    ) -> Result<PlaceOrderOutcome, OrderSafetyError> {
        self.place_at(intent, filters, current_price, Utc::now().timestamp_millis())
            .await
    }

    /// Place `intent` with an explicit id timestamp.
    pub async fn place_at(
        &self,
        intent: &OrderIntent,
        filters: &MarketFilterSnapshot,
        current_price: Option<Decimal>,
        ts_ms: i64,
    ) -> Result<PlaceOrderOutcome, OrderSafetyError> {
        let expected = self.audit.environment();
        if intent.env != expected {
            return Err(OrderSafetyError::EnvironmentMismatch {
                expected,
                actual: intent.env,
            });
        }

        // 1. Normalize
        let normalized = match self.gate.normalize(intent.price, intent.quantity, filters, current_price) {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!(symbol = %intent.symbol, intent_key = %intent.intent_key, reason = e.reason(), "Order blocked by precision gate");
                let audited = self.audit_order(
                    OrderEventKind::Rejected,
                    &self.ids.client_id_for(intent, Some(ts_ms)),
                    intent,
                    json!({"reason": e.reason(), "message": e.to_string()}),
                );
                return Err(with_audit(e.into(), audited));
            }
        };

        // Known intents never consume capacity
        if let Some(id) = self.store.get(&intent.intent_key) {
            return self.known_intent(intent, id);
        }

        // 2. Derive the id
        let candidate = self.ids.client_id_for(intent, Some(ts_ms));

        // 3. Capacity before the binding: a throttled intent stays placeable
        if let Err(e) = self.limiter.acquire(self.order_weight).await {
            warn!(symbol = %intent.symbol, intent_key = %intent.intent_key, error = %e, "Order throttled before submission");
            let audited = self.audit_order(
                OrderEventKind::Rejected,
                &candidate,
                intent,
                json!({"reason": ErrorCode::RateLimited.reason(), "message": e.to_string()}),
            );
            return Err(with_audit(e.into(), audited));
        }

        // 4. Reserve the id
        let client_order_id = match self.store.reserve(&intent.intent_key, &candidate)? {
            Reservation::New(id) => id,
            Reservation::Existing(id) => return self.known_intent(intent, id),
        };

        let request = SubmitOrderRequest::from_normalized(
            client_order_id,
            intent.symbol.clone(),
            intent.side,
            intent.order_type,
            &normalized,
        );

        // 5-6. Submission with retry, then audit
        match self.submit_with_retry(&request).await {
            Ok((ack, attempts)) => {
                info!(
                    symbol = %request.symbol,
                    client_order_id = %request.client_order_id,
                    exchange_order_id = %ack.exchange_order_id,
                    attempts,
                    "Order submitted"
                );
                let audited = self.audit_order(
                    OrderEventKind::Submitted,
                    &request.client_order_id,
                    intent,
                    submission_details(&request, Some(&ack), attempts),
                );
                Ok(PlaceOrderOutcome::Submitted {
                    ack,
                    normalized,
                    attempts,
                    audit_error: audited.err().map(|e| e.to_string()),
                })
            }
            Err(SubmitFailure::AlreadyPlaced { attempts }) => {
                info!(client_order_id = %request.client_order_id, attempts, "Retry found order already on exchange");
                let audited = self.audit_order(
                    OrderEventKind::Duplicate,
                    &request.client_order_id,
                    intent,
                    submission_details(&request, None, attempts),
                );
                Ok(PlaceOrderOutcome::Duplicate {
                    client_order_id: request.client_order_id,
                    audit_error: audited.err().map(|e| e.to_string()),
                })
            }
            Err(SubmitFailure::Error { attempts, error: err }) => {
                error!(client_order_id = %request.client_order_id, attempts, error = %err, "Order submission failed");
                let mut details = submission_details(&request, None, attempts);
                details["error"] = Value::String(err.to_string());
                details["code"] = Value::String(err.code().reason().to_string());
                let audited = self.audit_order(OrderEventKind::Failed, &request.client_order_id, intent, details);
                Err(with_audit(err, audited))
            }
        }
    }

    fn known_intent(&self, intent: &OrderIntent, id: String) -> Result<PlaceOrderOutcome, OrderSafetyError> {
        info!(symbol = %intent.symbol, intent_key = %intent.intent_key, client_order_id = %id, "Duplicate intent, not resubmitting");
        self.audit_order(OrderEventKind::Duplicate, &id, intent, json!({"intent_key": intent.intent_key}))?;
        Ok(PlaceOrderOutcome::Duplicate {
            client_order_id: id,
            audit_error: None,
        })
    }

    async fn submit_with_retry(&self, request: &SubmitOrderRequest) -> Result<(OrderAck, u32), SubmitFailure> {
        let mut backoff = ExponentialBackoffCalculator::new(&self.retry_policy);
        let mut attempts = 0;

        loop {
            // The first attempt's capacity was acquired before reservation
            if attempts > 0 {
                self.limiter
                    .acquire(self.order_weight)
                    .await
                    .map_err(|e| SubmitFailure::Error {
                        attempts,
                        error: e.into(),
                    })?;
            }
            attempts += 1;

            let err = match self.exchange.submit_order(request).await {
                Ok(ack) => return Ok((ack, attempts)),
                Err(err) => err,
            };

            // A timed-out earlier attempt may have landed
            if attempts > 1 && err.is_duplicate_order() {
                return Err(SubmitFailure::AlreadyPlaced { attempts });
            }

            let category = err.category();
            if !category.is_retryable() {
                return Err(exchange_failure(attempts, err));
            }

            let delay = match err.retry_after() {
                Some(hint) => backoff.override_delay(hint),
                None => backoff.next_backoff(),
            };
            let Some(delay) = delay else {
                return Err(exchange_failure(attempts, err));
            };

            warn!(
                client_order_id = %request.client_order_id,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retryable exchange error, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn audit_order(
        &self,
        kind: OrderEventKind,
        client_order_id: &str,
        intent: &OrderIntent,
        mut details: Value,
    ) -> Result<(), AuditError> {
        details["strategy"] = Value::String(intent.strategy.clone());
        details["intent_key"] = Value::String(intent.intent_key.clone());
        match self.audit.log_order_event(kind, client_order_id, &intent.symbol, details) {
            Ok(_) => {
                debug!(client_order_id, event = kind.event_name(), "Order event audited");
                Ok(())
            }
            Err(e) => {
                error!(client_order_id, event = kind.event_name(), error = %e, "Failed to write audit record");
                Err(e)
            }
        }
    }
}

enum SubmitFailure {
    AlreadyPlaced { attempts: u32 },
    Error { attempts: u32, error: OrderSafetyError },
}

fn exchange_failure(attempts: u32, source: ExchangeError) -> SubmitFailure {
    SubmitFailure::Error {
        attempts,
        error: OrderSafetyError::Exchange { attempts, source },
    }
}

fn with_audit(err: OrderSafetyError, audited: Result<(), AuditError>) -> OrderSafetyError {
    match audited {
        Ok(()) => err,
        Err(audit) => OrderSafetyError::Unaudited {
            source: Box::new(err),
            audit,
        },
    }
}

fn submission_details(request: &SubmitOrderRequest, ack: Option<&OrderAck>, attempts: u32) -> Value {
    let mut details = json!({
        "side": request.side,
        "type": request.order_type,
        "quantity": request.quantity,
        "price": request.price,
        "attempts": attempts,
    });
    if let Some(ack) = ack {
        details["exchange_order_id"] = Value::String(ack.exchange_order_id.clone());
        details["status"] = Value::String(ack.status.clone());
    }
    details
}
