use crate::{
    aggregation::{
        error::AggregationError,
        session::{AggregationSession, SessionStatus},
        signal::PartialSignal,
    },
    symbol::Symbol,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use uuid::Uuid;

const ALLOCATION_WEIGHT_EPSILON: Decimal = dec!(0.000000001);

struct SessionRecord {
    session: AggregationSession,
    /// Arrival order, not hash order: useful for audit logging even though
    /// `get_all_partial_signals` re-sorts by `strategy_id` for determinism.
    partials: IndexMap<String, PartialSignal>,
}

/// In-process replacement for the DynamoDB-backed session table: a
/// `parking_lot::Mutex`-guarded map standing in for conditional writes and
/// atomic counter increments.
///
/// Grounded on `original_source/the_alchemiser/coordinator_v2/services/
/// aggregation_session_service.py`: `store_partial_signal`'s
/// insert-if-absent-then-increment sequence is the only place idempotency
/// is enforced, matching the source's `ConditionExpression=
/// "attribute_not_exists(SK)"` guard.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, SessionRecord>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_session(
        &self,
        session_id: Uuid,
        correlation_id: Uuid,
        total_strategies: u32,
        timeout: chrono::Duration,
        now: DateTime<Utc>,
    ) -> AggregationSession {
        let session = AggregationSession {
            session_id,
            correlation_id,
            total_strategies,
            completed_strategies: 0,
            status: SessionStatus::Pending,
            created_at: now,
            timeout_at: now + timeout,
        };

        self.sessions.lock().insert(
            session_id,
            SessionRecord {
                session: session.clone(),
                partials: IndexMap::new(),
            },
        );

        session
    }

    /// Insert-if-absent then atomically increment `completed_strategies`. A
    /// duplicate `(session_id, strategy_id)` delivery is silently ignored and
    /// returns the counter unchanged.
    pub fn store_partial_signal(
        &self,
        session_id: Uuid,
        signal: PartialSignal,
    ) -> Result<u32, AggregationError> {
        let mut sessions = self.sessions.lock();
        let record = sessions
            .get_mut(&session_id)
            .ok_or(AggregationError::SessionNotFound(session_id))?;

        if record.partials.contains_key(&signal.strategy_id) {
            return Ok(record.session.completed_strategies);
        }

        record.partials.insert(signal.strategy_id.clone(), signal);
        record.session.completed_strategies += 1;

        if record.session.completed_strategies >= record.session.total_strategies
            && !record.session.status.is_terminal()
        {
            record.session.status = SessionStatus::Aggregating;
        }

        Ok(record.session.completed_strategies)
    }

    pub fn get_session(&self, session_id: Uuid) -> Option<AggregationSession> {
        self.sessions
            .lock()
            .get(&session_id)
            .map(|record| record.session.clone())
    }

    /// Returns partials in deterministic (strategy_id-sorted) order.
    pub fn get_all_partial_signals(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<PartialSignal>, AggregationError> {
        let sessions = self.sessions.lock();
        let record = sessions
            .get(&session_id)
            .ok_or(AggregationError::SessionNotFound(session_id))?;

        let mut signals: Vec<PartialSignal> = record.partials.values().cloned().collect();
        signals.sort_by(|a, b| a.strategy_id.cmp(&b.strategy_id));
        Ok(signals)
    }

    /// A partial arriving after a terminal status is recorded (handled by the
    /// caller via `store_partial_signal`, which does not itself check
    /// terminality) but does not reopen the session; this only rejects a
    /// status *transition* once terminal.
    pub fn update_session_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
    ) -> Result<(), AggregationError> {
        let mut sessions = self.sessions.lock();
        let record = sessions
            .get_mut(&session_id)
            .ok_or(AggregationError::SessionNotFound(session_id))?;

        if record.session.status.is_terminal() {
            return Err(AggregationError::AlreadyTerminal(session_id));
        }

        record.session.status = status;
        Ok(())
    }

    /// Consolidate every stored partial's portfolio weights into one target
    /// allocation, per `spec.md` §4.4's consolidation rule.
    pub fn consolidate(
        &self,
        session_id: Uuid,
    ) -> Result<HashMap<Symbol, Decimal>, AggregationError> {
        let partials = self.get_all_partial_signals(session_id)?;

        let allocation_sum = partials
            .iter()
            .fold(Decimal::ZERO, |acc, p| acc + p.allocation_weight);
        if partials.is_empty() || (allocation_sum - Decimal::ONE).abs() > ALLOCATION_WEIGHT_EPSILON
        {
            return Err(AggregationError::AllocationWeightsInvalid(allocation_sum));
        }

        Ok(Self::weighted_consolidation(&partials))
    }

    /// Consolidate whatever partials are on hand without requiring their
    /// allocation weights to sum to one, renormalizing by what actually
    /// arrived. Used only by the timeout "partial-consolidation" policy
    /// (`spec.md` §7, error kind 5) — never by the normal completion path.
    pub fn consolidate_lenient(
        &self,
        session_id: Uuid,
    ) -> Result<HashMap<Symbol, Decimal>, AggregationError> {
        let partials = self.get_all_partial_signals(session_id)?;
        if partials.is_empty() {
            return Err(AggregationError::AllocationWeightsInvalid(Decimal::ZERO));
        }

        let mut consolidated = Self::weighted_consolidation(&partials);
        let allocation_sum = partials
            .iter()
            .fold(Decimal::ZERO, |acc, p| acc + p.allocation_weight);
        if allocation_sum > Decimal::ZERO && allocation_sum < Decimal::ONE {
            for weight in consolidated.values_mut() {
                *weight /= allocation_sum;
            }
        }

        Ok(consolidated)
    }

    fn weighted_consolidation(partials: &[PartialSignal]) -> HashMap<Symbol, Decimal> {
        let mut consolidated: HashMap<Symbol, Decimal> = HashMap::new();
        for partial in partials {
            for (symbol, weight) in &partial.consolidated_portfolio {
                *consolidated.entry(symbol.clone()).or_insert(Decimal::ZERO) +=
                    partial.allocation_weight * *weight;
            }
        }

        let total: Decimal = consolidated.values().fold(Decimal::ZERO, |acc, w| acc + *w);
        if total > Decimal::ONE {
            for weight in consolidated.values_mut() {
                *weight /= total;
            }
        }

        consolidated
    }
}
