use crate::{
    config::Feed,
    market_data::{
        error::MarketDataError,
        quote::StreamEvent,
        store::MarketDataStore,
        subscription::{SubscriptionOutcome, SubscriptionTable},
    },
    symbol::Symbol,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Point-in-time counters, mirroring `original_source`'s
/// `pricing/data_store.py::get_stats` snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketDataStats {
    pub quotes_evicted_total: u64,
    pub subscription_limit_hit_total: u64,
    pub reconnect_attempts_total: u64,
}

/// The streaming top-of-book wire adapter, consumed generically.
///
/// Out of scope per `spec.md` §1: only this interface is specified, not a
/// concrete exchange/broker implementation.
#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync + 'static {
    /// Establish the underlying connection. Called once per reconnect episode.
    async fn connect(&self, feed: Feed) -> Result<(), MarketDataError>;

    /// Replace the server-side subscription set, used on initial subscribe and
    /// on reconnect to resubscribe the current symbol set before signalling ready.
    async fn resubscribe(&self, symbols: &[Symbol]) -> Result<(), MarketDataError>;

    /// Await the next wire event. Returning `None` signals the connection was
    /// lost and a reconnect episode should begin.
    async fn next_event(&self) -> Option<StreamEvent>;
}

/// Exponential backoff with a hard cap and attempt budget per episode.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let doubled = self.base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        doubled.min(self.cap)
    }
}

/// Small explicit circuit breaker: successive connect failures tagged as rate
/// limiting open the breaker for a cooldown, during which no reconnect is
/// attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
}

#[derive(Debug)]
struct CircuitBreaker {
    state: Mutex<BreakerState>,
    until: Mutex<Option<chrono::DateTime<Utc>>>,
    cooldown: Duration,
}

impl CircuitBreaker {
    fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState::Closed),
            until: Mutex::new(None),
            cooldown,
        }
    }

    fn record_failure(&self, is_rate_limited: bool) {
        if is_rate_limited {
            *self.state.lock() = BreakerState::Open;
            *self.until.lock() = Some(Utc::now() + self.cooldown);
        }
    }

    fn record_success(&self) {
        *self.state.lock() = BreakerState::Closed;
        *self.until.lock() = None;
    }

    fn blocked_until(&self) -> Option<chrono::DateTime<Utc>> {
        let mut until_guard = self.until.lock();
        if *self.state.lock() != BreakerState::Open {
            return None;
        }
        match *until_guard {
            Some(until) if Utc::now() < until => Some(until),
            Some(_) => {
                *self.state.lock() = BreakerState::Closed;
                *until_guard = None;
                None
            }
            None => None,
        }
    }
}

fn is_rate_limited(error: &MarketDataError) -> bool {
    matches!(error, MarketDataError::ConnectRetriesExhausted(msg) if msg.contains("429") || msg.contains("connection limit exceeded"))
}

enum Command {
    Subscribe {
        symbols: Vec<Symbol>,
        priority: f64,
        reply: oneshot::Sender<SubscriptionOutcome>,
    },
    Unsubscribe(Symbol),
    Stop,
}

/// Per-symbol latest-quote/trade cache, sourced from a streaming wire
/// protocol, under a bounded subscription set (`spec.md` §4.1).
#[derive(Clone)]
pub struct MarketDataStream {
    store: Arc<MarketDataStore>,
    connected: Arc<AtomicBool>,
    commands: mpsc::UnboundedSender<Command>,
    max_quote_age: chrono::Duration,
    subscription_limit_hit_total: Arc<AtomicU64>,
    reconnect_attempts_total: Arc<AtomicU64>,
}

impl MarketDataStream {
    /// Spawn the dedicated connection task and its periodic cleanup task, then
    /// return once the stream is ready to accept subscriptions.
    pub async fn start<S>(
        source: Arc<S>,
        feed: Feed,
        max_symbols: usize,
        max_quote_age: Duration,
        cleanup_interval: Duration,
        reconnect_policy: ReconnectPolicy,
    ) -> Result<Self, MarketDataError>
    where
        S: MarketDataSource,
    {
        let store = Arc::new(MarketDataStore::new());
        let connected = Arc::new(AtomicBool::new(false));
        let subscription_limit_hit_total = Arc::new(AtomicU64::new(0));
        let reconnect_attempts_total = Arc::new(AtomicU64::new(0));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            source,
            store: Arc::clone(&store),
            connected: Arc::clone(&connected),
            subscriptions: Mutex::new(SubscriptionTable::new(max_symbols)),
            feed,
            reconnect_policy,
            breaker: CircuitBreaker::new(Duration::from_secs(60)),
            subscription_limit_hit_total: Arc::clone(&subscription_limit_hit_total),
            reconnect_attempts_total: Arc::clone(&reconnect_attempts_total),
        };

        driver.connect_with_backoff().await?;
        driver.source.resubscribe(&[]).await?;
        connected.store(true, Ordering::SeqCst);

        tokio::spawn(driver.run(commands_rx));

        let stream = Self {
            store: Arc::clone(&store),
            connected,
            commands: commands_tx,
            max_quote_age: chrono::Duration::from_std(max_quote_age).unwrap_or(chrono::Duration::seconds(300)),
            subscription_limit_hit_total,
            reconnect_attempts_total,
        };

        tokio::spawn(cleanup_task(
            Arc::clone(&store),
            stream.max_quote_age,
            cleanup_interval,
        ));

        Ok(stream)
    }

    pub async fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
        self.connected.store(false, Ordering::SeqCst);
    }

    pub async fn subscribe(
        &self,
        symbols: Vec<Symbol>,
        priority: f64,
    ) -> Result<SubscriptionOutcome, MarketDataError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Subscribe {
                symbols,
                priority,
                reply: reply_tx,
            })
            .map_err(|_| MarketDataError::StreamTaskGone)?;
        reply_rx.await.map_err(|_| MarketDataError::StreamTaskGone)
    }

    pub fn unsubscribe(&self, symbol: Symbol) {
        let _ = self.commands.send(Command::Unsubscribe(symbol));
    }

    pub fn get_quote(&self, symbol: &Symbol) -> Option<crate::market_data::quote::Quote> {
        self.store.get_quote(symbol)
    }

    pub fn get_price(&self, symbol: &Symbol) -> Option<rust_decimal::Decimal> {
        self.store.get_price(symbol)
    }

    pub fn get_bid_ask(&self, symbol: &Symbol) -> Option<(rust_decimal::Decimal, rust_decimal::Decimal)> {
        self.store.get_bid_ask(symbol)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn quotes_evicted_total(&self) -> u64 {
        self.store.quotes_evicted_total()
    }

    /// Snapshot of this stream's lifetime counters.
    pub fn stats(&self) -> MarketDataStats {
        MarketDataStats {
            quotes_evicted_total: self.store.quotes_evicted_total(),
            subscription_limit_hit_total: self.subscription_limit_hit_total.load(Ordering::Relaxed),
            reconnect_attempts_total: self.reconnect_attempts_total.load(Ordering::Relaxed),
        }
    }
}

struct Driver<S> {
    source: Arc<S>,
    store: Arc<MarketDataStore>,
    connected: Arc<AtomicBool>,
    subscriptions: Mutex<SubscriptionTable>,
    feed: Feed,
    reconnect_policy: ReconnectPolicy,
    breaker: CircuitBreaker,
    subscription_limit_hit_total: Arc<AtomicU64>,
    reconnect_attempts_total: Arc<AtomicU64>,
}

impl<S> Driver<S>
where
    S: MarketDataSource,
{
    async fn connect_with_backoff(&self) -> Result<(), MarketDataError> {
        if let Some(until) = self.breaker.blocked_until() {
            return Err(MarketDataError::CircuitOpen { until });
        }

        let mut last_error = None;
        for attempt in 0..self.reconnect_policy.max_attempts {
            self.reconnect_attempts_total.fetch_add(1, Ordering::Relaxed);
            match self.source.connect(self.feed).await {
                Ok(()) => {
                    self.breaker.record_success();
                    return Ok(());
                }
                Err(error) => {
                    warn!(?error, attempt, "market data connect attempt failed");
                    self.breaker.record_failure(is_rate_limited(&error));
                    last_error = Some(error);
                    if self.breaker.blocked_until().is_some() {
                        break;
                    }
                    tokio::time::sleep(self.reconnect_policy.delay_for_attempt(attempt)).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            MarketDataError::ConnectRetriesExhausted("no attempts made".into())
        }))
    }

    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                event = self.source.next_event() => match event {
                    Some(event) => self.apply(event),
                    None => {
                        self.connected.store(false, Ordering::SeqCst);
                        warn!("market data stream disconnected, reconnecting");
                        if self.connect_with_backoff().await.is_err() {
                            warn!("market data stream failed to reconnect, stopping");
                            return;
                        }
                        let current: Vec<Symbol> = self.subscriptions.lock().symbols();
                        if self.source.resubscribe(&current).await.is_ok() {
                            self.connected.store(true, Ordering::SeqCst);
                            info!("market data stream reconnected");
                        }
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Subscribe { symbols, priority, reply }) => {
                        let outcome = self.subscriptions.lock().subscribe_bulk(&symbols, priority);
                        if outcome.rejected_count() > 0 {
                            self.subscription_limit_hit_total.fetch_add(outcome.rejected_count(), Ordering::Relaxed);
                        }
                        let _ = reply.send(outcome);
                    }
                    Some(Command::Unsubscribe(symbol)) => {
                        self.subscriptions.lock().unsubscribe(&symbol);
                    }
                    Some(Command::Stop) | None => {
                        info!("market data stream stopping");
                        return;
                    }
                }
            }
        }
    }

    fn apply(&self, event: StreamEvent) {
        match event {
            StreamEvent::Quote(quote) => self.store.apply_quote(quote),
            StreamEvent::Trade(trade) => self.store.apply_trade(trade),
            StreamEvent::Heartbeat => {}
        }
    }
}

async fn cleanup_task(store: Arc<MarketDataStore>, max_age: chrono::Duration, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let evicted = store.evict_stale(Utc::now(), max_age);
        if evicted > 0 {
            info!(evicted, "evicted stale quotes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SilentSource;

    #[async_trait::async_trait]
    impl MarketDataSource for SilentSource {
        async fn connect(&self, _feed: Feed) -> Result<(), MarketDataError> {
            Ok(())
        }

        async fn resubscribe(&self, _symbols: &[Symbol]) -> Result<(), MarketDataError> {
            Ok(())
        }

        async fn next_event(&self) -> Option<StreamEvent> {
            std::future::pending().await
        }
    }

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    #[tokio::test]
    async fn subscription_limit_hits_are_counted() {
        let stream = MarketDataStream::start(
            Arc::new(SilentSource),
            Feed::Iex,
            1,
            Duration::from_secs(300),
            Duration::from_secs(3600),
            ReconnectPolicy::default(),
        )
        .await
        .unwrap();

        stream.subscribe(vec![sym("AAPL")], 10.0).await.unwrap();
        let outcome = stream.subscribe(vec![sym("MSFT")], 1.0).await.unwrap();
        assert_eq!(outcome.rejected_count(), 1);

        assert_eq!(stream.stats().subscription_limit_hit_total, 1);
        stream.stop().await;
    }

    #[tokio::test]
    async fn stats_start_at_zero_with_one_successful_connect() {
        let stream = MarketDataStream::start(
            Arc::new(SilentSource),
            Feed::Iex,
            10,
            Duration::from_secs(300),
            Duration::from_secs(3600),
            ReconnectPolicy::default(),
        )
        .await
        .unwrap();

        let stats = stream.stats();
        assert_eq!(stats.subscription_limit_hit_total, 0);
        assert_eq!(stats.quotes_evicted_total, 0);
        assert_eq!(stats.reconnect_attempts_total, 1);
        stream.stop().await;
    }
}
