//! In-memory test doubles for the store and message channel capabilities.

use std::{
    cmp::Ordering,
    sync::{
        atomic::{AtomicBool, Ordering as AtomicOrdering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    control::models::ActuatorState,
    db::{
        history::{HistoryQuery, SearchField, SortField, SortOrder},
        models::{ControlEvent, SensorReading},
        Store, StoreError,
    },
    mqtt::{BrokerError, MessageChannel, MessageHandler},
    sensors::models::SensorPayload,
};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Append-only vectors standing in for the two tables.
///
/// `reading_history` records the resolved query it was given and applies it
/// the way the SQL does: case-insensitive substring match on each column's
/// text, then the requested order with `id` as tie-break and NULLs sorting
/// high.
#[derive(Default)]
pub struct MemoryStore {
    readings: Mutex<Vec<SensorReading>>,
    events: Mutex<Vec<ControlEvent>>,
    last_query: Mutex<Option<HistoryQuery>>,
}

impl MemoryStore {
    pub async fn readings(&self) -> Vec<SensorReading> {
        self.readings.lock().await.clone()
    }

    pub async fn events(&self) -> Vec<ControlEvent> {
        self.events.lock().await.clone()
    }

    pub async fn last_query(&self) -> Option<HistoryQuery> {
        self.last_query.lock().await.clone()
    }

    /// Waits up to two seconds for at least `n` readings to be written.
    pub async fn wait_for_readings(&self, n: usize) -> Vec<SensorReading> {
        for _ in 0..200 {
            let rows = self.readings().await;
            if rows.len() >= n {
                return rows;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {n} readings, found {}", self.readings().await.len());
    }
}

fn cell_text(row: &SensorReading, field: SortField) -> Option<String> {
    match field {
        SortField::Id => Some(row.id.to_string()),
        SortField::Temperature => row.temperature.map(|v| v.to_string()),
        SortField::Humidity => row.humidity.map(|v| v.to_string()),
        SortField::Light => row.light.map(|v| v.to_string()),
        SortField::Timestamp => Some(row.recorded_at.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
    }
}

fn matches_search(row: &SensorReading, query: &HistoryQuery) -> bool {
    if !query.has_search() {
        return true;
    }
    let needle = query.search.to_lowercase();
    let columns = match query.search_field {
        SearchField::All => SortField::ALL.to_vec(),
        SearchField::Column(c) => vec![c],
    };
    columns.into_iter().any(|c| {
        cell_text(row, c).is_some_and(|text| text.to_lowercase().contains(&needle))
    })
}

fn nulls_last<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}

fn compare(a: &SensorReading, b: &SensorReading, field: SortField) -> Ordering {
    let primary = match field {
        SortField::Id => Ordering::Equal,
        SortField::Temperature => nulls_last(a.temperature, b.temperature),
        SortField::Humidity => nulls_last(a.humidity, b.humidity),
        SortField::Light => nulls_last(a.light, b.light),
        SortField::Timestamp => a.recorded_at.cmp(&b.recorded_at),
    };
    primary.then(a.id.cmp(&b.id))
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_reading(&self, reading: &SensorPayload) -> Result<SensorReading, StoreError> {
        let mut rows = self.readings.lock().await;
        let row = SensorReading {
            id: rows.len() as i64 + 1,
            temperature: reading.temperature,
            humidity: reading.humidity,
            light: reading.light,
            recorded_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn latest_reading(&self) -> Result<Option<SensorReading>, StoreError> {
        Ok(self.readings.lock().await.last().cloned())
    }

    async fn reading_history(&self, query: &HistoryQuery) -> Result<Vec<SensorReading>, StoreError> {
        *self.last_query.lock().await = Some(query.clone());
        let mut rows: Vec<SensorReading> = self
            .readings
            .lock()
            .await
            .iter()
            .filter(|row| matches_search(row, query))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let ord = compare(a, b, query.sort_field);
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        Ok(rows)
    }

    async fn insert_control_event(
        &self,
        state: &ActuatorState,
        source: &str,
    ) -> Result<ControlEvent, StoreError> {
        let mut rows = self.events.lock().await;
        let row = ControlEvent {
            id: rows.len() as i64 + 1,
            led1: state.led1.is_on(),
            led2: state.led2.is_on(),
            led3: state.led3.is_on(),
            source: source.to_owned(),
            recorded_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn control_history(&self, limit: i64) -> Result<Vec<ControlEvent>, StoreError> {
        let take = usize::try_from(limit).unwrap_or(0);
        Ok(self.events.lock().await.iter().rev().take(take).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// FailingStore
// ---------------------------------------------------------------------------

/// Every call fails as if Postgres were unreachable.
pub struct FailingStore;

fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl Store for FailingStore {
    async fn insert_reading(&self, _: &SensorPayload) -> Result<SensorReading, StoreError> {
        Err(unavailable())
    }

    async fn latest_reading(&self) -> Result<Option<SensorReading>, StoreError> {
        Err(unavailable())
    }

    async fn reading_history(&self, _: &HistoryQuery) -> Result<Vec<SensorReading>, StoreError> {
        Err(unavailable())
    }

    async fn insert_control_event(
        &self,
        _: &ActuatorState,
        _: &str,
    ) -> Result<ControlEvent, StoreError> {
        Err(unavailable())
    }

    async fn control_history(&self, _: i64) -> Result<Vec<ControlEvent>, StoreError> {
        Err(unavailable())
    }
}

// ---------------------------------------------------------------------------
// SlowStore
// ---------------------------------------------------------------------------

/// A `MemoryStore` that sleeps before every call, like a database that is
/// reachable but not answering.
pub struct SlowStore {
    delay: Duration,
    inner: MemoryStore,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: MemoryStore::default(),
        }
    }
}

#[async_trait]
impl Store for SlowStore {
    async fn insert_reading(&self, reading: &SensorPayload) -> Result<SensorReading, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert_reading(reading).await
    }

    async fn latest_reading(&self) -> Result<Option<SensorReading>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.latest_reading().await
    }

    async fn reading_history(&self, query: &HistoryQuery) -> Result<Vec<SensorReading>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.reading_history(query).await
    }

    async fn insert_control_event(
        &self,
        state: &ActuatorState,
        source: &str,
    ) -> Result<ControlEvent, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert_control_event(state, source).await
    }

    async fn control_history(&self, limit: i64) -> Result<Vec<ControlEvent>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.control_history(limit).await
    }
}

// ---------------------------------------------------------------------------
// RecordingChannel
// ---------------------------------------------------------------------------

/// Captures publishes instead of sending them. A `closed()` channel rejects
/// every request the way a dead MQTT client would.
#[derive(Default)]
pub struct RecordingChannel {
    closed: bool,
    /// Delay applied once, after recording the first publish.
    stall_first: Option<Duration>,
    stalled: AtomicBool,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    subscriptions: Mutex<Vec<(String, Arc<dyn MessageHandler>)>>,
}

impl RecordingChannel {
    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Default::default()
        }
    }

    /// The first publish is recorded and then held for `delay` before it
    /// returns, so a later publish can overtake it.
    pub fn stalling_first(delay: Duration) -> Self {
        Self {
            stall_first: Some(delay),
            ..Default::default()
        }
    }

    pub async fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().await.clone()
    }

    /// Delivers `payload` to every handler subscribed to exactly `topic`.
    pub async fn deliver(&self, topic: &str, payload: &[u8]) {
        let handlers: Vec<_> = self
            .subscriptions
            .lock()
            .await
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in handlers {
            handler.handle(topic, payload).await;
        }
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BrokerError> {
        if self.closed {
            return Err(BrokerError::Closed);
        }
        self.subscriptions.lock().await.push((topic.to_owned(), handler));
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        if self.closed {
            return Err(BrokerError::Closed);
        }
        self.published.lock().await.push((topic.to_owned(), payload));
        if let Some(delay) = self.stall_first {
            if !self.stalled.swap(true, AtomicOrdering::SeqCst) {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }
}
