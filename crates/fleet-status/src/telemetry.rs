//! Telemetry store and ingest pipeline
//!
//! Samples are append-only. Ingest persists a sample, mirrors it to the
//! boat's realtime group and runs the alert policy over it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use marinelink_core::store::{column_uuid, column_uuid_opt};
use marinelink_core::time::{from_ms, now_ms, to_ms};
use marinelink_core::Database;
use marinelink_domain::{BoatId, DeviceId};
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::alerts::{Alert, AlertPolicy};
use crate::error::{FleetError, Result};
use crate::realtime::FanoutHub;

const MAX_KEY_LEN: usize = 128;
const MAX_VALUE_LEN: usize = 1024;
const MAX_PAGE_SIZE: i64 = 1000;

/// A stored sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub id: i64,
    pub boat_id: BoatId,
    pub device_id: Option<DeviceId>,
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

/// Inbound sample, from HTTP ingest or the broker telemetry topic.
///
/// `value` may arrive as a JSON string, number or bool; it is stored as text.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryInput {
    #[serde(default)]
    pub device_id: Option<DeviceId>,
    pub key: String,
    #[serde(deserialize_with = "scalar_as_string")]
    pub value: String,
    #[serde(default)]
    pub timestamp_utc: Option<DateTime<Utc>>,
}

fn scalar_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(serde::de::Error::custom("value must be a string, number or bool")),
    }
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryQuery {
    #[serde(default)]
    pub from_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub keys: Option<Vec<String>>,
    #[serde(default)]
    pub device_id: Option<DeviceId>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for TelemetryQuery {
    fn default() -> Self {
        Self {
            from_utc: None,
            to_utc: None,
            keys: None,
            device_id: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl TelemetryQuery {
    /// Page clamped to >= 1, page size to 1..=1000.
    pub fn normalized(&self) -> (i64, i64) {
        (self.page.max(1), self.page_size.clamp(1, MAX_PAGE_SIZE))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPage {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub items: Vec<TelemetrySample>,
}

#[derive(Debug, Clone)]
pub struct TelemetryStore {
    db: Database,
}

impl TelemetryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn append(
        &self,
        boat_id: BoatId,
        device_id: Option<DeviceId>,
        input: &TelemetryInput,
    ) -> Result<TelemetrySample> {
        let key = input.key.trim();
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(FleetError::InvalidTelemetry("key is empty or too long".into()));
        }
        if input.value.len() > MAX_VALUE_LEN {
            return Err(FleetError::InvalidTelemetry("value too long".into()));
        }

        let created_ms = input.timestamp_utc.as_ref().map_or_else(now_ms, to_ms);

        let conn = self.db.connect()?;
        conn.execute(
            "INSERT INTO telemetry (boat_id, device_id, key, value, created_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                boat_id.to_string(),
                device_id.map(|d| d.to_string()),
                key,
                input.value,
                created_ms,
            ],
        )?;

        Ok(TelemetrySample {
            id: conn.last_insert_rowid(),
            boat_id,
            device_id,
            key: key.to_string(),
            value: input.value.clone(),
            created_at: from_ms(created_ms),
        })
    }

    /// Samples of one boat, newest first.
    pub fn query(&self, boat_id: BoatId, query: &TelemetryQuery) -> Result<TelemetryPage> {
        let (page, page_size) = query.normalized();

        let mut filter = String::from("boat_id = ?");
        let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(boat_id.to_string())];

        if let Some(from) = &query.from_utc {
            filter.push_str(" AND created_ms >= ?");
            args.push(Box::new(to_ms(from)));
        }
        if let Some(to) = &query.to_utc {
            filter.push_str(" AND created_ms <= ?");
            args.push(Box::new(to_ms(to)));
        }
        if let Some(device_id) = &query.device_id {
            filter.push_str(" AND device_id = ?");
            args.push(Box::new(device_id.to_string()));
        }
        if let Some(keys) = query.keys.as_ref().filter(|k| !k.is_empty()) {
            let marks = vec!["?"; keys.len()].join(", ");
            filter.push_str(&format!(" AND key IN ({})", marks));
            for key in keys {
                args.push(Box::new(key.clone()));
            }
        }

        let conn = self.db.connect()?;

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM telemetry WHERE {}", filter),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT id, boat_id, device_id, key, value, created_ms FROM telemetry
             WHERE {} ORDER BY created_ms DESC, id DESC LIMIT {} OFFSET {}",
            filter,
            page_size,
            (page - 1).saturating_mul(page_size)
        ))?;
        let items = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(TelemetrySample {
                    id: row.get(0)?,
                    boat_id: column_uuid(row, 1)?,
                    device_id: column_uuid_opt(row, 2)?,
                    key: row.get(3)?,
                    value: row.get(4)?,
                    created_at: from_ms(row.get(5)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(TelemetryPage {
            page,
            page_size,
            total,
            items,
        })
    }
}

/// Result of one ingest.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub sample: TelemetrySample,
    pub alerts: Vec<Alert>,
}

/// Persist, fan out, evaluate alerts.
#[derive(Clone)]
pub struct TelemetryPipeline {
    store: TelemetryStore,
    hub: Arc<FanoutHub>,
    policy: Arc<dyn AlertPolicy>,
}

impl TelemetryPipeline {
    pub fn new(store: TelemetryStore, hub: Arc<FanoutHub>, policy: Arc<dyn AlertPolicy>) -> Self {
        Self { store, hub, policy }
    }

    pub fn ingest(
        &self,
        boat_id: BoatId,
        device_id: Option<DeviceId>,
        input: &TelemetryInput,
    ) -> Result<IngestOutcome> {
        let sample = self.store.append(boat_id, device_id, input)?;
        debug!(boat_id = %boat_id, key = %sample.key, "Telemetry stored");

        self.hub.broadcast_telemetry(boat_id, &sample);

        let alerts = self.policy.evaluate(&sample);
        for alert in &alerts {
            info!(
                boat_id = %boat_id,
                key = %alert.key,
                value = %alert.value,
                level = ?alert.level,
                "Alert raised"
            );
            self.hub.broadcast_alert(boat_id, alert);
        }

        Ok(IngestOutcome { sample, alerts })
    }

    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::ThresholdRules;
    use crate::realtime::RealtimeEvent;
    use marinelink_core::AlertConfig;
    use marinelink_domain::BoatRepository;
    use uuid::Uuid;

    fn setup() -> (TelemetryStore, Uuid) {
        let db = Database::open_temp("test_telemetry").unwrap();
        let boat = BoatRepository::new(db.clone())
            .create(Uuid::new_v4(), "Sea Breeze")
            .unwrap();
        (TelemetryStore::new(db), boat.id)
    }

    fn input(key: &str, value: &str) -> TelemetryInput {
        TelemetryInput {
            device_id: None,
            key: key.to_string(),
            value: value.to_string(),
            timestamp_utc: None,
        }
    }

    #[test]
    fn test_input_accepts_numeric_value() {
        let parsed: TelemetryInput =
            serde_json::from_str(r#"{"key":"battery.voltage","value":12.6}"#).unwrap();
        assert_eq!(parsed.value, "12.6");

        assert!(serde_json::from_str::<TelemetryInput>(r#"{"key":"k","value":{}}"#).is_err());
        assert!(serde_json::from_str::<TelemetryInput>(r#"{"value":"1"}"#).is_err());
    }

    #[test]
    fn test_append_rejects_empty_key() {
        let (store, boat) = setup();
        assert!(matches!(
            store.append(boat, None, &input("  ", "1")),
            Err(FleetError::InvalidTelemetry(_))
        ));
    }

    #[test]
    fn test_query_newest_first_with_paging() {
        let (store, boat) = setup();
        let base = Utc::now();
        for i in 0..5 {
            let mut sample = input("battery.voltage", &format!("12.{}", i));
            sample.timestamp_utc = Some(base + chrono::Duration::seconds(i));
            store.append(boat, None, &sample).unwrap();
        }

        let page = store
            .query(
                boat,
                &TelemetryQuery {
                    page_size: 2,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].value, "12.4");
        assert_eq!(page.items[1].value, "12.3");

        let last = store
            .query(
                boat,
                &TelemetryQuery {
                    page: 3,
                    page_size: 2,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].value, "12.0");
    }

    #[test]
    fn test_query_filters() {
        let (store, boat) = setup();
        let device = Uuid::new_v4();
        store.append(boat, Some(device), &input("battery.voltage", "12.1")).unwrap();
        store.append(boat, None, &input("engine.temp", "80")).unwrap();
        store.append(boat, None, &input("bilge.level", "0")).unwrap();

        let by_key = store
            .query(
                boat,
                &TelemetryQuery {
                    keys: Some(vec!["engine.temp".into(), "bilge.level".into()]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(by_key.total, 2);

        let by_device = store
            .query(
                boat,
                &TelemetryQuery {
                    device_id: Some(device),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(by_device.total, 1);
        assert_eq!(by_device.items[0].device_id, Some(device));

        let future = store
            .query(
                boat,
                &TelemetryQuery {
                    from_utc: Some(Utc::now() + chrono::Duration::hours(1)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(future.total, 0);

        let other_boat = store.query(Uuid::new_v4(), &TelemetryQuery::default()).unwrap();
        assert_eq!(other_boat.total, 0);
    }

    #[test]
    fn test_paging_is_clamped() {
        let query = TelemetryQuery {
            page: 0,
            page_size: 5000,
            ..Default::default()
        };
        assert_eq!(query.normalized(), (1, 1000));

        let query = TelemetryQuery {
            page: -3,
            page_size: 0,
            ..Default::default()
        };
        assert_eq!(query.normalized(), (1, 1));
    }

    #[tokio::test]
    async fn test_ingest_broadcasts_and_alerts() {
        let (store, boat) = setup();
        let hub = Arc::new(FanoutHub::new());
        let pipeline = TelemetryPipeline::new(
            store,
            hub.clone(),
            Arc::new(ThresholdRules::from_config(&AlertConfig::default())),
        );
        let mut rx = hub.subscribe(boat);

        let outcome = pipeline
            .ingest(boat, None, &input("battery.voltage", "11.5"))
            .unwrap();
        assert_eq!(outcome.alerts.len(), 1);

        assert!(matches!(rx.recv().await.unwrap(), RealtimeEvent::Telemetry(_)));
        assert!(matches!(rx.recv().await.unwrap(), RealtimeEvent::Alert(_)));

        let outcome = pipeline
            .ingest(boat, None, &input("battery.voltage", "12.6"))
            .unwrap();
        assert!(outcome.alerts.is_empty());
        assert!(matches!(rx.recv().await.unwrap(), RealtimeEvent::Telemetry(_)));
        assert!(rx.try_recv().is_err());
    }
}
