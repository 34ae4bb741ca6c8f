//! Market-group discovery against the Gamma events catalog.
//!
//! Periodically fetches candidate events and distills them into
//! [`MarketGroup`]s: the token sets whose outcomes are mutually exclusive.
//! Subscribers get the full replacement list via
//! [`Event::MarketGroupsUpdated`], and only when the list actually changed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::bus::{Event, EventBus};
use crate::domain::{canonical_group_list, MarketGroup, MarketId, TokenId};
use crate::error::Result;

/// Catalog connection settings.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub base_url: Url,
    pub tags: Vec<String>,
    pub limit: u32,
    pub refresh_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://gamma-api.polymarket.com")
                .expect("default catalog URL is valid"),
            tags: Vec::new(),
            limit: 100,
            refresh_interval: Duration::from_secs(30),
        }
    }
}

/// One event row from the catalog.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GammaEvent {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub neg_risk: bool,
    pub markets: Vec<GammaMarket>,
}

/// One sub-market row within a catalog event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GammaMarket {
    pub condition_id: String,
    pub question: String,
    /// JSON-encoded array of exactly two token ids.
    pub clob_token_ids: String,
    pub active: bool,
    pub closed: bool,
}

impl GammaMarket {
    /// Parse the serialized token-id pair. Malformed payloads decode to an
    /// empty list, so the sub-market contributes nothing.
    fn token_ids(&self) -> Vec<TokenId> {
        serde_json::from_str::<Vec<String>>(&self.clob_token_ids)
            .unwrap_or_default()
            .into_iter()
            .map(TokenId::from)
            .collect()
    }
}

/// Distill catalog events into market groups.
///
/// A negative-risk event with at least two sub-markets yields the "yes"
/// token of each sub-market; an event with exactly one two-token sub-market
/// yields a binary group; everything else is skipped. Groups always have at
/// least two tokens.
pub fn extract_groups(events: &[GammaEvent]) -> Vec<MarketGroup> {
    let mut groups = Vec::new();
    for event in events {
        if event.neg_risk && event.markets.len() >= 2 {
            let tokens: Vec<TokenId> = event
                .markets
                .iter()
                .filter_map(|market| market.token_ids().into_iter().next())
                .collect();
            if tokens.len() >= 2 {
                let condition_id = MarketId::from(event.markets[0].condition_id.clone());
                groups.push(MarketGroup::new(condition_id, tokens));
            }
        } else if event.markets.len() == 1 {
            let market = &event.markets[0];
            let tokens = market.token_ids();
            if tokens.len() == 2 {
                groups.push(MarketGroup::new(
                    MarketId::from(market.condition_id.clone()),
                    tokens,
                ));
            }
        }
    }
    groups
}

/// Periodic catalog poller that owns the current group list.
pub struct DiscoveryService {
    http: reqwest::Client,
    config: DiscoveryConfig,
    bus: EventBus,
    groups: RwLock<Vec<MarketGroup>>,
    last_serialization: Mutex<String>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DiscoveryService {
    #[must_use]
    pub fn new(config: DiscoveryConfig, bus: EventBus) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            bus,
            groups: RwLock::new(Vec::new()),
            last_serialization: Mutex::new(String::new()),
            shutdown: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Snapshot of the current group list.
    #[must_use]
    pub fn market_groups(&self) -> Vec<MarketGroup> {
        self.groups.read().clone()
    }

    /// Fetch the catalog once and apply the result. Returns whether the
    /// group list changed.
    pub async fn fetch_and_update(&self) -> Result<bool> {
        let events = self.fetch_events().await?;
        Ok(self.apply_events(&events))
    }

    /// Apply a batch of catalog events: store and broadcast the distilled
    /// group list when its canonical serialization changed. Exposed for
    /// tests driving the service without a catalog.
    pub fn apply_events(&self, events: &[GammaEvent]) -> bool {
        let groups = extract_groups(events);
        let serialization = canonical_group_list(&groups);

        let changed = {
            let mut last = self.last_serialization.lock();
            if *last == serialization {
                false
            } else {
                *last = serialization;
                *self.groups.write() = groups.clone();
                true
            }
        };

        if changed {
            info!(groups = groups.len(), "Market groups updated");
            self.bus.emit(Event::MarketGroupsUpdated { groups });
        }
        self.bus.emit(Event::MarketUpdate {
            events_seen: events.len(),
            groups: self.groups.read().len(),
        });
        changed
    }

    async fn fetch_events(&self) -> Result<Vec<GammaEvent>> {
        let url = self.config.base_url.join("events")?;
        let mut query: Vec<(&str, String)> = vec![
            ("closed", "false".to_string()),
            ("active", "true".to_string()),
            ("limit", self.config.limit.to_string()),
        ];
        for tag in &self.config.tags {
            query.push(("tag", tag.clone()));
        }

        let events: Vec<GammaEvent> = self
            .http
            .get(url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(events)
    }

    /// Start the refresh loop: one immediate fetch, then one per interval.
    pub fn start(self: &Arc<Self>) {
        let mut shutdown = self.shutdown.lock();
        if shutdown.is_some() {
            return;
        }
        let (tx, mut rx) = watch::channel(false);
        *shutdown = Some(tx);

        let service = Arc::clone(self);
        let handle = tokio::spawn(async move {
            service.refresh().await;
            let mut ticker = tokio::time::interval(service.config.refresh_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => service.refresh().await,
                    _ = rx.changed() => break,
                }
            }
            debug!("Discovery poller exited");
        });
        *self.task.lock() = Some(handle);
        info!(
            interval_s = self.config.refresh_interval.as_secs(),
            tags = ?self.config.tags,
            "Discovery service started"
        );
    }

    /// Stop the refresh loop, letting an in-flight fetch drain.
    pub async fn stop(&self) {
        let sender = self.shutdown.lock().take();
        if let Some(tx) = sender {
            let _ = tx.send(true);
        }
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("Discovery service stopped");
    }

    /// One guarded refresh: failures are logged and leave state untouched.
    async fn refresh(&self) {
        if let Err(e) = self.fetch_and_update().await {
            warn!(error = %e, "Catalog fetch failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(condition: &str, tokens: &str) -> GammaMarket {
        GammaMarket {
            condition_id: condition.to_string(),
            question: String::new(),
            clob_token_ids: tokens.to_string(),
            active: true,
            closed: false,
        }
    }

    fn binary_event(condition: &str, yes: &str, no: &str) -> GammaEvent {
        GammaEvent {
            id: format!("ev-{condition}"),
            markets: vec![market(condition, &format!(r#"["{yes}","{no}"]"#))],
            ..GammaEvent::default()
        }
    }

    #[test]
    fn binary_event_yields_both_tokens() {
        let groups = extract_groups(&[binary_event("c1", "yes", "no")]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].token_ids.len(), 2);
        assert_eq!(groups[0].condition_id.as_str(), "c1");
    }

    #[test]
    fn neg_risk_event_takes_first_token_of_each_market() {
        let event = GammaEvent {
            id: "ev".to_string(),
            neg_risk: true,
            markets: vec![
                market("c1", r#"["a-yes","a-no"]"#),
                market("c2", r#"["b-yes","b-no"]"#),
                market("c3", r#"["c-yes","c-no"]"#),
            ],
            ..GammaEvent::default()
        };
        let groups = extract_groups(&[event]);
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].token_ids,
            vec![
                TokenId::from("a-yes"),
                TokenId::from("b-yes"),
                TokenId::from("c-yes"),
            ]
        );
    }

    #[test]
    fn neg_risk_with_single_market_falls_through_to_binary() {
        let event = GammaEvent {
            id: "ev".to_string(),
            neg_risk: true,
            markets: vec![market("c1", r#"["yes","no"]"#)],
            ..GammaEvent::default()
        };
        let groups = extract_groups(&[event]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].token_ids.len(), 2);
    }

    #[test]
    fn malformed_token_ids_contribute_nothing() {
        let event = GammaEvent {
            id: "ev".to_string(),
            neg_risk: true,
            markets: vec![
                market("c1", "not json"),
                market("c2", r#"["b-yes","b-no"]"#),
            ],
            ..GammaEvent::default()
        };
        // Only one surviving token: below the minimum group size.
        assert!(extract_groups(&[event]).is_empty());

        let binary = GammaEvent {
            id: "ev2".to_string(),
            markets: vec![market("c3", "{broken")],
            ..GammaEvent::default()
        };
        assert!(extract_groups(&[binary]).is_empty());
    }

    #[test]
    fn repeated_apply_emits_update_once() {
        let bus = EventBus::new();
        let updates = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&updates);
        bus.on(
            crate::bus::EventKind::MarketGroupsUpdated,
            Arc::new(move |_| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }),
        );

        let service = DiscoveryService::new(DiscoveryConfig::default(), bus);
        let events = vec![binary_event("c1", "yes", "no")];
        assert!(service.apply_events(&events));
        assert!(!service.apply_events(&events));
        assert_eq!(updates.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(service.market_groups().len(), 1);
    }

    #[test]
    fn empty_catalog_on_first_apply_emits_nothing() {
        let bus = EventBus::new();
        let updates = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&updates);
        bus.on(
            crate::bus::EventKind::MarketGroupsUpdated,
            Arc::new(move |_| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }),
        );

        let service = DiscoveryService::new(DiscoveryConfig::default(), bus);
        assert!(!service.apply_events(&[]));
        assert_eq!(updates.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
