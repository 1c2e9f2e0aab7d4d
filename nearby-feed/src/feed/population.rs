//! Lazy population of the regional store from external providers
//!
//! `PopulationCoordinator` guarantees that for one region signature at most
//! one population runs at a time and that a signature is populated at most
//! once per TTL window. Concurrent callers for the same signature await the
//! same shared future. The work itself runs as a detached tokio task which
//! records the attempt when it settles, so a caller that goes away mid-flight
//! cannot leave the signature stuck in flight.
//!
//! `PopulationSources` is the default job: places search and events discovery
//! run side by side and neither one's failure affects the other.

use crate::db::RegionalStore;
use crate::error::FeedError;
use crate::feed::quality::QualityFilter;
use crate::feed::signature::RegionSignature;
use crate::models::{CityState, NewVenue, VibeCategory};
use crate::services::{EventsProvider, ImageWarmer, PlacesProvider, ReverseGeocoder};
use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use nearby_common::time::Clock;
use nearby_common::Coordinates;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;

/// What one population attempt achieved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationReport {
    /// Venues created by places search (refreshed ones are not counted)
    pub places_inserted: usize,
    /// Events written by the events provider
    pub events_found: usize,
    pub places_error: Option<String>,
    pub events_error: Option<String>,
    /// City the events search ran against
    pub city: Option<CityState>,
}

/// How a call to [`PopulationCoordinator::run`] was served
#[derive(Debug, Clone, PartialEq)]
pub enum PopulationOutcome {
    /// This caller started the population
    Launched(PopulationReport),
    /// This caller awaited a population already in flight
    Joined(PopulationReport),
    /// Populated too recently; nothing was run
    Throttled { last_populated_at: DateTime<Utc> },
}

type SharedPopulation = Shared<BoxFuture<'static, Result<PopulationReport, String>>>;

#[derive(Default)]
struct PopulationState {
    last_populated_at: Option<DateTime<Utc>>,
    in_flight: Option<SharedPopulation>,
}

/// Single-flight, TTL-gated population orchestrator
pub struct PopulationCoordinator {
    states: Arc<Mutex<HashMap<RegionSignature, PopulationState>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl PopulationCoordinator {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            clock,
            ttl,
        }
    }

    /// Run `job` for `signature` unless it is in flight or inside its TTL window
    ///
    /// `job` is only invoked when this call launches a new population.
    pub async fn run<F, Fut>(
        &self,
        signature: RegionSignature,
        job: F,
    ) -> Result<PopulationOutcome, FeedError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PopulationReport> + Send + 'static,
    {
        let (population, launched) = {
            let mut states = self.states.lock().await;
            let state = states.entry(signature.clone()).or_default();

            if let Some(existing) = state.in_flight.clone() {
                tracing::info!(signature = %signature, "Joining in-flight population");
                (existing, false)
            } else {
                if let Some(last) = state.last_populated_at {
                    if self.clock.now() - last < self.ttl {
                        tracing::info!(
                            signature = %signature,
                            last_populated_at = %last,
                            "Population throttled"
                        );
                        return Ok(PopulationOutcome::Throttled {
                            last_populated_at: last,
                        });
                    }
                }

                tracing::info!(signature = %signature, "Launching population");
                let population = self.spawn(signature.clone(), job());
                state.in_flight = Some(population.clone());
                (population, true)
            }
        };

        let report = population.await.map_err(FeedError::PopulationTask)?;
        Ok(if launched {
            PopulationOutcome::Launched(report)
        } else {
            PopulationOutcome::Joined(report)
        })
    }

    /// Detach `work` and return a shareable handle to its result
    fn spawn<Fut>(&self, signature: RegionSignature, work: Fut) -> SharedPopulation
    where
        Fut: Future<Output = PopulationReport> + Send + 'static,
    {
        let states = Arc::clone(&self.states);
        let clock = Arc::clone(&self.clock);

        let handle = tokio::spawn(async move {
            let result = AssertUnwindSafe(work)
                .catch_unwind()
                .await
                .map_err(panic_message);

            // Failed attempts count towards the TTL too
            let mut states = states.lock().await;
            let state = states.entry(signature.clone()).or_default();
            state.last_populated_at = Some(clock.now());
            state.in_flight = None;

            match &result {
                Ok(report) => tracing::info!(
                    signature = %signature,
                    places_inserted = report.places_inserted,
                    events_found = report.events_found,
                    "Population settled"
                ),
                Err(e) => tracing::error!(signature = %signature, error = %e, "Population task panicked"),
            }
            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(format!("population task did not complete: {}", e)),
            }
        }
        .boxed()
        .shared()
    }

    /// When `signature` was last populated, if ever
    pub async fn last_populated_at(&self, signature: &RegionSignature) -> Option<DateTime<Utc>> {
        self.states
            .lock()
            .await
            .get(signature)
            .and_then(|s| s.last_populated_at)
    }

    pub async fn is_in_flight(&self, signature: &RegionSignature) -> bool {
        self.states
            .lock()
            .await
            .get(signature)
            .is_some_and(|s| s.in_flight.is_some())
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "population task panicked".to_string()
    }
}

/// External sources a population pass draws from
pub struct PopulationSources {
    pub places: Arc<dyn PlacesProvider>,
    pub events: Arc<dyn EventsProvider>,
    pub geocoder: Arc<ReverseGeocoder>,
    pub store: Arc<dyn RegionalStore>,
    pub quality: Arc<QualityFilter>,
    pub image_warmer: Arc<dyn ImageWarmer>,
}

impl PopulationSources {
    /// Places search and events discovery, settled together
    pub async fn populate(
        &self,
        center: Coordinates,
        radius_m: f64,
        vibe: Option<VibeCategory>,
    ) -> PopulationReport {
        let (places, events) = tokio::join!(
            self.populate_places(center, radius_m, vibe),
            self.populate_events(center)
        );

        let (places_inserted, places_error) = match places {
            Ok(count) => (count, None),
            Err(e) => {
                tracing::warn!(error = %e, "Places population failed");
                (0, Some(e))
            }
        };
        let (city, events_result) = events;
        let (events_found, events_error) = match events_result {
            Ok(count) => (count, None),
            Err(e) => {
                tracing::warn!(error = %e, city = %city, "Events population failed");
                (0, Some(e))
            }
        };

        PopulationReport {
            places_inserted,
            events_found,
            places_error,
            events_error,
            city: Some(city),
        }
    }

    async fn populate_places(
        &self,
        center: Coordinates,
        radius_m: f64,
        vibe: Option<VibeCategory>,
    ) -> Result<usize, String> {
        let found = self
            .places
            .search(center, radius_m, vibe)
            .await
            .map_err(|e| e.to_string())?;

        let venues: Vec<NewVenue> = found
            .iter()
            .filter(|p| self.quality.passes_place(p))
            .map(NewVenue::from_place)
            .collect();
        tracing::debug!(found = found.len(), kept = venues.len(), "Places search results");

        if venues.is_empty() {
            return Ok(0);
        }

        let created = self
            .store
            .upsert_places(&venues)
            .await
            .map_err(|e| e.to_string())?;

        let inserted = created.len();
        if !created.is_empty() {
            let warmer = Arc::clone(&self.image_warmer);
            tokio::spawn(async move {
                warmer.warm(created).await;
            });
        }
        Ok(inserted)
    }

    async fn populate_events(&self, center: Coordinates) -> (CityState, Result<usize, String>) {
        let (city, source) = self.geocoder.resolve_city(center).await;
        tracing::debug!(city = %city, source = ?source, "Resolved city for events discovery");
        let result = self
            .events
            .discover(center, &city)
            .await
            .map_err(|e| e.to_string());
        (city, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nearby_common::time::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn signature() -> RegionSignature {
        RegionSignature::new(Coordinates::new(-23.5505, -46.6333), 5000.0, None, None).unwrap()
    }

    fn coordinator(clock: Arc<ManualClock>) -> PopulationCoordinator {
        PopulationCoordinator::new(clock, Duration::minutes(15))
    }

    fn counting_job(
        counter: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> BoxFuture<'static, PopulationReport> {
        let counter = Arc::clone(counter);
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                PopulationReport {
                    places_inserted: 3,
                    ..PopulationReport::default()
                }
            }
            .boxed()
        }
    }

    async fn exploding_job() -> PopulationReport {
        panic!("provider exploded")
    }

    #[tokio::test]
    async fn test_ttl_window_throttles_repeat_calls() {
        let clock = Arc::new(ManualClock::default());
        let coordinator = coordinator(Arc::clone(&clock));
        let counter = Arc::new(AtomicUsize::new(0));

        let first = coordinator.run(signature(), counting_job(&counter)).await.unwrap();
        assert!(matches!(first, PopulationOutcome::Launched(ref r) if r.places_inserted == 3));

        clock.advance(Duration::minutes(14));
        let second = coordinator.run(signature(), counting_job(&counter)).await.unwrap();
        assert!(matches!(second, PopulationOutcome::Throttled { .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        clock.advance(Duration::minutes(2));
        let third = coordinator.run(signature(), counting_job(&counter)).await.unwrap();
        assert!(matches!(third, PopulationOutcome::Launched(_)));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_signatures_do_not_share_state() {
        let clock = Arc::new(ManualClock::default());
        let coordinator = coordinator(clock);
        let counter = Arc::new(AtomicUsize::new(0));
        let other =
            RegionSignature::new(Coordinates::new(-22.9068, -43.1729), 5000.0, None, None).unwrap();

        coordinator.run(signature(), counting_job(&counter)).await.unwrap();
        coordinator.run(other, counting_job(&counter)).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_job_fails_request_and_records_attempt() {
        let clock = Arc::new(ManualClock::default());
        let coordinator = coordinator(Arc::clone(&clock));

        let result = coordinator.run(signature(), exploding_job).await;
        match result {
            Err(FeedError::PopulationTask(msg)) => assert!(msg.contains("provider exploded")),
            other => panic!("expected population task error, got {:?}", other),
        }

        assert!(!coordinator.is_in_flight(&signature()).await);
        assert_eq!(coordinator.last_populated_at(&signature()).await, Some(clock.now()));
    }
}
