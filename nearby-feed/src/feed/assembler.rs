//! Feed assembly entry point
//!
//! Stage order:
//! `ResolvingCoordinates -> FetchingLocal -> FilteringInteractions ->
//! [PopulatingIfSparse] -> FilteringVibe -> [ExpandingIfSparse] -> Scoring -> Done`.
//! Only internal faults (a signature that cannot be formed, a population task
//! that panicked) end in `Failed`; everything else degrades to a smaller feed
//! with a notice.

use crate::db::{InteractionStore, ProfileStore, RegionalStore};
use crate::error::FeedError;
use crate::feed::coordinates::{CoordinateResolver, ResolvedLocation};
use crate::feed::expansion::CityExpansion;
use crate::feed::interaction::InteractionFilter;
use crate::feed::population::{
    PopulationCoordinator, PopulationOutcome, PopulationReport, PopulationSources,
};
use crate::feed::quality::QualityFilter;
use crate::feed::regional::RegionalQuery;
use crate::feed::scoring::PreferenceScorer;
use crate::feed::signature::RegionSignature;
use crate::feed::vibe::VibeFilter;
use crate::models::{FeedItem, UserPreferences, VibeCategory};
use crate::services::{EventsProvider, ImageWarmer, PlacesProvider, ReverseGeocoder};
use chrono::{DateTime, Utc};
use nearby_common::config::{FeedSettings, FilterRules};
use nearby_common::geo::CityTable;
use nearby_common::time::{secs_to_duration, Clock};
use nearby_common::Coordinates;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStage {
    ResolvingCoordinates,
    FetchingLocal,
    FilteringInteractions,
    PopulatingIfSparse,
    FilteringVibe,
    ExpandingIfSparse,
    Scoring,
    Done,
    Failed,
}

impl fmt::Display for FeedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedStage::ResolvingCoordinates => "resolving_coordinates",
            FeedStage::FetchingLocal => "fetching_local",
            FeedStage::FilteringInteractions => "filtering_interactions",
            FeedStage::PopulatingIfSparse => "populating_if_sparse",
            FeedStage::FilteringVibe => "filtering_vibe",
            FeedStage::ExpandingIfSparse => "expanding_if_sparse",
            FeedStage::Scoring => "scoring",
            FeedStage::Done => "done",
            FeedStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One feed request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedRequest {
    pub coordinates: Option<Coordinates>,
    /// Falls back to the configured default radius when absent or not positive
    pub radius_m: Option<f64>,
    pub user_id: Option<String>,
    pub vibe: Option<VibeCategory>,
}

/// What the population step did for this request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PopulationStatus {
    NotNeeded,
    Launched {
        places_inserted: usize,
        events_found: usize,
    },
    Joined {
        places_inserted: usize,
        events_found: usize,
    },
    Throttled {
        last_populated_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedResponse {
    pub items: Vec<FeedItem>,
    pub location: ResolvedLocation,
    pub population: PopulationStatus,
    /// Soft, user-facing notes about fallbacks and partial failures
    pub notices: Vec<String>,
    /// Whether the wider-radius fallback contributed
    pub expanded: bool,
}

/// Collaborators the assembler is built from
#[derive(Clone)]
pub struct FeedDependencies {
    pub store: Arc<dyn RegionalStore>,
    pub interactions: Arc<dyn InteractionStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub places: Arc<dyn PlacesProvider>,
    pub events: Arc<dyn EventsProvider>,
    pub image_warmer: Arc<dyn ImageWarmer>,
    pub clock: Arc<dyn Clock>,
    pub cities: &'static CityTable,
}

pub struct FeedAssembler {
    resolver: CoordinateResolver,
    regional: RegionalQuery,
    interactions: InteractionFilter,
    vibe: VibeFilter,
    expansion: CityExpansion,
    scorer: PreferenceScorer,
    coordinator: PopulationCoordinator,
    sources: Arc<PopulationSources>,
    profiles: Arc<dyn ProfileStore>,
    settings: FeedSettings,
}

impl FeedAssembler {
    pub fn new(
        deps: FeedDependencies,
        settings: FeedSettings,
        rules: &FilterRules,
    ) -> Result<Self, FeedError> {
        let quality = Arc::new(QualityFilter::from_rules(rules)?);

        let sources = Arc::new(PopulationSources {
            places: Arc::clone(&deps.places),
            events: deps.events,
            geocoder: Arc::new(ReverseGeocoder::new(Arc::clone(&deps.places), deps.cities)),
            store: Arc::clone(&deps.store),
            quality: Arc::clone(&quality),
            image_warmer: deps.image_warmer,
        });

        Ok(Self {
            resolver: CoordinateResolver::new(Arc::clone(&deps.profiles), deps.places, deps.cities),
            regional: RegionalQuery::new(deps.store, quality, deps.cities, settings.clone()),
            interactions: InteractionFilter::new(deps.interactions),
            vibe: VibeFilter::from_rules(&rules.vibe),
            expansion: CityExpansion::from_settings(&settings),
            scorer: PreferenceScorer::new(),
            coordinator: PopulationCoordinator::new(
                deps.clock,
                secs_to_duration(settings.population_ttl_secs),
            ),
            sources,
            profiles: deps.profiles,
            settings,
        })
    }

    /// Build the ranked feed for `request`
    pub async fn assemble(&self, request: FeedRequest) -> Result<FeedResponse, FeedError> {
        match self.run_stages(&request).await {
            Ok(response) => {
                enter(FeedStage::Done, response.items.len());
                Ok(response)
            }
            Err(e) => {
                enter(FeedStage::Failed, 0);
                tracing::error!(error = %e, user_id = ?request.user_id, "Feed assembly failed");
                Err(e)
            }
        }
    }

    async fn run_stages(&self, request: &FeedRequest) -> Result<FeedResponse, FeedError> {
        let user_id = request.user_id.as_deref();
        let vibe = request.vibe;
        let radius_m = request
            .radius_m
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(self.settings.default_radius_m);
        let mut notices = Vec::new();

        enter(FeedStage::ResolvingCoordinates, 0);
        let resolution = self.resolver.resolve(request.coordinates, user_id).await;
        notices.extend(resolution.notice);
        let center = resolution.location.coordinates;

        enter(FeedStage::FetchingLocal, 0);
        let fetched = self.regional.fetch(center, radius_m).await;

        enter(FeedStage::FilteringInteractions, fetched.len());
        let mut items = self.interactions.apply(fetched, user_id).await;

        let mut population = PopulationStatus::NotNeeded;
        if items.len() < self.settings.population_threshold {
            enter(FeedStage::PopulatingIfSparse, items.len());
            let signature = RegionSignature::new(center, radius_m, user_id, vibe)?;
            let sources = Arc::clone(&self.sources);
            let outcome = self
                .coordinator
                .run(signature, move || async move {
                    sources.populate(center, radius_m, vibe).await
                })
                .await?;

            population = match outcome {
                PopulationOutcome::Launched(report) => {
                    notices.extend(report_notices(&report));
                    PopulationStatus::Launched {
                        places_inserted: report.places_inserted,
                        events_found: report.events_found,
                    }
                }
                PopulationOutcome::Joined(report) => {
                    notices.extend(report_notices(&report));
                    PopulationStatus::Joined {
                        places_inserted: report.places_inserted,
                        events_found: report.events_found,
                    }
                }
                PopulationOutcome::Throttled { last_populated_at } => {
                    PopulationStatus::Throttled { last_populated_at }
                }
            };

            if !matches!(population, PopulationStatus::Throttled { .. }) {
                let refreshed = self.regional.fetch(center, radius_m).await;
                enter(FeedStage::FilteringInteractions, refreshed.len());
                items = self.interactions.apply(refreshed, user_id).await;
            }
        }

        enter(FeedStage::FilteringVibe, items.len());
        let mut filtered = self.vibe.apply(items.clone(), vibe);

        let mut expanded = false;
        if self.expansion.should_expand(filtered.items.len()) {
            enter(FeedStage::ExpandingIfSparse, filtered.items.len());
            let wider = self.regional.fetch(center, self.expansion.radius_m()).await;
            let wider = self.interactions.apply(wider, user_id).await;
            let (pool, _) = self.expansion.merge(items, wider, &mut rand::thread_rng());

            // The relaxation decision covers local and wider rows together
            let shown: HashSet<String> = filtered.items.iter().map(|i| i.id.clone()).collect();
            filtered = self.vibe.apply(pool, vibe);
            let added = filtered.items.iter().filter(|i| !shown.contains(&i.id)).count();
            tracing::debug!(added, radius_m = self.expansion.radius_m(), "Merged wider-radius items");
            expanded = added > 0;
        }

        if filtered.relaxed {
            if let Some(vibe) = vibe {
                notices.push(format!("No {} spots nearby, showing everything", vibe));
            }
        }
        let items = filtered.items;

        enter(FeedStage::Scoring, items.len());
        let preferences = self.load_preferences(user_id).await;
        let items = self.scorer.rank(items, preferences.as_ref());

        Ok(FeedResponse {
            items,
            location: resolution.location,
            population,
            notices,
            expanded,
        })
    }

    async fn load_preferences(&self, user_id: Option<&str>) -> Option<UserPreferences> {
        let user_id = user_id?;
        match self.profiles.preferences(user_id).await {
            Ok(preferences) => preferences,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Preference read failed, ranking without preferences");
                None
            }
        }
    }
}

fn enter(stage: FeedStage, items: usize) {
    tracing::debug!(stage = %stage, items, "Feed stage");
}

fn report_notices(report: &PopulationReport) -> Vec<String> {
    let mut notices = Vec::new();
    if report.events_found > 0 {
        notices.push(format!("Found {} upcoming events nearby", report.events_found));
    }
    if report.places_error.is_some() {
        notices.push("Some nearby places could not be loaded right now".to_string());
    }
    if report.events_error.is_some() {
        notices.push("Nearby events could not be loaded right now".to_string());
    }
    notices
}
