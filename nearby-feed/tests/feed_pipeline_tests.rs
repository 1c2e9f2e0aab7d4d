//! End-to-end feed assembly over an in-memory store

mod helpers;

use chrono::{Duration, Utc};
use helpers::{event, offset, raw_place, venue, Harness, SAO_PAULO};
use nearby_feed::db::InteractionKind;
use nearby_feed::feed::{FeedRequest, LocationSource, PopulationStatus};
use nearby_feed::models::{UserPreferences, VibeCategory};
use std::collections::HashSet;

fn request_at_sao_paulo() -> FeedRequest {
    FeedRequest {
        coordinates: Some(SAO_PAULO),
        radius_m: Some(5000.0),
        ..FeedRequest::default()
    }
}

fn six_venues() -> Vec<nearby_feed::models::NewVenue> {
    vec![
        venue("p1", "Bar Brahma", offset(SAO_PAULO, 0.5, 0.0), 4.4, "bar"),
        venue("p2", "Café Girondino", offset(SAO_PAULO, 0.0, 1.0), 4.6, "cafe"),
        venue("p3", "Pinacoteca", offset(SAO_PAULO, 1.5, 0.5), 4.8, "museum"),
        venue("p4", "Terraço Itália", offset(SAO_PAULO, -1.0, -1.0), 4.5, "restaurant"),
        venue("p5", "Bar da Dona Onça", offset(SAO_PAULO, 2.0, -1.5), 4.3, "bar"),
        venue("p6", "Casa do Porco", offset(SAO_PAULO, -2.5, 0.8), 4.7, "restaurant"),
    ]
}

#[tokio::test]
async fn test_six_nearby_venues_come_back_as_a_set() {
    let harness = Harness::new().await;
    let ids = harness.seed(six_venues()).await;
    let assembler = harness.assembler();

    let response = assembler.assemble(request_at_sao_paulo()).await.unwrap();

    let expected: HashSet<String> = ids.into_iter().collect();
    let returned: HashSet<String> = response.items.iter().map(|i| i.id.clone()).collect();
    assert_eq!(returned, expected);
    assert_eq!(response.items.len(), 6);
    assert!(response.items.iter().all(|i| !i.is_event));
    assert!(response.items.iter().all(|i| i.match_score.is_none()));
    assert!(response.items.iter().all(|i| i.distance_km <= 3.0));
    assert_eq!(response.population, PopulationStatus::NotNeeded);
    assert_eq!(response.location.source, LocationSource::Request);
    assert!(!response.expanded);
    assert_eq!(harness.places.search_count(), 0);
}

#[tokio::test]
async fn test_low_rated_and_blocked_venues_are_dropped() {
    let harness = Harness::new().await;
    let mut venues = six_venues();
    venues.push(venue("bad-1", "Boteco Ruim", offset(SAO_PAULO, 0.2, 0.2), 3.1, "bar"));
    venues.push(venue("bad-2", "Hospital Sírio-Libanês", offset(SAO_PAULO, 0.3, 0.0), 4.9, "hospital"));
    harness.seed(venues).await;

    let response = harness.assembler().assemble(request_at_sao_paulo()).await.unwrap();

    assert_eq!(response.items.len(), 6);
    assert!(response.items.iter().all(|i| i.name != "Boteco Ruim" && !i.name.contains("Hospital")));
}

#[tokio::test]
async fn test_seen_items_are_excluded_by_either_identifier() {
    let harness = Harness::new().await;
    let ids = harness.seed(six_venues()).await;
    harness
        .interactions
        .record("u1", &ids[0], InteractionKind::Accepted)
        .await
        .unwrap();
    harness
        .interactions
        .record("u1", "p2", InteractionKind::Rejected)
        .await
        .unwrap();

    let request = FeedRequest {
        user_id: Some("u1".to_string()),
        ..request_at_sao_paulo()
    };
    let response = harness.assembler().assemble(request).await.unwrap();

    let returned: HashSet<&str> = response.items.iter().map(|i| i.id.as_str()).collect();
    assert!(!returned.contains(ids[0].as_str()));
    assert!(!returned.contains(ids[1].as_str()));
    assert_eq!(returned.len(), 4);
}

#[tokio::test]
async fn test_vibe_safety_valve_returns_everything() {
    let harness = Harness::new().await;
    let venues = (1..=6)
        .map(|n| {
            venue(
                &format!("hw-{}", n),
                &format!("Loja de Ferragens {}", n),
                offset(SAO_PAULO, 0.2 * n as f64, 0.0),
                4.5,
                "hardware_store",
            )
        })
        .collect();
    harness.seed(venues).await;

    let request = FeedRequest {
        vibe: Some(VibeCategory::Culture),
        ..request_at_sao_paulo()
    };
    let response = harness.assembler().assemble(request).await.unwrap();

    assert_eq!(response.items.len(), 6);
    assert!(response.notices.iter().any(|n| n.contains("culture")));
}

#[tokio::test]
async fn test_vibe_keeps_only_matching_items() {
    let harness = Harness::new().await;
    harness.seed(six_venues()).await;

    let request = FeedRequest {
        vibe: Some(VibeCategory::Culture),
        ..request_at_sao_paulo()
    };
    let response = harness.assembler().assemble(request).await.unwrap();

    // Only the Pinacoteca matches; the sparse result widens to 20 km but
    // nothing else in the store is cultural
    assert_eq!(response.items.len(), 1);
    assert_eq!(response.items[0].name, "Pinacoteca");
}

#[tokio::test]
async fn test_wider_read_does_not_pad_matches_with_other_categories() {
    let harness = Harness::new().await;
    harness
        .seed(vec![venue("museu", "Museu da Língua", offset(SAO_PAULO, 1.0, 0.0), 4.7, "museum")])
        .await;
    let bars = (0..30)
        .map(|n| {
            venue(
                &format!("bar-{}", n),
                &format!("Bar {}", n),
                offset(SAO_PAULO, 0.0, 8.0 + (n % 6) as f64),
                4.5,
                "bar",
            )
        })
        .collect();
    harness.seed(bars).await;

    let request = FeedRequest {
        vibe: Some(VibeCategory::Culture),
        ..request_at_sao_paulo()
    };
    let response = harness.assembler().assemble(request).await.unwrap();

    assert_eq!(response.items.len(), 1);
    assert_eq!(response.items[0].name, "Museu da Língua");
    assert!(!response.expanded);
    assert!(response.notices.iter().all(|n| !n.contains("culture")));
}

#[tokio::test]
async fn test_matches_further_out_replace_unrelated_local_items() {
    let harness = Harness::new().await;
    harness
        .seed(vec![
            venue("hw", "Loja de Ferragens", offset(SAO_PAULO, 0.5, 0.0), 4.5, "hardware_store"),
            venue("museu", "Museu do Ipiranga", offset(SAO_PAULO, 12.0, 0.0), 4.7, "museum"),
        ])
        .await;

    let request = FeedRequest {
        vibe: Some(VibeCategory::Culture),
        ..request_at_sao_paulo()
    };
    let response = harness.assembler().assemble(request).await.unwrap();

    let names: Vec<&str> = response.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Museu do Ipiranga"]);
    assert!(response.expanded);
    assert!(response.notices.iter().all(|n| !n.contains("culture")));
}

#[tokio::test]
async fn test_valve_over_wider_read_reports_relaxation() {
    let harness = Harness::new().await;
    harness
        .seed(vec![
            venue("hw", "Loja de Ferragens", offset(SAO_PAULO, 0.5, 0.0), 4.5, "hardware_store"),
            venue("pharm", "Farmácia Popular", offset(SAO_PAULO, 12.0, 0.0), 4.5, "pharmacy"),
        ])
        .await;

    let request = FeedRequest {
        vibe: Some(VibeCategory::Culture),
        ..request_at_sao_paulo()
    };
    let response = harness.assembler().assemble(request).await.unwrap();

    assert_eq!(response.items.len(), 2);
    assert!(response.expanded);
    assert_eq!(
        response.notices.iter().filter(|n| n.contains("culture")).count(),
        1
    );
}

#[tokio::test]
async fn test_preferences_order_by_score_then_distance() {
    let harness = Harness::new().await;
    harness
        .seed(vec![
            venue("near-museum", "Museu Afro Brasil", offset(SAO_PAULO, 0.1, 0.0), 4.6, "museum"),
            venue("far-wine", "Enoteca Saint VinSaint", offset(SAO_PAULO, 2.0, 0.0), 4.5, "wine_bar"),
            venue("mid-wine", "Vino!", offset(SAO_PAULO, 1.0, 0.0), 4.4, "wine_bar"),
            venue("cafe-1", "Café Floresta", offset(SAO_PAULO, 0.3, 0.0), 4.4, "cafe"),
            venue("cafe-2", "Coffee Lab", offset(SAO_PAULO, 0.6, 0.0), 4.7, "cafe"),
        ])
        .await;
    harness
        .profiles
        .upsert_profile(
            "u1",
            None,
            None,
            &UserPreferences {
                drinks: vec!["wine".to_string()],
                ..UserPreferences::default()
            },
        )
        .await
        .unwrap();

    let request = FeedRequest {
        user_id: Some("u1".to_string()),
        ..request_at_sao_paulo()
    };
    let response = harness.assembler().assemble(request).await.unwrap();

    let names: Vec<&str> = response.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names[0], "Vino!");
    assert_eq!(names[1], "Enoteca Saint VinSaint");
    assert_eq!(names[2], "Museu Afro Brasil");

    let scores: Vec<f64> = response.items.iter().map(|i| i.match_score.unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_two_items_trigger_wider_radius() {
    let harness = Harness::new().await;
    harness
        .seed(vec![
            venue("a", "Bar A", offset(SAO_PAULO, 0.5, 0.0), 4.5, "bar"),
            venue("b", "Bar B", offset(SAO_PAULO, 1.0, 0.0), 4.5, "bar"),
            venue("far", "Bar Longe", offset(SAO_PAULO, 12.0, 0.0), 4.5, "bar"),
        ])
        .await;

    let response = harness.assembler().assemble(request_at_sao_paulo()).await.unwrap();

    assert!(response.expanded);
    assert_eq!(response.items.len(), 3);
    assert!(response.items.iter().any(|i| i.name == "Bar Longe"));
}

#[tokio::test]
async fn test_three_items_do_not_widen() {
    let harness = Harness::new().await;
    harness
        .seed(vec![
            venue("a", "Bar A", offset(SAO_PAULO, 0.5, 0.0), 4.5, "bar"),
            venue("b", "Bar B", offset(SAO_PAULO, 1.0, 0.0), 4.5, "bar"),
            venue("c", "Bar C", offset(SAO_PAULO, 1.5, 0.0), 4.5, "bar"),
            venue("far", "Bar Longe", offset(SAO_PAULO, 12.0, 0.0), 4.5, "bar"),
        ])
        .await;

    let response = harness.assembler().assemble(request_at_sao_paulo()).await.unwrap();

    assert!(!response.expanded);
    assert_eq!(response.items.len(), 3);
    assert!(response.items.iter().all(|i| i.name != "Bar Longe"));
}

#[tokio::test]
async fn test_sparse_region_is_populated_then_requeried() {
    let harness = Harness::new().await;
    harness.places.set_results(vec![
        raw_place("g1", "Bar do Juarez", offset(SAO_PAULO, 0.4, 0.0), Some(4.4), &["bar"]),
        raw_place("g2", "Mocotó", offset(SAO_PAULO, 0.8, 0.2), Some(4.7), &["restaurant"]),
        raw_place("g3", "Escola Municipal", offset(SAO_PAULO, 0.2, 0.2), Some(4.9), &["school"]),
        raw_place("g4", "Lanchonete", offset(SAO_PAULO, 0.1, 0.1), Some(3.0), &["restaurant"]),
    ]);
    let start = Utc::now() + Duration::days(3);
    harness.events.set_batch(vec![event("tm-1", "Samba da Vela", offset(SAO_PAULO, 1.0, 0.0), start)]);

    let response = harness.assembler().assemble(request_at_sao_paulo()).await.unwrap();

    assert_eq!(
        response.population,
        PopulationStatus::Launched {
            places_inserted: 2,
            events_found: 1,
        }
    );
    assert_eq!(response.items.len(), 3);
    assert!(response.items.iter().any(|i| i.is_event && i.name == "Samba da Vela"));
    assert!(response.notices.iter().any(|n| n.contains("1 upcoming events")));
    assert_eq!(harness.events.cities.lock().unwrap()[0].city, "São Paulo");

    // The warm-up runs detached; give it a moment
    for _ in 0..50 {
        if harness.warmer.ids.lock().unwrap().len() == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(harness.warmer.ids.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_city_anchored_events_show_up_in_their_city() {
    let harness = Harness::new().await;
    harness.seed(six_venues()).await;
    let start = Utc::now() + Duration::days(1);
    harness
        .seed_events(vec![event("tm-city", "Virada Cultural", nearby_common::Coordinates::new(0.0, 0.0), start)])
        .await;

    let response = harness.assembler().assemble(request_at_sao_paulo()).await.unwrap();

    assert_eq!(response.items.len(), 7);
    let city_event = response.items.iter().find(|i| i.name == "Virada Cultural").unwrap();
    assert!(city_event.is_event);
    assert_eq!(city_event.distance_km, 1.0);
}

#[tokio::test]
async fn test_missing_coordinates_use_profile_then_default() {
    let harness = Harness::new().await;
    let curitiba = nearby_common::Coordinates::new(-25.4284, -49.2733);
    harness
        .profiles
        .upsert_profile("u1", Some("Curitiba, PR"), Some(curitiba), &UserPreferences::default())
        .await
        .unwrap();

    let with_profile = harness
        .assembler()
        .assemble(FeedRequest {
            user_id: Some("u1".to_string()),
            ..FeedRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(with_profile.location.source, LocationSource::Profile);
    assert_eq!(with_profile.location.coordinates, curitiba);

    let anonymous = harness.assembler().assemble(FeedRequest::default()).await.unwrap();
    assert_eq!(anonymous.location.source, LocationSource::Default);
    assert_eq!(anonymous.location.coordinates, SAO_PAULO);
    assert!(!anonymous.notices.is_empty());
}

#[tokio::test]
async fn test_store_fault_yields_empty_feed_not_error() {
    let harness = Harness::new().await;
    harness.pool.close().await;

    let response = harness.assembler().assemble(request_at_sao_paulo()).await.unwrap();

    assert!(response.items.is_empty());
    // Writing discovered events hits the same closed pool
    assert!(response.notices.iter().any(|n| n.contains("events could not be loaded")));
}
