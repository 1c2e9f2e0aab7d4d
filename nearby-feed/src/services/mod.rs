//! External source adapters
//!
//! Each provider sits behind an `async_trait` seam so the feed engine can be
//! exercised with in-memory fakes.

pub mod events_client;
pub mod geocoder;
pub mod image_warmer;
pub mod places_client;

pub use events_client::{DisabledEvents, EventsError, EventsProvider, TicketmasterEventsClient};
pub use geocoder::{CitySource, ReverseGeocoder};
pub use image_warmer::{ImageWarmer, LoggingImageWarmer};
pub use places_client::{DisabledPlaces, GooglePlacesClient, PlacesError, PlacesProvider};
