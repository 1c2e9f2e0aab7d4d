//! Feed-assembly and lazy-population engine

pub mod assembler;
pub mod coordinates;
pub mod expansion;
pub mod interaction;
pub mod population;
pub mod quality;
pub mod regional;
pub mod scoring;
pub mod signature;
pub mod vibe;

pub use assembler::{
    FeedAssembler, FeedDependencies, FeedRequest, FeedResponse, FeedStage, PopulationStatus,
};
pub use coordinates::{CoordinateResolver, LocationSource, ResolvedLocation};
pub use population::{PopulationCoordinator, PopulationOutcome, PopulationReport};
pub use signature::RegionSignature;
