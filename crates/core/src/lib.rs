pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod gateway;
pub mod scoring;

pub use domain::analytics::{
    CategoryAggregate, CategoryPairing, PopularityPoint, PricePoint, TrendingProduct,
};
pub use domain::context::{ContextSpec, Season};
pub use domain::customer::{CustomerId, CustomerProfile, SimilarCustomer};
pub use domain::product::{PriceBand, ProductId, ProductRecord, ProductSummary};
pub use domain::recommendation::RecommendationCandidate;
pub use errors::{EntityKind, InterfaceError, OrchestrationError};
pub use flows::{LifecycleEvent, RequestLifecycle, RequestState};
pub use gateway::{CustomerFilter, DataGateway, GatewayError, ProductFilter};
pub use scoring::{ScoringEngine, ScoringWeights};
