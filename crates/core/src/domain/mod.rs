pub mod analytics;
pub mod context;
pub mod customer;
pub mod product;
pub mod recommendation;
