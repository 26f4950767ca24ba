pub mod schema;

#[allow(unused_imports)]
pub use schema::{AgentsConfig, Config, RoutingConfig};
