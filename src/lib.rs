pub mod configuration;
pub mod domain;
pub mod emails;
pub mod release;
pub mod routes;
pub mod startup;
pub mod subscriber_cleanup;
pub mod telemetry;
pub mod tokens;
mod utils;
pub mod validation;
