mod admin;
mod health_check;

pub use admin::*;
pub use health_check::*;
