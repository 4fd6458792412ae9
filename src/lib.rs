pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod group;
pub mod metrics;
pub mod query;
pub mod range;
pub mod state;

pub use config::DashboardConfig;
pub use error::{DashboardError, Result};
pub use state::Dashboard;
