pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::{CliConfig, Command};

pub use crate::adapters::{
    http::WebhookSubmissionClient,
    navigator::RecordingNavigator,
    storage::{FileStorage, MemoryStorage},
};
pub use crate::config::toml_config::CommerceConfig;
pub use crate::core::{
    checkout_url::build_checkout_url, handoff::CheckoutHandoff, pricing::PricingEngine,
    region::RegionRouter, resolver::resolve_endpoint, store::SelectionStore,
};
pub use crate::domain::catalog::{AddOn, AddOnFlags, AddOnSelection, EndpointId};
pub use crate::domain::model::{AttributionSnapshot, PriceBreakdown, Selection, SelectionDelta};
pub use crate::utils::error::{CheckoutError, Result};
