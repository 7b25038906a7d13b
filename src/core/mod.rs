pub mod checkout_url;
pub mod handoff;
pub mod notifier;
pub mod pricing;
pub mod region;
pub mod resolver;
pub mod store;

pub use crate::domain::model::{PriceBreakdown, Selection, SelectionDelta};
pub use crate::domain::ports::{KeyValueStorage, Navigator, PhotoUploader, SubmissionClient};
pub use crate::utils::error::Result;
pub use checkout_url::{build_checkout_url, endpoint_mapping, CheckoutUrlBuilder};
pub use handoff::CheckoutHandoff;
pub use pricing::PricingEngine;
pub use region::{RegionRoute, RegionRouter};
pub use resolver::{resolve_endpoint, EndpointResolver};
pub use store::SelectionStore;
