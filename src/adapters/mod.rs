// Adapters layer: concrete implementations of the domain ports (storage, http, navigation).

pub mod http;
pub mod navigator;
pub mod storage;
