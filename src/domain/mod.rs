// Domain layer: catalog, session models and ports (interfaces) to external collaborators.

pub mod catalog;
pub mod model;
pub mod ports;
