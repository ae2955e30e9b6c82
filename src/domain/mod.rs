// Domain layer: unit model and the capability ports (engine, fetcher, readiness).

pub mod model;
pub mod ports;
