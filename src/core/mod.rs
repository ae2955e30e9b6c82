pub mod build;
pub mod dependency;
pub mod invite;
pub mod plan;
pub mod scheduler;

pub use crate::domain::model::{BuildOutcome, BuildSettings, CommandReport, UnitDescriptor, UnitSelection};
pub use crate::domain::ports::{ContainerEngine, ReadinessGate, SourceFetcher};
pub use crate::utils::error::Result;
