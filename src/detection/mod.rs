pub mod event;
pub mod health;
pub mod oneshot;
pub mod supervisor;

pub use event::{BoundingBox, DetectionEvent, DetectionStatus};
pub use health::{HealthProbe, HealthReport};
pub use oneshot::{FrameResult, OneShotClient};
pub use supervisor::{DetectionSupervisor, StartOutcome};
