mod probe_scheduler;
mod status_exporter;
mod sweep_coordinator;

pub use probe_scheduler::ProbeScheduler;
pub use status_exporter::StatusExporter;
pub use sweep_coordinator::{SweepCoordinator, SweepSummary};
