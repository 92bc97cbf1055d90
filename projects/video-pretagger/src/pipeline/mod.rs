// Detection, annotation, reporting and the orchestrator that chains them

pub mod annotate;
pub mod detection;
pub mod ledger;
pub mod orchestrator;
pub mod report;
pub mod types;
