pub mod product;
pub mod state;

pub use product::{Candidate, DetailFields, DetailRecord, PriceTier, SupplierInfo, WorkItem};
pub use state::{ExecutionState, Phase, RunSummary};
