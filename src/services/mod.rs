pub mod checkout;
pub mod demand;
pub mod feedback;
pub mod ledger;
pub mod scheduler;
pub mod seats;

pub use checkout::CheckoutService;
pub use demand::{DemandModel, DemandSimulator};
pub use feedback::UpliftFeedbackAdjuster;
pub use ledger::InventoryLedger;
pub use scheduler::SimulationScheduler;
