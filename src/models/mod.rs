pub mod artist;
pub mod event;
pub mod seat;
pub mod simulation;
pub mod suggestion;

pub use artist::{ActiveListing, ArtistPricingState};
pub use event::EventInventory;
pub use seat::{PurchaseSource, SeatPurchaseRecord, SeatRequest};
pub use simulation::{RunStateSource, SimulationRunState};
pub use suggestion::DemandSuggestion;
