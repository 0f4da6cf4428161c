pub mod amount;
pub mod roles;
pub mod scenario;

pub use scenario::Scenario;
