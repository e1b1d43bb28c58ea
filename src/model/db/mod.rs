pub mod audit;
pub mod ballot;
pub mod election;
pub mod voter;
