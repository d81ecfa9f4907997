pub mod energy;
pub mod prize_selector;
