pub mod court_variety;
pub mod evaluation_driver;
pub mod king_of_court;
pub mod rating;
pub mod round_robin;
pub mod session_lifecycle;
pub mod stats_store;
pub mod utils;
