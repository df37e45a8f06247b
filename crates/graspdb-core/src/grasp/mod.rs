pub mod compose;
pub mod filter;
pub mod guards;
pub mod layout;
pub mod planner;
