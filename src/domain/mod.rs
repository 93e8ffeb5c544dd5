pub mod cycle_list;
pub mod display;
pub mod models;
pub mod timer;
