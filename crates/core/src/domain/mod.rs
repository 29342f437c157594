pub mod lead;
pub mod staff;
