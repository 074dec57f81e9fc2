pub mod reservation;
pub mod resy;
