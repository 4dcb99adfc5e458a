pub mod fetch;
pub mod ports;
