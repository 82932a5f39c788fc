pub mod agent;
pub mod memory;
pub mod onboard;
pub mod status;
