pub mod bench;
pub mod metrics;
pub mod models;
pub mod settings;
pub mod status;
pub mod uplink;
pub mod workflows;
