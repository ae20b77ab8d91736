pub mod events;
pub mod provisioning;
pub mod status;
