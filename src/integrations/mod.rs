//! External collaborators the gateway calls out to but does not implement.
//!
//! - [`biometrics`]: wearable biometric queries backing `whoop_data_query`
//! - [`status`]: row-count summary of the time-series store

pub mod biometrics;
pub mod status;
