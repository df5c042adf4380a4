// Hostwarden - host liveness alerting and scheduled service recycling
// Library root

pub mod config;
pub mod error;
pub mod guard;
pub mod monitor;
pub mod recycle;
pub mod scheduler;
pub mod version;
