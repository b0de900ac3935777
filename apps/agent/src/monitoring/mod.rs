/// Monitoring module - builds, schedules and reports monitors
///
/// This module is responsible for:
/// - Setting up monitors from the config, before anything runs
/// - Evaluating alive, disk usage and email ping-pong monitors
/// - Running every monitor on its own timer
/// - Pushing results to the uptime hosts
pub mod disk_usage;
pub mod email_ping;
pub mod monitor;
pub mod pusher;
pub mod scheduler;
pub mod setup;
pub mod types;

pub use pusher::StatusPusher;
pub use scheduler::MonitoringScheduler;
pub use setup::{SetupContext, setup_monitors};
