pub mod actuator;
pub mod color;
pub mod config;
pub mod error;
pub mod estimator;
pub mod events;
pub mod frame;
pub mod ledger;
pub mod meeting;
pub mod paths;
pub mod pomodoro;
pub mod profile;
pub mod scheduler;
pub mod session;
