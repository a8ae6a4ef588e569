// Library exports for the spe_ed agent
// This allows the server, the replay tool and the tests to use the decision engine

pub mod bot;
pub mod client;
pub mod collision;
pub mod config;
pub mod debug_logger;
pub mod handler;
pub mod replay;
pub mod search;
pub mod types;
