use log::{error, info};
use std::env;
use std::process;
use std::sync::Arc;

use spe_ed_bot::bot::Bot;
use spe_ed_bot::client;
use spe_ed_bot::config::Config;
use spe_ed_bot::debug_logger::DebugLogger;
use spe_ed_bot::handler::build_rocket;

#[rocket::main]
async fn main() {
    // Lots of web hosting services expect you to bind to the port specified by the `PORT`
    // environment variable. However, Rocket looks at the `ROCKET_PORT` environment variable.
    // If we find a value for `PORT`, we set `ROCKET_PORT` to that value.
    if let Ok(port) = env::var("PORT") {
        env::set_var("ROCKET_PORT", &port);
    }

    // We default to 'info' level logging. But if the `RUST_LOG` environment variable is set,
    // we keep that value instead.
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    env_logger::init();

    info!("Starting spe_ed agent...");

    // Load configuration once at startup
    let config = Config::load_or_default();
    let logger = DebugLogger::new(config.debug.enabled, &config.debug.log_file_path).await;
    let bot = Arc::new(Bot::new(config));

    // With `URL` and `KEY` set we play one game as websocket client,
    // otherwise we serve the HTTP routes
    match (env::var("URL"), env::var("KEY")) {
        (Ok(url), Ok(key)) => {
            info!("Connecting to {}", url);
            match client::run(&client::endpoint(&url, &key), bot, logger).await {
                Ok(status) => info!("Finished: {:?}", status),
                Err(e) => {
                    error!("Game aborted: {}", e);
                    process::exit(1);
                }
            }
        }
        _ => {
            if let Err(e) = build_rocket(bot, logger).launch().await {
                error!("Server failed: {}", e);
                process::exit(1);
            }
        }
    }
}
