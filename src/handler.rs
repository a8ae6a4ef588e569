// Boundary bindings for the spe_ed agent
//
// `play_tick` is the per-state step shared by the HTTP routes and the
// websocket client:
// - Stopping once the game is over or our player is dead
// - Rejecting states that fail validation
// - Deciding within the time budget and logging the decided tick

use log::{info, warn};
use rocket::fairing::AdHoc;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Rocket, State};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::bot::Bot;
use crate::debug_logger::DebugLogger;
use crate::types::{Command, GameState, GameStatus, Snapshot, StateError};

/// What the boundary should do with one received state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Move(Command),
    Finished(GameStatus),
}

/// Runs one tick for a received state
pub async fn play_tick(
    bot: &Arc<Bot>,
    logger: &DebugLogger,
    state: GameState,
) -> Result<Tick, StateError> {
    match state.status() {
        GameStatus::Running => {}
        GameStatus::GameOver => {
            info!("game over");
            return Ok(Tick::Finished(GameStatus::GameOver));
        }
        GameStatus::PlayerDied => {
            info!("player died after {} moves", bot.move_count());
            return Ok(Tick::Finished(GameStatus::PlayerDied));
        }
    }

    let snapshot = Snapshot::from_state(&state)?;
    let decision = Arc::clone(bot).decide(snapshot, state.deadline.clone()).await;

    if let Some(turn) = decision.turn {
        logger.log_move(turn, state, decision.command);
    }

    Ok(Tick::Move(decision.command))
}

/// Response body carrying a command token
pub fn action_body(command: Command) -> Value {
    json!({ "action": command.as_str() })
}

/// GET / endpoint
/// Returns bot metadata
#[get("/")]
pub fn index(bot: &State<Arc<Bot>>) -> Json<Value> {
    Json(bot.info())
}

/// POST /move endpoint
/// Called each tick with the full game state, answers with the chosen action
#[post("/move", format = "json", data = "<move_req>")]
pub async fn get_move(
    bot: &State<Arc<Bot>>,
    logger: &State<DebugLogger>,
    move_req: Json<GameState>,
) -> Result<Json<Value>, Status> {
    match play_tick(bot.inner(), logger.inner(), move_req.into_inner()).await {
        Ok(Tick::Move(command)) => Ok(Json(action_body(command))),
        Ok(Tick::Finished(_)) => Err(Status::Gone),
        Err(e) => {
            warn!("Rejecting game state: {}", e);
            Err(Status::UnprocessableEntity)
        }
    }
}

/// POST /end endpoint
/// Called when a game ends - allows cleanup and logging
#[post("/end", format = "json", data = "<end_req>")]
pub fn end(bot: &State<Arc<Bot>>, end_req: Json<GameState>) -> Status {
    bot.end(&end_req);

    Status::Ok
}

/// Rocket instance with the bot, the debug logger and all routes mounted
pub fn build_rocket(bot: Arc<Bot>, logger: DebugLogger) -> Rocket<Build> {
    rocket::build()
        .manage(bot)
        .manage(logger)
        .attach(AdHoc::on_response("Server ID Middleware", |_, res| {
            Box::pin(async move {
                res.set_raw_header("Server", "spe-ed-bot");
            })
        }))
        .mount("/", routes![index, get_move, end])
}
