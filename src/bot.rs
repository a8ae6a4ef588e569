// Decision engine for the spe_ed agent
//
// Every tick the bot builds the move tree from the controlled player's state,
// predicts one-tick collisions with nearby players and picks the command with
// the best adjusted score.

use chrono::{DateTime, Utc};
use log::{debug, error, info, log_enabled, warn, Level};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::collision::{collision_commands, collision_histogram, nearby_players};
use crate::config::{Config, SearchConfig};
use crate::search::{score, MoveNode, SearchContext};
use crate::types::{Command, GameState, PlayerSnapshot, Snapshot};

/// Outcome of `Bot::decide`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub command: Command,
    /// Tick the command was searched on, `None` when it is the timeout fallback
    pub turn: Option<u64>,
}

impl Decision {
    fn fallback() -> Self {
        Decision {
            command: Command::ChangeNothing,
            turn: None,
        }
    }
}

/// spe_ed bot with OOP-style API
/// Takes static configuration and owns the per-process turn counter and the
/// tie-break random source
pub struct Bot {
    config: Config,
    move_count: AtomicU64,
    rng: Mutex<StdRng>,
}

impl Bot {
    /// Creates a new Bot instance with an OS-seeded tie-break source
    ///
    /// # Arguments
    /// * `config` - Static configuration that does not change during the bot's lifetime
    pub fn new(config: Config) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Creates a Bot whose tie-breaks are reproducible
    pub fn with_seed(config: Config, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: Config, rng: StdRng) -> Self {
        Bot {
            config,
            move_count: AtomicU64::new(0),
            rng: Mutex::new(rng),
        }
    }

    /// Continues counting from `turns` already processed ticks
    pub fn resume_at(self, turns: u64) -> Self {
        self.move_count.store(turns, Ordering::Release);
        self
    }

    /// Number of ticks processed so far
    pub fn move_count(&self) -> u64 {
        self.move_count.load(Ordering::Acquire)
    }

    /// Returns bot metadata
    /// Corresponds to GET / endpoint
    pub fn info(&self) -> Value {
        info!("INFO");

        json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "depth": self.config.search.depth,
            "moves": self.move_count(),
        })
    }

    /// Called when the server reports the end of a game
    /// Corresponds to POST /end endpoint
    pub fn end(&self, state: &GameState) {
        info!(
            "GAME OVER (running: {}, players: {}, moves: {})",
            state.running,
            state.players.len(),
            self.move_count()
        );
    }

    /// Chooses the command for the current tick.
    ///
    /// Increments the turn counter first; the new value decides whether this
    /// tick uses the abbreviated occupancy scan.
    pub fn predict_move(&self, snapshot: &Snapshot) -> Command {
        self.predict_at(self.next_turn(), snapshot)
    }

    fn next_turn(&self) -> u64 {
        self.move_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn predict_at(&self, turn: u64, snapshot: &Snapshot) -> Command {
        let start_time = Instant::now();
        let search = &self.config.search;

        let fast_path = search.fast_path_interval > 0 && turn % search.fast_path_interval == 0;
        let ctx = SearchContext::new(snapshot.board(), fast_path);
        let you = snapshot.you();

        let root = if search.parallel_root {
            ctx.build_tree_parallel(you.position, you.direction, you.speed, search.depth)
        } else {
            ctx.build_tree(you.position, you.direction, you.speed, search.depth)
        };

        let opponents = nearby_players(you, snapshot.players(), search.proximity_margin);

        let command = {
            let mut rng = self.rng.lock();
            choose_command(&ctx, &root, &opponents, search, &mut *rng)
        };

        if log_enabled!(Level::Debug) {
            debug!(
                "Turn {}: {} tree nodes, {} nearby players",
                turn,
                root.node_count(),
                opponents.len()
            );
        }

        info!(
            "Turn {}: Chose {} (fast path: {}, time: {}ms)",
            turn,
            command,
            fast_path,
            start_time.elapsed().as_millis()
        );

        command
    }

    /// Runs the search on the blocking pool and waits at most the time
    /// budget for it. Falls back to CHANGE_NOTHING when the budget runs out.
    ///
    /// The turn is claimed before spawning, so overlapping calls never share
    /// a tick number.
    pub async fn decide(self: Arc<Self>, snapshot: Snapshot, deadline: Option<String>) -> Decision {
        let budget = self.time_budget(deadline.as_deref(), Utc::now());
        if budget.is_zero() {
            warn!("Deadline already passed, sending {}", Command::ChangeNothing);
            return Decision::fallback();
        }

        let turn = self.next_turn();
        let bot = Arc::clone(&self);
        let handle = tokio::task::spawn_blocking(move || bot.predict_at(turn, &snapshot));

        match tokio::time::timeout(budget, handle).await {
            Ok(Ok(command)) => Decision {
                command,
                turn: Some(turn),
            },
            Ok(Err(e)) => {
                error!("Move computation for turn {} failed: {}", turn, e);
                Decision::fallback()
            }
            Err(_) => {
                warn!(
                    "Turn {}: no move within {}ms, sending {}",
                    turn,
                    budget.as_millis(),
                    Command::ChangeNothing
                );
                Decision::fallback()
            }
        }
    }

    /// Time left for a decision: until the server deadline minus network
    /// overhead, or the configured budget when the deadline is missing or
    /// not RFC 3339
    pub fn time_budget(&self, deadline: Option<&str>, now: DateTime<Utc>) -> Duration {
        let timing = &self.config.timing;

        let from_deadline = deadline
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| {
                let remaining = d.with_timezone(&Utc) - now;
                (remaining.num_milliseconds().max(0) as u64).saturating_sub(timing.network_overhead_ms)
            });

        Duration::from_millis(from_deadline.unwrap_or_else(|| timing.effective_budget_ms()))
    }
}

/// Adjusted score of every legal root command, in canonical order.
///
/// Each command scores its subtree and loses `depth * collision_penalty` per
/// nearby player it may run into this tick.
pub fn score_commands(
    ctx: &SearchContext<'_>,
    root: &MoveNode,
    opponents: &[&PlayerSnapshot],
    search: &SearchConfig,
) -> Vec<(Command, f64)> {
    let collisions: Vec<Command> = opponents
        .iter()
        .flat_map(|opp| collision_commands(ctx, root.position, root.direction, root.speed, opp))
        .collect();
    let counts = collision_histogram(&collisions);
    let depth = search.depth;

    root.viable_commands()
        .filter_map(|cmd| {
            let child = root.child(cmd)?;
            let penalty = depth as f64 * search.collision_penalty * counts[cmd.index()] as f64;
            Some((cmd, score(child, depth.saturating_sub(1), search.decay) - penalty))
        })
        .collect()
}

/// Picks the command to send.
///
/// The initial pick is uniform among legal commands; the scan then only
/// replaces it on a strictly better score, skipping SPEED_UP while the
/// current speed exceeds `speed_up_limit`.
pub fn choose_command<R: Rng>(
    ctx: &SearchContext<'_>,
    root: &MoveNode,
    opponents: &[&PlayerSnapshot],
    search: &SearchConfig,
    rng: &mut R,
) -> Command {
    let scored = score_commands(ctx, root, opponents, search);

    if scored.is_empty() {
        info!("No reachable command, keeping course");
        return Command::ChangeNothing;
    }

    for (cmd, value) in &scored {
        debug!("  {}: {:.6}", cmd, value);
    }

    let (mut best, mut best_score) = scored[rng.random_range(0..scored.len())];
    for &(cmd, value) in &scored {
        if cmd == Command::SpeedUp && root.speed > search.speed_up_limit {
            continue;
        }
        if value > best_score {
            best = cmd;
            best_score = value;
        }
    }

    best
}
