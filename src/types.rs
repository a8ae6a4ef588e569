// spe_ed API Types
//
// Wire types mirror the JSON the game server pushes every tick. Snapshot types
// are the validated, read-only view the search works on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Validation failures raised while turning a wire state into a snapshot
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("grid has {rows} rows of {columns:?} cells, expected {height} rows of {width}")]
    GridShape {
        width: i32,
        height: i32,
        rows: usize,
        columns: Vec<usize>,
    },
    #[error("player key '{0}' is not an integer id")]
    InvalidPlayerId(String),
    #[error("controlled player {0} is not in the player list")]
    UnknownPlayer(u32),
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

/// 2D coordinate on the board, x grows to the right and y grows downwards
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Coord { x, y }
    }
}

/// Heading of a player, in clockwise order
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// Returns all directions in clockwise order starting at Up
    pub fn all() -> [Direction; 4] {
        [Direction::Up, Direction::Right, Direction::Down, Direction::Left]
    }

    /// Position of this direction in the clockwise cycle
    pub fn index(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Right => 1,
            Direction::Down => 2,
            Direction::Left => 3,
        }
    }

    /// One step counter-clockwise, wrapping Up to Left
    pub fn turn_left(self) -> Direction {
        Self::all()[(self.index() + 3) % 4]
    }

    /// One step clockwise, wrapping Left to Up
    pub fn turn_right(self) -> Direction {
        Self::all()[(self.index() + 1) % 4]
    }

    /// Down and Right move along growing coordinates
    pub fn factor(self) -> i32 {
        match self {
            Direction::Down | Direction::Right => 1,
            Direction::Up | Direction::Left => -1,
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }
}

/// The five actions a player can send each tick.
///
/// The declaration order is the canonical order: it indexes move-tree
/// children, the collision histogram and the tie-break scan.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    TurnLeft,
    TurnRight,
    SlowDown,
    SpeedUp,
    ChangeNothing,
}

impl Command {
    /// All commands in canonical order
    pub const ALL: [Command; 5] = [
        Command::TurnLeft,
        Command::TurnRight,
        Command::SlowDown,
        Command::SpeedUp,
        Command::ChangeNothing,
    ];

    pub fn index(self) -> usize {
        match self {
            Command::TurnLeft => 0,
            Command::TurnRight => 1,
            Command::SlowDown => 2,
            Command::SpeedUp => 3,
            Command::ChangeNothing => 4,
        }
    }

    /// Wire token sent back to the game server
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::TurnLeft => "turn_left",
            Command::TurnRight => "turn_right",
            Command::SlowDown => "slow_down",
            Command::SpeedUp => "speed_up",
            Command::ChangeNothing => "change_nothing",
        }
    }

    /// Heading and speed after applying this command. Speed is not clamped.
    pub fn apply(self, direction: Direction, speed: i32) -> (Direction, i32) {
        match self {
            Command::TurnLeft => (direction.turn_left(), speed),
            Command::TurnRight => (direction.turn_right(), speed),
            Command::SlowDown => (direction, speed - 1),
            Command::SpeedUp => (direction, speed + 1),
            Command::ChangeNothing => (direction, speed),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .iter()
            .copied()
            .find(|cmd| cmd.as_str() == s)
            .ok_or_else(|| StateError::UnknownCommand(s.to_string()))
    }
}

/// Player entry as sent by the server, keyed by id in `GameState::players`
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Player {
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub speed: i32,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Complete game state received every tick
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GameState {
    pub width: i32,
    pub height: i32,
    pub cells: Vec<Vec<i32>>,
    pub players: BTreeMap<String, Player>,
    pub you: u32,
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
}

/// Where the game stands from the controlled player's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Running,
    GameOver,
    PlayerDied,
}

impl GameState {
    /// A controlled id missing from `players` reports `Running`; validation
    /// rejects it afterwards with `StateError::UnknownPlayer`
    pub fn status(&self) -> GameStatus {
        if !self.running {
            return GameStatus::GameOver;
        }

        match self.players.get(&self.you.to_string()) {
            Some(player) if !player.active => GameStatus::PlayerDied,
            _ => GameStatus::Running,
        }
    }
}

/// Occupancy grid captured at the start of a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    width: i32,
    height: i32,
    occupied: Vec<bool>,
}

impl Board {
    /// Builds a board from rows of texture codes, `0` being the only empty code
    pub fn from_cells(width: i32, height: i32, cells: &[Vec<i32>]) -> Result<Self, StateError> {
        let shape_ok = width >= 0
            && height >= 0
            && cells.len() == height as usize
            && cells.iter().all(|row| row.len() == width as usize);

        if !shape_ok {
            return Err(StateError::GridShape {
                width,
                height,
                rows: cells.len(),
                columns: cells.iter().map(Vec::len).collect(),
            });
        }

        let occupied = cells.iter().flatten().map(|&texture| texture != 0).collect();
        Ok(Board {
            width,
            height,
            occupied,
        })
    }

    pub fn in_bounds(&self, coord: Coord) -> bool {
        coord.x >= 0 && coord.x < self.width && coord.y >= 0 && coord.y < self.height
    }

    /// Callers must check bounds first
    pub fn is_occupied(&self, coord: Coord) -> bool {
        self.occupied[(coord.y * self.width + coord.x) as usize]
    }
}

/// Immutable view of one player for the duration of a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub id: u32,
    pub position: Coord,
    pub direction: Direction,
    pub speed: i32,
    pub active: bool,
}

/// Validated board and players for one tick
#[derive(Debug, Clone)]
pub struct Snapshot {
    board: Board,
    players: Vec<PlayerSnapshot>,
    you_index: usize,
}

impl Snapshot {
    pub fn new(board: Board, players: Vec<PlayerSnapshot>, you: u32) -> Result<Self, StateError> {
        let you_index = players
            .iter()
            .position(|p| p.id == you)
            .ok_or(StateError::UnknownPlayer(you))?;

        Ok(Snapshot {
            board,
            players,
            you_index,
        })
    }

    pub fn from_state(state: &GameState) -> Result<Self, StateError> {
        let board = Board::from_cells(state.width, state.height, &state.cells)?;

        let mut players = state
            .players
            .iter()
            .map(|(key, player)| {
                let id = key
                    .parse::<u32>()
                    .map_err(|_| StateError::InvalidPlayerId(key.clone()))?;
                Ok(PlayerSnapshot {
                    id,
                    position: Coord::new(player.x, player.y),
                    direction: player.direction,
                    speed: player.speed,
                    active: player.active,
                })
            })
            .collect::<Result<Vec<_>, StateError>>()?;
        players.sort_by_key(|p| p.id);

        Self::new(board, players, state.you)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn players(&self) -> &[PlayerSnapshot] {
        &self.players
    }

    /// The player this agent controls
    pub fn you(&self) -> &PlayerSnapshot {
        &self.players[self.you_index]
    }
}
