// One-tick collision prediction against nearby players

use std::collections::HashSet;

use crate::search::{candidate_fields, SearchContext};
use crate::types::{Command, Coord, Direction, PlayerSnapshot};

/// Whether `other` lies inside the axis-aligned box of half-width
/// `margin + speed` around `pos`
pub fn is_nearby(pos: Coord, speed: i32, margin: i32, other: Coord) -> bool {
    let reach = margin + speed;
    (other.x - pos.x).abs() <= reach && (other.y - pos.y).abs() <= reach
}

/// Players within the proximity window of the controlled player, in input order
pub fn nearby_players<'p>(
    you: &PlayerSnapshot,
    players: &'p [PlayerSnapshot],
    margin: i32,
) -> Vec<&'p PlayerSnapshot> {
    players
        .iter()
        .filter(|p| is_nearby(you.position, you.speed, margin, p.position))
        .collect()
}

/// Every cell an opponent can touch this tick, over all five of its commands
fn footprint(ctx: &SearchContext<'_>, opponent: &PlayerSnapshot) -> HashSet<Coord> {
    let mut cells = HashSet::new();
    for field in candidate_fields(opponent.position, opponent.direction, opponent.speed) {
        cells.insert(field);
        cells.extend(ctx.path(opponent.position, field));
    }
    cells
}

/// Commands of the player at `pos` whose path shares a cell with the
/// opponent's footprint.
///
/// Overlap is detected by comparing the size of the union with the summed
/// sizes, where the path is counted as a list. A fast-path path that repeats
/// its target therefore always counts as a collision.
pub fn collision_commands(
    ctx: &SearchContext<'_>,
    pos: Coord,
    direction: Direction,
    speed: i32,
    opponent: &PlayerSnapshot,
) -> Vec<Command> {
    let opponent_cells = footprint(ctx, opponent);
    let fields = candidate_fields(pos, direction, speed);

    Command::ALL
        .into_iter()
        .filter(|cmd| {
            let path = ctx.path(pos, fields[cmd.index()]);
            let expected = path.len() + opponent_cells.len();
            let union = opponent_cells
                .iter()
                .chain(path.iter())
                .collect::<HashSet<_>>()
                .len();
            union != expected
        })
        .collect()
}

/// Number of predicted collisions per command, indexed by `Command::index`
pub fn collision_histogram(collisions: &[Command]) -> [u32; 5] {
    let mut counts = [0; 5];
    for cmd in collisions {
        counts[cmd.index()] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Board;

    fn board() -> Board {
        let cells = vec![
            vec![0, 0, 0, 0, 0],
            vec![0, 0, 1, 0, 0],
            vec![0, 0, 0, 2, 0],
            vec![0, 0, 0, 0, 0],
        ];
        Board::from_cells(5, 4, &cells).unwrap()
    }

    fn player(id: u32, x: i32, y: i32, direction: Direction, speed: i32) -> PlayerSnapshot {
        PlayerSnapshot {
            id,
            position: Coord::new(x, y),
            direction,
            speed,
            active: true,
        }
    }

    #[test]
    fn test_collision_commands_on_fast_path_tick() {
        let board = board();
        let ctx = SearchContext::new(&board, true);
        let opponent = player(2, 1, 1, Direction::Up, 1);

        let result = collision_commands(&ctx, Coord::new(0, 0), Direction::Right, 1, &opponent);
        assert_eq!(
            result,
            vec![
                Command::TurnLeft,
                Command::TurnRight,
                Command::SpeedUp,
                Command::ChangeNothing
            ]
        );
        assert!(!result.contains(&Command::SlowDown));
    }

    #[test]
    fn test_collision_commands_on_regular_tick() {
        let board = board();
        let ctx = SearchContext::new(&board, false);
        let opponent = player(2, 1, 1, Direction::Up, 1);

        // Without the repeated target, moving up to (0,-1) stays clear
        let result = collision_commands(&ctx, Coord::new(0, 0), Direction::Right, 1, &opponent);
        assert_eq!(
            result,
            vec![Command::TurnRight, Command::SpeedUp, Command::ChangeNothing]
        );
    }

    #[test]
    fn test_far_opponent_never_collides() {
        let board = board();
        let ctx = SearchContext::new(&board, false);
        let opponent = player(2, 4, 3, Direction::Down, 1);

        let result = collision_commands(&ctx, Coord::new(0, 0), Direction::Right, 1, &opponent);
        assert!(result.is_empty());
    }

    #[test]
    fn test_self_collides_on_every_command() {
        let board = board();
        let ctx = SearchContext::new(&board, false);
        let you = player(1, 2, 1, Direction::Right, 1);

        let result = collision_commands(&ctx, you.position, you.direction, you.speed, &you);
        assert_eq!(result, Command::ALL.to_vec());
    }

    #[test]
    fn test_proximity_window_is_a_box() {
        let you = player(1, 0, 0, Direction::Right, 2);
        let players = vec![
            you,
            player(2, 12, 12, Direction::Up, 1),
            player(3, 13, 0, Direction::Up, 1),
            player(4, -12, 5, Direction::Up, 1),
        ];

        let ids: Vec<u32> = nearby_players(&you, &players, 10)
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }

    #[test]
    fn test_histogram_counts_duplicates() {
        let counts = collision_histogram(&[
            Command::SpeedUp,
            Command::TurnLeft,
            Command::SpeedUp,
        ]);
        assert_eq!(counts, [1, 0, 0, 2, 0]);
    }
}
