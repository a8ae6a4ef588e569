// Lookahead search over the five commands
//
// Builds a fixed-depth tree of future (position, direction, speed) states from
// the static board captured at the start of the tick, and scores subtrees by a
// decay-weighted count of future mobility.

use rayon::prelude::*;

use crate::types::{Board, Command, Coord, Direction};

/// Target cell of each command, indexed by `Command::index`.
///
/// Turns are a lateral step of `speed` cells rather than a heading change, so
/// TURN_LEFT on a vertical heading moves along x by `speed * factor`.
pub fn candidate_fields(pos: Coord, direction: Direction, speed: i32) -> [Coord; 5] {
    let f = direction.factor();

    if direction.is_vertical() {
        [
            Coord::new(pos.x + speed * f, pos.y),
            Coord::new(pos.x - speed * f, pos.y),
            Coord::new(pos.x, pos.y + (speed - 1) * f),
            Coord::new(pos.x, pos.y + (speed + 1) * f),
            Coord::new(pos.x, pos.y + speed * f),
        ]
    } else {
        [
            Coord::new(pos.x, pos.y - speed * f),
            Coord::new(pos.x, pos.y + speed * f),
            Coord::new(pos.x + (speed - 1) * f, pos.y),
            Coord::new(pos.x + (speed + 1) * f, pos.y),
            Coord::new(pos.x + speed * f, pos.y),
        ]
    }
}

/// Unit step from `start` towards `target` if both share a row or a column
fn axis_step(start: Coord, target: Coord) -> Option<Coord> {
    if start == target {
        None
    } else if start.x == target.x {
        Some(Coord::new(0, if start.y < target.y { 1 } else { -1 }))
    } else if start.y == target.y {
        Some(Coord::new(if start.x < target.x { 1 } else { -1 }, 0))
    } else {
        None
    }
}

/// Per-tick read-only context shared by every component of the search
#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    board: &'a Board,
    fast_path: bool,
}

impl<'a> SearchContext<'a> {
    /// `fast_path` enables the abbreviated occupancy scan used on every
    /// `fast_path_interval`-th tick
    pub fn new(board: &'a Board, fast_path: bool) -> Self {
        SearchContext { board, fast_path }
    }

    /// Whether a straight move from `start` ends on `target` without leaving
    /// the board or crossing an occupied cell
    pub fn is_reachable(&self, start: Coord, target: Coord) -> bool {
        if !self.board.in_bounds(start) || !self.board.in_bounds(target) {
            return false;
        }

        let step = match axis_step(start, target) {
            Some(step) => step,
            None => return false,
        };

        let first = Coord::new(start.x + step.x, start.y + step.y);
        if self.fast_path {
            // Only the first and the last cell, the rest of the line is skipped
            return !self.board.is_occupied(first) && !self.board.is_occupied(target);
        }

        let mut cell = first;
        loop {
            if self.board.is_occupied(cell) {
                return false;
            }
            if cell == target {
                return true;
            }
            cell = Coord::new(cell.x + step.x, cell.y + step.y);
        }
    }

    /// Cells a move from `start` to `target` passes through, starting with
    /// `start`. Off-axis, null or off-board starts yield just `[start]`.
    ///
    /// On a fast-path tick the path is always `[start, start + step, target]`,
    /// which repeats the target when the move is a single cell.
    pub fn path(&self, start: Coord, target: Coord) -> Vec<Coord> {
        let mut path = vec![start];

        if !self.board.in_bounds(start) {
            return path;
        }

        let step = match axis_step(start, target) {
            Some(step) => step,
            None => return path,
        };

        let first = Coord::new(start.x + step.x, start.y + step.y);
        if self.fast_path {
            path.push(first);
            path.push(target);
            return path;
        }

        let len = (target.x - start.x).abs() + (target.y - start.y).abs();
        path.reserve(len as usize);
        let mut cell = first;
        for _ in 0..len {
            path.push(cell);
            cell = Coord::new(cell.x + step.x, cell.y + step.y);
        }
        path
    }

    /// Expands `command` from the given state, or `None` when it is illegal
    fn expand(
        &self,
        pos: Coord,
        direction: Direction,
        speed: i32,
        command: Command,
        target: Coord,
        depth: u32,
    ) -> Option<Box<MoveNode>> {
        if !self.is_reachable(pos, target) {
            return None;
        }

        let (next_direction, next_speed) = command.apply(direction, speed);
        let child = if depth <= 1 {
            MoveNode::leaf(target, next_direction, next_speed)
        } else {
            self.build_tree(target, next_direction, next_speed, depth - 1)
        };
        Some(Box::new(child))
    }

    /// Builds the move tree `depth` levels deep, sequentially
    pub fn build_tree(&self, pos: Coord, direction: Direction, speed: i32, depth: u32) -> MoveNode {
        let fields = candidate_fields(pos, direction, speed);
        let mut node = MoveNode::leaf(pos, direction, speed);

        for command in Command::ALL {
            node.children[command.index()] =
                self.expand(pos, direction, speed, command, fields[command.index()], depth);
        }
        node
    }

    /// Same tree as `build_tree`, with the five root branches built on the
    /// rayon pool. Deeper levels stay sequential.
    pub fn build_tree_parallel(
        &self,
        pos: Coord,
        direction: Direction,
        speed: i32,
        depth: u32,
    ) -> MoveNode {
        let fields = candidate_fields(pos, direction, speed);

        let branches: Vec<Option<Box<MoveNode>>> = Command::ALL
            .par_iter()
            .map(|&command| {
                self.expand(pos, direction, speed, command, fields[command.index()], depth)
            })
            .collect();

        let mut node = MoveNode::leaf(pos, direction, speed);
        for (slot, branch) in node.children.iter_mut().zip(branches) {
            *slot = branch;
        }
        node
    }
}

/// One future state of the controlled player.
///
/// `children[i]` is the state after `Command::ALL[i]`, or `None` when that
/// command is illegal. Leaves have no children at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveNode {
    pub position: Coord,
    pub direction: Direction,
    pub speed: i32,
    pub children: [Option<Box<MoveNode>>; 5],
}

impl MoveNode {
    fn leaf(position: Coord, direction: Direction, speed: i32) -> Self {
        MoveNode {
            position,
            direction,
            speed,
            children: [None, None, None, None, None],
        }
    }

    pub fn child(&self, command: Command) -> Option<&MoveNode> {
        self.children[command.index()].as_deref()
    }

    /// Legal commands from this node, in canonical order
    pub fn viable_commands(&self) -> impl Iterator<Item = Command> + '_ {
        Command::ALL
            .into_iter()
            .filter(move |&cmd| self.children[cmd.index()].is_some())
    }

    /// Number of nodes in this subtree, root included
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(|child| child.node_count())
            .sum::<usize>()
    }
}

/// Recursive mobility score of `node` with `depth` levels remaining.
///
/// At depth 1 this is the number of legal commands; above it every legal
/// child contributes `decay * score(child, depth - 1)`.
pub fn score(node: &MoveNode, depth: u32, decay: f64) -> f64 {
    if depth == 0 {
        return 0.0;
    }
    if depth == 1 {
        return node.viable_commands().count() as f64;
    }

    node.children
        .iter()
        .flatten()
        .map(|child| decay * score(child, depth - 1, decay))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(rows: &[&[i32]]) -> Board {
        let cells: Vec<Vec<i32>> = rows.iter().map(|r| r.to_vec()).collect();
        Board::from_cells(cells[0].len() as i32, cells.len() as i32, &cells).unwrap()
    }

    fn two_player_board() -> Board {
        board(&[
            &[0, 0, 0, 0, 0],
            &[0, 0, 1, 0, 0],
            &[0, 0, 0, 2, 0],
            &[0, 0, 0, 0, 0],
        ])
    }

    fn empty_board(width: usize, height: usize) -> Board {
        let cells = vec![vec![0; width]; height];
        Board::from_cells(width as i32, height as i32, &cells).unwrap()
    }

    #[test]
    fn test_candidate_fields_facing_up() {
        let fields = candidate_fields(Coord::new(2, 2), Direction::Up, 1);
        assert_eq!(fields[Command::TurnLeft.index()], Coord::new(1, 2));
        assert_eq!(fields[Command::TurnRight.index()], Coord::new(3, 2));
        assert_eq!(fields[Command::SlowDown.index()], Coord::new(2, 2));
        assert_eq!(fields[Command::SpeedUp.index()], Coord::new(2, 0));
        assert_eq!(fields[Command::ChangeNothing.index()], Coord::new(2, 1));
    }

    #[test]
    fn test_candidate_fields_facing_right() {
        let fields = candidate_fields(Coord::new(0, 0), Direction::Right, 1);
        assert_eq!(
            fields,
            [
                Coord::new(0, -1),
                Coord::new(0, 1),
                Coord::new(0, 0),
                Coord::new(2, 0),
                Coord::new(1, 0),
            ]
        );
    }

    #[test]
    fn test_candidate_fields_are_pure() {
        let a = candidate_fields(Coord::new(7, 3), Direction::Left, 4);
        let b = candidate_fields(Coord::new(7, 3), Direction::Left, 4);
        assert_eq!(a, b);
    }

    #[test]
    fn test_reachability_and_path_are_pure() {
        let board = two_player_board();
        let pairs = [
            (Coord::new(2, 1), Coord::new(4, 1)),
            (Coord::new(0, 0), Coord::new(0, 3)),
            (Coord::new(0, 0), Coord::new(4, 0)),
            (Coord::new(2, 1), Coord::new(3, 4)),
            (Coord::new(1, 1), Coord::new(1, 1)),
        ];

        for fast_path in [false, true] {
            let ctx = SearchContext::new(&board, fast_path);
            for (start, target) in pairs {
                let reachable = ctx.is_reachable(start, target);
                let path = ctx.path(start, target);
                for _ in 0..3 {
                    assert_eq!(ctx.is_reachable(start, target), reachable);
                    assert_eq!(ctx.path(start, target), path);
                }
            }
        }
    }

    #[test]
    fn test_reachability() {
        let board = two_player_board();
        let ctx = SearchContext::new(&board, false);

        assert!(ctx.is_reachable(Coord::new(2, 1), Coord::new(4, 1)));
        assert!(!ctx.is_reachable(Coord::new(2, 1), Coord::new(3, 4)));
        assert!(!ctx.is_reachable(Coord::new(2, 1), Coord::new(2, 1)));
        assert!(ctx.is_reachable(Coord::new(2, 1), Coord::new(2, 3)));
    }

    #[test]
    fn test_out_of_bounds_is_never_reachable() {
        let board = empty_board(5, 4);
        for fast_path in [false, true] {
            let ctx = SearchContext::new(&board, fast_path);
            assert!(!ctx.is_reachable(Coord::new(0, 0), Coord::new(-1, 0)));
            assert!(!ctx.is_reachable(Coord::new(4, 0), Coord::new(5, 0)));
            assert!(!ctx.is_reachable(Coord::new(0, 0), Coord::new(0, -2)));
            assert!(!ctx.is_reachable(Coord::new(0, 3), Coord::new(0, 4)));
            assert!(!ctx.is_reachable(Coord::new(-1, 0), Coord::new(1, 0)));
        }
    }

    #[test]
    fn test_off_axis_is_unreachable() {
        let board = empty_board(5, 4);
        let ctx = SearchContext::new(&board, false);
        assert!(!ctx.is_reachable(Coord::new(0, 0), Coord::new(1, 1)));
    }

    #[test]
    fn test_blocked_line_is_unreachable() {
        let board = board(&[&[0, 0, 1, 0, 0, 0]]);
        let ctx = SearchContext::new(&board, false);
        assert!(!ctx.is_reachable(Coord::new(0, 0), Coord::new(4, 0)));
        assert!(ctx.is_reachable(Coord::new(4, 0), Coord::new(3, 0)));
    }

    #[test]
    fn test_fast_path_skips_middle_of_line() {
        // Only the middle cell is occupied
        let board = board(&[&[0, 0, 1, 0, 0]]);
        let slow = SearchContext::new(&board, false);
        let fast = SearchContext::new(&board, true);

        assert!(!slow.is_reachable(Coord::new(0, 0), Coord::new(4, 0)));
        assert!(fast.is_reachable(Coord::new(0, 0), Coord::new(4, 0)));
        assert!(!fast.is_reachable(Coord::new(0, 0), Coord::new(2, 0)));
    }

    #[test]
    fn test_path_lengths() {
        let board = board(&[&[0, 0, 0, 0, 3], &[0, 0, 1, 0, 0], &[2, 0, 0, 0, 0]]);
        let slow = SearchContext::new(&board, false);
        let fast = SearchContext::new(&board, true);

        assert_eq!(slow.path(Coord::new(0, 4), Coord::new(0, 0)).len(), 1);
        assert_eq!(slow.path(Coord::new(0, 0), Coord::new(0, 0)).len(), 1);
        assert_eq!(slow.path(Coord::new(0, 1), Coord::new(2, 3)).len(), 1);

        assert_eq!(
            slow.path(Coord::new(0, 0), Coord::new(0, 2)),
            vec![Coord::new(0, 0), Coord::new(0, 1), Coord::new(0, 2)]
        );
        assert_eq!(fast.path(Coord::new(0, 0), Coord::new(0, 2)).len(), 3);
        assert_eq!(slow.path(Coord::new(0, 0), Coord::new(2, 0)).len(), 3);
        assert_eq!(fast.path(Coord::new(0, 0), Coord::new(2, 0)).len(), 3);
    }

    #[test]
    fn test_fast_path_collapses_long_paths() {
        let board = empty_board(12, 1);
        let slow = SearchContext::new(&board, false);
        let fast = SearchContext::new(&board, true);

        assert_eq!(slow.path(Coord::new(10, 0), Coord::new(1, 0)).len(), 10);
        assert_eq!(
            fast.path(Coord::new(10, 0), Coord::new(1, 0)),
            vec![Coord::new(10, 0), Coord::new(9, 0), Coord::new(1, 0)]
        );
        // A single-cell move repeats its target
        assert_eq!(
            fast.path(Coord::new(0, 0), Coord::new(1, 0)),
            vec![Coord::new(0, 0), Coord::new(1, 0), Coord::new(1, 0)]
        );
    }

    #[test]
    fn test_path_may_leave_the_board() {
        let board = empty_board(3, 3);
        let ctx = SearchContext::new(&board, false);
        assert_eq!(
            ctx.path(Coord::new(1, 0), Coord::new(1, -1)),
            vec![Coord::new(1, 0), Coord::new(1, -1)]
        );
    }

    #[test]
    fn test_tree_has_requested_depth() {
        let board = empty_board(30, 30);
        let ctx = SearchContext::new(&board, false);
        let root = ctx.build_tree(Coord::new(15, 15), Direction::Up, 1, 3);

        fn max_depth(node: &MoveNode) -> u32 {
            1 + node
                .children
                .iter()
                .flatten()
                .map(|c| max_depth(c))
                .max()
                .unwrap_or(0)
        }
        // Root plus three levels of children
        assert_eq!(max_depth(&root), 4);
    }

    #[test]
    fn test_child_state_follows_command() {
        let board = empty_board(10, 10);
        let ctx = SearchContext::new(&board, false);
        let root = ctx.build_tree(Coord::new(5, 5), Direction::Up, 2, 1);

        let left = root.child(Command::TurnLeft).unwrap();
        assert_eq!(left.position, Coord::new(3, 5));
        assert_eq!(left.direction, Direction::Left);
        assert_eq!(left.speed, 2);

        let up = root.child(Command::SpeedUp).unwrap();
        assert_eq!(up.position, Coord::new(5, 2));
        assert_eq!((up.direction, up.speed), (Direction::Up, 3));

        let slow = root.child(Command::SlowDown).unwrap();
        assert_eq!((slow.position, slow.speed), (Coord::new(5, 4), 1));

        // Leaves are not expanded
        assert_eq!(left.viable_commands().count(), 0);
    }

    #[test]
    fn test_speed_goes_negative_in_tree() {
        // Documents current behaviour: repeated SLOW_DOWN is never floored at 0
        let board = empty_board(10, 10);
        let ctx = SearchContext::new(&board, false);
        let root = ctx.build_tree(Coord::new(5, 5), Direction::Up, 2, 3);

        let once = root.child(Command::SlowDown).unwrap();
        assert_eq!(once.speed, 1);
        // Slowing from 1 lands on the start cell, which is never reachable
        assert!(once.child(Command::SlowDown).is_none());

        // From speed 0, SLOW_DOWN steps one cell backwards
        let root = ctx.build_tree(Coord::new(5, 5), Direction::Up, 0, 2);
        let negative = root.child(Command::SlowDown).unwrap();
        assert_eq!(negative.position, Coord::new(5, 6));
        assert_eq!(negative.speed, -1);
        assert_eq!(negative.direction, Direction::Up);
    }

    #[test]
    fn test_parallel_build_matches_sequential() {
        let board = two_player_board();
        let ctx = SearchContext::new(&board, false);
        let sequential = ctx.build_tree(Coord::new(2, 1), Direction::Right, 1, 5);
        let parallel = ctx.build_tree_parallel(Coord::new(2, 1), Direction::Right, 1, 5);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_score_at_depth_one_counts_moves() {
        let board = two_player_board();
        let ctx = SearchContext::new(&board, false);
        let root = ctx.build_tree(Coord::new(2, 1), Direction::Right, 1, 1);

        // Everything but the null SLOW_DOWN move is open
        assert_eq!(score(&root, 1, 0.1), 4.0);

        let corner = ctx.build_tree(Coord::new(0, 0), Direction::Up, 1, 1);
        let s = score(&corner, 1, 0.1);
        assert!((0.0..=5.0).contains(&s));
        assert_eq!(s, corner.viable_commands().count() as f64);
    }

    #[test]
    fn test_score_decays_per_level() {
        let board = empty_board(40, 40);
        let ctx = SearchContext::new(&board, false);
        let root = ctx.build_tree(Coord::new(20, 20), Direction::Down, 1, 2);

        // SLOW_DOWN is a null move at speed 1
        let expected: f64 = root
            .children
            .iter()
            .flatten()
            .map(|child| 0.1 * child.viable_commands().count() as f64)
            .sum();
        assert!((score(&root, 2, 0.1) - expected).abs() < 1e-12);
    }
}
