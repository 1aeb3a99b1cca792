//! Property tests for the game state machine.
//!
//! Invariants covered:
//! - No command sequence commits an overlapping or out-of-bounds piece.
//! - Score only grows, in steps of 10 per lock.
//! - Level stays within `[MIN_LEVEL, max_level]` and `max_level` never rises.
//! - Locked cells always come from the palette.
//! - Compaction is idempotent and keeps non-empty rows in order.
//! - Four quarter turns restore any 4x4 shape.

use proptest::prelude::*;

use blockfall::game::MIN_LEVEL;
use blockfall::{GameConfig, GameState, Grid, RandomPieceSource, Shape};

#[derive(Clone, Copy, Debug)]
enum Command {
    Left,
    Right,
    Rotate,
    Drop,
    SlideDown,
    Step,
    Faster,
    Slower,
}

fn command() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::Left),
        Just(Command::Right),
        Just(Command::Rotate),
        Just(Command::Drop),
        Just(Command::SlideDown),
        Just(Command::Step),
        Just(Command::Faster),
        Just(Command::Slower),
    ]
}

fn apply(game: &mut GameState, command: Command) {
    match command {
        Command::Left => {
            game.move_left();
        }
        Command::Right => {
            game.move_right();
        }
        Command::Rotate => {
            game.rotate();
        }
        Command::Drop => {
            game.hard_drop();
        }
        Command::SlideDown => {
            game.slide_down();
        }
        Command::Step => game.step(),
        Command::Faster => game.level_up(),
        Command::Slower => game.level_down(),
    }
}

fn grid_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    (1usize..8).prop_flat_map(|width| {
        prop::collection::vec(prop::collection::vec(0u8..3, width), 1..12)
    })
}

fn non_empty_rows(grid: &Grid) -> Vec<Vec<u8>> {
    grid.rows()
        .filter(|row| row.iter().any(|&c| c != 0))
        .map(<[u8]>::to_vec)
        .collect()
}

proptest! {
    #[test]
    fn command_sequences_respect_core_invariants(
        seed in any::<u64>(),
        width in 4usize..12,
        height in 4usize..24,
        commands in prop::collection::vec(command(), 1..300),
    ) {
        let config = GameConfig::new(width, height, 7).unwrap();
        let mut game =
            GameState::with_source(config, Box::new(RandomPieceSource::seeded(seed))).unwrap();
        let mut max_level = game.max_level();
        let mut score = game.score();

        for command in commands {
            apply(&mut game, command);

            if !game.is_finished() {
                prop_assert!(game.is_position_valid(game.position()));
            }
            prop_assert!(game.score() >= score);
            prop_assert_eq!(game.score() % 10, 0);
            prop_assert!(game.level() >= MIN_LEVEL);
            prop_assert!(game.level() <= game.max_level());
            prop_assert!(game.max_level() <= max_level);
            prop_assert!(game.grid().rows().flatten().all(|&c| c < game.max_colors()));

            score = game.score();
            max_level = game.max_level();
        }
    }

    #[test]
    fn compaction_is_idempotent_and_ordered(rows in grid_strategy()) {
        let mut grid = Grid::from_rows(rows).unwrap();
        let before = non_empty_rows(&grid);

        grid.compact_down();
        let once = grid.clone();
        grid.compact_down();

        prop_assert_eq!(&grid, &once);
        prop_assert_eq!(non_empty_rows(&grid), before.clone());

        // Every empty row sits above every non-empty one.
        let first_filled = (0..grid.height())
            .find(|&row| !grid.is_row_empty(row))
            .unwrap_or(grid.height());
        prop_assert_eq!(first_filled, grid.height() - before.len());
    }

    #[test]
    fn clearing_removes_exactly_the_full_rows(rows in grid_strategy()) {
        let mut grid = Grid::from_rows(rows).unwrap();
        let full = (0..grid.height()).filter(|&row| grid.is_row_full(row)).count();
        let survivors: Vec<Vec<u8>> = grid
            .rows()
            .filter(|row| row.iter().any(|&c| c != 0) && row.iter().any(|&c| c == 0))
            .map(<[u8]>::to_vec)
            .collect();

        prop_assert_eq!(grid.clear_full_rows(), full);
        grid.compact_down();

        prop_assert_eq!(non_empty_rows(&grid), survivors);
    }

    #[test]
    fn four_turns_restore_any_shape(
        cells in prop::array::uniform4(prop::array::uniform4(0u8..4)),
    ) {
        let shape = Shape::new(cells);
        prop_assert_eq!(shape.rotated().rotated().rotated().rotated(), shape);
        prop_assert_eq!(shape.rotated().occupied().count(), shape.occupied().count());
    }
}
