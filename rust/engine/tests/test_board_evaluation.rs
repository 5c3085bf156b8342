use tictac_engine::board::{Board, CELL_COUNT};
use tictac_engine::mark::{Mark, Winner};
use tictac_engine::rules::{evaluate, Outcome, WINNING_LINES};

fn board_from_index(mut code: u32) -> Board {
    let mut cells = [None; CELL_COUNT];
    for cell in cells.iter_mut() {
        *cell = match code % 3 {
            0 => None,
            1 => Some(Mark::X),
            _ => Some(Mark::O),
        };
        code /= 3;
    }
    Board::from_cells(cells)
}

fn has_line(board: &Board) -> bool {
    let cells = board.cells();
    WINNING_LINES
        .iter()
        .any(|[a, b, c]| cells[*a].is_some() && cells[*a] == cells[*b] && cells[*b] == cells[*c])
}

#[test]
fn evaluate_is_deterministic_for_every_board() {
    for code in 0..3u32.pow(9) {
        let board = board_from_index(code);
        assert_eq!(evaluate(&board), evaluate(&board), "board {:?}", board);
    }
}

#[test]
fn full_boards_without_a_line_are_draws() {
    let mut draws = 0;
    for code in 0..3u32.pow(9) {
        let board = board_from_index(code);
        if board.is_full() && !has_line(&board) {
            assert_eq!(evaluate(&board), Outcome::Draw);
            draws += 1;
        }
    }
    assert!(draws > 0);
}

#[test]
fn boards_with_a_line_always_report_a_winner() {
    for code in 0..3u32.pow(9) {
        let board = board_from_index(code);
        let outcome = evaluate(&board);
        if has_line(&board) {
            assert!(matches!(outcome, Outcome::Won(_)), "board {:?}", board);
        } else if !board.is_full() {
            assert_eq!(outcome, Outcome::InProgress);
        }
    }
}

#[test]
fn top_row_scenario_is_won_by_x() {
    let mut board = Board::new();
    for (cell, mark) in [
        (2, Mark::X),
        (4, Mark::O),
        (0, Mark::X),
        (6, Mark::O),
        (1, Mark::X),
    ] {
        board.place(cell, mark).expect("empty cell");
    }
    assert_eq!(evaluate(&board).winner(), Some(Winner::X));
    assert_eq!(
        board.cells(),
        &[
            Some(Mark::X),
            Some(Mark::X),
            Some(Mark::X),
            None,
            Some(Mark::O),
            None,
            Some(Mark::O),
            None,
            None
        ]
    );
}
