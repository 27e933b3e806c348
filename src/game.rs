//! Game state: board occupancy, piece movement/rotation, line clears, tick.

use crate::theme::Theme;
use thiserror::Error;

/// Points awarded per cleared line.
const POINTS_PER_LINE: u32 = 10;

/// Tetromino kinds (O, Z, S, I, T, L, J).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    O,
    Z,
    S,
    I,
    T,
    L,
    J,
}

impl ShapeKind {
    pub const ALL: [Self; 7] = [Self::O, Self::Z, Self::S, Self::I, Self::T, Self::L, Self::J];

    /// 4 cells relative to the spawn origin; each (dx, dy).
    /// The FIRST cell is the rotation pivot, so the order here matters.
    pub fn cells(&self) -> &[(i8, i8); 4] {
        match self {
            Self::O => &[(0, 0), (1, 0), (0, 1), (1, 1)],
            Self::Z => &[(0, 1), (1, 1), (1, 0), (2, 0)],
            Self::S => &[(0, 0), (1, 0), (1, 1), (2, 1)],
            Self::I => &[(0, 0), (0, 1), (0, 2), (0, 3)],
            Self::T => &[(1, 0), (0, 1), (1, 1), (2, 1)],
            Self::L => &[(0, 0), (1, 0), (2, 0), (2, 1)],
            Self::J => &[(0, 1), (1, 1), (2, 1), (2, 0)],
        }
    }

    /// Colour index 0..7 for theme.piece_color().
    pub fn color_index(&self) -> u8 {
        match self {
            Self::O => 0, // Yellow
            Self::Z => 1, // Red
            Self::S => 2, // Green
            Self::I => 3, // Cyan
            Self::T => 4, // Magenta
            Self::L => 5, // Orange
            Self::J => 6, // Blue
        }
    }
}

/// Supplies the next shape to spawn. Injected so tests can script sequences.
pub trait ShapeSource: std::fmt::Debug {
    fn next_shape(&mut self) -> ShapeKind;
}

/// Uniform random shape picker (seedable LCG).
#[derive(Debug, Clone)]
pub struct UniformShapes {
    state: u32,
}

impl UniformShapes {
    pub fn new() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0x1234_5678);
        Self::from_seed(nanos | 1)
    }

    pub fn from_seed(seed: u32) -> Self {
        Self { state: seed }
    }

    fn next_rand(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        self.state >> 16
    }
}

impl ShapeSource for UniformShapes {
    fn next_shape(&mut self) -> ShapeKind {
        ShapeKind::ALL[(self.next_rand() as usize) % ShapeKind::ALL.len()]
    }
}

impl Default for UniformShapes {
    fn default() -> Self {
        Self::new()
    }
}

/// Player intent delivered by the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    MoveLeft,
    MoveRight,
    SoftDrop,
    Rotate,
}

/// Outcome of one tick or intent, so the host loop can react
/// (flash cleared rows, drop key repeat, stop the gravity timer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The piece is still falling; it moved, or a blocked move was discarded.
    Falling,
    /// A blocked downward step locked the piece. `cleared` holds the indices
    /// of the rows that were removed (may be empty).
    Locked { cleared: Vec<usize> },
    /// The game is over; nothing changed.
    Ignored,
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("board dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: u16, height: u16 },
    #[error("tick interval must be positive")]
    InvalidTickInterval,
}

/// Active piece: 4 absolute grid coordinates plus a colour tag.
/// cells[0] is the rotation pivot. y may be negative while the piece is
/// still entering the board from above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub cells: [(i32, i32); 4],
    pub color: u8,
}

fn translated(cells: &[(i32, i32); 4], dx: i32, dy: i32) -> [(i32, i32); 4] {
    let mut out = *cells;
    for (x, y) in &mut out {
        *x += dx;
        *y += dy;
    }
    out
}

/// Board: W×H occupancy grid of frozen cells. y=0 is the top row.
#[derive(Debug, Clone)]
pub struct Board {
    pub width: i32,
    pub height: i32,
    /// rows[y][x] = occupied. rows[0] is the top.
    rows: Vec<Vec<bool>>,
}

impl Board {
    pub fn new(width: u16, height: u16) -> Self {
        let (w, h) = (usize::from(width), usize::from(height));
        Self {
            width: w as i32,
            height: h as i32,
            rows: vec![vec![false; w]; h],
        }
    }

    /// True if the frozen cell at (x, y) is occupied. Out-of-range is empty.
    #[inline]
    pub fn occupied(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return false;
        }
        self.rows[y as usize][x as usize]
    }

    /// True if every cell is inside the side/bottom bounds and free.
    /// Cells with y < 0 are exempt from the occupancy check (piece still
    /// entering from above) but still bounds-checked on x.
    pub fn fits(&self, cells: &[(i32, i32); 4]) -> bool {
        cells.iter().all(|&(x, y)| {
            x >= 0
                && x < self.width
                && y < self.height
                && !(y >= 0 && self.rows[y as usize][x as usize])
        })
    }

    /// Mark the cells with y >= 0 occupied; cells above the board are dropped.
    pub fn freeze(&mut self, cells: &[(i32, i32); 4]) {
        for &(x, y) in cells {
            if x >= 0 && x < self.width && y >= 0 && y < self.height {
                self.rows[y as usize][x as usize] = true;
            }
        }
    }

    /// Remove every fully-occupied row in one pass, keeping the relative
    /// order of surviving rows and re-padding with empty rows at the top.
    /// Returns the indices of the removed rows.
    pub fn clear_full_rows(&mut self) -> Vec<usize> {
        let full: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(|&c| c))
            .map(|(y, _)| y)
            .collect();
        if !full.is_empty() {
            let w = self.width as usize;
            self.rows.retain(|row| row.iter().any(|&c| !c));
            for _ in 0..full.len() {
                self.rows.insert(0, vec![false; w]);
            }
        }
        full
    }

    /// Empty every cell, keeping dimensions.
    pub fn clear(&mut self) {
        for row in &mut self.rows {
            row.fill(false);
        }
    }
}

/// Game state: board, current piece, score, game-over flag.
///
/// All mutation happens through `handle_intent`, `tick`, and `restart`;
/// each call is atomic with respect to the board, so the rendering layer
/// only ever observes complete states.
#[derive(Debug)]
pub struct GameState {
    pub theme: Theme,
    pub board: Board,
    pub piece: Option<Piece>,
    pub score: u32,
    pub lines_cleared: u32,
    pub game_over: bool,
    spawn_col: i32,
    shapes: Box<dyn ShapeSource>,
}

impl GameState {
    /// Build a fresh game and spawn the first piece.
    /// Fails fast on a configuration the board invariants cannot hold under.
    pub fn new(
        theme: Theme,
        config: &crate::GameConfig,
        shapes: Box<dyn ShapeSource>,
    ) -> Result<Self, GameError> {
        if config.width == 0 || config.height == 0 {
            return Err(GameError::InvalidDimensions {
                width: config.width,
                height: config.height,
            });
        }
        if config.tick_interval_ms == 0 {
            return Err(GameError::InvalidTickInterval);
        }
        let mut state = Self {
            theme,
            board: Board::new(config.width, config.height),
            piece: None,
            score: 0,
            lines_cleared: 0,
            game_over: false,
            spawn_col: i32::from(config.width / 2),
            shapes,
        };
        state.spawn();
        Ok(state)
    }

    /// Full reset: empty grid, score 0, fresh piece. The shape source keeps
    /// its sequence, so a seeded session stays reproducible across restarts.
    pub fn restart(&mut self) {
        self.board.clear();
        self.score = 0;
        self.lines_cleared = 0;
        self.game_over = false;
        self.spawn();
    }

    /// Apply a player intent. No-op once the game is over.
    pub fn handle_intent(&mut self, intent: Intent) -> Step {
        if self.game_over {
            return Step::Ignored;
        }
        match intent {
            Intent::MoveLeft => self.move_piece(-1, 0),
            Intent::MoveRight => self.move_piece(1, 0),
            Intent::SoftDrop => self.move_piece(0, 1),
            Intent::Rotate => {
                self.rotate_piece();
                Step::Falling
            }
        }
    }

    /// One forced downward step. No-op once the game is over; the caller
    /// should stop the gravity timer when it sees `Step::Ignored`.
    pub fn tick(&mut self) -> Step {
        if self.game_over {
            return Step::Ignored;
        }
        self.move_piece(0, 1)
    }

    /// Colour for the given piece from the current theme.
    pub fn piece_color(&self, piece: &Piece) -> ratatui::style::Color {
        self.theme.piece_color(piece.color)
    }

    /// Spawn a new piece at the spawn column. If it does not fit, the game
    /// is over; the colliding piece stays current so the renderer shows the
    /// overlap.
    fn spawn(&mut self) {
        let kind = self.shapes.next_shape();
        let mut cells = [(0i32, 0i32); 4];
        for (slot, &(dx, dy)) in cells.iter_mut().zip(kind.cells()) {
            *slot = (self.spawn_col + i32::from(dx), i32::from(dy));
        }
        if !self.board.fits(&cells) {
            self.game_over = true;
        }
        self.piece = Some(Piece {
            cells,
            color: kind.color_index(),
        });
    }

    /// Translate the piece by (dx, dy) if the target fits. A blocked
    /// downward step locks the piece, clears lines, and spawns the next
    /// piece; a blocked horizontal step is discarded.
    fn move_piece(&mut self, dx: i32, dy: i32) -> Step {
        let candidate = match &self.piece {
            Some(p) => translated(&p.cells, dx, dy),
            None => return Step::Falling,
        };
        if self.board.fits(&candidate) {
            if let Some(p) = &mut self.piece {
                p.cells = candidate;
            }
            return Step::Falling;
        }
        if (dx, dy) != (0, 1) {
            return Step::Falling;
        }
        if let Some(p) = self.piece.take() {
            self.board.freeze(&p.cells);
        }
        let cleared = self.board.clear_full_rows();
        self.score += cleared.len() as u32 * POINTS_PER_LINE;
        self.lines_cleared += cleared.len() as u32;
        self.spawn();
        Step::Locked { cleared }
    }

    /// Rotate 90° about the piece's first coordinate. If the rotated set
    /// does not fit, kick one column left, then one right; if neither fits
    /// the rotation is discarded.
    fn rotate_piece(&mut self) {
        let rotated = match &self.piece {
            Some(p) => {
                let (px, py) = p.cells[0];
                let mut out = [(0i32, 0i32); 4];
                for (slot, &(x, y)) in out.iter_mut().zip(&p.cells) {
                    *slot = (px + (y - py), py - (x - px));
                }
                out
            }
            None => return,
        };
        for shift in [0, -1, 1] {
            let candidate = translated(&rotated, shift, 0);
            if self.board.fits(&candidate) {
                if let Some(p) = &mut self.piece {
                    p.cells = candidate;
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameConfig;
    use std::collections::VecDeque;

    #[derive(Debug)]
    struct Scripted(VecDeque<ShapeKind>);

    impl ShapeSource for Scripted {
        fn next_shape(&mut self) -> ShapeKind {
            self.0.pop_front().unwrap_or(ShapeKind::O)
        }
    }

    fn config(width: u16, height: u16) -> GameConfig {
        GameConfig {
            width,
            height,
            tick_interval_ms: 500,
            seed: None,
        }
    }

    fn state_with(shapes: &[ShapeKind]) -> GameState {
        GameState::new(
            Theme::default(),
            &config(10, 22),
            Box::new(Scripted(shapes.iter().copied().collect())),
        )
        .unwrap()
    }

    fn fill_row_except(board: &mut Board, y: i32, gap: i32) {
        for x in 0..board.width {
            if x != gap {
                board.freeze(&[(x, y); 4]);
            }
        }
    }

    fn piece_cells(state: &GameState) -> [(i32, i32); 4] {
        state.piece.as_ref().unwrap().cells
    }

    #[test]
    fn test_fits_bounds_and_overlap() {
        let mut board = Board::new(10, 22);
        assert!(board.fits(&[(0, 0), (1, 0), (2, 0), (3, 0)]));
        assert!(!board.fits(&[(-1, 0), (0, 0), (1, 0), (2, 0)]));
        assert!(!board.fits(&[(7, 0), (8, 0), (9, 0), (10, 0)]));
        assert!(!board.fits(&[(5, 19), (5, 20), (5, 21), (5, 22)]));
        // y < 0 is fine while entering from above
        assert!(board.fits(&[(5, -1), (5, 0), (5, 1), (5, 2)]));
        board.freeze(&[(5, 0); 4]);
        assert!(!board.fits(&[(5, 0), (6, 0), (5, 1), (6, 1)]));
        // occupancy only checked at y >= 0
        assert!(board.fits(&[(5, -2), (5, -1), (6, 0), (7, 0)]));
    }

    #[test]
    fn test_freeze_drops_cells_above_board() {
        let mut board = Board::new(10, 22);
        board.freeze(&[(5, -1), (5, 0), (5, 1), (5, 2)]);
        assert!(board.occupied(5, 0));
        assert!(board.occupied(5, 1));
        assert!(board.occupied(5, 2));
        assert!(!board.occupied(5, 3));
    }

    #[test]
    fn test_clear_full_rows_preserves_order() {
        let mut board = Board::new(10, 22);
        board.freeze(&[(3, 19); 4]);
        fill_row_except(&mut board, 20, -1);
        fill_row_except(&mut board, 21, -1);
        let cleared = board.clear_full_rows();
        assert_eq!(cleared, vec![20, 21]);
        // marker shifted down by the two removed rows below it
        assert!(board.occupied(3, 21));
        assert!(!board.occupied(3, 19));
        for x in 0..10 {
            assert!(!board.occupied(x, 0));
            assert!(!board.occupied(x, 1));
        }
    }

    #[test]
    fn test_clear_full_rows_empty_board_is_noop() {
        let mut board = Board::new(10, 22);
        assert!(board.clear_full_rows().is_empty());
    }

    #[test]
    fn test_i_piece_falls_to_bottom() {
        let mut state = state_with(&[ShapeKind::I, ShapeKind::O]);
        assert_eq!(piece_cells(&state), [(5, 0), (5, 1), (5, 2), (5, 3)]);
        for _ in 0..18 {
            assert_eq!(state.tick(), Step::Falling);
        }
        assert_eq!(piece_cells(&state), [(5, 18), (5, 19), (5, 20), (5, 21)]);
        assert_eq!(state.tick(), Step::Locked { cleared: vec![] });
        for y in 18..22 {
            assert!(state.board.occupied(5, y));
        }
        assert!(!state.game_over);
        // next scripted piece spawned at the spawn column
        assert_eq!(piece_cells(&state), [(5, 0), (6, 0), (5, 1), (6, 1)]);
    }

    #[test]
    fn test_gap_fill_clears_line_and_scores() {
        let mut state = state_with(&[ShapeKind::I, ShapeKind::O]);
        fill_row_except(&mut state.board, 21, 5);
        for _ in 0..19 {
            state.tick();
        }
        assert_eq!(state.score, 10);
        assert_eq!(state.lines_cleared, 1);
        // the cleared row took the bottom I cell with it; the rest shifted down
        assert!(!state.board.occupied(0, 21));
        assert!(state.board.occupied(5, 21));
        assert!(state.board.occupied(5, 20));
        assert!(state.board.occupied(5, 19));
        assert!(!state.board.occupied(5, 18));
        for x in 0..10 {
            assert!(!state.board.occupied(x, 0));
        }
    }

    #[test]
    fn test_double_line_clear_in_one_pass() {
        let mut state = state_with(&[ShapeKind::I, ShapeKind::O]);
        fill_row_except(&mut state.board, 20, 5);
        fill_row_except(&mut state.board, 21, 5);
        let mut last = Step::Falling;
        for _ in 0..19 {
            last = state.tick();
        }
        assert_eq!(
            last,
            Step::Locked {
                cleared: vec![20, 21]
            }
        );
        assert_eq!(state.score, 20);
        assert_eq!(state.lines_cleared, 2);
        assert!(state.board.occupied(5, 20));
        assert!(state.board.occupied(5, 21));
        assert!(!state.board.occupied(5, 19));
        assert!(!state.board.occupied(0, 21));
    }

    #[test]
    fn test_blocked_horizontal_move_is_discarded() {
        let mut state = state_with(&[ShapeKind::I]);
        for _ in 0..5 {
            state.handle_intent(Intent::MoveLeft);
        }
        assert_eq!(piece_cells(&state), [(0, 0), (0, 1), (0, 2), (0, 3)]);
        assert_eq!(state.handle_intent(Intent::MoveLeft), Step::Falling);
        assert_eq!(piece_cells(&state), [(0, 0), (0, 1), (0, 2), (0, 3)]);
        assert_eq!(state.score, 0);
    }

    #[test]
    fn test_soft_drop_is_one_downward_step() {
        let mut state = state_with(&[ShapeKind::I]);
        assert_eq!(state.handle_intent(Intent::SoftDrop), Step::Falling);
        assert_eq!(piece_cells(&state), [(5, 1), (5, 2), (5, 3), (5, 4)]);
    }

    #[test]
    fn test_rotation_pivots_on_first_cell() {
        let mut state = state_with(&[ShapeKind::I]);
        state.handle_intent(Intent::Rotate);
        assert_eq!(piece_cells(&state), [(5, 0), (6, 0), (7, 0), (8, 0)]);
    }

    #[test]
    fn test_rotation_may_leave_cells_above_board() {
        let mut state = state_with(&[ShapeKind::T]);
        assert_eq!(piece_cells(&state), [(6, 0), (5, 1), (6, 1), (7, 1)]);
        state.handle_intent(Intent::Rotate);
        assert_eq!(piece_cells(&state), [(6, 0), (7, 1), (7, 0), (7, -1)]);
    }

    #[test]
    fn test_rotation_unshifted_when_it_fits() {
        let mut state = state_with(&[ShapeKind::O]);
        state.piece.as_mut().unwrap().cells = [(4, 10), (5, 10), (4, 11), (5, 11)];
        state.handle_intent(Intent::Rotate);
        assert_eq!(piece_cells(&state), [(4, 10), (4, 9), (5, 10), (5, 9)]);
    }

    #[test]
    fn test_wall_kick_left_shift() {
        let mut state = state_with(&[ShapeKind::O]);
        state.piece.as_mut().unwrap().cells = [(4, 10), (5, 10), (4, 11), (5, 11)];
        // blocks the unshifted rotation and the +1 kick, leaves -1 free
        state.board.freeze(&[(5, 9); 4]);
        state.handle_intent(Intent::Rotate);
        assert_eq!(piece_cells(&state), [(3, 10), (3, 9), (4, 10), (4, 9)]);
    }

    #[test]
    fn test_wall_kick_right_shift() {
        let mut state = state_with(&[ShapeKind::O]);
        state.piece.as_mut().unwrap().cells = [(4, 10), (5, 10), (4, 11), (5, 11)];
        // blocks the unshifted rotation and the -1 kick, leaves +1 free
        state.board.freeze(&[(4, 9); 4]);
        state.handle_intent(Intent::Rotate);
        assert_eq!(piece_cells(&state), [(5, 10), (5, 9), (6, 10), (6, 9)]);
    }

    #[test]
    fn test_rotation_noop_when_no_candidate_fits() {
        let mut state = state_with(&[ShapeKind::O]);
        state.piece.as_mut().unwrap().cells = [(4, 10), (5, 10), (4, 11), (5, 11)];
        state.board.freeze(&[(4, 9); 4]);
        state.board.freeze(&[(5, 9); 4]);
        state.handle_intent(Intent::Rotate);
        assert_eq!(piece_cells(&state), [(4, 10), (5, 10), (4, 11), (5, 11)]);
    }

    #[test]
    fn test_rotation_noop_at_right_wall() {
        let mut state = state_with(&[ShapeKind::I]);
        for _ in 0..4 {
            state.handle_intent(Intent::MoveRight);
        }
        assert_eq!(piece_cells(&state), [(9, 0), (9, 1), (9, 2), (9, 3)]);
        // rotated spans columns 9..=12; neither kick brings it in bounds
        state.handle_intent(Intent::Rotate);
        assert_eq!(piece_cells(&state), [(9, 0), (9, 1), (9, 2), (9, 3)]);
    }

    #[test]
    fn test_spawn_collision_ends_game() {
        let mut state = state_with(&[ShapeKind::I, ShapeKind::I, ShapeKind::O]);
        for _ in 0..4 {
            state.handle_intent(Intent::MoveRight);
        }
        // pre-occupy the spawn region before the first piece locks
        state.board.freeze(&[(5, 0), (5, 1), (6, 0), (6, 1)]);
        for _ in 0..19 {
            state.tick();
        }
        // the second I spawned into the occupied column
        assert!(state.game_over);
        assert_eq!(piece_cells(&state), [(5, 0), (5, 1), (5, 2), (5, 3)]);

        // nothing mutates after game over except restart
        let score = state.score;
        assert_eq!(state.tick(), Step::Ignored);
        assert_eq!(state.handle_intent(Intent::MoveLeft), Step::Ignored);
        assert_eq!(state.handle_intent(Intent::Rotate), Step::Ignored);
        assert_eq!(state.score, score);
        assert!(state.board.occupied(9, 18));
        assert_eq!(piece_cells(&state), [(5, 0), (5, 1), (5, 2), (5, 3)]);
    }

    #[test]
    fn test_restart_resets_everything() {
        let mut state = state_with(&[ShapeKind::I, ShapeKind::I, ShapeKind::O]);
        for _ in 0..4 {
            state.handle_intent(Intent::MoveRight);
        }
        state.board.freeze(&[(5, 0), (5, 1), (6, 0), (6, 1)]);
        for _ in 0..19 {
            state.tick();
        }
        assert!(state.game_over);

        state.restart();
        assert!(!state.game_over);
        assert_eq!(state.score, 0);
        assert_eq!(state.lines_cleared, 0);
        for y in 0..22 {
            for x in 0..10 {
                assert!(!state.board.occupied(x, y));
            }
        }
        assert_eq!(piece_cells(&state), [(5, 0), (6, 0), (5, 1), (6, 1)]);
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let shapes = || Box::new(Scripted(VecDeque::new())) as Box<dyn ShapeSource>;
        assert!(matches!(
            GameState::new(Theme::default(), &config(0, 22), shapes()),
            Err(GameError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            GameState::new(Theme::default(), &config(10, 0), shapes()),
            Err(GameError::InvalidDimensions { .. })
        ));
        let bad_tick = GameConfig {
            width: 10,
            height: 22,
            tick_interval_ms: 0,
            seed: None,
        };
        assert!(matches!(
            GameState::new(Theme::default(), &bad_tick, shapes()),
            Err(GameError::InvalidTickInterval)
        ));
    }

    #[test]
    fn test_uniform_shapes_seed_is_deterministic() {
        let mut a = UniformShapes::from_seed(42);
        let mut b = UniformShapes::from_seed(42);
        for _ in 0..32 {
            assert_eq!(a.next_shape(), b.next_shape());
        }
    }

    #[test]
    fn test_spawn_column_scales_with_width() {
        let state = GameState::new(
            Theme::default(),
            &config(6, 22),
            Box::new(Scripted(VecDeque::from([ShapeKind::I]))),
        )
        .unwrap();
        assert_eq!(piece_cells(&state), [(3, 0), (3, 1), (3, 2), (3, 3)]);
    }
}
