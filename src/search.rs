//! A time-bounded minimax agent for the computer opponent

use anyhow::anyhow;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::board::{Board, Cell, Coord, Player};
use crate::{HEIGHT, WIDTH};

/// Base score of a completed alignment, before the remaining depth bonus
pub const WIN_SCORE: i32 = 1000;

const CENTER_COLUMN: usize = WIDTH / 2;
const CENTER_BONUS: i32 = 3;

/// Returns the columns ordered from the middle outwards, left before right,
/// as the middle columns are often better moves
pub const fn move_order() -> [usize; WIDTH] {
    let mut move_order = [0; WIDTH];
    let mut i = 0;
    while i < WIDTH {
        move_order[i] = (WIDTH / 2) + (1 - i % 2) * (i / 2) - (i % 2) * (i / 2 + 1);
        i += 1;
    }
    move_order
}

/// Playable columns in search order
pub fn legal_columns(board: &Board) -> Vec<usize> {
    move_order()
        .iter()
        .copied()
        .filter(|&column| board.playable(column))
        .collect()
}

/// Strength setting of the computer opponent
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Name shown for the computer opponent
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "ROOKIE",
            Difficulty::Medium => "STANDARD",
            Difficulty::Hard => "BRUTAL",
        }
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" | "rookie" => Ok(Difficulty::Easy),
            "medium" | "standard" => Ok(Difficulty::Medium),
            "hard" | "brutal" => Ok(Difficulty::Hard),
            other => Err(anyhow!("unknown difficulty '{}'", other)),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(name)
    }
}

/// Depth and think-time limits of one difficulty tier
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    /// Maximum search depth in plies
    pub depth: u32,
    /// Wall-clock budget for one decision
    pub budget_ms: u64,
}

impl TierLimits {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub easy: TierLimits,
    pub medium: TierLimits,
    pub hard: TierLimits,
    /// Chance that the easy tier searches instead of playing a random column
    pub easy_search_probability: f64,
    /// How long to wait for a background search before searching inline
    pub watchdog_ms: u64,
}

impl SearchConfig {
    pub fn limits(&self, difficulty: Difficulty) -> TierLimits {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            easy: TierLimits {
                depth: 2,
                budget_ms: 120,
            },
            medium: TierLimits {
                depth: 4,
                budget_ms: 120,
            },
            hard: TierLimits {
                depth: 6,
                budget_ms: 250,
            },
            easy_search_probability: 0.3,
            watchdog_ms: 800,
        }
    }
}

/// Scores a window of four cells for `player`
fn score_window(window: [Cell; 4], player: Player) -> i32 {
    let own_cell = player.cell();
    let opp_cell = player.other().cell();
    let own = window.iter().filter(|&&c| c == own_cell).count();
    let opp = window.iter().filter(|&&c| c == opp_cell).count();
    let empty = window.iter().filter(|c| c.is_empty()).count();

    match (own, opp, empty) {
        (4, _, _) => 100,
        (_, 4, _) => -100,
        (3, _, 1) => 5,
        (2, _, 2) => 2,
        (_, 3, 1) => -4,
        _ => 0,
    }
}

/// Static evaluation of a position from `player`'s point of view
///
/// Sums [`score_window`] over every horizontal, vertical and diagonal run of
/// four cells, plus a bonus for each of the player's pieces in the centre column.
pub fn evaluate(board: &Board, player: Player) -> i32 {
    let own_cell = player.cell();
    let mut score = (0..HEIGHT)
        .filter(|&row| board.get(row, CENTER_COLUMN) == own_cell)
        .count() as i32
        * CENTER_BONUS;

    // (row step, column step, first row, last row, first column, last column)
    let runs: [(isize, isize, usize, usize, usize, usize); 4] = [
        (0, 1, 0, HEIGHT, 0, WIDTH - 3),
        (1, 0, 0, HEIGHT - 3, 0, WIDTH),
        (1, 1, 0, HEIGHT - 3, 0, WIDTH - 3),
        (1, -1, 0, HEIGHT - 3, 3, WIDTH),
    ];
    for &(dr, dc, row_start, row_end, column_start, column_end) in runs.iter() {
        for row in row_start..row_end {
            for column in column_start..column_end {
                let mut window = [Cell::Empty; 4];
                for (i, cell) in window.iter_mut().enumerate() {
                    let r = (row as isize + dr * i as isize) as usize;
                    let c = (column as isize + dc * i as isize) as usize;
                    *cell = board.get(r, c);
                }
                score += score_window(window, player);
            }
        }
    }
    score
}

/// Move picker for the computer opponent
///
/// # Notes
/// Immediate wins and forced blocks are always played. Otherwise the agent
/// runs a depth-limited minimax with alpha-beta pruning under a wall-clock
/// deadline; when either limit is hit the branch falls back to [`evaluate`].
/// The search is heuristic and makes no attempt at solving the position.
///
/// # Position Scoring
/// A position where the last placed piece completes four scores
/// `1000 + remaining depth` for the AI, or the negation for the opponent, so
/// faster wins and slower losses are preferred.
#[derive(Clone)]
pub struct Searcher {
    config: SearchConfig,
    rng: StdRng,

    /// The number of nodes searched by this `Searcher` so far (for diagnostics only)
    pub node_count: usize,
}

impl Searcher {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
            node_count: 0,
        }
    }

    /// Creates a `Searcher` whose random choices are reproducible
    pub fn with_seed(config: SearchConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            node_count: 0,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Picks a column for `ai` to play.
    ///
    /// Returns `None` only when the board is full, which callers treat as a draw.
    pub fn choose_move(
        &mut self,
        board: &Board,
        difficulty: Difficulty,
        ai: Player,
    ) -> Option<usize> {
        let columns = legal_columns(board);
        if columns.is_empty() {
            return None;
        }

        if let Some(column) = immediate_win(board, &columns, ai) {
            debug!(column, "taking immediate win");
            return Some(column);
        }
        if let Some(column) = immediate_win(board, &columns, ai.other()) {
            debug!(column, "blocking opponent win");
            return Some(column);
        }

        let limits = self.config.limits(difficulty);
        let deadline = Instant::now() + limits.budget();

        if difficulty == Difficulty::Easy
            && !self.rng.gen_bool(self.config.easy_search_probability.clamp(0.0, 1.0))
        {
            let column = columns[self.rng.gen_range(0..columns.len())];
            debug!(column, "easy tier random move");
            return Some(column);
        }

        let start_nodes = self.node_count;
        let (best, score) = self.minimax(
            *board,
            limits.depth,
            i32::MIN,
            i32::MAX,
            true,
            ai,
            None,
            deadline,
        );
        debug!(
            ?difficulty,
            column = ?best,
            score,
            nodes = self.node_count - start_nodes,
            "search finished"
        );
        // the deadline may expire before the root expands a single child
        best.or_else(|| columns.first().copied())
    }

    /// Performs the game tree search
    ///
    /// `last` is the piece placed just before this call; only it can have
    /// completed an alignment. Returns the best column at this node (if any
    /// child was searched) and the score of the position.
    #[allow(clippy::too_many_arguments)]
    fn minimax(
        &mut self,
        board: Board,
        depth: u32,
        mut alpha: i32,
        mut beta: i32,
        maximizing: bool,
        ai: Player,
        last: Option<Coord>,
        deadline: Instant,
    ) -> (Option<usize>, i32) {
        self.node_count += 1;

        if Instant::now() >= deadline {
            return (None, evaluate(&board, ai));
        }

        if let Some((row, column)) = last {
            if board.check_win(row, column).is_some() {
                let bonus = WIN_SCORE + depth as i32;
                let ai_won = board.get(row, column) == ai.cell();
                return (None, if ai_won { bonus } else { -bonus });
            }
        }

        let columns = legal_columns(&board);
        if depth == 0 || columns.is_empty() {
            return (None, evaluate(&board, ai));
        }

        let mover = if maximizing { ai } else { ai.other() };
        let mut best_column = None;
        let mut best_score = if maximizing { i32::MIN } else { i32::MAX };

        for column in columns {
            let mut next = board;
            let row = match next.drop_piece(column, mover) {
                Some(row) => row,
                None => continue,
            };
            let (_, score) = self.minimax(
                next,
                depth - 1,
                alpha,
                beta,
                !maximizing,
                ai,
                Some((row, column)),
                deadline,
            );

            if maximizing {
                if best_column.is_none() || score > best_score {
                    best_score = score;
                    best_column = Some(column);
                }
                alpha = alpha.max(score);
            } else {
                if best_column.is_none() || score < best_score {
                    best_score = score;
                    best_column = Some(column);
                }
                beta = beta.min(score);
            }
            // a perfect opponent will never let the game reach this branch
            if alpha >= beta {
                break;
            }
        }

        (best_column, best_score)
    }
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

/// The first column (in search order) where `player` completes four
fn immediate_win(board: &Board, columns: &[usize], player: Player) -> Option<usize> {
    columns.iter().copied().find(|&column| {
        let mut next = *board;
        match next.drop_piece(column, player) {
            Some(row) => next.check_win(row, column).is_some(),
            None => false,
        }
    })
}
