#[cfg(test)]
pub mod test {
    use anyhow::{anyhow, Result};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rayon::prelude::*;
    use std::collections::VecDeque;
    use std::time::{Duration, Instant};

    use crate::board::{Board, Cell, Coord, Outcome, Player};
    use crate::error::MoveError;
    use crate::local_match::LocalMatch;
    use crate::search::{legal_columns, Difficulty, SearchConfig, Searcher, TierLimits};
    use crate::worker::{InlineSearch, MoveSource};
    use crate::{HEIGHT, WIDTH};

    /// Plays `moves` random drops from the empty board, returning the position
    /// and the player to move, or `None` if the game ended on the way
    fn random_position(rng: &mut StdRng, moves: usize) -> Option<(Board, Player)> {
        let mut board = Board::new();
        let mut player = Player::One;
        for _ in 0..moves {
            let columns = legal_columns(&board);
            if columns.is_empty() {
                return None;
            }
            let column = columns[rng.gen_range(0..columns.len())];
            let row = board.drop_piece(column, player)?;
            if board.check_win(row, column).is_some() {
                return None;
            }
            player = player.other();
        }
        Some((board, player))
    }

    /// Stacks `players` bottom to top in `column`
    fn stack(board: &mut Board, column: usize, players: &[Player]) -> Result<usize> {
        let mut last = 0;
        for &player in players {
            last = board
                .drop_piece(column, player)
                .ok_or_else(|| anyhow!("column {} full", column))?;
        }
        Ok(last)
    }

    fn sorted(mut line: Vec<Coord>) -> Vec<Coord> {
        line.sort();
        line
    }

    fn fast_config() -> SearchConfig {
        let limits = TierLimits {
            depth: 4,
            budget_ms: 30,
        };
        SearchConfig {
            easy: limits,
            medium: limits,
            hard: limits,
            ..SearchConfig::default()
        }
    }

    /// Replays a fixed list of columns
    struct Scripted(VecDeque<usize>);

    impl MoveSource for Scripted {
        fn choose_move(&mut self, _: &Board, _: Difficulty, _: Player) -> Option<usize> {
            self.0.pop_front()
        }
    }

    #[test]
    pub fn drops_stay_bottom_contiguous() -> Result<()> {
        (0..64u64).into_par_iter().for_each(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut board = Board::new();
            let mut player = Player::One;
            loop {
                let columns = legal_columns(&board);
                if columns.is_empty() {
                    break;
                }
                let column = columns[rng.gen_range(0..columns.len())];
                board.drop_piece(column, player);
                player = player.other();

                for c in 0..WIDTH {
                    let filled = (0..HEIGHT).filter(|&r| !board.get(r, c).is_empty()).count();
                    // the lowest `filled` rows hold pieces, everything above is empty
                    for r in 0..HEIGHT {
                        assert_eq!(board.get(r, c).is_empty(), r < HEIGHT - filled);
                    }
                }
            }
            assert!(board.is_full());
            assert_eq!(board.num_pieces(), WIDTH * HEIGHT);
        });
        Ok(())
    }

    /// Whether some in-bounds run of four through `(row, column)` is all one colour
    fn window_through(board: &Board, row: usize, column: usize) -> bool {
        let cell = board.get(row, column);
        if cell.is_empty() {
            return false;
        }
        let directions = [(0i32, 1i32), (1, 0), (1, 1), (1, -1)];
        directions.iter().any(|&(dr, dc)| {
            (-3..=0).any(|offset| {
                (0..4).all(|step| {
                    let r = row as i32 + (offset + step) * dr;
                    let c = column as i32 + (offset + step) * dc;
                    (0..HEIGHT as i32).contains(&r)
                        && (0..WIDTH as i32).contains(&c)
                        && board.get(r as usize, c as usize) == cell
                })
            })
        })
    }

    #[test]
    pub fn check_win_matches_a_window_scan() -> Result<()> {
        let start = Instant::now();
        let wins: usize = (0..256u64)
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut board = Board::new();
                // colours are random so most boards hold several lines
                for _ in 0..rng.gen_range(0..=WIDTH * HEIGHT) {
                    let columns = legal_columns(&board);
                    let column = columns[rng.gen_range(0..columns.len())];
                    let player = if rng.gen() { Player::One } else { Player::Two };
                    board.drop_piece(column, player);
                }

                let mut wins = 0;
                for row in 0..HEIGHT {
                    for column in 0..WIDTH {
                        let found = board.check_win(row, column);
                        assert_eq!(
                            found.is_some(),
                            window_through(&board, row, column),
                            "cell ({}, {}) of seed {}:\n{:?}",
                            row,
                            column,
                            seed,
                            board
                        );
                        if let Some(line) = found {
                            assert!(line.contains(&(row, column)));
                            assert!(line
                                .iter()
                                .all(|&(r, c)| board.get(r, c) == board.get(row, column)));
                            wins += 1;
                        }
                    }
                }
                wins
            })
            .sum();
        println!("{} winning cells checked in {:?}", wins, start.elapsed());
        assert!(wins > 0);
        Ok(())
    }

    #[test]
    pub fn horizontal_win_at_the_left_edge() -> Result<()> {
        let mut board = Board::from_moves("112233")?;
        let row = board
            .drop_piece(3, Player::One)
            .ok_or_else(|| anyhow!("column full"))?;
        let line = board
            .check_win(row, 3)
            .ok_or_else(|| anyhow!("no win found"))?;
        assert_eq!(
            sorted(line.to_vec()),
            vec![(5, 0), (5, 1), (5, 2), (5, 3)]
        );
        Ok(())
    }

    #[test]
    pub fn vertical_win() -> Result<()> {
        let mut board = Board::from_moves("121212")?;
        let row = board
            .drop_piece(0, Player::One)
            .ok_or_else(|| anyhow!("column full"))?;
        assert_eq!(
            board.check_win(row, 0),
            Some([(2, 0), (3, 0), (4, 0), (5, 0)])
        );
        Ok(())
    }

    #[test]
    pub fn rising_diagonal_win() -> Result<()> {
        use Player::*;
        let mut board = Board::new();
        stack(&mut board, 0, &[One])?;
        stack(&mut board, 1, &[Two, One])?;
        stack(&mut board, 2, &[Two, Two, One])?;
        assert_eq!(board.check_win(3, 2), None);
        let row = stack(&mut board, 3, &[Two, Two, Two, One])?;
        assert_eq!(
            board.check_win(row, 3),
            Some([(2, 3), (3, 2), (4, 1), (5, 0)])
        );
        Ok(())
    }

    #[test]
    pub fn falling_diagonal_win_at_the_right_edge() -> Result<()> {
        use Player::*;
        let mut board = Board::new();
        stack(&mut board, 6, &[Two])?;
        stack(&mut board, 5, &[One, Two])?;
        stack(&mut board, 4, &[One, One, Two])?;
        let row = stack(&mut board, 3, &[One, One, One, Two])?;
        let line = board
            .check_win(row, 3)
            .ok_or_else(|| anyhow!("no win found"))?;
        assert_eq!(
            sorted(line.to_vec()),
            vec![(2, 3), (3, 4), (4, 5), (5, 6)]
        );
        // the same line is found from its lower end
        let line = board
            .check_win(5, 6)
            .ok_or_else(|| anyhow!("no win found"))?;
        assert_eq!(
            sorted(line.to_vec()),
            vec![(2, 3), (3, 4), (4, 5), (5, 6)]
        );
        Ok(())
    }

    #[test]
    pub fn horizontal_win_in_the_top_row() -> Result<()> {
        use Player::*;
        let mut board = Board::new();
        let low = [One, One, Two, Two, One];
        let high = [Two, Two, One, One, Two];
        for column in 3..WIDTH {
            let pattern = if column % 2 == 1 { &low } else { &high };
            stack(&mut board, column, pattern)?;
        }
        for column in 3..WIDTH {
            stack(&mut board, column, &[Two])?;
        }
        let line = board
            .check_win(0, WIDTH - 1)
            .ok_or_else(|| anyhow!("no win found"))?;
        assert_eq!(sorted(line.to_vec()), vec![(0, 3), (0, 4), (0, 5), (0, 6)]);
        Ok(())
    }

    #[test]
    pub fn five_in_a_row_reports_four_cells() -> Result<()> {
        use Player::*;
        let mut board = Board::new();
        for &column in [0, 1, 3, 4].iter() {
            stack(&mut board, column, &[One])?;
        }
        let row = stack(&mut board, 2, &[One])?;
        let line = board
            .check_win(row, 2)
            .ok_or_else(|| anyhow!("no win found"))?;
        // forwards first, then backwards
        assert_eq!(line, [(5, 2), (5, 3), (5, 4), (5, 1)]);
        assert!(board.is_won());
        Ok(())
    }

    #[test]
    pub fn move_strings() -> Result<()> {
        assert_eq!(Board::from_moves("")?, Board::new());
        let board = Board::from_moves("4455")?;
        assert_eq!(board.get(HEIGHT - 1, 3), Cell::PlayerOne);
        assert_eq!(board.get(HEIGHT - 2, 3), Cell::PlayerTwo);
        assert_eq!(board.num_pieces(), 4);

        assert!(Board::from_moves("448").is_err());
        assert!(Board::from_moves("4x").is_err());
        assert!(Board::from_moves("1111111").is_err());
        // play continues after player one's vertical four
        assert!(Board::from_moves("12121213").is_err());
        Ok(())
    }

    #[test]
    pub fn search_never_picks_a_full_column() -> Result<()> {
        let config = fast_config();
        (0..48u64).into_par_iter().for_each(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let moves = rng.gen_range(0..40);
            if let Some((board, player)) = random_position(&mut rng, moves) {
                let mut searcher = Searcher::with_seed(config.clone(), seed);
                for &difficulty in Difficulty::ALL.iter() {
                    match searcher.choose_move(&board, difficulty, player) {
                        Some(column) => assert!(board.playable(column), "{:?}", board),
                        None => assert!(board.is_full()),
                    }
                }
            }
        });
        Ok(())
    }

    #[test]
    pub fn full_board_has_no_move() -> Result<()> {
        use Player::*;
        let mut board = Board::new();
        for column in 0..WIDTH {
            let pattern = if (column / 2) % 2 == 0 {
                [One, One, Two, Two, One, One]
            } else {
                [Two, Two, One, One, Two, Two]
            };
            stack(&mut board, column, &pattern)?;
        }
        assert!(board.is_full());
        let mut searcher = Searcher::default();
        assert_eq!(searcher.choose_move(&board, Difficulty::Hard, One), None);
        Ok(())
    }

    #[test]
    pub fn search_takes_a_win_over_a_block() -> Result<()> {
        // both have three stacked; player two to move
        let board = Board::from_moves("1212127")?;
        let mut searcher = Searcher::with_seed(SearchConfig::default(), 3);
        for &difficulty in Difficulty::ALL.iter() {
            assert_eq!(
                searcher.choose_move(&board, difficulty, Player::Two),
                Some(1)
            );
        }
        Ok(())
    }

    #[test]
    pub fn search_blocks_an_immediate_loss() -> Result<()> {
        let board = Board::from_moves("12121")?;
        let mut searcher = Searcher::with_seed(SearchConfig::default(), 3);
        for &difficulty in Difficulty::ALL.iter() {
            assert_eq!(
                searcher.choose_move(&board, difficulty, Player::Two),
                Some(0)
            );
        }
        Ok(())
    }

    #[test]
    pub fn hard_blocks_every_threat_column() -> Result<()> {
        (0..WIDTH).into_par_iter().try_for_each(|threat| -> Result<()> {
            let mut board = Board::new();
            stack(&mut board, threat, &[Player::One])?;
            stack(&mut board, (threat + 1) % WIDTH, &[Player::Two])?;
            stack(&mut board, threat, &[Player::One])?;
            stack(&mut board, (threat + 2) % WIDTH, &[Player::Two])?;
            stack(&mut board, threat, &[Player::One])?;

            let mut searcher = Searcher::default();
            assert_eq!(
                searcher.choose_move(&board, Difficulty::Hard, Player::Two),
                Some(threat),
                "threat in column {}",
                threat
            );
            Ok(())
        })
    }

    #[test]
    pub fn search_respects_the_deadline() -> Result<()> {
        let config = SearchConfig {
            hard: TierLimits {
                depth: 42,
                budget_ms: 50,
            },
            ..SearchConfig::default()
        };
        let mut searcher = Searcher::new(config);
        let board = Board::from_moves("44")?;

        let start_time = Instant::now();
        let column = searcher
            .choose_move(&board, Difficulty::Hard, Player::One)
            .ok_or_else(|| anyhow!("no move returned"))?;
        let elapsed = Instant::now() - start_time;

        assert!(board.playable(column));
        assert!(
            elapsed < Duration::from_millis(50 + 200),
            "search took {:?}",
            elapsed
        );
        println!(
            "Deadline search\n Time: {:.6}s, No. of positions: {}",
            elapsed.as_secs_f64(),
            searcher.node_count
        );
        Ok(())
    }

    #[test]
    pub fn seeded_easy_tier_is_reproducible() -> Result<()> {
        let mut a = Searcher::with_seed(SearchConfig::default(), 42);
        let mut b = Searcher::with_seed(SearchConfig::default(), 42);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let moves = rng.gen_range(0..20);
            if let Some((board, player)) = random_position(&mut rng, moves) {
                let left = a.choose_move(&board, Difficulty::Easy, player);
                let right = b.choose_move(&board, Difficulty::Easy, player);
                assert_eq!(left, right);
                assert!(left.map_or(false, |column| board.playable(column)));
            }
        }
        Ok(())
    }

    #[test]
    pub fn local_match_human_win_and_rematch() -> Result<()> {
        let mut game = LocalMatch::new(Difficulty::Medium);
        let mut cpu = Scripted(vec![1, 1, 1].into());

        for _ in 0..3 {
            assert_eq!(game.play(0)?, None);
            assert!(game.is_computer_turn());
            assert_eq!(game.play(0), Err(MoveError::NotYourTurn));
            game.play_computer(&mut cpu)?;
        }
        assert_eq!(game.play(0)?, Some(Outcome::Win(Player::One)));
        assert_eq!(game.scores().p1, 1);
        assert_eq!(game.last_winner(), Some(Player::One));
        assert_eq!(game.game().win_cells.len(), 4);
        assert_eq!(game.play_computer(&mut cpu)?, None);

        game.rematch();
        assert_eq!(game.game().move_count, 0);
        assert_eq!(game.game().current_player, Player::One);
        assert_eq!(game.scores().p1, 1);

        game.change_difficulty(Difficulty::Medium);
        assert_eq!(game.game().current_player, Player::One);
        assert!(!game.is_computer_turn());
        Ok(())
    }

    #[test]
    pub fn local_match_computer_win_opens_next_game() -> Result<()> {
        let mut game = LocalMatch::new(Difficulty::Easy);
        let mut cpu = Scripted(vec![6, 6, 6, 6].into());

        for &column in [0, 1, 0].iter() {
            game.play(column)?;
            game.play_computer(&mut cpu)?;
        }
        game.play(2)?;
        assert_eq!(game.play_computer(&mut cpu)?, Some(6));
        assert_eq!(game.game().winner, Some(Outcome::Win(Player::Two)));
        assert_eq!(game.scores().p2, 1);

        game.rematch();
        assert!(game.is_computer_turn());

        // switching tiers keeps the tally and the winner's opening
        game.play_computer(&mut Scripted(vec![3].into()))?;
        game.change_difficulty(Difficulty::Hard);
        assert_eq!(game.difficulty(), Difficulty::Hard);
        assert_eq!(game.scores().p2, 1);
        assert_eq!(game.game().move_count, 0);
        assert!(game.is_computer_turn());

        let mut game = LocalMatch::new(Difficulty::Hard);
        assert_eq!(game.scores().games(), 0);
        // nobody has won yet, so the human opens
        game.change_difficulty(Difficulty::Easy);
        assert!(!game.is_computer_turn());
        Ok(())
    }

    #[test]
    pub fn local_match_against_inline_search() -> Result<()> {
        let mut game = LocalMatch::new(Difficulty::Medium);
        let mut cpu = InlineSearch::new(Searcher::new(fast_config()));
        game.play(3)?;
        let column = game
            .play_computer(&mut cpu)?
            .ok_or_else(|| anyhow!("computer did not move"))?;
        assert!(column < WIDTH);
        assert_eq!(game.game().move_count, 2);
        Ok(())
    }
}
