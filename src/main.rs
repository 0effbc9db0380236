use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    cursor::MoveTo,
    style::{style, Attribute, Color, PrintStyledContent},
    QueueableCommand,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use std::io::{stdin, stdout, Write};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use connect4_rooms::{
    board::{Cell, Outcome, Player},
    config::AppConfig,
    game::GameState,
    local_match::LocalMatch,
    poller::Poller,
    reconcile::{GameResult, Reconciler, Screen, SyncEvent},
    room::{PlayerId, Room},
    search::Difficulty,
    session::RoomService,
    store::MemoryStore,
    worker::{BackgroundSearch, MoveSource},
    HEIGHT, WIDTH,
};

/// Connect 4 against the computer, or two computer players sharing a room
#[derive(Parser)]
#[command(name = "connect4", about = "Play Connect 4 in the terminal")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, env = "CONNECT4_CONFIG", default_value = "connect4.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Play against the computer
    Play {
        /// easy, medium or hard
        #[arg(long, short, default_value = "medium")]
        difficulty: Difficulty,
    },
    /// Watch two computer players meet in an online room
    Duel {
        /// Strength of the room's host
        #[arg(long, default_value = "medium")]
        host: Difficulty,

        /// Strength of the joining player
        #[arg(long, default_value = "hard")]
        guest: Difficulty,

        /// Number of games before leaving the room
        #[arg(long, default_value_t = 2)]
        games: u32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    match cli.command.unwrap_or(Command::Play {
        difficulty: Difficulty::Medium,
    }) {
        Command::Play { difficulty } => play(&config, difficulty),
        Command::Duel { host, guest, games } => duel(&config, host, guest, games),
    }
}

fn display(game: &GameState) -> Result<()> {
    let mut stdout = stdout();

    let cols: String = (1..=WIDTH).map(|x| x.to_string()).collect();
    stdout.queue(PrintStyledContent(style(cols + "\n")))?;
    for _ in 0..HEIGHT {
        stdout.queue(PrintStyledContent(style("\n")))?;
    }
    stdout.flush()?;

    let (origin_x, origin_y) = crossterm::cursor::position()?;

    for (row, cells) in game.board.rows().enumerate() {
        for (column, cell) in cells.iter().enumerate() {
            let (pos_x, pos_y) = (
                origin_x + column as u16,
                origin_y - (HEIGHT - row) as u16,
            );
            let symbol = if game.win_cells.contains(&(row, column)) {
                "@"
            } else {
                "O"
            };

            stdout
                .queue(MoveTo(pos_x, pos_y))?
                .queue(PrintStyledContent(
                    style(symbol)
                        .attribute(Attribute::Bold)
                        .on(Color::DarkBlue)
                        .with(match cell {
                            Cell::PlayerOne => Color::Red,
                            Cell::PlayerTwo => Color::Yellow,
                            Cell::Empty => Color::DarkBlue,
                        }),
                ))?;
        }
    }
    stdout
        .queue(MoveTo(origin_x, origin_y))?
        .queue(PrintStyledContent(style("\n")))?;
    stdout.flush()?;
    Ok(())
}

fn prompt(text: &str) -> Result<Option<String>> {
    print!("{}", text);
    stdout().flush()?;
    let mut buffer = String::new();
    if stdin().read_line(&mut buffer)? == 0 {
        return Ok(None);
    }
    Ok(Some(buffer.trim().to_lowercase()))
}

fn play(config: &AppConfig, difficulty: Difficulty) -> Result<()> {
    let mut game = LocalMatch::new(difficulty);
    let mut ai = BackgroundSearch::new(config.search.clone());

    println!("Welcome to Connect 4\n");
    println!(
        "You play red and move first, {} plays yellow",
        difficulty.label()
    );

    loop {
        display(game.game())?;

        if let Some(outcome) = game.game().winner {
            match outcome {
                Outcome::Win(Player::One) => println!("You win!"),
                Outcome::Win(Player::Two) => println!("{} wins!", game.difficulty().label()),
                Outcome::Draw => println!("Draw!"),
            }
            let scores = game.scores();
            println!(
                "You {} - {} {} ({} drawn)",
                scores.p1,
                scores.p2,
                game.difficulty().label(),
                scores.draws
            );

            let answer = match prompt("Play again? y/n, or pick easy/medium/hard: ")? {
                Some(answer) => answer,
                None => break,
            };
            match answer.chars().next() {
                Some('y') => game.rematch(),
                Some('n') => break,
                _ => match answer.parse::<Difficulty>() {
                    Ok(difficulty) => {
                        game.change_difficulty(difficulty);
                        println!("Now playing {}", difficulty.label());
                    }
                    Err(_) => println!("Unknown answer given"),
                },
            }
            continue;
        }

        if game.is_computer_turn() {
            println!("{} is thinking...", game.difficulty().label());
            stdout().flush()?;
            if let Some(column) = game.play_computer(&mut ai)? {
                println!("{} plays {}", game.difficulty().label(), column + 1);
            }
            continue;
        }

        let input = match prompt("Move input > ")? {
            Some(input) => input,
            None => break,
        };
        let column = match input.parse::<usize>() {
            Ok(column @ 1..=WIDTH) => column - 1,
            _ => {
                println!(
                    "Invalid move '{}', columns must be between 1 and {}",
                    input, WIDTH
                );
                continue;
            }
        };
        if let Err(err) = game.play(column) {
            println!("{}", err);
        }
    }
    Ok(())
}

/// One computer-controlled client of a room
struct Client {
    id: PlayerId,
    difficulty: Difficulty,
    view: Arc<Mutex<Reconciler>>,
    search: BackgroundSearch,
    events: Sender<SyncEvent>,
}

impl Client {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Reconciler>> {
        self.view
            .lock()
            .map_err(|_| anyhow::anyhow!("client state poisoned"))
    }

    /// Reconciles a response to one of this client's own requests
    fn absorb(&self, room: &Room) -> Result<()> {
        let changes = self.lock()?.reconcile(room);
        for event in changes {
            // the receiver only goes away on shutdown
            let _ = self.events.send(event);
        }
        Ok(())
    }

    /// Plays one move if it is this client's turn, returning whether it did
    fn take_turn(&mut self, service: &RoomService<MemoryStore>, code: &str) -> Result<bool> {
        let (board, seat) = {
            let view = self.lock()?;
            if !view.is_my_turn() {
                return Ok(false);
            }
            (view.game().board, view.seat())
        };

        let column = match self.search.choose_move(&board, self.difficulty, seat) {
            Some(column) => column,
            None => return Ok(false),
        };

        {
            let mut view = self.lock()?;
            // a poll may have landed while searching
            if view.game().board != board || view.play_local(column).is_err() {
                return Ok(false);
            }
        }
        println!("{} ({}) drops in column {}", seat, self.difficulty.label(), column + 1);

        match service.make_move(code, &self.id, column) {
            Ok(room) => self.absorb(&room)?,
            Err(err) => {
                warn!(%err, seat = %seat, "move rejected, resyncing");
                match service.read(code) {
                    Ok(room) => self.lock()?.resync(&room),
                    // the next poll brings the view back in line
                    Err(err) => warn!(%err, seat = %seat, "resync read failed"),
                }
            }
        }
        Ok(true)
    }

    fn wants_rematch(&self) -> Result<bool> {
        let view = self.lock()?;
        Ok(view.screen() == Screen::GameOver && !view.rematch_requested())
    }
}

fn duel(config: &AppConfig, host: Difficulty, guest: Difficulty, games: u32) -> Result<()> {
    let service = Arc::new(RoomService::new(MemoryStore::new(), config.room.clone()));
    let mut rng = rand::thread_rng();

    let host_id = PlayerId::generate(&mut rng);
    let room = service.create(&host_id, Some(host.label()))?;
    let code = room.room_code.clone();
    let host_view = Arc::new(Mutex::new(Reconciler::host(&room)));
    println!("Room {} opened by {}", code, host.label());

    let guest_id = PlayerId::generate(&mut rng);
    let room = service.join(code.as_str(), &guest_id, Some(guest.label()))?;
    let guest_view = Arc::new(Mutex::new(Reconciler::guest(&room)));

    let (host_tx, host_events) = channel();
    let (guest_tx, guest_events) = channel();
    let host_poller = Poller::spawn(
        service.clone(),
        code.clone(),
        host_view.clone(),
        config.poll.interval(),
        host_tx.clone(),
    )?;
    let guest_poller = Poller::spawn(
        service.clone(),
        code.clone(),
        guest_view.clone(),
        config.poll.interval(),
        guest_tx.clone(),
    )?;

    let mut clients = [
        Client {
            id: host_id,
            difficulty: host,
            view: host_view,
            search: BackgroundSearch::new(config.search.clone()),
            events: host_tx,
        },
        Client {
            id: guest_id,
            difficulty: guest,
            view: guest_view,
            search: BackgroundSearch::new(config.search.clone()),
            events: guest_tx,
        },
    ];

    let mut finished = 0;
    while finished < games {
        for client in clients.iter_mut() {
            client.take_turn(&service, code.as_str())?;
        }

        // the host's view narrates the match
        for event in host_events.try_iter() {
            match event {
                SyncEvent::OpponentNamed(name) => println!("{} joined", name),
                SyncEvent::NewGame {
                    game_number,
                    starter,
                } => println!("Game {}, {} opens", game_number, starter),
                SyncEvent::Finished { outcome, .. } => {
                    info!(?outcome, "duel game finished");
                }
                SyncEvent::ScoresChanged(scores) => {
                    let view = clients[0].lock()?;
                    println!("{:?}", view.game().board);
                    let result = view
                        .game()
                        .winner
                        .map(|outcome| GameResult::for_seat(outcome, view.seat()));
                    match result {
                        Some(GameResult::Won) => println!("{} wins", host.label()),
                        Some(GameResult::Lost) => println!("{} wins", guest.label()),
                        Some(GameResult::Draw) => println!("Draw"),
                        None => {}
                    }
                    println!(
                        "Score {} {} - {} {} ({} drawn)",
                        host.label(),
                        scores.p1,
                        scores.p2,
                        guest.label(),
                        scores.draws
                    );
                }
                SyncEvent::OpponentJoined
                | SyncEvent::MoveApplied(_)
                | SyncEvent::RematchVotes(_) => {}
                SyncEvent::LocalMoveDropped(dropped) => {
                    warn!(column = dropped.col, "host move never reached the room");
                }
            }
        }
        for event in guest_events.try_iter() {
            debug!(?event, "guest view");
        }
        finished = clients[0].lock()?.scores().games();

        if finished < games {
            for client in clients.iter() {
                if client.wants_rematch()? {
                    let room = service.rematch(code.as_str(), &client.id)?;
                    client.absorb(&room)?;
                }
            }
        }

        thread::sleep(Duration::from_millis(20));
    }

    host_poller.stop();
    guest_poller.stop();

    let view = clients[0].lock()?;
    let scores = view.scores();
    println!(
        "Final score {} {} - {} {} ({} drawn)",
        host.label(),
        scores.p1,
        scores.p2,
        guest.label(),
        scores.draws
    );
    Ok(())
}
