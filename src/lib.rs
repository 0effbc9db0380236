//! Connect 4 against the computer or another player through a shared room
//!
//! The crate holds the game rules, a time-boxed alpha-beta opponent with
//! three difficulty tiers, and an online room protocol: the server-side
//! handlers in [`session`] keep the authoritative state in a [`store`], and
//! clients merge polled snapshots into their own optimistic copy with a
//! [`reconcile::Reconciler`].
//!
//! # Basic Usage
//!
//! ```
//! use connect4_rooms::{board::{Board, Player}, search::{Difficulty, Searcher}};
//!
//!# use std::error::Error;
//!# fn main() -> Result<(), Box<dyn Error>> {
//! // player one has three stacked in the fourth column
//! let board = Board::from_moves("45454")?;
//! let mut searcher = Searcher::default();
//!
//! assert_eq!(searcher.choose_move(&board, Difficulty::Hard, Player::Two), Some(3));
//!# Ok(())
//!# }
//! ```
//!
//! An online game between two clients sharing one service:
//!
//! ```
//! use connect4_rooms::{room::PlayerId, session::{RoomConfig, RoomService}, store::MemoryStore};
//!
//!# use std::error::Error;
//!# fn main() -> Result<(), Box<dyn Error>> {
//! let service = RoomService::new(MemoryStore::new(), RoomConfig::default());
//! let host = PlayerId::new("host");
//! let guest = PlayerId::new("guest");
//!
//! let room = service.create(&host, Some("Ada"))?;
//! service.join(room.room_code.as_str(), &guest, None)?;
//! let room = service.make_move(room.room_code.as_str(), &host, 3)?;
//!
//! assert_eq!(room.game.move_count, 1);
//!# Ok(())
//!# }
//! ```

use static_assertions::*;
pub use anyhow;

pub mod board;

pub mod game;

pub mod search;

pub mod worker;

pub mod local_match;

pub mod room;

pub mod store;

pub mod session;

pub mod reconcile;

pub mod poller;

pub mod config;

pub mod error;

mod test;

/// The width of the game board in tiles
pub const WIDTH: usize = 7;

/// The height of the game board in tiles
pub const HEIGHT: usize = 6;

// a four-in-a-row has to fit in every direction
const_assert!(WIDTH >= 4 && HEIGHT >= 4);
