//! Game session management
//!
//! A game is a page counter over a random selection of quiz questions.
//! Page 0 is the lobby; after that pages alternate between a question and
//! its reveal, and a page past the last reveal means the game is over.
//! The host advances pages, players guess, and every update is a single
//! immediate SQLite transaction so the two never overwrite each other.

use crate::error::{Result, WhosaidError};
use crate::quiz::QuizBook;
use crate::storage::Database;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

/// Where the game currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the host to start
    Lobby,
    /// Players are guessing the question at this position of the selection
    Question(usize),
    /// The answer and its context are on screen
    Reveal(usize),
    /// Every question has been revealed
    Finished,
}

impl Phase {
    /// Phase of page `page` in a game of `questions` questions
    pub fn from_page(page: u64, questions: usize) -> Self {
        if page == 0 {
            return Phase::Lobby;
        }

        let position = ((page - 1) / 2) as usize;
        if position >= questions {
            Phase::Finished
        } else if page % 2 == 1 {
            Phase::Question(position)
        } else {
            Phase::Reveal(position)
        }
    }
}

/// Snapshot of the shared game state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub session_id: Uuid,
    pub page_id: u64,
    /// Quiz indices in play order
    pub selection: Vec<usize>,
}

impl GameState {
    pub fn phase(&self) -> Phase {
        Phase::from_page(self.page_id, self.selection.len())
    }

    /// Quiz index of the question at `position`
    pub fn quiz_index(&self, position: usize) -> Option<usize> {
        self.selection.get(position).copied()
    }
}

/// One player's standing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub player: String,
    pub correct: usize,
    pub answered: usize,
}

/// A recorded guess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guess {
    pub player: String,
    pub choice: String,
    pub correct: bool,
}

/// Persistent game store
pub struct GameStore {
    db: Database,
}

impl GameStore {
    /// Open the store, creating a fresh lobby if none exists
    pub fn open(db_path: &Path) -> Result<Self> {
        let mut db = Database::open(db_path)?;

        let tx = db.write_transaction()?;
        let exists: Option<i64> = tx
            .query_row("SELECT id FROM game_state WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        if exists.is_none() {
            insert_fresh_state(&tx)?;
            tracing::info!("Created new game session store at {}", db_path.display());
        }
        tx.commit()?;

        Ok(Self { db })
    }

    /// Current state
    pub fn state(&self) -> Result<GameState> {
        read_state(self.db.conn())
    }

    pub fn phase(&self) -> Result<Phase> {
        Ok(self.state()?.phase())
    }

    /// Drop the selection and every guess, back to the lobby
    pub fn reset(&mut self) -> Result<GameState> {
        let tx = self.db.write_transaction()?;
        tx.execute("DELETE FROM answers", [])?;
        tx.execute("DELETE FROM selection", [])?;
        tx.execute("DELETE FROM game_state", [])?;
        insert_fresh_state(&tx)?;
        let state = read_state(&tx)?;
        tx.commit()?;

        tracing::info!("Game reset (session {})", state.session_id);
        Ok(state)
    }

    /// Pick `questions` distinct quiz questions and open the first one
    ///
    /// # Arguments
    /// * `quiz_len` - Number of questions in the quiz book
    /// * `questions` - How many to play
    /// * `seed` - Fixed seed for a reproducible selection
    pub fn start(&mut self, quiz_len: usize, questions: usize, seed: Option<u64>) -> Result<GameState> {
        if questions == 0 {
            return Err(WhosaidError::Game(
                "A game needs at least one question".to_string(),
            ));
        }
        if questions > quiz_len {
            return Err(WhosaidError::Game(format!(
                "Asked for {} questions but the quiz only has {}",
                questions, quiz_len
            )));
        }

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let picked = rand::seq::index::sample(&mut rng, quiz_len, questions).into_vec();

        let tx = self.db.write_transaction()?;
        let current = read_state(&tx)?;
        if current.phase() != Phase::Lobby {
            return Err(WhosaidError::Game(
                "A game is already running; reset it first".to_string(),
            ));
        }

        tx.execute("DELETE FROM answers", [])?;
        tx.execute("DELETE FROM selection", [])?;
        for (position, quiz_index) in picked.iter().enumerate() {
            tx.execute(
                "INSERT INTO selection (position, quiz_index) VALUES (?1, ?2)",
                params![position as i64, *quiz_index as i64],
            )?;
        }
        set_page(&tx, 1)?;
        let state = read_state(&tx)?;
        tx.commit()?;

        tracing::info!(
            "Game {} started with {} questions",
            state.session_id,
            state.selection.len()
        );
        Ok(state)
    }

    /// Move to the next page
    pub fn advance(&mut self) -> Result<GameState> {
        let tx = self.db.write_transaction()?;
        let current = read_state(&tx)?;

        match current.phase() {
            Phase::Lobby => {
                return Err(WhosaidError::Game(
                    "The game has not started yet".to_string(),
                ))
            }
            Phase::Finished => {
                return Err(WhosaidError::Game(
                    "The game is over; reset to play again".to_string(),
                ))
            }
            Phase::Question(_) | Phase::Reveal(_) => {}
        }

        set_page(&tx, current.page_id + 1)?;
        let state = read_state(&tx)?;
        tx.commit()?;

        tracing::debug!("Advanced to page {} ({:?})", state.page_id, state.phase());
        Ok(state)
    }

    /// Record `player`'s guess for the open question
    ///
    /// # Returns
    /// Whether the guess was right
    pub fn record_guess(&mut self, book: &QuizBook, player: &str, choice: &str) -> Result<bool> {
        let player = player.trim();
        if player.is_empty() {
            return Err(WhosaidError::Game("Player name cannot be empty".to_string()));
        }

        let tx = self.db.write_transaction()?;
        let state = read_state(&tx)?;

        let Phase::Question(position) = state.phase() else {
            return Err(WhosaidError::Game(
                "Guesses are only accepted while a question is open".to_string(),
            ));
        };
        let index = state.quiz_index(position);
        let question = index
            .and_then(|index| book.question(index))
            .ok_or_else(|| {
                WhosaidError::Game(format!(
                    "Question {} is not in the quiz book; was preprocess rerun mid-game?",
                    position
                ))
            })?;

        if !question.candidate_names().contains(&choice) {
            return Err(WhosaidError::Game(format!(
                "'{}' is not one of the options: {}",
                choice, question.candidates
            )));
        }

        let already: Option<String> = tx
            .query_row(
                "SELECT choice FROM answers WHERE player = ?1 AND position = ?2",
                params![player, position as i64],
                |row| row.get(0),
            )
            .optional()?;
        if already.is_some() {
            return Err(WhosaidError::Game(format!(
                "{} already answered this question",
                player
            )));
        }

        let correct = index
            .and_then(|index| book.is_correct(index, choice))
            .unwrap_or(false);
        tx.execute(
            "INSERT INTO answers (player, position, choice, correct, answered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![player, position as i64, choice, correct, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        tracing::debug!("{} guessed {} for question {}", player, choice, position);
        Ok(correct)
    }

    /// Guesses for the question at `position`, by player name
    pub fn guesses(&self, position: usize) -> Result<Vec<Guess>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT player, choice, correct FROM answers WHERE position = ?1 ORDER BY player",
        )?;
        let guesses = stmt
            .query_map(params![position as i64], |row| {
                Ok(Guess {
                    player: row.get(0)?,
                    choice: row.get(1)?,
                    correct: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(guesses)
    }

    /// Whether `player` already answered the question at `position`
    ///
    /// Names are trimmed the same way `record_guess` stores them.
    pub fn has_answered(&self, position: usize, player: &str) -> Result<bool> {
        let found: Option<i64> = self
            .db
            .conn()
            .query_row(
                "SELECT 1 FROM answers WHERE player = ?1 AND position = ?2",
                params![player.trim(), position as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Players ranked by correct guesses, then by name
    pub fn scoreboard(&self) -> Result<Vec<Score>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT player, SUM(correct), COUNT(*) FROM answers GROUP BY player",
        )?;
        let mut scores = stmt
            .query_map([], |row| {
                Ok(Score {
                    player: row.get(0)?,
                    correct: row.get::<_, i64>(1)? as usize,
                    answered: row.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        scores.sort_by(|a, b| b.correct.cmp(&a.correct).then_with(|| a.player.cmp(&b.player)));
        Ok(scores)
    }
}

fn insert_fresh_state(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO game_state (id, session_id, page_id, updated_at) VALUES (1, ?1, 0, ?2)",
        params![Uuid::new_v4().to_string(), Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn set_page(conn: &Connection, page: u64) -> Result<()> {
    conn.execute(
        "UPDATE game_state SET page_id = ?1, updated_at = ?2 WHERE id = 1",
        params![page as i64, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn read_state(conn: &Connection) -> Result<GameState> {
    let (session_id, page_id): (String, i64) = conn.query_row(
        "SELECT session_id, page_id FROM game_state WHERE id = 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let session_id = Uuid::parse_str(&session_id)
        .map_err(|e| WhosaidError::Game(format!("Corrupt session id '{}': {}", session_id, e)))?;

    let mut stmt = conn.prepare("SELECT quiz_index FROM selection ORDER BY position")?;
    let selection = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .map(|index| index.map(|i| i as usize))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(GameState {
        session_id,
        page_id: page_id.max(0) as u64,
        selection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{HistoryRow, QuizRow};
    use tempfile::TempDir;

    fn book() -> QuizBook {
        let authors = ["ana", "bo", "cy", "dee", "ana", "bo"];
        let history = authors
            .iter()
            .enumerate()
            .map(|(i, author)| HistoryRow {
                index: i,
                author: author.to_string(),
                date: "2022-01-01T10:00:00.000+00:00".to_string(),
                content: format!("quote number {}", i),
                reactions: String::new(),
            })
            .collect::<Vec<_>>();
        let questions = history
            .iter()
            .map(|row| QuizRow {
                index: row.index,
                author: row.author.clone(),
                date: row.date.clone(),
                content: row.content.clone(),
                reactions: String::new(),
                candidates: "ana bo cy dee".to_string(),
            })
            .collect();
        QuizBook::from_rows(history, questions)
    }

    fn store(temp: &TempDir) -> GameStore {
        GameStore::open(&temp.path().join("state.sqlite")).unwrap()
    }

    #[test]
    fn test_page_arithmetic() {
        assert_eq!(Phase::from_page(0, 3), Phase::Lobby);
        assert_eq!(Phase::from_page(1, 3), Phase::Question(0));
        assert_eq!(Phase::from_page(2, 3), Phase::Reveal(0));
        assert_eq!(Phase::from_page(5, 3), Phase::Question(2));
        assert_eq!(Phase::from_page(6, 3), Phase::Reveal(2));
        assert_eq!(Phase::from_page(7, 3), Phase::Finished);
        assert_eq!(Phase::from_page(1, 0), Phase::Finished);
    }

    #[test]
    fn test_open_starts_in_lobby() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let state = store.state().unwrap();
        assert_eq!(state.page_id, 0);
        assert_eq!(state.phase(), Phase::Lobby);
        assert!(state.selection.is_empty());
    }

    #[test]
    fn test_seeded_start_is_reproducible() {
        let temp = TempDir::new().unwrap();
        let mut store = store(&temp);
        let quiz_len = book().len();

        let first = store.start(quiz_len, 4, Some(7)).unwrap();
        store.reset().unwrap();
        let second = store.start(quiz_len, 4, Some(7)).unwrap();

        assert_eq!(first.selection, second.selection);
        assert_ne!(first.session_id, second.session_id);
        let mut distinct = first.selection.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), 4);
        assert!(first.selection.iter().all(|&i| i < quiz_len));
    }

    #[test]
    fn test_start_rejects_bad_sizes_and_running_game() {
        let temp = TempDir::new().unwrap();
        let mut store = store(&temp);

        assert!(store.start(6, 0, None).is_err());
        assert!(store.start(6, 7, None).is_err());

        store.start(6, 2, Some(1)).unwrap();
        assert!(matches!(
            store.start(6, 2, Some(1)),
            Err(WhosaidError::Game(_))
        ));
    }

    #[test]
    fn test_full_game_flow() {
        let temp = TempDir::new().unwrap();
        let mut store = store(&temp);
        let book = book();

        assert!(store.advance().is_err());
        let state = store.start(book.len(), 2, Some(3)).unwrap();
        assert_eq!(state.phase(), Phase::Question(0));

        let first = book.question(state.selection[0]).unwrap();
        let wrong = first
            .candidate_names()
            .into_iter()
            .find(|name| *name != first.author)
            .unwrap()
            .to_string();

        assert!(!store.has_answered(0, "zoe").unwrap());
        assert!(store.record_guess(&book, " zoe ", &first.author).unwrap());
        assert!(!store.record_guess(&book, "max", &wrong).unwrap());
        assert!(store.has_answered(0, "zoe").unwrap());
        assert!(store.has_answered(0, " zoe").unwrap());
        assert!(!store.has_answered(1, "zoe").unwrap());

        // One guess per question
        assert!(store.record_guess(&book, "zoe", &wrong).is_err());
        // Only listed options
        assert!(store.record_guess(&book, "kim", "nobody").is_err());

        assert_eq!(store.advance().unwrap().phase(), Phase::Reveal(0));
        // No guessing during a reveal
        assert!(store.record_guess(&book, "kim", &first.author).is_err());
        assert_eq!(store.guesses(0).unwrap().len(), 2);

        assert_eq!(store.advance().unwrap().phase(), Phase::Question(1));
        let second = book.question(store.state().unwrap().selection[1]).unwrap();
        assert!(store.record_guess(&book, "max", &second.author).unwrap());

        assert_eq!(store.advance().unwrap().phase(), Phase::Reveal(1));
        assert_eq!(store.advance().unwrap().phase(), Phase::Finished);
        assert!(store.advance().is_err());

        let scores = store.scoreboard().unwrap();
        assert_eq!(
            scores,
            vec![
                Score {
                    player: "max".to_string(),
                    correct: 1,
                    answered: 2
                },
                Score {
                    player: "zoe".to_string(),
                    correct: 1,
                    answered: 1
                },
            ]
        );
    }

    #[test]
    fn test_state_shared_between_connections() {
        let temp = TempDir::new().unwrap();
        let book = book();
        let mut host = store(&temp);
        let mut player = store(&temp);

        host.start(book.len(), 1, Some(9)).unwrap();
        let question = book.question(player.state().unwrap().selection[0]).unwrap();
        assert!(player.record_guess(&book, "ana", &question.author).unwrap());

        assert_eq!(host.scoreboard().unwrap()[0].player, "ana");
        host.reset().unwrap();
        assert!(player.scoreboard().unwrap().is_empty());
        assert_eq!(player.phase().unwrap(), Phase::Lobby);
    }
}
