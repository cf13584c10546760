use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::time::{sleep_until, Duration, Instant};

use crate::auth::Identity;
use crate::errors::{ServerError, ServerResult};

use super::{PlayerRecord, Question};

pub type GameId = String;

/// Seconds between a question's answer deadline and the next question, during
/// which the correct answer is revealed to everyone.
pub const REVEAL_BUFFER_SECS: u64 = 5;

/// One running round of trivia. The question list, roster, and start instant
/// are fixed at creation; only the online set and the per-player records
/// change, each behind its own lock.
pub struct Game {
    id: GameId,
    questions: Arc<Vec<Question>>,
    time_per_question: u32,
    started_at: Instant,
    online: RwLock<Vec<Identity>>,
    records: RwLock<HashMap<Identity, PlayerRecord>>,
}

impl Game {
    pub(super) fn new(
        id: GameId,
        questions: Vec<Question>,
        players: Vec<Identity>,
        time_per_question: u32,
    ) -> Self {
        let questions = Arc::new(questions);

        let records = players
            .iter()
            .cloned()
            .map(|player| {
                (
                    player,
                    PlayerRecord::new(questions.clone(), time_per_question),
                )
            })
            .collect();

        Self {
            id,
            questions,
            time_per_question,
            started_at: Instant::now(),
            online: RwLock::new(players),
            records: RwLock::new(records),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Answer window plus reveal buffer: the wall-clock length of one question.
    fn cycle_secs(&self) -> u64 {
        self.time_per_question as u64 + REVEAL_BUFFER_SECS
    }

    fn elapsed_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Which question the game is on right now, derived from the clock alone.
    pub fn current_index(&self) -> u32 {
        (self.elapsed_secs() / self.cycle_secs()) as u32
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_secs() >= self.questions.len() as u64 * self.cycle_secs()
    }

    pub fn current_question(&self) -> ServerResult<(u32, Question)> {
        let index = self.current_index();

        let question = self
            .questions
            .get(index as usize)
            .cloned()
            .ok_or_else(|| ServerError::InvalidRequest("Game is already finished".to_string()))?;

        Ok((index, question))
    }

    /// Records an answer and returns the correct index, but only once the
    /// reveal boundary has passed: the call blocks (just this player's task)
    /// until the instant the answer becomes safe to disclose, so early
    /// submitters cannot leak it to anyone still thinking.
    pub async fn submit_answer(
        &self,
        user: &Identity,
        answer_index: u32,
        question_index: u32,
    ) -> ServerResult<u32> {
        let elapsed = self.elapsed_secs();
        let current_index = (elapsed / self.cycle_secs()) as u32;

        if current_index as usize >= self.questions.len() {
            return Err(ServerError::InvalidRequest(
                "Game is already finished".to_string(),
            ));
        }

        if answer_index > 4 {
            return Err(ServerError::InvalidRequest(
                "Invalid answer index".to_string(),
            ));
        }

        if question_index != current_index {
            return Err(ServerError::InvalidRequest(
                "Answer submitted for wrong question".to_string(),
            ));
        }

        let release_offset = (current_index as u64 + 1) * self.cycle_secs() - REVEAL_BUFFER_SECS;

        if elapsed >= release_offset {
            return Err(ServerError::InvalidRequest(
                "Answer already released".to_string(),
            ));
        }

        // Every submitter for this question computes this same instant from
        // the shared start time, so they all wake together. No lock is held
        // across the wait.
        let release_at = self.started_at + Duration::from_secs(release_offset);
        sleep_until(release_at).await;

        let answer_time = self.time_per_question - (release_offset - elapsed) as u32;

        {
            let mut records = self.records.write();
            let record = records
                .get_mut(user)
                .ok_or(ServerError::NotFound { resource: "Player" })?;

            record.submit(question_index, answer_index, answer_time);
        }

        Ok(self.questions[question_index as usize].correct_index())
    }

    pub fn online_count(&self) -> usize {
        self.online.read().len()
    }

    pub fn is_online(&self, user: &Identity) -> bool {
        self.online.read().contains(user)
    }

    pub fn remove_online(&self, user: &Identity) {
        self.online.write().retain(|player| player != user);
    }

    pub fn punish(&self, user: &Identity) {
        if let Some(record) = self.records.write().get_mut(user) {
            record.punished = true;
        }
    }

    /// Claims the right to persist this player's results. Returns true for
    /// exactly one caller, no matter how many race for it; the flag never
    /// reverts.
    pub fn mark_persisted(&self, user: &Identity) -> bool {
        let mut records = self.records.write();

        match records.get_mut(user) {
            Some(record) if !record.persisted => {
                record.persisted = true;
                true
            }
            _ => false,
        }
    }

    pub fn record(&self, user: &Identity) -> Option<PlayerRecord> {
        self.records.read().get(user).cloned()
    }

    /// A snapshot of every player's record, online or not.
    pub fn results(&self) -> Vec<(Identity, PlayerRecord)> {
        self.records
            .read()
            .iter()
            .map(|(player, record)| (player.clone(), record.clone()))
            .collect()
    }
}
