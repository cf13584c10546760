use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::store::QuestionRow;

/// One trivia question with its four choices shuffled into place. Immutable
/// once built.
#[derive(Debug, Clone)]
pub struct Question {
    prompt: String,
    answers: Vec<String>,
    correct_index: u32,
}

impl Question {
    pub fn new(row: QuestionRow) -> Self {
        let correct = row.correct_answer;
        let [a, b, c] = row.incorrect_answers;

        let mut answers = vec![correct.clone(), a, b, c];
        answers.shuffle(&mut thread_rng());

        let correct_index = answers
            .iter()
            .position(|answer| answer == &correct)
            .expect("correct answer is present after the shuffle") as u32;

        Self {
            prompt: row.question,
            answers,
            correct_index,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    /// The choices keyed by their index, as they go out on the wire.
    pub fn answer_map(&self) -> BTreeMap<u32, String> {
        self.answers()
            .iter()
            .enumerate()
            .map(|(i, answer)| (i as u32, answer.clone()))
            .collect()
    }

    pub fn correct_index(&self) -> u32 {
        self.correct_index
    }
}
