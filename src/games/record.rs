use std::sync::Arc;

use crate::store::GameOutcome;

use super::Question;

pub const CORRECT_ANSWER_POINTS: u32 = 30;
pub const INCORRECT_ANSWER_POINTS: u32 = 10;
pub const PENALTY_POINTS: u32 = 20;

/// The placeholder choice a player "gave" before actually answering. Sits
/// outside the four real choices, so it never matches a correct index.
pub const NO_ANSWER_INDEX: u32 = 5;

/// One player's performance in one game: what they picked and how long they
/// took, per question. Starts out as "wrong, slowest" across the board.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    questions: Arc<Vec<Question>>,
    time_per_question: u32,
    /// (chosen index, answer time) per question
    answers: Vec<(u32, u32)>,
    pub punished: bool,
    pub persisted: bool,
}

impl PlayerRecord {
    pub(super) fn new(questions: Arc<Vec<Question>>, time_per_question: u32) -> Self {
        let answers = vec![(NO_ANSWER_INDEX, time_per_question); questions.len()];

        Self {
            questions,
            time_per_question,
            answers,
            punished: false,
            persisted: false,
        }
    }

    pub fn submit(&mut self, question_index: u32, answer_index: u32, answer_time: u32) {
        if let Some(answer) = self.answers.get_mut(question_index as usize) {
            *answer = (answer_index, answer_time);
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &[(u32, u32)] {
        &self.answers
    }

    pub fn correct_answers(&self) -> u32 {
        self.answers
            .iter()
            .zip(self.questions.iter())
            .filter(|((chosen, _), question)| *chosen == question.correct_index())
            .count() as u32
    }

    pub fn wrong_answers(&self) -> u32 {
        self.answers.len() as u32 - self.correct_answers()
    }

    pub fn average_answer_time(&self) -> u32 {
        if self.answers.is_empty() {
            return 0;
        }

        let sum: u32 = self.answers.iter().map(|(_, time)| time).sum();
        sum / self.answers.len() as u32
    }

    /// How this game moves the player's total score. Fast correct answers pay
    /// out more, wrong answers and leaving early cost points.
    pub fn score_change(&self) -> i64 {
        let correct = self.correct_answers() as f64;
        let average = self.average_answer_time() as f64;
        let time_per_question = self.time_per_question as f64;

        let earned =
            (correct * CORRECT_ANSWER_POINTS as f64 / (average / time_per_question)).round() as i64;

        let mut change = earned - (self.wrong_answers() * INCORRECT_ANSWER_POINTS) as i64;

        if self.punished {
            change -= PENALTY_POINTS as i64;
        }

        change
    }

    pub fn outcome(&self) -> GameOutcome {
        GameOutcome {
            correct_answers: self.correct_answers(),
            wrong_answers: self.wrong_answers(),
            average_answer_time: self.average_answer_time(),
            score_change: self.score_change(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::QuestionRow;

    fn questions(count: usize) -> Arc<Vec<Question>> {
        let questions = (0..count)
            .map(|i| {
                Question::new(QuestionRow {
                    question: format!("Question {}?", i),
                    correct_answer: "Right".to_string(),
                    incorrect_answers: [
                        "Wrong A".to_string(),
                        "Wrong B".to_string(),
                        "Wrong C".to_string(),
                    ],
                })
            })
            .collect();

        Arc::new(questions)
    }

    #[test]
    fn all_correct_at_half_time_scores_180() {
        let questions = questions(3);
        let mut record = PlayerRecord::new(questions.clone(), 10);

        for (i, question) in questions.iter().enumerate() {
            record.submit(i as u32, question.correct_index(), 5);
        }

        assert_eq!(record.correct_answers(), 3);
        assert_eq!(record.wrong_answers(), 0);
        assert_eq!(record.average_answer_time(), 5);
        // round(3 * 30 / (5 / 10)) = 180
        assert_eq!(record.score_change(), 180);
    }

    #[test]
    fn never_answering_degenerates_to_a_pure_penalty() {
        let record = PlayerRecord::new(questions(3), 10);

        assert_eq!(record.correct_answers(), 0);
        assert_eq!(record.wrong_answers(), 3);
        assert_eq!(record.average_answer_time(), 10);
        // round(0 / (10 / 10)) - 3 * 10 = -30
        assert_eq!(record.score_change(), -30);
    }

    #[test]
    fn punishment_costs_a_flat_twenty() {
        let mut record = PlayerRecord::new(questions(3), 10);
        record.punished = true;

        assert_eq!(record.score_change(), -50);
    }

    #[test]
    fn outcomes_mirror_the_record() {
        let questions = questions(2);
        let mut record = PlayerRecord::new(questions.clone(), 10);
        record.submit(0, questions[0].correct_index(), 4);

        let outcome = record.outcome();

        assert_eq!(outcome.correct_answers, 1);
        assert_eq!(outcome.wrong_answers, 1);
        // (4 + 10) / 2 = 7
        assert_eq!(outcome.average_answer_time, 7);
        assert_eq!(outcome.score_change, record.score_change());
    }
}
