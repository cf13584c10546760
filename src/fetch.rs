use std::time::Duration;

use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::store::QuestionRow;

const OPENTDB_BASE_URL: &str = "https://opentdb.com";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Question request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Question service replied with code {0}")]
    Rejected(u8),
    #[error("Malformed question payload: {0}")]
    Malformed(&'static str),
    #[error("Not enough questions available")]
    NotEnough,
}

#[derive(Debug, Deserialize)]
struct FetchedQuestions {
    response_code: u8,
    results: Vec<FetchedQuestion>,
}

#[derive(Debug, Deserialize)]
struct FetchedQuestion {
    question: String,
    correct_answer: String,
    incorrect_answers: Vec<String>,
}

/// Pulls multiple-choice questions from the Open Trivia Database.
pub struct QuestionFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl QuestionFetcher {
    pub fn new() -> Self {
        Self::with_base_url(OPENTDB_BASE_URL)
    }

    /// Points the fetcher at a different question service, such as a mirror.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("http client is built");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub async fn fetch(&self, amount: u32) -> Result<Vec<QuestionRow>, FetchError> {
        info!("Fetching {} questions from OpenTDB...", amount);

        let url = format!(
            "{}/api.php?amount={}&type=multiple&difficulty=easy&encode=url3986",
            self.base_url, amount
        );

        let fetched: FetchedQuestions = self.client.get(url).send().await?.json().await?;

        if fetched.response_code != 0 {
            return Err(FetchError::Rejected(fetched.response_code));
        }

        let questions: Vec<_> = fetched
            .results
            .into_iter()
            .map(decode_question)
            .collect::<Result<_, _>>()?;

        if questions.len() != amount as usize {
            return Err(FetchError::NotEnough);
        }

        Ok(questions)
    }
}

impl Default for QuestionFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_question(fetched: FetchedQuestion) -> Result<QuestionRow, FetchError> {
    let [a, b, c]: [String; 3] = fetched
        .incorrect_answers
        .try_into()
        .map_err(|_| FetchError::Malformed("expected exactly three incorrect answers"))?;

    Ok(QuestionRow {
        question: percent_decode(&fetched.question),
        correct_answer: percent_decode(&fetched.correct_answer),
        incorrect_answers: [percent_decode(&a), percent_decode(&b), percent_decode(&c)],
    })
}

/// Decodes RFC 3986 percent-encoding, which OpenTDB uses when asked for
/// `encode=url3986`. Invalid escapes are passed through untouched.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            let byte = hex.and_then(|hex| u8::from_str_radix(hex, 16).ok());

            if let Some(byte) = byte {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }

        decoded.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}
