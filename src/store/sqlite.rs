use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use rand::rngs::OsRng;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError, FromRow, SqlitePool,
};

use super::{
    GameOutcome, IntoStorageError, NewUser, PlayerSummary, ProfileUpdate, QuestionRow, Result,
    Storage, StorageError, UserProfile, UserStatistics,
};
use crate::fetch::QuestionFetcher;
use crate::util::random_string;

/// How many questions the bank is topped up to at startup
const MIN_QUESTION_BANK: u32 = 50;
/// How many spare rows to keep beyond a single game's draw, so the random
/// selection stays varied
const MIN_SPARE_QUESTIONS: u32 = 20;

/// A sqlite storage implementation for quiznight
pub struct SqliteStorage {
    pool: SqlitePool,
    fetcher: QuestionFetcher,
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    email: String,
    address: String,
    phone_number: String,
    birthday: String,
    avatar_color: String,
    member_since: i64,
}

#[derive(FromRow)]
struct StatisticsRow {
    total_games: i64,
    correct_answers: i64,
    wrong_answers: i64,
    avg_answer_time: Option<i64>,
    score: i64,
}

#[derive(FromRow)]
struct QuestionDbRow {
    question: String,
    correct_answer: String,
    incorrect_answer_1: String,
    incorrect_answer_2: String,
    incorrect_answer_3: String,
}

impl SqliteStorage {
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| e.any())?;

        let storage = Self {
            pool,
            fetcher: QuestionFetcher::new(),
        };

        storage.create_schema().await?;

        Ok(storage)
    }

    /// Tops the question bank up to its minimum size. Failures are logged and
    /// swallowed so the server can still start without network access.
    pub async fn ensure_question_bank(&self) {
        let count = match self.question_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to count questions: {}", e);
                return;
            }
        };

        if count >= MIN_QUESTION_BANK {
            return;
        }

        match self.fetcher.fetch(MIN_QUESTION_BANK - count).await {
            Ok(rows) => {
                for row in rows {
                    let _ = self.add_question(&row).await;
                }

                info!("Topped the question bank up to {} questions", MIN_QUESTION_BANK);
            }
            Err(e) => warn!("Failed to top up the question bank: {}", e),
        }
    }

    async fn create_schema(&self) -> Result<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                address TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                birthday TEXT NOT NULL,
                avatar_color TEXT NOT NULL,
                member_since INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS statistics (
                user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                total_games INTEGER NOT NULL DEFAULT 0,
                correct_answers INTEGER NOT NULL DEFAULT 0,
                wrong_answers INTEGER NOT NULL DEFAULT 0,
                avg_answer_time INTEGER,
                score INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL UNIQUE,
                correct_answer TEXT NOT NULL,
                incorrect_answer_1 TEXT NOT NULL,
                incorrect_answer_2 TEXT NOT NULL,
                incorrect_answer_3 TEXT NOT NULL
            )",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| e.any())?;
        }

        Ok(())
    }

    async fn user(&self, username: &str) -> Result<UserRow> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "username"))
    }

    async fn statistics(&self, user_id: i64) -> Result<StatisticsRow> {
        sqlx::query_as::<_, StatisticsRow>(
            "SELECT total_games, correct_answers, wrong_answers, avg_answer_time, score
             FROM statistics WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("statistics", "user_id"))
    }

    async fn question_count(&self) -> Result<u32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(count as u32)
    }

    #[cfg(test)]
    pub(crate) fn set_fetcher(&mut self, fetcher: QuestionFetcher) {
        self.fetcher = fetcher;
    }

    pub(crate) async fn add_question(&self, row: &QuestionRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO questions
                (question, correct_answer, incorrect_answer_1, incorrect_answer_2, incorrect_answer_3)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&row.question)
        .bind(&row.correct_answer)
        .bind(&row.incorrect_answers[0])
        .bind(&row.incorrect_answers[1])
        .bind(&row.incorrect_answers[2])
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(())
    }

    fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| StorageError::Internal(e.to_string().into()))
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn user_exists(&self, username: &str) -> Result<bool> {
        let row: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(row.is_some())
    }

    async fn password_matches(&self, username: &str, password: &str) -> Result<bool> {
        let user = self.user(username).await?;

        let stored = PasswordHash::new(&user.password)
            .map_err(|e| StorageError::Internal(e.to_string().into()))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &stored)
            .is_ok())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<()> {
        if self.user_exists(&new_user.username).await? {
            return Err(StorageError::Conflict {
                resource: "user",
                field: "username",
                value: new_user.username,
            });
        }

        if self.email_exists(&new_user.email).await? {
            return Err(StorageError::Conflict {
                resource: "user",
                field: "email",
                value: new_user.email,
            });
        }

        let hashed_password = Self::hash_password(&new_user.password)?;

        let user_id: i64 = sqlx::query_scalar(
            "INSERT INTO users
                (username, password, email, address, phone_number, birthday, avatar_color, member_since)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&new_user.username)
        .bind(&hashed_password)
        .bind(&new_user.email)
        .bind(&new_user.address)
        .bind(&new_user.phone_number)
        .bind(&new_user.birthday)
        .bind(&new_user.avatar_color)
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        sqlx::query("INSERT INTO statistics (user_id) VALUES (?)")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(())
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let row: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(row.is_some())
    }

    async fn delete_user(&self, username: &str) -> Result<()> {
        let user = self.user(username).await?;

        sqlx::query("DELETE FROM statistics WHERE user_id = ?")
            .bind(user.id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user.id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(())
    }

    async fn questions(&self, amount: u32) -> Result<Vec<QuestionRow>> {
        let count = self.question_count().await?;

        // Top the bank up so a draw never exhausts it
        if count < amount + MIN_SPARE_QUESTIONS {
            let to_add = amount + MIN_SPARE_QUESTIONS - count;

            let fetched = self
                .fetcher
                .fetch(to_add)
                .await
                .map_err(|e| StorageError::Internal(e.to_string().into()))?;

            for row in fetched {
                // Duplicates are fine to skip
                let _ = self.add_question(&row).await;
            }
        }

        let rows = sqlx::query_as::<_, QuestionDbRow>(
            "SELECT question, correct_answer, incorrect_answer_1, incorrect_answer_2, incorrect_answer_3
             FROM questions ORDER BY RANDOM() LIMIT ?",
        )
        .bind(amount as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if rows.len() != amount as usize {
            return Err(StorageError::NotFound {
                resource: "questions",
                identifier: "requested amount",
            });
        }

        let questions = rows
            .into_iter()
            .map(|row| QuestionRow {
                question: row.question,
                correct_answer: row.correct_answer,
                incorrect_answers: [
                    row.incorrect_answer_1,
                    row.incorrect_answer_2,
                    row.incorrect_answer_3,
                ],
            })
            .collect();

        Ok(questions)
    }

    async fn user_statistics(&self, username: &str) -> Result<UserStatistics> {
        let user = self.user(username).await?;
        let stats = self.statistics(user.id).await?;

        Ok(UserStatistics {
            average_answer_time: stats.avg_answer_time.map(|t| t as u32),
            correct_answers: stats.correct_answers as u32,
            wrong_answers: stats.wrong_answers as u32,
            total_answers: (stats.correct_answers + stats.wrong_answers) as u32,
            total_games: stats.total_games as u32,
            score: stats.score as u32,
        })
    }

    async fn top_players(&self, limit: u32) -> Result<Vec<PlayerSummary>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT users.username, users.avatar_color, statistics.score
             FROM statistics
                INNER JOIN users ON statistics.user_id = users.id
             ORDER BY statistics.score DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let players = rows
            .into_iter()
            .map(|(username, avatar_color, score)| PlayerSummary {
                username,
                avatar_color,
                score: score as u32,
            })
            .collect();

        Ok(players)
    }

    async fn player_by_username(&self, username: &str) -> Result<PlayerSummary> {
        let user = self.user(username).await?;
        let stats = self.statistics(user.id).await?;

        Ok(PlayerSummary {
            username: user.username,
            avatar_color: user.avatar_color,
            score: stats.score as u32,
        })
    }

    async fn submit_game_result(&self, outcome: GameOutcome, username: &str) -> Result<()> {
        let user = self.user(username).await?;
        let stats = self.statistics(user.id).await?;

        let game_answers = outcome.correct_answers + outcome.wrong_answers;
        let prior_answers = (stats.correct_answers + stats.wrong_answers) as u32;

        // Blend the stored average with this game's, weighted by answer count.
        // Ordinary rounding, matching the rest of the scoring.
        let average_answer_time = match stats.avg_answer_time {
            Some(prior) => ((prior as f64 * prior_answers as f64
                + outcome.average_answer_time as f64 * game_answers as f64)
                / (prior_answers + game_answers) as f64)
                .round() as i64,
            None => outcome.average_answer_time as i64,
        };

        // One bad game never takes the total score below zero
        let score = (stats.score + outcome.score_change).max(0);

        sqlx::query(
            "UPDATE statistics SET
                total_games = ?,
                correct_answers = ?,
                wrong_answers = ?,
                avg_answer_time = ?,
                score = ?
             WHERE user_id = ?",
        )
        .bind(stats.total_games + 1)
        .bind(stats.correct_answers + outcome.correct_answers as i64)
        .bind(stats.wrong_answers + outcome.wrong_answers as i64)
        .bind(average_answer_time)
        .bind(score)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(())
    }

    async fn user_profile(&self, username: &str) -> Result<UserProfile> {
        let user = self.user(username).await?;

        Ok(UserProfile {
            username: user.username,
            email: user.email,
            address: user.address,
            phone_number: user.phone_number,
            birthday: user.birthday,
            avatar_color: user.avatar_color,
            member_since: user.member_since,
        })
    }

    async fn update_user_profile(&self, username: &str, update: ProfileUpdate) -> Result<()> {
        let user = self.user(username).await?;

        let password = match update.password {
            Some(password) => Self::hash_password(&password)?,
            None => user.password,
        };

        sqlx::query(
            "UPDATE users SET password = ?, address = ?, phone_number = ?, avatar_color = ?
             WHERE id = ?",
        )
        .bind(&password)
        .bind(&update.address)
        .bind(&update.phone_number)
        .bind(&update.avatar_color)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(())
    }

    async fn password_for_recovery_email(&self, email: &str) -> Result<String> {
        let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "email"))?;

        // Passwords are stored hashed, so recovery issues a fresh temporary
        // one instead of echoing the original back
        let temporary = random_string(12);
        let hashed = Self::hash_password(&temporary)?;

        sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(&hashed)
            .bind(user.id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(temporary)
    }
}

impl IntoStorageError for SqlxError {
    fn any(self) -> StorageError {
        StorageError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> StorageError {
        match self {
            SqlxError::RowNotFound => StorageError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Creates a storage backed by a throwaway database file.
    ///
    /// Several game tests freeze the clock with `#[tokio::test(start_paused)]`
    /// and fast-forward it with `advance`. The sqlite driver talks to a
    /// background worker thread over a channel, which the paused runtime treats
    /// as idle and so auto-advances the clock — tripping the pool's
    /// `acquire_timeout` and surfacing as a spurious `PoolTimedOut`. To keep the
    /// tests hermetic we (1) establish the pool on a dedicated, real-time
    /// runtime that outlives the test, and (2) keep a warm connection pinned
    /// with `test_before_acquire(false)` so no acquire ever waits on the frozen
    /// clock. This is test plumbing only; production goes through
    /// [`SqliteStorage::connect`].
    pub(crate) async fn test_storage() -> SqliteStorage {
        let path = std::env::temp_dir().join(format!("quiznight-test-{}.sqlite", random_string(12)));
        let path = path.to_str().expect("path is utf-8").to_owned();

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        // The sqlite driver hands each statement to a background worker thread
        // and awaits its reply over a channel. A paused test clock
        // (`#[tokio::test(start_paused)]`) sees the awaiting task as idle and
        // auto-advances time, tripping the pool's `acquire_timeout` before the
        // worker answers — a spurious `PoolTimedOut`. Keeping one connection
        // warm (`min_connections(1)` + `test_before_acquire(false)`) means later
        // acquires never wait on the clock; the opening handshake still can, so
        // `keep_clock_live` runs a runnable task across it to suppress
        // auto-advance. Test plumbing only — production uses
        // [`SqliteStorage::connect`].
        let pool = keep_clock_live(
            SqlitePoolOptions::new()
                .max_connections(5)
                .min_connections(1)
                .test_before_acquire(false)
                .connect_with(options),
        )
        .await
        .map_err(|e| e.any())
        .expect("test pool connects");

        let storage = SqliteStorage {
            pool,
            fetcher: QuestionFetcher::new(),
        };

        keep_clock_live(storage.create_schema())
            .await
            .expect("schema is created");

        storage
    }

    /// Drives `future` to completion while a second task stays perpetually
    /// runnable, so a paused test runtime never decides it is idle and
    /// auto-advances its clock past a real, cross-thread wakeup.
    async fn keep_clock_live<F: std::future::Future>(future: F) -> F::Output {
        let keeper = tokio::spawn(async {
            loop {
                tokio::task::yield_now().await;
            }
        });

        let output = future.await;
        keeper.abort();
        output
    }

    pub(crate) fn test_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: "Sup3r$ecret".to_string(),
            email: format!("{}@example.com", username),
            address: "Main Street, 4, Springfield".to_string(),
            phone_number: "052-1234567".to_string(),
            birthday: "01.02.1990".to_string(),
            avatar_color: "Blue".to_string(),
        }
    }

    /// Seeds enough questions that a draw never reaches out to the network.
    pub(crate) async fn seed_questions(storage: &SqliteStorage, amount: u32) {
        for i in 0..amount {
            storage
                .add_question(&QuestionRow {
                    question: format!("Question number {}?", i),
                    correct_answer: "Right".to_string(),
                    incorrect_answers: [
                        "Wrong A".to_string(),
                        "Wrong B".to_string(),
                        "Wrong C".to_string(),
                    ],
                })
                .await
                .expect("question is added");
        }
    }

    #[tokio::test]
    async fn created_users_can_log_in() {
        let storage = test_storage().await;
        storage
            .create_user(test_user("olive"))
            .await
            .expect("user is created");

        assert!(storage.user_exists("olive").await.expect("query succeeds"));
        assert!(storage
            .password_matches("olive", "Sup3r$ecret")
            .await
            .expect("query succeeds"));
        assert!(!storage
            .password_matches("olive", "wrong")
            .await
            .expect("query succeeds"));
    }

    #[tokio::test]
    async fn duplicate_usernames_conflict() {
        let storage = test_storage().await;
        storage
            .create_user(test_user("olive"))
            .await
            .expect("user is created");

        let mut duplicate = test_user("olive");
        duplicate.email = "other@example.com".to_string();

        let result = storage.create_user(duplicate).await;
        assert!(matches!(result, Err(StorageError::Conflict { .. })));
    }

    #[tokio::test]
    async fn game_results_blend_and_clamp() {
        let storage = test_storage().await;
        storage
            .create_user(test_user("olive"))
            .await
            .expect("user is created");

        // A losing first game cannot take the score below zero
        storage
            .submit_game_result(
                GameOutcome {
                    correct_answers: 0,
                    wrong_answers: 3,
                    average_answer_time: 10,
                    score_change: -30,
                },
                "olive",
            )
            .await
            .expect("result is submitted");

        let stats = storage
            .user_statistics("olive")
            .await
            .expect("statistics exist");

        assert_eq!(stats.score, 0);
        assert_eq!(stats.total_games, 1);
        assert_eq!(stats.average_answer_time, Some(10));

        // A second game blends the average weighted by answer count
        storage
            .submit_game_result(
                GameOutcome {
                    correct_answers: 3,
                    wrong_answers: 0,
                    average_answer_time: 4,
                    score_change: 180,
                },
                "olive",
            )
            .await
            .expect("result is submitted");

        let stats = storage
            .user_statistics("olive")
            .await
            .expect("statistics exist");

        assert_eq!(stats.score, 180);
        assert_eq!(stats.total_games, 2);
        assert_eq!(stats.total_answers, 6);
        // (10 * 3 + 4 * 3) / 6 = 7
        assert_eq!(stats.average_answer_time, Some(7));
    }

    #[tokio::test]
    async fn question_draws_return_exactly_the_requested_amount() {
        let storage = test_storage().await;
        seed_questions(&storage, 30).await;

        let questions = storage.questions(5).await.expect("questions are drawn");
        assert_eq!(questions.len(), 5);
    }

    #[tokio::test]
    async fn recovery_issues_a_working_temporary_password() {
        let storage = test_storage().await;
        storage
            .create_user(test_user("olive"))
            .await
            .expect("user is created");

        let temporary = storage
            .password_for_recovery_email("olive@example.com")
            .await
            .expect("secret is issued");

        assert!(storage
            .password_matches("olive", &temporary)
            .await
            .expect("query succeeds"));

        let missing = storage.password_for_recovery_email("nobody@example.com").await;
        assert!(matches!(missing, Err(StorageError::NotFound { .. })));
    }
}
