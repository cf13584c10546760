use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Context as AnyhowContext;
use log::{error, info};
use tokio::runtime::{self, Runtime};

use auth::Auth;
use config::ServerConfig;
use email::{DisabledMailer, Mailer, MailjetMailer};
use games::GameManager;
use rooms::RoomManager;
use server::Acceptor;
use store::{SqliteStorage, Storage};

mod auth;
mod config;
mod email;
mod errors;
mod fetch;
mod games;
mod logging;
mod protocol;
mod rooms;
mod server;
mod session;
mod store;
mod util;
mod validate;

/// Everything a session needs to do its job: the storage and mailer
/// collaborators, plus the singleton registries. Constructed once at startup
/// and handed to every connection.
#[derive(Clone)]
pub struct Context {
    pub storage: Arc<dyn Storage>,
    pub mailer: Arc<dyn Mailer>,
    pub auth: Arc<Auth>,
    pub rooms: Arc<RoomManager>,
    pub games: Arc<GameManager>,
}

struct QuizNight {
    context: Context,
    config: ServerConfig,
    runtime: Runtime,
}

impl QuizNight {
    fn new() -> anyhow::Result<Self> {
        info!("Building async runtime...");
        let main_runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("quiznight-async")
            .build()
            .context("could not build the async runtime")?;

        let config = ServerConfig::load(config::CONFIG_FILE_PATH);

        info!("Opening database...");
        let storage = main_runtime
            .block_on(SqliteStorage::connect(config::DATABASE_FILE_PATH))
            .context("could not open the database")?;

        main_runtime.block_on(storage.ensure_question_bank());

        let storage: Arc<dyn Storage> = Arc::new(storage);

        let mailer: Arc<dyn Mailer> = match MailjetMailer::from_env() {
            Some(mailer) => Arc::new(mailer),
            None => {
                info!("No Mailjet credentials in the environment, email delivery is disabled");
                Arc::new(DisabledMailer)
            }
        };

        let context = Context {
            auth: Auth::new(&storage),
            rooms: RoomManager::new(),
            games: GameManager::new(&storage),
            storage,
            mailer,
        };

        Ok(Self {
            context,
            config,
            runtime: main_runtime,
        })
    }

    fn run(&self) {
        let acceptor = Acceptor::new(self.context.clone());
        let address = self.config.address();

        self.runtime.spawn(async move {
            if let Err(e) = acceptor.run(&address).await {
                error!("Server stopped: {}", e);
            }
        });

        // The console stays on the main thread: `clear` wipes the terminal,
        // `exit` (any casing) shuts the server down.
        let stdin = std::io::stdin();

        for line in stdin.lock().lines() {
            let line = line.unwrap_or_default();

            if line == "clear" || line == "CLEAR" {
                print!("\x1B[2J\x1B[1;1H");
                let _ = std::io::stdout().flush();
            }

            if line.eq_ignore_ascii_case("exit") {
                break;
            }
        }

        info!("Shutting down server...");
    }
}

fn main() {
    logging::init_logger();

    match QuizNight::new() {
        Ok(quiznight) => {
            info!("Initialized successfully.");
            quiznight.run();
        }
        Err(error) => {
            error!("QuizNight failed to start: {:#}", error);
        }
    }
}
