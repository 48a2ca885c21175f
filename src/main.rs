use std::path::PathBuf;
use std::sync::Arc;
use whosaid::cli::{Cli, Commands, ConfigAction, GameAction};
use whosaid::config::Config;
use whosaid::embedding::FastEmbedProvider;
use whosaid::error::{Result, WhosaidError};
use whosaid::pipeline::Preprocessor;
use whosaid::quiz::QuizBook;
use whosaid::session::{GameStore, Phase};

fn main() {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Every variant's message already includes its cause
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Preprocess { profile } => cmd_preprocess(cli.config, profile),
        Commands::Config { action } => cmd_config(cli.config, action),
        Commands::Game { action } => cmd_game(cli.config, action),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "whosaid=debug" } else { "whosaid=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn cmd_preprocess(config_path: Option<PathBuf>, profile: Option<String>) -> Result<()> {
    let config = load_config(config_path, profile)?;
    let provider = Arc::new(FastEmbedProvider::new(&config.embedding.model)?);
    let preprocessor = Preprocessor::new(config, provider)?;

    let rt = tokio::runtime::Runtime::new().map_err(|e| WhosaidError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;
    let report = rt.block_on(preprocessor.run())?;

    println!("✓ Preprocessing complete");
    println!("  History messages:  {}", report.history_rows);
    println!("  Quiz candidates:   {}", report.pool_rows);
    println!("  Quiz questions:    {}", report.quiz_rows);
    println!(
        "  Authors forced in: {}/{}",
        report.substitutions, report.quiz_rows
    );
    println!(
        "  Embeddings:        {}",
        if report.cache_hit { "cached" } else { "computed" }
    );
    println!("  Elapsed:           {:.1}s", report.elapsed.as_secs_f64());

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, None)?;
            let value = serde_json::to_value(&config).map_err(|e| WhosaidError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;

            let shown = match &section {
                Some(name) => value.get(name.as_str()).cloned().ok_or_else(|| {
                    WhosaidError::Config(format!("Unknown config section: {}", name))
                })?,
                None => value,
            };

            let json = serde_json::to_string_pretty(&shown).map_err(|e| WhosaidError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("  Add your server's authors to [game] users_to_include before preprocessing");
        }
    }

    Ok(())
}

fn cmd_game(config_path: Option<PathBuf>, action: GameAction) -> Result<()> {
    let config = load_config(config_path, None)?;
    let mut store = GameStore::open(&config.state_db_path())?;

    match action {
        GameAction::Reset => {
            let state = store.reset()?;
            println!("✓ Game reset (session {})", state.session_id);
        }
        GameAction::Start { questions, seed } => {
            let book = QuizBook::load(&config)?;
            store.start(book.len(), questions, seed)?;
            println!("✓ Game started with {} questions", questions);
            show_page(&store, &book, None)?;
        }
        GameAction::Next => {
            let book = QuizBook::load(&config)?;
            store.advance()?;
            show_page(&store, &book, None)?;
        }
        GameAction::Show { player } => {
            let book = QuizBook::load(&config)?;
            show_page(&store, &book, player.as_deref())?;
        }
        GameAction::Guess { player, choice } => {
            let book = QuizBook::load(&config)?;
            store.record_guess(&book, &player, &choice)?;
            println!("✓ Guess recorded. Waiting for host!");
        }
        GameAction::Scores => print_scores(&store)?,
    }

    Ok(())
}

fn show_page(store: &GameStore, book: &QuizBook, player: Option<&str>) -> Result<()> {
    let state = store.state()?;

    match state.phase() {
        Phase::Lobby => {
            println!("Who said that?");
            println!("Waiting for the host to start the game.");
        }
        Phase::Question(position) => {
            let question = state
                .quiz_index(position)
                .and_then(|index| book.question(index))
                .ok_or_else(|| WhosaidError::Game(format!("Missing question {}", position)))?;

            println!("Question {}/{}", position + 1, state.selection.len());
            println!("Who said...");
            println!("  \"{}\"", question.content);
            println!();

            let answered = match player {
                Some(player) => store.has_answered(position, player)?,
                None => false,
            };
            if answered {
                println!("Answer recorded. Waiting for host!");
            } else {
                for option in question.candidate_names() {
                    println!("  - {}", option);
                }
            }
        }
        Phase::Reveal(position) => {
            let index = state
                .quiz_index(position)
                .ok_or_else(|| WhosaidError::Game(format!("Missing question {}", position)))?;

            for line in book.context(index)? {
                let marker = if line.focal { ">>" } else { "  " };
                println!("{} {} ({})", marker, line.author, line.display_date());
                println!("{}    {}", marker, line.content);
            }
            println!();

            for guess in store.guesses(position)? {
                if player.is_some_and(|p| p.trim() != guess.player) {
                    continue;
                }
                let mark = if guess.correct { "✓" } else { "✗" };
                println!("  {} {} guessed {}", mark, guess.player, guess.choice);
            }
        }
        Phase::Finished => {
            println!("THANKS FOR PLAYING <3");
            println!();
            print_scores(store)?;
        }
    }

    Ok(())
}

fn print_scores(store: &GameStore) -> Result<()> {
    let scores = store.scoreboard()?;
    if scores.is_empty() {
        println!("No guesses yet.");
        return Ok(());
    }

    for (rank, score) in scores.iter().enumerate() {
        println!(
            "{:>2}. {:<20} {} / {}",
            rank + 1,
            score.player,
            score.correct,
            score.answered
        );
    }
    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found at {}, using defaults. Run 'whosaid config init' to create one.",
            path.display()
        );
        return Config::load_defaults(profile.as_deref());
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}
