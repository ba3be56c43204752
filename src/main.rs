use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tutordesk::config::{ClientConfig, ConfigError, normalize_base_url};
use tutordesk::error::ErrorCode;
use tutordesk::gateway::types::{CourseRequest, CourseSummary};
use tutordesk::gateway::{GatewayError, HttpGateway};
use tutordesk::services::auth::{AuthError, Authenticator};
use tutordesk::services::chat::{ChatError, ChatSession};
use tutordesk::services::courses::{CourseCatalog, CourseError, ProfileOverview};
use tutordesk::services::doubts::{self, DoubtBoard};
use tutordesk::services::homework::{HintOutcome, HomeworkError, HomeworkManager};
use tutordesk::state::chat::{Chapter, Role};
use tutordesk::state::homework::{Attachment, ProblemPhase};
use tutordesk::store::{FileStorage, Storage, StoreError};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Homework(#[from] HomeworkError),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error("no saved chat for chapter {0}; pass --course or --title to start one")]
    UnboundChapter(String),
    #[error("could not read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stdin read failed: {0}")]
    Stdin(#[source] std::io::Error),
}

impl ErrorCode for CliError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Gateway(e) => e.error_code(),
            Self::Auth(e) => e.error_code(),
            Self::Chat(e) => e.error_code(),
            Self::Homework(e) => e.error_code(),
            Self::Course(e) => e.error_code(),
            Self::UnboundChapter(_) => "E_UNBOUND_CHAPTER",
            Self::ReadFile { .. } | Self::Stdin(_) => "E_IO",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Gateway(e) => e.retryable(),
            Self::Auth(e) => e.retryable(),
            Self::Chat(e) => e.retryable(),
            Self::Homework(e) => e.retryable(),
            Self::Course(e) => e.retryable(),
            _ => false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "tutordesk", about = "Chapter chat and homework client for the tutoring backend")]
struct Cli {
    #[arg(long, env = "TUTOR_API_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "TUTOR_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session token.
    Signin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TUTOR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and store the session token.
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TUTOR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Signout,
    /// Signed-in user and their courses.
    Profile,
    Courses(CoursesCommand),
    /// Interactive chat about one chapter. `/quit` leaves, `/close` ends the session.
    Chat(ChatArgs),
    Homework(HomeworkCommand),
    /// Saved questions and answers for a chapter.
    Doubts { chapter_id: String },
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// Chapter id, or its number within `--course`.
    chapter_id: String,

    /// Look the chapter up in this course when there is no session to resume.
    #[arg(long)]
    course: Option<String>,

    /// Start a new session with this chapter title instead of resuming.
    #[arg(long, conflicts_with = "course")]
    title: Option<String>,

    #[arg(long, requires = "title")]
    notes: Option<String>,
}

#[derive(Args, Debug)]
struct CoursesCommand {
    #[command(subcommand)]
    command: CoursesSubcommand,
}

#[derive(Subcommand, Debug)]
enum CoursesSubcommand {
    List,
    /// Chapters of one course with homework progress.
    Show { course_id: String },
    /// Ask the backend to generate a new course.
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[arg(long)]
    topic: String,
    #[arg(long, default_value = "Beginner")]
    difficulty: String,
    /// Length in weeks (1-52).
    #[arg(long, default_value_t = 4)]
    duration: u32,
    #[arg(long)]
    no_videos: bool,
    #[arg(long, default_value = "English")]
    language: String,
    #[arg(long, default_value = "Programming")]
    category: String,
    #[arg(long, default_value = "")]
    description: String,
}

#[derive(Args, Debug)]
struct HomeworkCommand {
    #[command(subcommand)]
    command: HomeworkSubcommand,
}

#[derive(Subcommand, Debug)]
enum HomeworkSubcommand {
    /// List problems with progress, generating a set if the chapter has none.
    List { chapter_id: String },
    Hint { chapter_id: String, problem_id: String },
    /// Save draft text without submitting.
    Draft { chapter_id: String, problem_id: String, text: String },
    /// Submit the saved draft, or the given text or image.
    Submit {
        chapter_id: String,
        problem_id: String,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

struct CliContext {
    config: ClientConfig,
    storage: Arc<dyn Storage>,
    gateway: Arc<HttpGateway>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = build_context(cli.base_url.as_deref(), cli.state_dir)?;

    let result = match cli.command {
        Command::Signin { email, password } => run_signin(&ctx, &email, &password).await,
        Command::Signup { name, email, password } => run_signup(&ctx, &name, &email, &password).await,
        Command::Signout => Authenticator::new(ctx.gateway.clone(), ctx.storage.clone())
            .sign_out()
            .map_err(CliError::from),
        Command::Profile => run_profile(&ctx).await,
        Command::Courses(courses) => run_courses(&ctx, courses).await,
        Command::Chat(args) => run_chat(&ctx, args).await,
        Command::Homework(homework) => run_homework(&ctx, homework).await,
        Command::Doubts { chapter_id } => run_doubts(&ctx, &chapter_id).await,
    };

    if let Some(hint) = result.as_ref().err().and_then(failure_hint) {
        eprintln!("{hint}");
    }
    result
}

/// Follow-up advice printed under a failed command.
fn failure_hint(error: &CliError) -> Option<&'static str> {
    if error.error_code() == "E_MISSING_TOKEN" {
        Some("not signed in; run `tutordesk signin` first")
    } else if error.retryable() {
        Some("the backend may be busy or unreachable; try again in a moment")
    } else {
        None
    }
}

fn build_context(base_url: Option<&str>, state_dir: Option<PathBuf>) -> Result<CliContext, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = base_url {
        config.api_base_url = normalize_base_url(base_url)?;
    }
    if let Some(state_dir) = state_dir {
        config.state_dir = state_dir;
    }
    let files = FileStorage::open(&config.state_dir)?;
    debug!(state_dir = %files.dir().display(), "cli: state directory ready");
    let storage: Arc<dyn Storage> = Arc::new(files);
    let gateway = Arc::new(HttpGateway::new(&config, storage.clone())?);
    debug!(base_url = gateway.base_url(), "cli: gateway ready");
    Ok(CliContext { config, storage, gateway })
}

// =============================================================================
// AUTH
// =============================================================================

async fn run_signin(ctx: &CliContext, email: &str, password: &str) -> Result<(), CliError> {
    let auth = Authenticator::new(ctx.gateway.clone(), ctx.storage.clone());
    let user = auth.sign_in(email, password).await?;
    println!("Welcome back, {}!", user.name);
    Ok(())
}

async fn run_signup(ctx: &CliContext, name: &str, email: &str, password: &str) -> Result<(), CliError> {
    let auth = Authenticator::new(ctx.gateway.clone(), ctx.storage.clone());
    let user = auth.sign_up(name, email, password).await?;
    println!("Welcome aboard, {}!", user.name);
    Ok(())
}

// =============================================================================
// CHAT
// =============================================================================

async fn run_chat(ctx: &CliContext, args: ChatArgs) -> Result<(), CliError> {
    let session = ChatSession::new(ctx.gateway.clone(), ctx.storage.clone(), ctx.config.chat_history_window);
    let board = Arc::new(DoubtBoard::new(ctx.gateway.clone()));
    let refresh = doubts::spawn_refresh_task(board.clone(), session.subscribe());

    let resumable = session
        .snapshot()
        .selected_chapter
        .is_some_and(|c| c.id == args.chapter_id);
    let chapter_id = match (args.title, args.course) {
        (Some(title), _) => {
            let mut chapter = Chapter::new(args.chapter_id, title);
            chapter.notes = args.notes;
            let id = chapter.id.clone();
            session.open_chat(chapter);
            id
        }
        (None, _) if resumable => args.chapter_id,
        (None, Some(course_id)) => {
            let chapter = CourseCatalog::new(ctx.gateway.clone())
                .chapter(&course_id, &args.chapter_id)
                .await?;
            let id = chapter.id.clone();
            session.open_chat(chapter);
            id
        }
        (None, None) => return Err(CliError::UnboundChapter(args.chapter_id)),
    };

    for message in session.snapshot().messages {
        print_message(message.role, &message.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.map_err(CliError::Stdin)? {
        match line.trim() {
            "" => {}
            "/quit" => break,
            "/close" => {
                session.close_chat();
                break;
            }
            text => match session.send_user_message(text).await {
                Ok(reply) => print_message(reply.role, &reply.content),
                Err(ChatError::Validation(e)) => eprintln!("{e}"),
                Err(e) => {
                    eprintln!("[{}] {e}", e.error_code());
                    if e.retryable() {
                        eprintln!("(temporary failure; send the message again to retry)");
                    }
                    if let Some(last) = session.snapshot().messages.last() {
                        print_message(last.role, &last.content);
                    }
                }
            },
        }
    }

    drop(session);
    // The refresh task exits once the session's event sender is gone.
    let _ = refresh.await;
    if let Some(saved) = board.cached(&chapter_id) {
        println!("{} saved doubt(s) for this chapter", saved.len());
    }
    Ok(())
}

fn print_message(role: Role, content: &str) {
    match role {
        Role::User => println!("you> {content}"),
        Role::Assistant => println!("tutor> {content}"),
    }
}

async fn run_doubts(ctx: &CliContext, chapter_id: &str) -> Result<(), CliError> {
    let board = DoubtBoard::new(ctx.gateway.clone());
    let doubts = board.doubts(chapter_id, true).await?;
    if doubts.is_empty() {
        println!("No doubts yet for this chapter");
    }
    for doubt in doubts {
        let when = doubt.created_at.as_deref().unwrap_or("-");
        println!("Q ({when}): {}\nA: {}\n", doubt.question, doubt.answer);
    }
    Ok(())
}

// =============================================================================
// COURSES
// =============================================================================

async fn run_profile(ctx: &CliContext) -> Result<(), CliError> {
    let overview = CourseCatalog::new(ctx.gateway.clone()).profile().await?;
    let ProfileOverview { user, completed, pending } = &overview;
    match &user.username {
        Some(username) => println!("{} (@{username}) <{}>", user.name, user.email),
        None => println!("{} <{}>", user.name, user.email),
    }
    if let Some(joined) = &user.created_at {
        println!("Joined {joined}");
    }
    println!("{} course(s): {} completed, {} in progress", overview.total(), completed.len(), pending.len());
    for course in pending.iter().chain(completed) {
        print_course(course);
    }
    Ok(())
}

async fn run_courses(ctx: &CliContext, courses: CoursesCommand) -> Result<(), CliError> {
    let catalog = CourseCatalog::new(ctx.gateway.clone());
    match courses.command {
        CoursesSubcommand::List => {
            let list = catalog.list().await?;
            if list.is_empty() {
                println!("No courses yet; create one with `tutordesk courses generate --topic ...`");
            }
            for course in &list {
                print_course(course);
            }
        }
        CoursesSubcommand::Show { course_id } => {
            let course = catalog.course(&course_id).await?;
            println!("{} ({:?}, {:.0}% complete)", course.title, course.status, course.overall_progress);
            if let Some(description) = &course.description {
                println!("{description}");
            }
            for chapter in &course.chapters {
                let progress = chapter
                    .homework_progress
                    .map(|p| format!(" [{}/{} solved]", p.solved_problems, p.total_problems))
                    .unwrap_or_default();
                println!("{:>3}. [{}] {}{progress}", chapter.chapter_number, chapter.id, chapter.title);
            }
        }
        CoursesSubcommand::Generate(args) => {
            let request = CourseRequest {
                topic: args.topic,
                difficulty: args.difficulty,
                duration: args.duration,
                include_videos: !args.no_videos,
                language: args.language,
                category: args.category,
                description: args.description,
            };
            let course = catalog.generate(request).await?;
            println!("Course \"{}\" is being generated (id {})", course.title, course.id);
        }
    }
    Ok(())
}

fn print_course(course: &CourseSummary) {
    println!(
        "[{}] {} ({:?}) {:.0}%, {}/{} chapters",
        course.id, course.title, course.status, course.progress, course.completed_chapters, course.total_chapters
    );
}

// =============================================================================
// HOMEWORK
// =============================================================================

async fn run_homework(ctx: &CliContext, homework: HomeworkCommand) -> Result<(), CliError> {
    match homework.command {
        HomeworkSubcommand::List { chapter_id } => {
            let manager = homework_manager(ctx, &chapter_id);
            let progress = manager.load_problems().await?;
            println!(
                "{}/{} solved ({:.0}%)",
                progress.solved_problems, progress.total_problems, progress.completion_percentage
            );
            for problem in manager.problems() {
                println!(
                    "[{}] {} ({:?}, {:?}) {}",
                    problem.id,
                    problem.title,
                    problem.difficulty,
                    manager.phase(&problem.id),
                    problem.description
                );
            }
            Ok(())
        }
        HomeworkSubcommand::Hint { chapter_id, problem_id } => {
            let manager = homework_manager(ctx, &chapter_id);
            manager.load_problems().await?;
            match manager.request_hint(&problem_id).await? {
                HintOutcome::Static(hint) | HintOutcome::Generated(hint) => println!("Hint: {hint}"),
                HintOutcome::Dropped => println!("A hint is already on its way"),
                HintOutcome::Exhausted => println!("No more hints available"),
            }
            Ok(())
        }
        HomeworkSubcommand::Draft { chapter_id, problem_id, text } => {
            homework_manager(ctx, &chapter_id).set_draft_text(&problem_id, text);
            Ok(())
        }
        HomeworkSubcommand::Submit { chapter_id, problem_id, text, image } => {
            let manager = homework_manager(ctx, &chapter_id);
            manager.load_problems().await?;
            if let Some(text) = text {
                manager.set_draft_text(&problem_id, text);
            }
            if let Some(path) = image {
                manager.set_draft_image(&problem_id, &read_attachment(&path).await?)?;
            }
            let feedback = manager.submit_solution(&problem_id).await?;
            let verdict = if feedback.is_correct { "Correct" } else { "Not quite" };
            println!("{verdict}: {}", feedback.feedback_text);
            if let Some(score) = feedback.score {
                println!("Score: {score}");
            }
            if let Some(suggestions) = &feedback.suggestions {
                println!("Suggestions: {suggestions}");
            }
            if manager.phase(&problem_id) == ProblemPhase::Correct {
                if let Some(progress) = manager.progress() {
                    println!("{}/{} solved", progress.solved_problems, progress.total_problems);
                }
            }
            Ok(())
        }
    }
}

fn homework_manager(ctx: &CliContext, chapter_id: &str) -> HomeworkManager {
    HomeworkManager::new(chapter_id, ctx.gateway.clone(), ctx.storage.clone())
}

async fn read_attachment(path: &Path) -> Result<Attachment, CliError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| CliError::ReadFile { path: path.to_owned(), source })?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok(Attachment { mime: mime.essence_str().to_owned(), bytes })
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
