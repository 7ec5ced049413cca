//! CLI argument parsing, validation, and startup helpers.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{error, warn};

use crate::client::{AuthScheme, NewPastExam, RegisterRequest};
use crate::store::LogoutMode;
use crate::{ClientConfig, FallbackTokens, Session, SessionConfig};

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
pub enum HeaderScheme {
    /// Raw token, no scheme prefix
    #[default]
    Raw,
    /// `Bearer <token>`
    Bearer,
}

impl From<HeaderScheme> for AuthScheme {
    fn from(scheme: HeaderScheme) -> Self {
        match scheme {
            HeaderScheme::Raw => AuthScheme::Raw,
            HeaderScheme::Bearer => AuthScheme::Bearer,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "campuslink",
    about = "University services client with local session management"
)]
pub struct Args {
    /// Backend base URL, including the API prefix
    #[arg(
        long,
        env = "CAMPUSLINK_API_URL",
        default_value = "http://localhost:8080/api/v1"
    )]
    pub api_url: String,

    /// Path to the SQLite credential database
    #[arg(short, long, default_value = "campuslink.db")]
    pub database: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    pub timeout_secs: u64,

    /// Authorization header scheme the backend expects
    #[arg(long, value_enum, default_value = "raw")]
    pub auth_scheme: HeaderScheme,

    /// Path to a JSON file with fallback tokens (dev/test only)
    #[arg(long)]
    pub fallback_tokens_file: Option<String>,

    /// Log output format
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CAMPUSLINK_PASSWORD")]
        password: String,
    },
    /// End the session (soft by default: the stored token is kept)
    Logout {
        /// Also remove the stored token and logged-in flag
        #[arg(long)]
        hard: bool,
    },
    /// Show whether a usable session exists
    Status,
    /// Show the locally stored user
    Whoami,
    /// Register a new account
    Register {
        #[arg(long)]
        department_id: i64,
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long, env = "CAMPUSLINK_PASSWORD")]
        password: String,
    },
    /// Profile operations
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Past-exam operations
    #[command(subcommand)]
    Exams(ExamsCommand),
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Fetch the profile from the backend
    Show,
    /// Update first and last name
    Update {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    /// Upload a profile photo
    PhotoUpload { path: PathBuf },
    /// Delete the profile photo
    PhotoDelete,
}

#[derive(Subcommand, Debug)]
pub enum ExamsCommand {
    /// List past exams
    List {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "10")]
        page_size: u32,
    },
    /// Show one past exam
    Show { id: i64 },
    /// Create a past exam
    Create {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        term: String,
        #[arg(long)]
        department_id: i64,
        #[arg(long)]
        course_code: String,
        #[arg(long)]
        title: String,
    },
    /// Attach a file to a past exam
    AddFile { id: i64, path: PathBuf },
    /// Remove a file from a past exam
    DeleteFile { id: i64, file_id: i64 },
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load fallback tokens from the environment or a JSON file.
///
/// Environment variables win over the file; every token is optional.
/// Returns None and logs an error if a given file cannot be used.
pub fn load_fallback_tokens(file: Option<&str>) -> Option<FallbackTokens> {
    let mut tokens = match file {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(tokens) => tokens,
                Err(e) => {
                    error!(path = %path, error = %e, "Fallback tokens file is not valid JSON");
                    return None;
                }
            },
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read fallback tokens file");
                return None;
            }
        },
        None => FallbackTokens::default(),
    };

    if let Ok(token) = std::env::var("CAMPUSLINK_FALLBACK_EXPIRED") {
        tokens.expired = Some(token);
    }
    if let Ok(token) = std::env::var("CAMPUSLINK_FALLBACK_GENERIC") {
        tokens.generic = Some(token);
    }
    if let Ok(token) = std::env::var("CAMPUSLINK_FALLBACK_LOGIN") {
        tokens.login = Some(token);
    }

    if !tokens.is_empty() {
        warn!("fallback credentials configured; not for production use");
    }

    Some(tokens)
}

/// Build the session config from validated arguments.
pub fn build_config(args: &Args, fallbacks: FallbackTokens) -> SessionConfig {
    SessionConfig {
        database: args.database.clone(),
        client: ClientConfig {
            base_url: args.api_url.clone(),
            timeout: std::time::Duration::from_secs(args.timeout_secs),
            auth_scheme: args.auth_scheme.into(),
        },
        fallbacks,
    }
}

/// Open the session, logging errors if it fails.
pub async fn open_session(config: SessionConfig) -> Option<Session> {
    match Session::open(config).await {
        Ok(session) => Some(session),
        Err(e) => {
            error!(error = %e, "Failed to open session");
            None
        }
    }
}

/// Run a subcommand against the session. Returns false on failure.
pub async fn run_command(session: &Session, command: Command) -> bool {
    let api = session.api();
    let result = match command {
        Command::Login { email, password } => match api.login(&email, &password).await {
            Ok(profile) => {
                println!("Logged in as {}", profile.email.as_deref().unwrap_or(&email));
                Ok(())
            }
            Err(e) => Err(e),
        },
        Command::Logout { hard } => {
            let mode = if hard {
                LogoutMode::Hard
            } else {
                LogoutMode::Soft
            };
            match api.logout(mode).await {
                Ok(()) => {
                    println!("Logged out ({})", if hard { "hard" } else { "soft" });
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Command::Status => {
            if api.is_logged_in().await {
                println!("Session active");
            } else {
                println!("No active session");
            }
            Ok(())
        }
        Command::Whoami => match api.current_user().await {
            Ok(Some(profile)) => {
                print_profile(&profile);
                Ok(())
            }
            Ok(None) => {
                println!("No stored user");
                Ok(())
            }
            Err(e) => Err(e),
        },
        Command::Register {
            department_id,
            email,
            first_name,
            last_name,
            password,
        } => {
            let request = RegisterRequest {
                department_id,
                email,
                first_name,
                last_name,
                password,
            };
            match api.register(&request).await {
                Ok(profile) => {
                    println!(
                        "Registered {}",
                        profile.email.as_deref().unwrap_or(&request.email)
                    );
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Command::Profile(command) => run_profile_command(session, command).await,
        Command::Exams(command) => run_exams_command(session, command).await,
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Command failed");
            false
        }
    }
}

async fn run_profile_command(
    session: &Session,
    command: ProfileCommand,
) -> Result<(), crate::ApiError> {
    let api = session.api();
    match command {
        ProfileCommand::Show => {
            let profile = api.fetch_profile().await?;
            print_profile(&profile);
        }
        ProfileCommand::Update {
            first_name,
            last_name,
        } => {
            let profile = api.update_profile(&first_name, &last_name).await?;
            print_profile(&profile);
        }
        ProfileCommand::PhotoUpload { path } => {
            let (file_name, mime, bytes) = read_upload(&path)?;
            match api.upload_photo(&file_name, mime, bytes).await? {
                Some(url) => println!("Photo uploaded: {}", url),
                None => println!("Photo uploaded"),
            }
        }
        ProfileCommand::PhotoDelete => {
            api.delete_photo().await?;
            println!("Photo deleted");
        }
    }
    Ok(())
}

async fn run_exams_command(
    session: &Session,
    command: ExamsCommand,
) -> Result<(), crate::ApiError> {
    let api = session.api();
    match command {
        ExamsCommand::List { page, page_size } => {
            let exams = api.list_exams(page, page_size).await?;
            if exams.is_empty() {
                println!("No past exams");
            }
            for exam in exams {
                println!(
                    "#{} {} {} {} - {} ({} files)",
                    exam.id,
                    exam.year,
                    exam.term,
                    exam.course_code,
                    exam.title,
                    exam.files.len()
                );
            }
        }
        ExamsCommand::Show { id } => {
            let exam = api.get_exam(id).await?;
            println!(
                "#{} {} {} {} - {}",
                exam.id, exam.year, exam.term, exam.course_code, exam.title
            );
            for file in exam.files {
                println!("  file #{}: {}", file.id, file.name);
            }
        }
        ExamsCommand::Create {
            year,
            term,
            department_id,
            course_code,
            title,
        } => {
            let exam = api
                .create_exam(&NewPastExam {
                    year,
                    term,
                    department_id,
                    course_code,
                    title,
                })
                .await?;
            println!("Created past exam #{}", exam.id);
        }
        ExamsCommand::AddFile { id, path } => {
            let (file_name, mime, bytes) = read_upload(&path)?;
            let file = api.add_exam_file(id, &file_name, mime, bytes).await?;
            println!("Attached file #{}: {}", file.id, file.name);
        }
        ExamsCommand::DeleteFile { id, file_id } => {
            api.delete_exam_file(id, file_id).await?;
            println!("Deleted file #{}", file_id);
        }
    }
    Ok(())
}

/// Read a file to upload, deriving the multipart file name and mime type
/// from its path.
fn read_upload(path: &Path) -> Result<(String, &'static str, Vec<u8>), crate::ApiError> {
    let bytes = std::fs::read(path)
        .map_err(|e| crate::ApiError::Invalid(format!("cannot read {}: {}", path.display(), e)))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok((file_name, guess_mime(path), bytes))
}

fn guess_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
