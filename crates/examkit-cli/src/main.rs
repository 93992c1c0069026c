//! examkit CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "examkit",
    version,
    about = "Timed exam delivery and hybrid grading"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create starter config and example assessment
    Init,

    /// Validate assessment TOML files
    Validate {
        /// Path to assessment file or directory
        #[arg(long)]
        assessment: PathBuf,
    },

    /// Load assessments into the store
    Import {
        /// Path to assessment file or directory (default: assessments_dir from config)
        #[arg(long)]
        assessment: Option<PathBuf>,

        /// Replace assessments that already have submissions and regrade them
        #[arg(long)]
        force: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Take a timed exam interactively
    Take {
        /// Assessment to take
        #[arg(long)]
        assessment_id: u64,

        /// Student taking the exam
        #[arg(long)]
        student: u64,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Record an instructor grade for a free-text answer
    Grade {
        /// Submission to grade
        #[arg(long)]
        submission: u64,

        /// Question being graded
        #[arg(long)]
        question: u64,

        /// Points awarded (clamped to the question's value)
        #[arg(long, allow_negative_numbers = true)]
        score: f64,

        /// Feedback for the student
        #[arg(long)]
        feedback: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show a submission and its grading
    Show {
        /// Submission to show
        #[arg(long)]
        submission: u64,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Also save the JSON report to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List submissions for an assessment
    Submissions {
        /// Assessment to list
        #[arg(long)]
        assessment_id: u64,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("examkit=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { assessment } => commands::validate::execute(assessment),
        Commands::Import {
            assessment,
            force,
            config,
        } => commands::import::execute(assessment, force, config).await,
        Commands::Take {
            assessment_id,
            student,
            config,
        } => commands::take::execute(assessment_id, student, config).await,
        Commands::Grade {
            submission,
            question,
            score,
            feedback,
            config,
        } => commands::grade::execute(submission, question, score, feedback, config).await,
        Commands::Show {
            submission,
            json,
            output,
            config,
        } => commands::show::execute(submission, json, output, config).await,
        Commands::Submissions {
            assessment_id,
            config,
        } => commands::show::list(assessment_id, config).await,
    };

    if let Err(e) = result {
        tracing::error!("{e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
