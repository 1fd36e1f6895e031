use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod config;
mod db;
mod error;
#[cfg(test)]
mod memory;
mod models;
mod persist;
mod report;
mod resolver;
mod scale;
mod store;
mod survey;

use crate::config::SurveyConfig;
use crate::db::PgStore;
use crate::models::Student;
use crate::store::GrowthStore;
use crate::survey::{Survey, SurveyState};

#[derive(Parser)]
#[command(name = "growth-pulse")]
#[command(about = "Learner growth scores and self-assessment survey", long_about = None)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// TOML file overriding the curated survey areas
    #[arg(long, global = true)]
    survey_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import graded observations from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List focus areas, for one learner or the whole catalog
    FocusAreas {
        #[arg(long)]
        email: Option<String>,
        /// Only the curated survey areas, in survey order
        #[arg(long)]
        curated: bool,
    },
    /// Representative score per focus area for a learner
    Scores {
        #[arg(long)]
        email: String,
        #[arg(long)]
        json: bool,
    },
    /// Complete the self-assessment survey for a learner
    Survey {
        #[arg(long)]
        email: String,
        /// One rating per step, 6-10, comma separated
        #[arg(long, value_delimiter = ',')]
        ratings: Vec<i32>,
        /// Start from the learner's saved ratings
        #[arg(long)]
        prefill: bool,
    },
    /// Generate a markdown growth report
    Report {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "growth-report.md")]
        out: PathBuf,
    },
}

async fn find_student(store: &dyn GrowthStore, email: &str) -> anyhow::Result<Student> {
    store
        .student_by_email(email)
        .await?
        .with_context(|| format!("no learner with email {email}"))
}

async fn run_survey(
    store: &dyn GrowthStore,
    student: &Student,
    config: &SurveyConfig,
    ratings: &[i32],
    prefill: bool,
) -> anyhow::Result<()> {
    let mut survey = Survey::load(store, student.id, config).await?;

    if let Some(at) = survey.last_completed() {
        println!("Last completed: {}", at.format("%B %-d, %Y %H:%M UTC"));
    }

    if prefill {
        let prior = store.self_assessments(student.id).await?;
        survey.start_prefilled(&prior)?;
    } else {
        survey.start()?;
    }

    if ratings.len() > survey.steps() {
        anyhow::bail!(
            "got {} ratings for a {}-step survey",
            ratings.len(),
            survey.steps()
        );
    }

    while let Some(prompt) = survey.current_prompt() {
        debug!(step = prompt.step, focus_area_id = %prompt.focus_area_id, "survey prompt");
        if prompt.step == 0 {
            let scale_line: Vec<String> = prompt
                .options
                .iter()
                .map(|option| format!("{} {}", option.value, option.label))
                .collect();
            println!("Scale: {}", scale_line.join(" | "));
        }
        if let Some(&value) = ratings.get(prompt.step) {
            survey.select_rating(prompt.step, value)?;
        }
        let chosen = survey
            .current_prompt()
            .and_then(|p| p.selected)
            .with_context(|| format!("no rating given for {}", prompt.focus_area_name))?;
        let label = prompt
            .options
            .iter()
            .find(|option| option.value == chosen)
            .map_or("unrated", |option| option.label);
        println!(
            "[{}/{}] {}: {} ({})",
            prompt.step + 1,
            prompt.total,
            prompt.focus_area_name,
            chosen,
            label
        );
        println!("    {}", prompt.text);

        match survey.advance(store).await {
            Ok(state) if *state == SurveyState::Completed => break,
            Ok(_) => {}
            Err(err) => {
                if let Some(message) = survey.last_error() {
                    eprintln!("Survey stopped at step {}: {message}", prompt.step + 1);
                }
                return Err(err.into());
            }
        }
    }

    debug!(state = ?survey.state(), "survey finished");
    survey.close();
    println!("Survey saved for {}.", student.full_name);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&cli.database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool);
    let survey_config = SurveyConfig::load(cli.survey_config.as_deref())?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(store.pool()).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(store.pool(), &csv).await?;
            println!("Inserted {inserted} observations from {}.", csv.display());
        }
        Commands::FocusAreas { email, curated } => {
            let student_id = match email.as_deref() {
                Some(email) => Some(find_student(&store, email).await?.id),
                None => None,
            };
            let areas = resolver::resolve_focus_areas(&store, student_id).await?;

            if curated {
                for entry in resolver::curated_focus_areas(&areas, &survey_config) {
                    println!("- {} [{}]", entry.focus_area.name, entry.key);
                }
            } else if areas.is_empty() {
                println!("No focus areas found.");
            } else {
                for area in areas {
                    println!("- {}: {}", area.name, area.description);
                }
            }
        }
        Commands::Scores { email, json } => {
            let student = find_student(&store, &email).await?;
            let areas = resolver::resolve_focus_areas(&store, Some(student.id)).await?;
            let scores = aggregate::aggregate_scores(&store, student.id, &areas).await?;
            let ratings = store.self_assessments(student.id).await?;
            let rows = report::combine_scores(&areas, &scores, &ratings);

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("{} is not enrolled in any course with focus areas.", student.full_name);
            } else {
                println!("Focus area scores for {}:", student.full_name);
                for row in rows {
                    println!("- {}: {}", row.name, scale::format_score(row.score));
                }
            }
        }
        Commands::Survey {
            email,
            ratings,
            prefill,
        } => {
            let student = find_student(&store, &email).await?;
            run_survey(&store, &student, &survey_config, &ratings, prefill).await?;
        }
        Commands::Report { email, out } => {
            let student = find_student(&store, &email).await?;
            let areas = resolver::resolve_focus_areas(&store, Some(student.id)).await?;
            let scores = aggregate::aggregate_scores(&store, student.id, &areas).await?;
            let ratings = store.self_assessments(student.id).await?;
            let last_completed = store.last_self_assessment_at(student.id).await?;
            let rows = report::combine_scores(&areas, &scores, &ratings);
            let report = report::build_report(&student, &rows, last_completed);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
