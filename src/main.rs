use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use refset_core::config::max_page_size_from_env_value;
use refset_core::constants::{DEFAULT_COMMITTER_EMAIL_DOMAIN, DEFAULT_DATA_DIR};
use refset_core::{
    ConceptStore, CoreConfig, GitStore, PageRequest, RefsetStore, TranslationStore, User,
    WorkflowService,
};
use refset_model::{Concept, Refset, RefsetMember, Translation, UserRole, WorkflowAction, wire};

#[derive(Parser)]
#[command(name = "refset-run")]
#[command(about = "Refset translation workflow CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialise the data directory as a store
    Init,
    /// Create a refset from its members
    CreateRefset {
        /// Refset name
        #[arg(long)]
        name: String,
        /// Member as `<terminology id>=<name>` (repeatable)
        #[arg(long = "member", value_parser = parse_member)]
        members: Vec<RefsetMember>,
    },
    /// Create a translation of a refset
    CreateTranslation {
        /// Refset UUID
        #[arg(long)]
        refset: Uuid,
        /// Translation name
        #[arg(long)]
        name: String,
        /// Language code, e.g. `da`
        #[arg(long)]
        language: String,
        /// Module id stamped on new concepts
        #[arg(long)]
        module: String,
    },
    /// List concepts a role may pick up
    Available {
        /// Translation UUID
        #[arg(long)]
        translation: Uuid,
        /// AUTHOR, REVIEWER, REVIEWER2 or ADMIN
        #[arg(long)]
        role: UserRole,
        /// Case-insensitive filter on terminology id or name
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = 0)]
        start: usize,
        #[arg(long)]
        max: Option<usize>,
    },
    /// List work a user currently holds
    Assigned {
        /// Translation UUID
        #[arg(long)]
        translation: Uuid,
        #[arg(long)]
        role: UserRole,
        #[arg(long)]
        user: String,
    },
    /// Validate and perform a workflow action
    Act {
        /// Translation UUID
        #[arg(long)]
        translation: Uuid,
        #[arg(long)]
        user: String,
        #[arg(long)]
        role: UserRole,
        /// e.g. ASSIGN, SAVE, FINISH, PREPARE_FOR_PUBLICATION
        #[arg(long)]
        action: WorkflowAction,
        /// Stored concept UUID
        #[arg(long, conflicts_with = "terminology_id", required_unless_present = "terminology_id")]
        concept: Option<Uuid>,
        /// Terminology id of a stored concept or an unassigned refset member
        #[arg(long)]
        terminology_id: Option<String>,
    },
    /// Print the workflow table as YAML
    Config,
}

/// Main entry point for the refset workflow CLI
///
/// # Environment Variables
/// - `REFSET_DATA_DIR`: store directory (default: "refset_data")
/// - `REFSET_COMMITTER_EMAIL_DOMAIN`: domain for committer emails (default: "refset.local")
/// - `REFSET_MAX_PAGE_SIZE`: upper bound on page sizes (default: 100)
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("refset=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cfg = Arc::new(config_from_env()?);
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => {
            GitStore::init(cfg.clone())?;
            println!("Initialised store in {}", cfg.data_dir().display());
        }
        Some(Commands::CreateRefset { name, members }) => {
            let store = GitStore::open(cfg)?;
            let refset = store.create_refset(Refset::new(name, members))?;
            println!("Created refset {} ({} members)", refset.id, refset.members.len());
        }
        Some(Commands::CreateTranslation {
            refset,
            name,
            language,
            module,
        }) => {
            let store = GitStore::open(cfg)?;
            let translation =
                store.create_translation(Translation::new(refset, name, language, module))?;
            println!("Created translation {}", translation.id);
        }
        Some(Commands::Available {
            translation,
            role,
            query,
            start,
            max,
        }) => {
            let service = service(cfg)?;
            let translation = load_translation(&service, translation)?;
            let page = service.find_available_concepts(
                role,
                &translation,
                &PageRequest::new(start, max, query),
            )?;
            println!("{} available", page.total_count);
            for concept in page.items {
                println!(
                    "{}\t{}\t{}",
                    concept.terminology_id, concept.workflow_status, concept.name
                );
            }
        }
        Some(Commands::Assigned {
            translation,
            role,
            user,
        }) => {
            let service = service(cfg)?;
            let translation = load_translation(&service, translation)?;
            let page = service.find_assigned_concepts(
                role,
                &translation,
                &user,
                &PageRequest::default(),
            )?;
            println!("{} assigned", page.total_count);
            for record in page.items {
                println!("{}", wire::render(&record)?);
            }
        }
        Some(Commands::Act {
            translation,
            user,
            role,
            action,
            concept,
            terminology_id,
        }) => {
            let service = service(cfg)?;
            let translation = load_translation(&service, translation)?;
            let user = User::from_user_name(&user)?;
            let concept = resolve_concept(&service, &translation, concept, terminology_id)?;

            let validation =
                service.validate_workflow_action(&translation, &user, role, action, &concept)?;
            for warning in &validation.warnings {
                eprintln!("warning: {warning}");
            }
            if !validation.is_valid() {
                for error in &validation.errors {
                    eprintln!("error: {error}");
                }
                bail!("{action} rejected for {role}");
            }
            let outcome =
                service.perform_workflow_action(&translation, &user, role, action, &concept)?;
            println!("{}", wire::render(&outcome)?);
        }
        Some(Commands::Config) => {
            print!("{}", serde_yaml::to_string(&refset_core::workflow::workflow_config())?);
        }
        None => {
            println!("Use 'refset-run --help' for commands");
        }
    }

    Ok(())
}

fn config_from_env() -> anyhow::Result<CoreConfig> {
    let data_dir = std::env::var("REFSET_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
    let domain = std::env::var("REFSET_COMMITTER_EMAIL_DOMAIN")
        .unwrap_or_else(|_| DEFAULT_COMMITTER_EMAIL_DOMAIN.into());
    let max_page_size = max_page_size_from_env_value(std::env::var("REFSET_MAX_PAGE_SIZE").ok())?;
    let cfg = CoreConfig::new(PathBuf::from(data_dir), domain, max_page_size)?;
    tracing::debug!(
        data_dir = %cfg.data_dir().display(),
        max_page_size = cfg.max_page_size(),
        "resolved configuration"
    );
    Ok(cfg)
}

fn service(cfg: Arc<CoreConfig>) -> anyhow::Result<WorkflowService<GitStore>> {
    let store = GitStore::open(cfg.clone())
        .with_context(|| format!("no store in {}; run `refset-run init`", cfg.data_dir().display()))?;
    Ok(WorkflowService::new(store, cfg))
}

fn load_translation(service: &WorkflowService<GitStore>, id: Uuid) -> anyhow::Result<Translation> {
    service
        .store()
        .get_translation(id)?
        .with_context(|| format!("translation {id} not found"))
}

/// A stored concept by id, or by terminology id falling back to the author pool.
fn resolve_concept(
    service: &WorkflowService<GitStore>,
    translation: &Translation,
    concept: Option<Uuid>,
    terminology_id: Option<String>,
) -> anyhow::Result<Concept> {
    if let Some(id) = concept {
        return service
            .store()
            .get_concept(id)?
            .with_context(|| format!("concept {id} not found"));
    }
    let Some(terminology_id) = terminology_id else {
        bail!("one of --concept or --terminology-id is required");
    };

    if let Some(stored) = service
        .store()
        .find_concepts_by_translation(translation.id)?
        .into_iter()
        .find(|c| c.terminology_id == terminology_id)
    {
        return Ok(stored);
    }

    let candidates = service.find_available_concepts(
        UserRole::Author,
        translation,
        &PageRequest::new(0, None, Some(terminology_id.clone())),
    )?;
    candidates
        .items
        .into_iter()
        .find(|c| c.terminology_id == terminology_id)
        .with_context(|| {
            format!("{terminology_id} is neither a stored concept nor a refset member")
        })
}

fn parse_member(value: &str) -> Result<RefsetMember, String> {
    match value.split_once('=') {
        Some((id, name)) if !id.trim().is_empty() && !name.trim().is_empty() => Ok(RefsetMember {
            concept_id: id.trim().to_string(),
            name: name.trim().to_string(),
        }),
        _ => Err(format!("expected <terminology id>=<name>, got '{value}'")),
    }
}
