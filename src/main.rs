use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use formdesk::api::ApiClient;
use formdesk::catalog::{HttpCatalog, OptionId, ProviderError, SelectOption};
use formdesk::config::{Config, API_TOKEN_ENV};
use formdesk::form::{
    ClientDialog, ClientRecord, EnquiryDialog, EnquiryRecord, EnquiryStatus, FetchStatus,
    HttpSink, OptionList,
};
use formdesk::session::{LoginRedirect, SessionContext};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Get the config directory path (~/.config/formdesk/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("formdesk"))
}

fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
    }

    // User-only access: the directory holds the session token.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }
    Ok(())
}

/// Tells the terminal user where to log in again after a 401.
struct TerminalNavigator;

impl LoginRedirect for TerminalNavigator {
    fn redirect_to_login(&self, login_url: &str) {
        eprintln!("Session expired. Log in at {} and run:", login_url);
        eprintln!("  formdesk login --token <TOKEN>");
    }
}

#[derive(Parser, Debug)]
#[command(name = "formdesk", about = "Client and enquiry forms for the admin panel API")]
struct Args {
    /// Config file (default: ~/.config/formdesk/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a bearer token for later requests
    Login {
        #[arg(long)]
        token: String,
    },
    /// Forget the stored token
    Logout,
    /// List products
    Products,
    /// List the packages of a product
    Packages {
        #[arg(value_name = "PRODUCT_ID")]
        product_id: String,
    },
    /// Create an enquiry, or update one given with --record
    Enquiry(EnquiryArgs),
    /// Create a client, or update one given with --record
    Client(ClientArgs),
}

#[derive(clap::Args, Debug)]
struct EnquiryArgs {
    /// Existing enquiry as JSON (switches to update mode)
    #[arg(long, value_name = "FILE")]
    record: Option<PathBuf>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    institute: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    contact: Option<String>,
    #[arg(long)]
    product: Option<String>,
    #[arg(long)]
    package: Option<String>,
    #[arg(long)]
    message: Option<String>,
    /// Pending, "In Progress" or Resolved
    #[arg(long)]
    status: Option<String>,
}

#[derive(clap::Args, Debug)]
struct ClientArgs {
    /// Existing client as JSON (switches to update mode)
    #[arg(long, value_name = "FILE")]
    record: Option<PathBuf>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    institute: Option<String>,
    #[arg(long)]
    contact: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    product: Option<String>,
    #[arg(long)]
    plan: Option<String>,
    /// YYYY-MM-DD
    #[arg(long, value_name = "DATE")]
    start_date: Option<String>,
}

/// Everything a command needs to talk to the API.
struct Services {
    config: Config,
    api: ApiClient,
    catalog: HttpCatalog,
}

impl Services {
    fn new(config: Config, session: SessionContext) -> Result<Self> {
        let api = ApiClient::new(
            config.api_settings(),
            Arc::new(session),
            Arc::new(TerminalNavigator),
        )
        .context("Invalid API configuration")?;
        let catalog = HttpCatalog::new(api.clone(), config.catalog_endpoints());
        Ok(Self {
            config,
            api,
            catalog,
        })
    }
}

/// Token precedence: environment, then the token file, then `api_token`.
fn open_session(config: &Config, token_path: &Path) -> Result<SessionContext> {
    let from_env = std::env::var(API_TOKEN_ENV).is_ok_and(|v| !v.trim().is_empty());
    if !from_env {
        let stored = SessionContext::with_store(token_path).with_context(|| {
            format!("Failed to read token file '{}'", token_path.display())
        })?;
        if stored.is_authenticated() || config.api_token.is_none() {
            return Ok(stored);
        }
    }
    Ok(SessionContext::new(config.api_token()))
}

fn read_record(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read record file '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Record file '{}' is not valid JSON", path.display()))
}

fn ensure_loaded(what: &str, list: &OptionList) -> Result<()> {
    if list.status() == FetchStatus::Failed {
        anyhow::bail!(
            "Failed to load {}: {}",
            what,
            list.error().unwrap_or("unknown error")
        );
    }
    Ok(())
}

/// After a 401 the login hint has already been printed.
fn load_failure(what: &str, e: ProviderError) -> anyhow::Error {
    if e.is_auth() {
        anyhow::anyhow!("Not logged in")
    } else {
        anyhow::Error::new(e).context(format!("Failed to load {}", what))
    }
}

fn print_options(options: &[SelectOption]) {
    if options.is_empty() {
        println!("(none)");
    }
    for option in options {
        println!("{}\t{}", option.id, option.label);
    }
}

fn set_if_given(field: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *field = value;
    }
}

async fn run_enquiry(services: &Services, args: EnquiryArgs) -> Result<()> {
    let record = match &args.record {
        Some(path) => Some(
            EnquiryRecord::from_value(&read_record(path)?).context("Invalid enquiry record")?,
        ),
        None => None,
    };

    let mut dialog = EnquiryDialog::open(Arc::new(services.catalog.clone()), record);
    println!("{}", dialog.title());
    dialog.settle().await;
    ensure_loaded("products", dialog.cascade().selector().primary())?;

    if let Some(product) = &args.product {
        dialog.select_product(product);
        dialog.settle().await;
    }
    if let Some(package) = &args.package {
        ensure_loaded("packages", dialog.cascade().selector().dependent())?;
        dialog
            .select_package(package)
            .with_context(|| format!("Cannot select package '{}'", package))?;
    }

    let contact_given = [&args.name, &args.institute, &args.email, &args.contact, &args.message]
        .iter()
        .any(|a| a.is_some());
    if dialog.shows_contact_fields() {
        set_if_given(&mut dialog.fields.name, args.name);
        set_if_given(&mut dialog.fields.institute_name, args.institute);
        set_if_given(&mut dialog.fields.email, args.email);
        set_if_given(&mut dialog.fields.contact, args.contact);
        set_if_given(&mut dialog.fields.message, args.message);
    } else if contact_given {
        eprintln!("Note: contact details and message cannot be changed when updating an enquiry");
    }
    if let Some(status) = &args.status {
        dialog.fields.status = EnquiryStatus::from_wire(status).with_context(|| {
            format!(
                "Unknown status '{}' (expected Pending, In Progress or Resolved)",
                status
            )
        })?;
    }

    let sink = HttpSink::new(services.api.clone(), services.config.endpoints.enquiries.clone());
    dialog
        .submit(&sink)
        .await
        .context("Failed to save enquiry")?;
    println!("Enquiry saved");
    Ok(())
}

async fn run_client(services: &Services, args: ClientArgs) -> Result<()> {
    let record = match &args.record {
        Some(path) => Some(
            ClientRecord::from_value(&read_record(path)?).context("Invalid client record")?,
        ),
        None => None,
    };

    let mut dialog = ClientDialog::new(record);
    println!("{}", dialog.title());
    dialog.load(&services.catalog).await;
    if let Some(error) = dialog.error() {
        anyhow::bail!("{}", error);
    }
    for notice in dialog.empty_list_notices() {
        eprintln!("{}", notice);
    }

    set_if_given(&mut dialog.fields.user_name, args.name);
    set_if_given(&mut dialog.fields.institute_name, args.institute);
    set_if_given(&mut dialog.fields.contact, args.contact);
    set_if_given(&mut dialog.fields.email, args.email);
    set_if_given(&mut dialog.fields.product, args.product);
    set_if_given(&mut dialog.fields.plan, args.plan);
    set_if_given(&mut dialog.fields.start_date, args.start_date);

    let sink = HttpSink::new(services.api.clone(), services.config.endpoints.clients.clone());
    dialog.submit(&sink).await.context("Failed to save client")?;
    println!("Client saved");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    ensure_config_dir(&config_dir)?;
    let token_path = config_dir.join("token");

    match &args.command {
        Command::Login { token } => {
            let token = token.trim().to_string();
            if token.is_empty() {
                anyhow::bail!("Token must not be empty");
            }
            SessionContext::with_store(&token_path)
                .and_then(|session| session.set_token(SecretString::from(token)))
                .with_context(|| format!("Failed to write token file '{}'", token_path.display()))?;
            println!("Token saved to {}", token_path.display());
            return Ok(());
        }
        Command::Logout => {
            SessionContext::with_store(&token_path)
                .with_context(|| format!("Failed to read token file '{}'", token_path.display()))?
                .clear();
            println!("Logged out.");
            return Ok(());
        }
        _ => {}
    }

    let config_path = args
        .config
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config '{}'", config_path.display()))?
        .with_env_overrides();
    let session = open_session(&config, &token_path)?;
    let services = Services::new(config, session)?;

    match args.command {
        Command::Products => {
            let products = services
                .catalog
                .products()
                .await
                .map_err(|e| load_failure("products", e))?;
            print_options(&products);
        }
        Command::Packages { product_id } => {
            let id = OptionId::parse(&product_id)
                .context("Product id must not be blank")?;
            let packages = services
                .catalog
                .packages(&id)
                .await
                .map_err(|e| load_failure(&format!("packages for product {}", id), e))?;
            print_options(&packages);
        }
        Command::Enquiry(enquiry) => run_enquiry(&services, enquiry).await?,
        Command::Client(client) => run_client(&services, client).await?,
        Command::Login { .. } | Command::Logout => {}
    }
    Ok(())
}
