use clap::{Parser, Subcommand};
use jpeg_fit::config::{self, AppConfig};
use jpeg_fit::fit::{self, FitOptions};
use jpeg_fit::flow::{self, DELIVERY_FILENAME, Delivery};
use jpeg_fit::imaging::{self, Dimensions};
use jpeg_fit::output;
use jpeg_fit::source;
use jpeg_fit::staging::StagingStore;
use jpeg_fit::token::TokenRegistry;
use jpeg_fit::types::{AccessList, UserKey};
use jpeg_fit::upload::{UploadFlow, UploadHandler, UploadOutcome};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("JPEG_FIT_RELEASE");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("JPEG_FIT_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "jpeg-fit")]
#[command(about = "Re-encode images into size-bounded progressive JPEGs")]
#[command(long_about = "\
Re-encode images into size-bounded progressive JPEGs

Any decodable image goes in; a progressive JPEG no larger than the
configured limit comes out. Inputs already under the limit are passed
through untouched.

Typical flows:

  jpeg-fit fit photo.png                     # fit at source size
  jpeg-fit fit https://example.com/a.webp    # fetch, then fit
  jpeg-fit options photo.png                 # list offered sizes
  jpeg-fit stage --user 42 photo.png         # park for a size choice
  jpeg-fit choose --user 42 2                # finish with option 2
  jpeg-fit token issue --user 42             # upload link token
  jpeg-fit upload --token <T> photo.png      # what the upload form does

Environment overrides: MAX_PROCESSED_FILE_SIZE, MAX_UPLOAD_SIZE,
TOKEN_SECRET_KEY, ALLOWED_USERS (comma-separated ids).

Run 'jpeg-fit gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Log engine decisions (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Byte budget override shared by fitting commands.
#[derive(clap::Args, Clone)]
struct FitArgs {
    /// Byte budget (overrides fit.max_size_bytes)
    #[arg(long)]
    max_size: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Fit one image (path or URL) under the byte budget
    Fit {
        /// Image path or http(s) URL
        input: String,
        /// Output file (default: <input stem>-fit.jpg, or processed_image.jpg for URLs)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Resize to this exact width first (needs --height)
        #[arg(long, requires = "height")]
        width: Option<u32>,
        /// Resize to this exact height first (needs --width)
        #[arg(long, requires = "width")]
        height: Option<u32>,
        #[command(flatten)]
        fit: FitArgs,
    },
    /// List the resize options offered for an image
    Options {
        /// Image path or http(s) URL
        input: String,
    },
    /// Stage an image for a user and list the sizes they can pick
    Stage {
        #[arg(long, allow_hyphen_values = true)]
        user: UserKey,
        /// Image path or http(s) URL
        input: String,
    },
    /// Finish a staged image with the chosen option (1-based)
    Choose {
        #[arg(long, allow_hyphen_values = true)]
        user: UserKey,
        choice: usize,
        /// Output file
        #[arg(short, long, default_value = DELIVERY_FILENAME)]
        output: PathBuf,
        #[command(flatten)]
        fit: FitArgs,
    },
    /// Submit an image the way the upload form does
    Upload {
        #[arg(long)]
        token: String,
        /// Image path
        input: PathBuf,
        /// Stage for a size choice instead of fitting right away
        #[arg(long)]
        choose_size: bool,
        /// Output file for the direct flow
        #[arg(short, long, default_value = DELIVERY_FILENAME)]
        output: PathBuf,
    },
    /// Issue or check upload link tokens
    #[command(subcommand)]
    Token(TokenCommand),
    /// Remove staged images older than staging.max_age_secs
    Sweep,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum TokenCommand {
    /// Issue a token for a user
    Issue {
        #[arg(long, allow_hyphen_values = true)]
        user: UserKey,
    },
    /// Show who a token belongs to and how long it stays valid
    Check { token: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config_with_env(&cli.config)?;
    init_thread_pool(&config.processing);
    let access = AccessList::from_config(&config.access);
    if access.is_empty() {
        warn!("access.allowed_users is empty; every user is denied");
    }

    match cli.command {
        Command::Fit {
            input,
            output: out,
            width,
            height,
            fit: fit_args,
        } => {
            let raw = source::read_source(&input, &config.fetch)?;
            let mut options = fit_options(&config, &fit_args);
            if let (Some(w), Some(h)) = (width, height) {
                options = options.with_target(Dimensions::new(w, h));
            }
            let result = fit::fit(&raw, &options)?;
            let out = out.unwrap_or_else(|| default_output(&input));
            std::fs::write(&out, &result.bytes)?;
            output::print_fit_result(Path::new(&input), &out, &result, options.max_size_bytes);
        }
        Command::Options { input } => {
            let raw = source::read_source(&input, &config.fetch)?;
            let dimensions = imaging::get_dimensions(&raw)?;
            let options = imaging::calculate_resize_options(dimensions);
            output::print_resize_options(dimensions, &options);
        }
        Command::Stage { user, input } => {
            ensure_allowed(&access, user)?;
            let raw = source::read_source(&input, &config.fetch)?;
            let dimensions = imaging::get_dimensions(&raw)?;
            let staging = StagingStore::open(&config.staging.dir)?;
            staging.save(user, &raw, Some(dimensions))?;
            info!(%user, %dimensions, "staged");
            output::print_resize_options(dimensions, &imaging::calculate_resize_options(dimensions));
        }
        Command::Choose {
            user,
            choice,
            output: out,
            fit: fit_args,
        } => {
            ensure_allowed(&access, user)?;
            let staging = StagingStore::open(&config.staging.dir)?;
            let staged = staging
                .get(user)?
                .ok_or(flow::FlowError::NothingStaged(user))?;
            let dimensions = match staged.dimensions {
                Some(d) => d,
                None => imaging::get_dimensions(&staged.bytes)?,
            };
            let options = imaging::calculate_resize_options(dimensions);
            let picked = choice
                .checked_sub(1)
                .and_then(|i| options.get(i))
                .ok_or_else(|| format!("choice must be between 1 and {}", options.len()))?;
            let result =
                flow::complete_resize_choice(&staging, user, picked, &fit_options(&config, &fit_args))?;
            deliver(result, &out)?;
        }
        Command::Upload {
            token,
            input,
            choose_size,
            output: out,
        } => {
            let raw = std::fs::read(&input)?;
            let handler = UploadHandler::from_config(
                &config,
                TokenRegistry::from_config(&config.tokens),
                StagingStore::open(&config.staging.dir)?,
            );
            let flow = if choose_size {
                UploadFlow::ChooseSize
            } else {
                UploadFlow::Direct
            };
            match handler.handle(&token, &raw, flow) {
                Ok(UploadOutcome::Processed { result, .. }) => deliver(result, &out)?,
                Ok(UploadOutcome::AwaitingChoice { options, .. }) => {
                    let dimensions = options[0].dimensions();
                    output::print_resize_options(dimensions, &options);
                }
                Err(e) => {
                    eprintln!("HTTP {}", e.status_code());
                    return Err(e.into());
                }
            }
        }
        Command::Token(TokenCommand::Issue { user }) => {
            ensure_allowed(&access, user)?;
            let tokens = TokenRegistry::from_config(&config.tokens);
            let token = tokens.issue(user);
            output::print_token(user, &token, tokens.ttl());
        }
        Command::Token(TokenCommand::Check { token }) => {
            let tokens = TokenRegistry::from_config(&config.tokens);
            match (tokens.validate(&token), tokens.remaining(&token)) {
                (Some(user), Some(remaining)) => output::print_token(user, &token, remaining),
                _ => return Err("token is invalid or expired".into()),
            }
        }
        Command::Sweep => {
            let staging = StagingStore::open(&config.staging.dir)?;
            let removed = staging.sweep(config.staging.max_age())?;
            println!("Removed {removed} staged image(s)");
        }
        Command::GenConfig => unreachable!("handled before config loading"),
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn fit_options(config: &AppConfig, args: &FitArgs) -> FitOptions {
    let mut options = config.fit_options();
    if let Some(max) = args.max_size {
        options.max_size_bytes = max;
    }
    options
}

fn ensure_allowed(access: &AccessList, user: UserKey) -> Result<(), String> {
    if access.is_allowed(user) {
        Ok(())
    } else {
        Err(format!("user {user} is not allowed"))
    }
}

fn default_output(input: &str) -> PathBuf {
    if source::is_url(input) {
        return PathBuf::from(DELIVERY_FILENAME);
    }
    let path = Path::new(input);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    path.with_file_name(format!("{stem}-fit.jpg"))
}

fn deliver(result: fit::ProcessingResult, output: &Path) -> std::io::Result<()> {
    let delivery = Delivery::from_result(result);
    std::fs::write(output, &delivery.bytes)?;
    println!("{} → {}", delivery.file_name, output.display());
    println!("{}", delivery.caption);
    Ok(())
}
