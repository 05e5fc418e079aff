mod activation;
mod barcode;
mod config;
mod errors;
mod hotp;
mod link;
mod prompt;

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use colored::*;
use log::{debug, warn, LevelFilter};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use activation::{ActivationClient, Transport};
use config::{ClientOptions, DeviceProfile, ProviderConfig};
use errors::{ActivationError, EnrollError};
use hotp::{HotpSpec, OtpEnrollmentUri};

/// Turn a Duo activation link into an HOTP QR code for any authenticator app.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Cli {
    /// Activation link; prompted for when absent.
    #[clap(long, env = "DUO_ENROLLMENT_URL")]
    url: Option<String>,

    /// Account label shown by the authenticator app.
    #[clap(long, default_value = config::DEFAULT_LABEL)]
    label: String,

    /// Host the activation links are issued from.
    #[clap(long, default_value = config::DEFAULT_ENROLLMENT_HOST)]
    enrollment_host: String,

    /// Host serving the activation endpoint.
    #[clap(long, default_value = config::DEFAULT_API_HOST)]
    api_host: String,

    /// JSON file overriding the emulated device profile.
    #[clap(long)]
    device_profile: Option<PathBuf>,

    /// Where to write the QR code image.
    #[clap(long, default_value = "bk.png")]
    output: PathBuf,

    /// Timeout of the activation request in seconds, 0 for none.
    #[clap(long, default_value = "30")]
    timeout: u64,

    /// Do not open the image in the default viewer.
    #[clap(long)]
    no_open: bool,

    /// Log request, response and secret. Leaks the seed to the terminal.
    #[clap(long)]
    debug: bool,

    #[clap(flatten)]
    verbose: Verbosity,
}

/// Validate the link, activate, and encode the seed.
fn provision<T: Transport>(
    url: &str,
    provider: &ProviderConfig,
    client: &ActivationClient<T>,
    label: &str,
    diagnostics: bool,
) -> Result<OtpEnrollmentUri, EnrollError> {
    if !link::validate(url, &provider.enrollment_host) {
        return Err(EnrollError::Validation(format!(
            "that doesn't look like an activation link from {}",
            provider.enrollment_host
        )));
    }

    let token = link::extract_token(url)?;
    if diagnostics {
        debug!("activation token: {}", token);
    }

    println!("Attempting to register with Duo...");
    let seed = client.activate(&token)?;
    hotp::encode(seed.as_bytes(), label)
}

/// Check that the image carries the URI we meant to write.
fn verify_image(path: &Path, uri: &OtpEnrollmentUri, diagnostics: bool) -> Result<(), EnrollError> {
    let read = barcode::extract_otp_uri(path)
        .ok_or_else(|| EnrollError::Render(String::from("the written QR code could not be read back")))?;
    if read.as_str() != uri.as_str() {
        return Err(EnrollError::Render(String::from(
            "the written QR code does not match the enrollment URI",
        )));
    }

    if diagnostics {
        let spec = HotpSpec::parse(&read)?;
        debug!("first code (counter {}): {}", spec.counter(), spec.get_otp());
    }
    Ok(())
}

fn init_logging(cli: &Cli) {
    let mut level = cli
        .verbose
        .log_level()
        .map(|l| l.to_level_filter())
        .unwrap_or(LevelFilter::Off);
    if cli.debug && level < LevelFilter::Debug {
        level = LevelFilter::Debug;
    }

    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli) -> Result<(), EnrollError> {
    let provider = ProviderConfig {
        enrollment_host: cli.enrollment_host.clone(),
        api_host: cli.api_host.clone(),
    };
    let profile = match cli.device_profile {
        Some(ref path) => DeviceProfile::from_file(path)?,
        None => DeviceProfile::default(),
    };
    let options = ClientOptions {
        timeout: match cli.timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        },
        diagnostics: cli.debug,
    };

    let url = match cli.url {
        Some(ref u) => u.trim().to_string(),
        None => {
            prompt::print_intro();
            prompt::prompt_enrollment_url()?
        }
    };

    let client = ActivationClient::connect(provider.clone(), profile, options)?;
    let uri = provision(&url, &provider, &client, &cli.label, cli.debug)?;

    println!("Generating QR code...");
    barcode::render_png(&uri, &cli.output)?;

    // The image exists from here on, so cleanup is offered whatever happens.
    let shown = verify_image(&cli.output, &uri, cli.debug);
    if shown.is_ok() && !cli.no_open {
        prompt::open_in_viewer(&cli.output);
    }

    let stdin = io::stdin();
    let mut lock = stdin.lock();
    if let Err(e) = prompt::cleanup(&mut lock, &cli.output) {
        warn!("cleanup failed: {}", e);
    }

    shown?;
    println!("Program complete.");
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run(&cli) {
        eprintln!("{} {}", "error:".red(), e);
        if let EnrollError::Activation(ActivationError::Decode { ref body, .. }) = e {
            if cli.debug {
                eprintln!("response body: {}", body);
            }
        }
        eprintln!("Obtain a fresh activation link and try again.");
        process::exit(1);
    }
}
