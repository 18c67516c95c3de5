use std::convert::Infallible;
use std::process::ExitCode;

use gitcache_ssh::audit::AuditLogger;
use gitcache_ssh::config::{GitConfigSource, Settings};
use gitcache_ssh::git::CacheSynchronizer;
use gitcache_ssh::security::{PasswdResolver, ProcessCredentials};
use gitcache_ssh::{logging, Collaborators, EnvironmentSanitizer, Gateway, GatewayError};
use tracing::{debug, error, warn};

const PROGRAM: &str = "gitcache-ssh";
const SOURCE_URL: &str = "https://github.com/nokia/gitcache-ssh";

fn main() -> ExitCode {
    logging::init();
    debug!(version = env!("CARGO_PKG_VERSION"), "Starting {}", PROGRAM);

    match run() {
        Ok(never) => match never {},
        Err(GatewayError::Dispatch(err)) => {
            // exec only returns on failure and the authorized command never ran
            error!("Passthrough failed; {}", err);
            std::process::abort();
        }
        Err(err) => {
            if err.is_input_error() {
                error!(program = PROGRAM, source = SOURCE_URL, "{}", err);
            } else {
                error!("{}", err);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<Infallible, GatewayError> {
    let settings = Settings::load()?;

    // Sanitize the environment as we're probably running setuid
    let sanitizer = EnvironmentSanitizer::new(settings.safe_path.as_str())?;
    let env = sanitizer.sanitize(std::env::vars_os());
    // SAFETY: still single threaded; nothing has been spawned yet.
    unsafe { env.install() };

    let audit = match AuditLogger::from_settings(&settings) {
        Ok(audit) => audit,
        Err(err) => {
            warn!(error = %err, "Audit log unavailable");
            None
        }
    };

    let config = GitConfigSource::new(&settings.git_binary);
    let synchronizer = CacheSynchronizer::new(&settings.git_binary);
    let gateway = Gateway::new(
        &settings,
        Collaborators {
            config: &config,
            identities: &PasswdResolver,
            credentials: &ProcessCredentials,
            synchronizer: &synchronizer,
            audit: audit.as_ref(),
        },
    )?;

    let request = gateway.prepare(env)?;
    Ok(request.exec()?)
}
