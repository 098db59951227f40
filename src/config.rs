use std::time::Duration;

/// Mirror contacted first. archive.today usually redirects to another mirror.
pub static DEFAULT_ARCHIVE_DOMAIN: &str = "https://archive.today";

pub static ARCHIVE_DOMAIN_ENV_VAR: &str = "ARCHIVE_TODAY_DOMAIN";
pub static USER_AGENT_ENV_VAR: &str = "ARCHIVE_TODAY_USER_AGENT";
pub static MAX_POLLS_ENV_VAR: &str = "ARCHIVE_TODAY_MAX_POLLS";

// Work-in-progress polling
pub const DEFAULT_WIP_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_WIP_MAX_ATTEMPTS: u32 = 600;
