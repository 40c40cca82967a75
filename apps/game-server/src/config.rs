use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Game server configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Room display name. Generated when unset.
    pub room_name: Option<String>,
    /// Outbound messages buffered per subscriber before it is evicted.
    pub queue_capacity: usize,
    /// Deadline for writing one frame to a client.
    pub write_timeout: Duration,
    /// Extra display-name draws when a generated name is already taken.
    pub name_retry_limit: usize,
    /// Word list for display names. The built-in list is used when unset.
    pub random_words_path: Option<PathBuf>,
    /// Directory of static assets served at `/`.
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4000,
            room_name: None,
            queue_capacity: 16,
            write_timeout: Duration::from_secs(10),
            name_retry_limit: 8,
            random_words_path: None,
            static_dir: PathBuf::from("./static"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; malformed values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed_var("PORT").unwrap_or(defaults.port),
            room_name: optional_var("ROOM_NAME"),
            queue_capacity: parsed_var::<usize>("SUBSCRIBER_QUEUE_CAPACITY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.queue_capacity),
            write_timeout: parsed_var::<u64>("WRITE_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.write_timeout),
            name_retry_limit: parsed_var("NAME_RETRY_LIMIT").unwrap_or(defaults.name_retry_limit),
            random_words_path: optional_var("RANDOM_WORDS_PATH").map(PathBuf::from),
            static_dir: optional_var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parsed_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = optional_var(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring malformed value, using default");
            None
        }
    }
}
