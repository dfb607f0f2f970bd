//! Engine logging bootstrap.
//!
//! # Responsibility
//! - Start the rotating file logger once per process.
//! - Capture panics as a single `event=panic_captured` line whose payload
//!   has owner tokens and precise coordinates scrubbed out.
//!
//! # Invariants
//! - A second `init_logging` with the same target is a no-op; a different
//!   target is refused with `LoggingError::AlreadyActive`.
//! - Panic payloads never carry a full UUID or device identity, nor a
//!   coordinate with more than 5 decimals.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, LogSpecification, Logger, LoggerHandle,
    Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::{Lazy, OnceCell};
use regex::{Captures, Regex};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LOG_FILE_BASENAME: &str = "geoanchor";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;
const REDACTED_PREFIX_CHARS: usize = 8;
const MAX_COORDINATE_DECIMALS: usize = 5;

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b")
        .expect("valid uuid regex")
});
static IDENTITY_DEBUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"DeviceIdentity\("([^"]*)"\)"#).expect("valid identity regex"));
static LONG_DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+\.\d{6,}").expect("valid decimal regex"));

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

pub type LoggingResult<T> = Result<T, LoggingError>;

/// Level and directory the file logger writes with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub level: LevelFilter,
    pub dir: PathBuf,
}

impl LogTarget {
    /// Parses host-supplied strings.
    ///
    /// `level` is case-insensitive (`warning` is accepted for `warn`; `off`
    /// is not accepted). `dir` must be absolute.
    pub fn parse(level: &str, dir: &str) -> LoggingResult<Self> {
        let level_text = level.trim().to_ascii_lowercase();
        let level = match level_text.as_str() {
            "warning" => LevelFilter::Warn,
            "off" => return Err(LoggingError::InvalidLevel(level_text.clone())),
            other => LevelFilter::from_str(other)
                .map_err(|_| LoggingError::InvalidLevel(level_text.clone()))?,
        };

        let dir = dir.trim();
        if dir.is_empty() || !Path::new(dir).is_absolute() {
            return Err(LoggingError::InvalidDir(dir.to_string()));
        }
        Ok(Self {
            level,
            dir: PathBuf::from(dir),
        })
    }
}

impl Display for LogTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at `{}`",
            self.level.as_str().to_ascii_lowercase(),
            self.dir.display()
        )
    }
}

#[derive(Debug)]
pub enum LoggingError {
    InvalidLevel(String),
    InvalidDir(String),
    CreateDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    Backend(FlexiLoggerError),
    AlreadyActive {
        active: LogTarget,
        requested: LogTarget,
    },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidDir(dir) => {
                write!(f, "log_dir must be a non-empty absolute path, got `{dir}`")
            }
            Self::CreateDir { dir, source } => write!(
                f,
                "failed to create log directory `{}`: {source}",
                dir.display()
            ),
            Self::Backend(err) => write!(f, "failed to start logger: {err}"),
            Self::AlreadyActive { active, requested } => write!(
                f,
                "logging already active with {active}; refusing to switch to {requested}"
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            Self::InvalidLevel(_) | Self::InvalidDir(_) | Self::AlreadyActive { .. } => None,
        }
    }
}

impl From<FlexiLoggerError> for LoggingError {
    fn from(value: FlexiLoggerError) -> Self {
        Self::Backend(value)
    }
}

struct ActiveLogger {
    target: LogTarget,
    _handle: LoggerHandle,
}

/// Starts file logging for the engine.
///
/// # Errors
/// - `level` or `log_dir` do not parse (see `LogTarget::parse`).
/// - The directory cannot be created or the backend fails to start.
/// - Logging is already active with a different target.
pub fn init_logging(level: &str, log_dir: &str) -> LoggingResult<()> {
    let requested = LogTarget::parse(level, log_dir)?;
    let active = ACTIVE.get_or_try_init(|| start(&requested))?;
    if active.target != requested {
        return Err(LoggingError::AlreadyActive {
            active: active.target.clone(),
            requested,
        });
    }
    Ok(())
}

fn start(target: &LogTarget) -> LoggingResult<ActiveLogger> {
    std::fs::create_dir_all(&target.dir).map_err(|source| LoggingError::CreateDir {
        dir: target.dir.clone(),
        source,
    })?;

    let spec = LogSpecification::builder().default(target.level).build();
    let handle = Logger::with(spec)
        .log_to_file(
            FileSpec::default()
                .directory(target.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    install_panic_hook_once();
    info!(
        "event=engine_start module=logging status=ok platform={} version={} target={}",
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION"),
        target
    );

    Ok(ActiveLogger {
        target: target.clone(),
        _handle: handle,
    })
}

/// The active log target, if logging was started.
pub fn logging_status() -> Option<LogTarget> {
    ACTIVE.get().map(|active| active.target.clone())
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.set(()).is_err() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic_captured module=logging status=error location={location} payload={}",
            scrub_payload(&payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        previous_hook(panic_info);
    }));
}

/// Makes free text safe for a single log line.
///
/// UUIDs and `DeviceIdentity(..)` debug output shrink to their first 8
/// characters, decimals longer than 5 places are rounded, and line breaks
/// are flattened before the result is capped at `max_chars`.
pub fn scrub_payload(value: &str, max_chars: usize) -> String {
    let value = IDENTITY_DEBUG_RE.replace_all(value, |caps: &Captures<'_>| {
        format!("DeviceIdentity({})", redact_token(&caps[1]))
    });
    let value = UUID_RE.replace_all(&value, |caps: &Captures<'_>| redact_token(&caps[0]));
    let value = LONG_DECIMAL_RE.replace_all(&value, |caps: &Captures<'_>| {
        caps[0]
            .parse::<f64>()
            .map(|number| format!("{:.*}", MAX_COORDINATE_DECIMALS, number))
            .unwrap_or_else(|_| caps[0].to_string())
    });

    let flattened = value.replace(['\n', '\r'], " ");
    let mut capped = flattened.chars().take(max_chars).collect::<String>();
    if flattened.chars().count() > max_chars {
        capped.push_str("...");
    }
    capped
}

fn redact_token(token: &str) -> String {
    let prefix = token.chars().take(REDACTED_PREFIX_CHARS).collect::<String>();
    format!("{prefix}…")
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, scrub_payload, LogTarget, LoggingError};
    use log::LevelFilter;
    use std::path::PathBuf;

    fn unique_temp_dir(suffix: &str) -> String {
        std::env::temp_dir()
            .join(format!(
                "geoanchor-logging-{suffix}-{}-{}",
                std::process::id(),
                uuid::Uuid::new_v4()
            ))
            .to_str()
            .expect("temp dir should be valid UTF-8")
            .to_string()
    }

    #[test]
    fn target_parses_levels_and_requires_absolute_dir() {
        let dir = unique_temp_dir("parse");
        let target = LogTarget::parse(" WARNING ", &dir).expect("warning should parse");
        assert_eq!(target.level, LevelFilter::Warn);
        assert_eq!(target.dir, PathBuf::from(&dir));
        assert_eq!(
            LogTarget::parse("Debug", &dir).expect("debug should parse").level,
            LevelFilter::Debug
        );

        assert!(matches!(
            LogTarget::parse("verbose", &dir),
            Err(LoggingError::InvalidLevel(_))
        ));
        assert!(matches!(
            LogTarget::parse("off", &dir),
            Err(LoggingError::InvalidLevel(_))
        ));
        assert!(matches!(
            LogTarget::parse("info", "logs/dev"),
            Err(LoggingError::InvalidDir(_))
        ));
        assert!(matches!(
            LogTarget::parse("info", "   "),
            Err(LoggingError::InvalidDir(_))
        ));
    }

    #[test]
    fn scrub_shortens_uuids_and_identities() {
        let scrubbed = scrub_payload(
            "delete 3c55c91e-0a4b-4f7e-9d2a-1b2c3d4e5f60 by DeviceIdentity(\"device-abcdef-123\")",
            200,
        );
        assert_eq!(
            scrubbed,
            "delete 3c55c91e… by DeviceIdentity(device-a…)"
        );
    }

    #[test]
    fn scrub_rounds_precise_coordinates_only() {
        let scrubbed = scrub_payload("at (12.971612345, -77.59461789) zoom 18 y -0.7", 200);
        assert_eq!(scrubbed, "at (12.97161, -77.59462) zoom 18 y -0.7");
    }

    #[test]
    fn scrub_flattens_lines_and_caps_length() {
        let scrubbed = scrub_payload("line1\nline2\rline3", 8);
        assert!(!scrubbed.contains('\n'));
        assert!(!scrubbed.contains('\r'));
        assert_eq!(scrubbed, "line1 li...");
    }

    #[test]
    fn init_is_idempotent_for_same_target_and_rejects_switching() {
        let dir = unique_temp_dir("idempotent");
        let other_dir = unique_temp_dir("other");

        init_logging("info", &dir).expect("first init should succeed");
        init_logging("INFO", &dir).expect("same target should be idempotent");

        let err = init_logging("debug", &dir).expect_err("level switch must fail");
        assert!(matches!(err, LoggingError::AlreadyActive { .. }));
        assert!(err.to_string().contains("refusing to switch"));
        assert!(matches!(
            init_logging("info", &other_dir),
            Err(LoggingError::AlreadyActive { .. })
        ));

        let active = logging_status().expect("logging should be active");
        assert_eq!(active.level, LevelFilter::Info);
        assert_eq!(active.dir, PathBuf::from(&dir));
        assert!(PathBuf::from(&dir).is_dir());
    }
}
