use std::{env, path::Path};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::writer::{BoxMakeWriter, MakeWriterExt},
    prelude::*,
    registry, EnvFilter,
};

const DEFAULT_LOG_FILE: &str = "/tmp/mcr.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
    None,
}

impl LogOutput {
    fn parse(value: &str) -> Self {
        match value {
            "console" => LogOutput::Console,
            "file" => LogOutput::File,
            "both" => LogOutput::Both,
            _ => LogOutput::None,
        }
    }
}

/// Logging settings read from `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT` and `LOG_FILE_PATH`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub output: LogOutput,
    pub json: bool,
    pub file_path: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Console,
            json: false,
            file_path: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            level: lookup("LOG_LEVEL").unwrap_or(defaults.level),
            output: lookup("LOG_OUTPUT")
                .map(|v| LogOutput::parse(&v))
                .unwrap_or(defaults.output),
            json: lookup("LOG_FORMAT").is_some_and(|v| v == "json"),
            file_path: lookup("LOG_FILE_PATH").unwrap_or(defaults.file_path),
        }
    }
}

/// Initializes the global tracing subscriber based on environment variables.
///
/// `RUST_LOG` takes precedence over `LOG_LEVEL`. Logs go to stderr so generated
/// output on stdout stays clean. The returned guard must be held while file
/// logging is in use.
pub fn init_subscriber() -> Option<WorkerGuard> {
    init_with(&LogSettings::from_env())
}

pub fn init_with(settings: &LogSettings) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let log_path = Path::new(&settings.file_path);
    let log_dir = log_path.parent().unwrap_or_else(|| Path::new("/tmp"));
    let log_filename = log_path.file_name().unwrap_or("mcr.log".as_ref());

    let mut guard = None;
    let mut file_writer = || {
        let appender = tracing_appender::rolling::daily(log_dir, log_filename);
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);
        non_blocking
    };

    let writer = match settings.output {
        LogOutput::Console => BoxMakeWriter::new(std::io::stderr),
        LogOutput::File => BoxMakeWriter::new(file_writer()),
        LogOutput::Both => BoxMakeWriter::new(std::io::stderr.and(file_writer())),
        LogOutput::None => {
            registry().with(env_filter).init();
            return None;
        }
    };

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(writer);
    if settings.json {
        registry().with(env_filter).with(fmt_layer.json()).init();
    } else {
        registry().with(env_filter).with(fmt_layer).init();
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(settings(&[]), LogSettings::default());
    }

    #[test]
    fn test_overrides() {
        let parsed = settings(&[
            ("LOG_LEVEL", "debug"),
            ("LOG_OUTPUT", "both"),
            ("LOG_FORMAT", "json"),
            ("LOG_FILE_PATH", "/var/log/mcr/generator.log"),
        ]);

        assert_eq!(parsed.level, "debug");
        assert_eq!(parsed.output, LogOutput::Both);
        assert!(parsed.json);
        assert_eq!(parsed.file_path, "/var/log/mcr/generator.log");
    }

    #[test]
    fn test_unknown_output_disables_formatting() {
        assert_eq!(settings(&[("LOG_OUTPUT", "syslog")]).output, LogOutput::None);
    }
}
