use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "intake=info,intake_core=info,intake_exec=info";

/// Daily log files kept in the log directory; older ones are pruned on rotation.
pub const LOG_RETENTION_DAYS: usize = 7;

/// Daily-rolling `intake.<date>.log` files under `log_dir`.
pub fn file_appender(log_dir: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("intake")
        .filename_suffix("log")
        .max_log_files(LOG_RETENTION_DAYS)
        .build(log_dir)
}

/// Console logging, plus the rolling file sink when `log_dir` is usable.
///
/// Hold the returned guard until exit or buffered file lines are lost.
pub fn init_tracing(log_dir: Option<&Path>, json: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(dir)?);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let console_text = (!json).then(|| fmt::layer().with_writer(std::io::stderr));
    let console_json = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_text)
        .with(console_json)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn appender_writes_dated_file_into_log_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut appender = file_appender(tmp.path()).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("intake.") && names[0].ends_with(".log"), "{names:?}");
    }

    #[test]
    fn appender_rejects_unusable_log_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        assert!(file_appender(&blocker).is_err());
    }
}
