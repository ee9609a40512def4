use std::path::PathBuf;

use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

/// 获取当前时间 (UTC)
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// 初始化日志
pub fn init_log(log: Option<PathBuf>) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dsaforge=debug,tower_http=info"));
    let subscriber_builder = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true);
    let (non_blocking, guard, ansi) = if let Some(log) = log {
        // output to file，daily rotate, non-blocking
        if !log.is_dir() {
            anyhow::bail!("log path {} is not a directory", log.display());
        }
        let file_appender = tracing_appender::rolling::daily(log, "dsaforge.log");
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        (writer, guard, false)
    } else {
        // output to stdout
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        (writer, guard, true)
    };
    tracing::subscriber::set_global_default(
        subscriber_builder
            .with_ansi(ansi)
            .with_writer(non_blocking)
            .finish(),
    )
    .map_err(|e| anyhow::anyhow!("init log failed: {}", e))?;
    Ok(guard)
}

/// Percentage of solved questions, one decimal place; zero when nothing is tracked.
pub fn completion_rate(solved: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (solved as f64 / total as f64 * 1000.0).round() / 10.0
}
