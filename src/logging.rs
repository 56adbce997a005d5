use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Parse a `LOG_LEVEL` value, falling back to `INFO` for anything unknown.
pub(crate) fn parse_level(raw: &str) -> (Level, bool) {
    match raw.trim().parse::<Level>() {
        Ok(level) => (level, true),
        Err(_) => (Level::INFO, false),
    }
}

/// Install the global subscriber. Safe to call more than once.
pub(crate) fn init(raw_level: &str) {
    let (level, recognised) = parse_level(raw_level);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    if !recognised {
        tracing::warn!("unknown log level {:?}, using info", raw_level);
    }
}
