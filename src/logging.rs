use slog::{o, Drain, Logger};

/// Terminal logger: human-readable output behind an async drain.
pub fn term_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, o!())
}

/// Logger that swallows everything; the default for pools constructed
/// without one.
pub fn null_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}
