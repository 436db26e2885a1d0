use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter};

/// Sets up the global logger. Jamsync crates log from debug up, everything
/// else only surfaces warnings and errors.
pub fn init_logger() {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {:>5} {} {}",
                chrono::Local::now()
                    .format("%H:%M:%S%.3f")
                    .to_string()
                    .dimmed(),
                level_badge(record.level()),
                crate_badge(record.target()),
                message
            ))
        })
        .level(LevelFilter::Warn)
        .level_for("jamsync_hub", LevelFilter::Debug)
        .level_for("jamsync_impls", LevelFilter::Debug)
        .level_for("jamsync_server", LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()
        .expect("logging is initialized")
}

fn level_badge(level: Level) -> ColoredString {
    match level {
        Level::Error => "error".red().bold(),
        Level::Warn => "warn".yellow().bold(),
        Level::Info => "info".green(),
        Level::Debug => "debug".cyan(),
        Level::Trace => "trace".normal(),
    }
}

fn crate_badge(target: &str) -> ColoredString {
    let krate = target.split("::").next().unwrap_or_default();

    match krate {
        "jamsync_hub" => "hub".purple(),
        "jamsync_server" => "server".blue(),
        "jamsync_impls" => "impls".magenta(),
        other => other.normal(),
    }
}
