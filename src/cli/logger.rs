// Logging setup for the CLI
use std::io::Write;

/// Initialize env_logger from the global verbosity flags
pub fn init_logger(verbose: bool, quiet: bool) {
    // RUST_LOG wins over the flags entirely
    if std::env::var("RUST_LOG").is_ok() {
        env_logger::init();
        return;
    }

    let default_level = if quiet {
        log::LevelFilter::Error
    } else if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    let mut builder = env_logger::Builder::new();

    builder.filter_level(default_level).format(|buf, record| {
        if record.level() >= log::Level::Debug {
            writeln!(buf, "[{}] {}", record.level(), record.args())
        } else {
            writeln!(buf, "{}", record.args())
        }
    });

    if verbose && !quiet {
        builder.filter_module("adtrack", log::LevelFilter::Debug);
        builder.filter_module("reqwest", log::LevelFilter::Info);
        builder.filter_module("hyper", log::LevelFilter::Info);
        builder.filter_module("hyper_util", log::LevelFilter::Info);
        builder.filter_module("rustls", log::LevelFilter::Info);
    }

    builder.init();
}
