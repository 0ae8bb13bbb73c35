use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Logger, Root},
    encode::pattern::PatternEncoder,
    Config,
};

/// Send log messages at `level` and above to stderr.
///
/// Messages from the crates used to read and draw the plots are limited to
/// warnings so that verbose runs show this program's progress.
pub fn init_logging(level: log::LevelFilter) {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{h({d(%Y-%m-%d %H:%M:%S)} [{l}] in {M})} - {m}{n}",
        )))
        .target(Target::Stderr)
        .build();

    let dependency_level = level.min(log::LevelFilter::Warn);
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .logger(Logger::builder().build("netcdf", dependency_level))
        .logger(Logger::builder().build("plotly", dependency_level))
        .logger(Logger::builder().build("figment", dependency_level))
        .build(Root::builder().appender("stderr").build(level))
        .expect("Failed to configure logger");

    log4rs::init_config(config).expect("Failed to initialize logger");
}
