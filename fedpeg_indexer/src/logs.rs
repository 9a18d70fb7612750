use std::path::Path;

use log::LevelFilter;
use log4rs::{
    append::{
        console::ConsoleAppender,
        rolling_file::{
            policy::compound::{
                roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
            },
            RollingFileAppender,
        },
    },
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};

const LOG_FILE_NAME: &str = "fedpeg_indexer.log";
const LOG_FILE_MAX_SIZE: u64 = 100 * 1024 * 1024;
const LOG_FILE_MAX_ROLLS: u32 = 20;
const LOG_LINE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {l:5.5} {M} {m}{n}";

/// Loads `<work_dir>/log_config.toml` if present.
/// Otherwise logs `info` to the console and `debug` to gzip-rolled files in `<work_dir>/logs`.
pub fn init(work_dir: &Path) {
    let config_path = work_dir.join("log_config.toml");
    if config_path.exists() {
        log4rs::init_file(&config_path, Default::default()).expect("can't init log4rs");
        return;
    }

    let log_dir = work_dir.join("logs");
    let roller = FixedWindowRoller::builder()
        .base(1)
        .build(
            &log_dir
                .join(format!("{LOG_FILE_NAME}.{{}}.gz"))
                .to_string_lossy(),
            LOG_FILE_MAX_ROLLS,
        )
        .expect("invalid log roller pattern");
    let policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(LOG_FILE_MAX_SIZE)),
        Box::new(roller),
    );
    let file = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_LINE_PATTERN)))
        .build(log_dir.join(LOG_FILE_NAME), Box::new(policy))
        .expect("can't open log file");

    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_LINE_PATTERN)))
        .build();

    let config = Config::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Info)))
                .build("console", Box::new(console)),
        )
        .appender(Appender::builder().build("file", Box::new(file)))
        .logger(log4rs::config::Logger::builder().build("sqlx", LevelFilter::Warn))
        .build(
            Root::builder()
                .appender("console")
                .appender("file")
                .build(LevelFilter::Debug),
        )
        .expect("invalid log config");

    log4rs::init_config(config).expect("can't init log4rs");
}
