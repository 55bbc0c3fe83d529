// tests/logging.rs

use taskdag::config::LogLevel;
use taskdag::logging::resolve_level;
use tracing::Level;

#[test]
fn explicit_level_wins() {
    assert_eq!(
        resolve_level(Some(LogLevel::Trace), Some("error"), Some(LogLevel::Warn)),
        Level::TRACE
    );
}

#[test]
fn env_beats_config_file() {
    assert_eq!(resolve_level(None, Some("DEBUG"), Some(LogLevel::Warn)), Level::DEBUG);
    assert_eq!(resolve_level(None, Some(" warning "), None), Level::WARN);
}

#[test]
fn unparseable_env_falls_back_to_config() {
    assert_eq!(resolve_level(None, Some("loud"), Some(LogLevel::Error)), Level::ERROR);
}

#[test]
fn defaults_to_info() {
    assert_eq!(resolve_level(None, None, None), Level::INFO);
}
