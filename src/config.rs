//! Configuration and CLI argument handling

use std::time::Duration;
use clap::Parser;

use crate::overlay::MessagePreset;
use crate::sync::DEFAULT_DOCUMENT_PATH;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "stage-timer")]
#[command(about = "A stage countdown timer with a synchronized display")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Local tick and display refresh interval in milliseconds
    #[arg(long, default_value = "100")]
    pub tick_ms: u64,

    /// Interval between timer syncs while a timer runs, in milliseconds
    #[arg(long, default_value = "1000")]
    pub sync_interval_ms: u64,

    /// Path of the shared timer document
    #[arg(long, default_value = DEFAULT_DOCUMENT_PATH)]
    pub document: String,

    /// Preset message, may be repeated
    #[arg(long = "preset-message")]
    pub preset_messages: Vec<String>,

    /// Do not run the embedded display
    #[arg(long)]
    pub no_display: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms.max(1))
    }

    pub fn presets(&self) -> Vec<MessagePreset> {
        self.preset_messages
            .iter()
            .filter(|text| !text.trim().is_empty())
            .map(|text| MessagePreset::new(text.trim()))
            .collect()
    }

    pub fn display_enabled(&self) -> bool {
        !self.no_display
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_args(args: &[&str]) -> Config {
        <Config as Parser>::parse_from(std::iter::once("stage-timer").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let config = parse_args(&[]);
        assert_eq!(config.address(), "0.0.0.0:20554");
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.tick(), Duration::from_millis(100));
        assert_eq!(config.sync_interval(), Duration::from_secs(1));
        assert_eq!(config.document, DEFAULT_DOCUMENT_PATH);
        assert!(config.presets().is_empty());
        assert!(config.display_enabled());
    }

    #[test]
    fn test_overrides() {
        let config = parse_args(&[
            "-p",
            "8080",
            "--verbose",
            "--preset-message",
            "Five minutes",
            "--preset-message",
            "  ",
            "--preset-message",
            "Wrap up",
            "--no-display",
            "--tick-ms",
            "0",
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_level(), "debug");
        let presets: Vec<_> = config.presets().into_iter().map(|p| p.text).collect();
        assert_eq!(presets, vec!["Five minutes", "Wrap up"]);
        assert!(!config.display_enabled());
        assert_eq!(config.tick(), Duration::from_millis(1));
    }
}
