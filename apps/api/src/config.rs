use std::time::Duration;

use anyhow::{Context, Result};

use crate::rewrite::validator::DEFAULT_BULLET_TOLERANCE;
use crate::rewrite::RewriteStrategy;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub rewrite_strategy: RewriteStrategy,
    /// The `.docx` the structured strategy renders into.
    pub template_path: String,
    /// How much longer a rewritten bullet may be (0.10 = 10%).
    pub bullet_length_tolerance: f64,
    pub progress_interval: Duration,
    pub job_queue_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bullet_length_tolerance = or_default(
            "BULLET_LENGTH_TOLERANCE",
            &DEFAULT_BULLET_TOLERANCE.to_string(),
        )
        .parse::<f64>()
        .context("BULLET_LENGTH_TOLERANCE must be a number")?;
        if !(0.0..=1.0).contains(&bullet_length_tolerance) {
            anyhow::bail!("BULLET_LENGTH_TOLERANCE must be between 0 and 1, got {bullet_length_tolerance}");
        }

        Ok(Config {
            database_url: require("DATABASE_URL")?,
            redis_url: require("REDIS_URL")?,
            s3_bucket: require("S3_BUCKET")?,
            s3_endpoint: require("S3_ENDPOINT")?,
            aws_access_key_id: require("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require("ANTHROPIC_API_KEY")?,
            port: or_default("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: or_default("RUST_LOG", "info"),
            rewrite_strategy: or_default("REWRITE_STRATEGY", "unit_patch").parse()?,
            template_path: or_default("RESUME_TEMPLATE_PATH", "assets/resume-template.docx"),
            bullet_length_tolerance,
            progress_interval: Duration::from_millis(
                or_default("PROGRESS_INTERVAL_MS", "500")
                    .parse::<u64>()
                    .context("PROGRESS_INTERVAL_MS must be a whole number of milliseconds")?,
            ),
            job_queue_key: or_default("JOB_QUEUE_KEY", "cvpatch:jobs"),
        })
    }
}
