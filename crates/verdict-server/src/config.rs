use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "verdict")]
#[command(version, about = "Versioned model registry and scoring server")]
pub struct Config {
    /// HTTP listen address
    #[arg(long, env = "VERDICT_HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: SocketAddr,

    /// Directory of model definitions (*.json) deployed on startup
    #[arg(long, env = "VERDICT_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Max request body size in bytes (model uploads and batches)
    #[arg(long, env = "VERDICT_MAX_MODEL_SIZE", default_value = "16777216")]
    pub max_model_size: usize,

    /// Evaluation timeout in milliseconds
    #[arg(long, env = "VERDICT_EVAL_TIMEOUT_MS", default_value = "30000")]
    pub eval_timeout_ms: u64,
}

impl Config {
    pub fn eval_timeout(&self) -> Duration {
        Duration::from_millis(self.eval_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(dir) = &self.model_dir {
            if !dir.is_dir() {
                anyhow::bail!("model directory {:?} does not exist", dir);
            }
        }
        if self.max_model_size == 0 {
            anyhow::bail!("max_model_size must be > 0");
        }
        if self.eval_timeout_ms == 0 {
            anyhow::bail!("eval_timeout_ms must be > 0");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            model_dir: None,
            max_model_size: 16 * 1024 * 1024, // 16MB
            eval_timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse_from_empty_args() {
        let config = Config::try_parse_from(["verdict"]).unwrap();
        assert_eq!(config.http_addr, Config::default().http_addr);
        assert_eq!(config.max_model_size, 16 * 1024 * 1024);
        assert_eq!(config.eval_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_model_dir_rejected() {
        let config = Config {
            model_dir: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = Config {
            eval_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
