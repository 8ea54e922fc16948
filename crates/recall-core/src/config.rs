//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. recall.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Error;

/// Main configuration for the recall subsystem
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Multiplier applied to salience on each decay pass (0-1)
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    /// Salience floor; rows below it are pruned by the sweep
    #[serde(default = "default_min_salience")]
    pub min_salience: f64,

    /// Hours since creation before a row becomes eligible for decay
    #[serde(default = "default_grace_hours")]
    pub grace_hours: i64,

    /// Hours between decay sweeps
    #[serde(default = "default_sweep_interval_hours")]
    pub sweep_interval_hours: u64,

    /// Maximum memories injected per context block
    #[serde(default = "default_max_context")]
    pub max_context: usize,

    /// Relevance results considered per lookup
    #[serde(default = "default_relevant_limit")]
    pub relevant_limit: usize,

    /// Recency results considered per lookup
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// Leading string that marks a turn as a command, not content
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            decay_rate: default_decay_rate(),
            min_salience: default_min_salience(),
            grace_hours: default_grace_hours(),
            sweep_interval_hours: default_sweep_interval_hours(),
            max_context: default_max_context(),
            relevant_limit: default_relevant_limit(),
            recent_limit: default_recent_limit(),
            command_prefix: default_command_prefix(),
        }
    }
}

fn default_db_path() -> String {
    "data/recall.db".to_string()
}

fn default_decay_rate() -> f64 {
    0.98
}

fn default_min_salience() -> f64 {
    0.1
}

fn default_grace_hours() -> i64 {
    24
}

fn default_sweep_interval_hours() -> u64 {
    24
}

fn default_max_context() -> usize {
    8
}

fn default_relevant_limit() -> usize {
    3
}

fn default_recent_limit() -> usize {
    5
}

fn default_command_prefix() -> String {
    "/".to_string()
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '}' {
                        chars.next(); // '}' を消費
                        break;
                    }
                    var_name.push(chars.next().unwrap());
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// # 引数
    /// * `path` - TOML ファイルのパス
    ///
    /// # 環境変数展開
    /// 設定ファイル内の `${VAR_NAME}` は環境変数の値に置換されます。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let expanded_content = Self::expand_env_vars(&toml_content);

        let mut config: Config = toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        // 既存の環境変数で上書き（環境変数が優先）
        config.apply_env_overrides();

        Ok(config)
    }

    /// デフォルトパスから設定を読み込む
    ///
    /// カレントディレクトリに `recall.toml` があればそれを使い、
    /// なければ環境変数のみから構成します。
    pub fn load() -> crate::Result<Self> {
        if Path::new("recall.toml").exists() {
            return Self::from_toml_file("recall.toml");
        }

        Self::from_env()
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// 環境変数で設定を上書きする
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("DB_PATH") {
            self.memory.db_path = path;
        }
        if let Ok(rate) = std::env::var("DECAY_RATE") {
            if let Ok(v) = rate.parse() {
                self.memory.decay_rate = v;
            }
        }
        if let Ok(floor) = std::env::var("MIN_SALIENCE") {
            if let Ok(v) = floor.parse() {
                self.memory.min_salience = v;
            }
        }
        if let Ok(hours) = std::env::var("GRACE_HOURS") {
            if let Ok(v) = hours.parse() {
                self.memory.grace_hours = v;
            }
        }
        if let Ok(hours) = std::env::var("SWEEP_INTERVAL_HOURS") {
            if let Ok(v) = hours.parse() {
                self.memory.sweep_interval_hours = v;
            }
        }
        if let Ok(count) = std::env::var("MAX_CONTEXT") {
            if let Ok(v) = count.parse() {
                self.memory.max_context = v;
            }
        }
        if let Ok(count) = std::env::var("RELEVANT_LIMIT") {
            if let Ok(v) = count.parse() {
                self.memory.relevant_limit = v;
            }
        }
        if let Ok(count) = std::env::var("RECENT_LIMIT") {
            if let Ok(v) = count.parse() {
                self.memory.recent_limit = v;
            }
        }
        if let Ok(prefix) = std::env::var("COMMAND_PREFIX") {
            self.memory.command_prefix = prefix;
        }
    }
}
