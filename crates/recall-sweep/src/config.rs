//! スイープ設定

use recall_core::MemoryConfig;
use serde::{Deserialize, Serialize};

/// 減衰スイープの設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// スイープ実行間隔（時間）
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// 1 回のスイープで salience に掛ける減衰率 (0-1)
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    /// 削除しきい値。これを下回ったメモリは削除される
    #[serde(default = "default_min_salience")]
    pub min_salience: f64,

    /// 作成からこの時間（時間単位）は減衰の対象外
    #[serde(default = "default_grace_hours")]
    pub grace_hours: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
            decay_rate: default_decay_rate(),
            min_salience: default_min_salience(),
            grace_hours: default_grace_hours(),
        }
    }
}

fn default_interval_hours() -> u64 {
    24
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

impl From<&MemoryConfig> for SweepConfig {
    fn from(memory: &MemoryConfig) -> Self {
        Self {
            interval_hours: memory.sweep_interval_hours,
            decay_rate: memory.decay_rate,
            min_salience: memory.min_salience,
            grace_hours: memory.grace_hours,
        }
    }
}
