//! 減衰スイーパー
//!
//! プロセス起動時に 1 回、その後は一定間隔で減衰スイープを実行します。
//! スイープは冪等な一括更新としきい値削除だけなので、実行が重なったり
//! 遅れたりしても整合性は崩れません。

use recall_core::{DecayStats, MemoryStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::SweepConfig;

/// スイーパーのハンドル
pub struct SweeperHandle {
    /// スイーパータスクの終了送信
    shutdown_tx: broadcast::Sender<()>,
    /// 実行中のタスクハンドル
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// スイーパーを停止
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

/// 減衰スイーパー
pub struct Sweeper {
    store: Arc<Mutex<MemoryStore>>,
    config: SweepConfig,
}

impl Sweeper {
    /// 新しいスイーパーを作成
    pub fn new(store: Arc<Mutex<MemoryStore>>, config: SweepConfig) -> Self {
        Self { store, config }
    }

    /// スイープを 1 回だけ実行
    pub fn run_once(&self) -> recall_core::Result<DecayStats> {
        self.store.lock().unwrap().decay_sweep(
            self.config.decay_rate,
            self.config.min_salience,
            chrono::Duration::hours(self.config.grace_hours),
        )
    }

    /// スイーパーを開始
    ///
    /// 起動直後に 1 回実行し、その後 `interval_hours` ごとに実行します。
    pub fn start(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let shutdown_tx_clone = shutdown_tx.clone();

        let handle = tokio::spawn(async move {
            info!(
                "減衰スイーパーを開始しました (間隔: {} 時間)",
                self.config.interval_hours
            );
            let period = Duration::from_secs(self.config.interval_hours * 3600);

            loop {
                match self.run_once() {
                    Ok(stats) => {
                        info!("スイープ完了: {} 件減衰, {} 件削除", stats.decayed, stats.deleted);
                    }
                    Err(e) => {
                        error!("スイープ失敗: {}", e);
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = shutdown_rx.recv() => {
                        info!("シャットダウン要求を受信");
                        break;
                    }
                }
            }

            info!("減衰スイーパーを停止しました");
        });

        SweeperHandle {
            shutdown_tx: shutdown_tx_clone,
            handle,
        }
    }
}
