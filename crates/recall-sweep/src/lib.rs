//! 減衰スイープモジュール
//!
//! 一定間隔でメモリの salience を減衰させ、しきい値を下回った
//! メモリを削除するバックグラウンドタスクを提供します。

mod config;
mod sweeper;

pub use config::SweepConfig;
pub use sweeper::{Sweeper, SweeperHandle};
