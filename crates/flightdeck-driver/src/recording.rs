//! 快照录制钩子
//!
//! 把每次安装的状态快照通过有界 Channel 转发给后台消费者（写文件、绘图等）。
//!
//! # 设计原则
//!
//! - **有界队列**: `bounded(capacity)` 防止消费者过慢时内存无限增长
//! - **非阻塞**: 使用 `try_send`，队列满时丢弃快照而非阻塞通知线程
//! - **丢帧监控**: `dropped()` / `recorded()` 计数器
//!
//! # 使用示例
//!
//! ```rust
//! use flightdeck_driver::{SnapshotRecorder, StateManager};
//! use std::sync::Arc;
//!
//! let manager = StateManager::new();
//! let (recorder, rx) = SnapshotRecorder::new(1024);
//! let recorder = Arc::new(recorder);
//! manager.register_observer(recorder.clone());
//!
//! manager.update_state(|s| flightdeck_physics::FlightState { z: 10.0, ..s });
//!
//! let first = rx.try_recv().unwrap();
//! assert_eq!(first.seq, 0);
//! assert_eq!(first.state.z, 10.0);
//! ```

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use flightdeck_physics::FlightState;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CallbackError;
use crate::hooks::StateCallback;

/// 带序号的快照
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordedState {
    /// 录制序号（从 0 开始，每次通知预留一个；被丢弃的快照留下空洞）
    pub seq: u64,
    pub state: FlightState,
}

/// 快照录制钩子
pub struct SnapshotRecorder {
    tx: Sender<RecordedState>,
    /// 下一个待分配的序号
    next_seq: AtomicU64,
    /// 成功入队的快照数
    recorded: AtomicU64,
    /// 队列满而丢弃的快照数
    dropped: AtomicU64,
}

impl SnapshotRecorder {
    /// 创建录制钩子，返回 `(hook, rx)`
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<RecordedState>) {
        let (tx, rx) = bounded(capacity);
        let hook = Self {
            tx,
            next_seq: AtomicU64::new(0),
            recorded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        };
        (hook, rx)
    }

    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl StateCallback for SnapshotRecorder {
    fn on_state_changed(&self, state: &FlightState) -> Result<(), CallbackError> {
        // 序号在发送前原子地预留；并发通知时入队顺序可能交错
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        match self.tx.try_send(RecordedState { seq, state: *state }) {
            Ok(()) => {
                self.recorded.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            Err(TrySendError::Disconnected(_)) => {
                Err(CallbackError::new("snapshot receiver disconnected"))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(z: f64) -> FlightState {
        FlightState {
            z,
            ..FlightState::default()
        }
    }

    #[test]
    fn test_recorder_forwards_in_order() {
        let (recorder, rx) = SnapshotRecorder::new(16);
        for z in [1.0, 2.0, 3.0] {
            recorder.on_state_changed(&at(z)).unwrap();
        }

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), 3);
        assert_eq!(received[2].seq, 2);
        assert_eq!(received[2].state.z, 3.0);
        assert_eq!(recorder.recorded(), 3);
        assert_eq!(recorder.dropped(), 0);
    }

    #[test]
    fn test_recorder_drops_when_full() {
        let (recorder, rx) = SnapshotRecorder::new(2);
        for z in 0..5 {
            recorder.on_state_changed(&at(z as f64)).unwrap();
        }

        assert_eq!(recorder.recorded(), 2);
        assert_eq!(recorder.dropped(), 3);
        let seqs: Vec<u64> = rx.try_iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![0, 1]);

        // 丢弃的快照在序号上留下空洞
        recorder.on_state_changed(&at(9.0)).unwrap();
        assert_eq!(rx.try_recv().unwrap().seq, 5);
    }

    #[test]
    fn test_recorder_sequence_unique_across_threads() {
        let threads = 8;
        let per_thread = 5_000;
        let (recorder, rx) = SnapshotRecorder::new(threads * per_thread);
        let recorder = std::sync::Arc::new(recorder);

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let recorder = std::sync::Arc::clone(&recorder);
                std::thread::spawn(move || {
                    for k in 0..per_thread {
                        recorder.on_state_changed(&at(k as f64)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut seqs: Vec<u64> = rx.try_iter().map(|r| r.seq).collect();
        seqs.sort_unstable();
        let expected: Vec<u64> = (0..(threads * per_thread) as u64).collect();
        assert_eq!(seqs, expected);
        assert_eq!(recorder.recorded(), (threads * per_thread) as u64);
        assert_eq!(recorder.dropped(), 0);
    }

    #[test]
    fn test_recorder_reports_disconnected_receiver() {
        let (recorder, rx) = SnapshotRecorder::new(2);
        drop(rx);
        assert!(recorder.on_state_changed(&at(1.0)).is_err());
    }
}
