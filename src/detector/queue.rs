use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

/// キャプチャスレッドと処理ループをつなぐ有界キュー
///
/// offer は満杯のとき値を捨てて即座に戻る（ブロックしない）。
/// 負荷時には完全性より鮮度を優先するフレームドロップポリシー。
pub struct FrameSender<T> {
    tx: SyncSender<T>,
}

impl<T> FrameSender<T> {
    /// ノンブロッキング送信。受理されたら true、満杯で捨てたら false。
    /// 受信側が閉じている場合も false を返す。
    pub fn offer(&self, value: T) -> bool {
        match self.tx.try_send(value) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// 容量付きキューを作る。容量1でフレームの先入れ・後着ドロップになる。
pub fn bounded<T>(capacity: usize) -> (FrameSender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (FrameSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::TryRecvError;

    #[test]
    fn test_second_offer_dropped_when_full() {
        let (tx, rx) = bounded::<u32>(1);
        // 消費前に2フレーム到着: 1つ目だけ保持される
        assert!(tx.offer(1));
        assert!(!tx.offer(2));

        assert_eq!(rx.recv().unwrap(), 1);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_offer_accepts_after_consumption() {
        let (tx, rx) = bounded::<u32>(1);
        assert!(tx.offer(1));
        assert_eq!(rx.recv().unwrap(), 1);
        assert!(tx.offer(2));
        assert_eq!(rx.recv().unwrap(), 2);
    }

    #[test]
    fn test_offer_after_receiver_dropped() {
        let (tx, rx) = bounded::<u32>(1);
        drop(rx);
        assert!(!tx.offer(1));
    }

    #[test]
    fn test_receiver_unblocks_when_sender_dropped() {
        let (tx, rx) = bounded::<u32>(1);
        drop(tx);
        assert!(rx.recv().is_err());
    }
}
