use std::collections::VecDeque;

/// フレームごとの特徴ベクトルを保持するスライディングウィンドウ
///
/// 容量に達した後の push は最古の要素を追い出す。一度満杯になったら
/// それ以降 is_full が false に戻ることはない。
pub struct SequenceBuffer {
    buf: VecDeque<Vec<f32>>,
    capacity: usize,
}

impl SequenceBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, features: Vec<f32>) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(features);
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 古い順に並んだウィンドウのコピーを返す
    pub fn snapshot(&self) -> Vec<Vec<f32>> {
        self.buf.iter().cloned().collect()
    }
}

/// 直近の生スコアを保持して移動平均を返すウィンドウ
pub struct ScoreWindow {
    buf: VecDeque<f32>,
    capacity: usize,
}

impl ScoreWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, score: f32) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(score);
    }

    /// 移動平均。パイプラインは必ず push 後に読むが、空のときは 0.0 を返す。
    pub fn mean(&self) -> f32 {
        if self.buf.is_empty() {
            return 0.0;
        }
        self.buf.iter().sum::<f32>() / self.buf.len() as f32
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_buffer_fills_exactly_at_capacity() {
        let mut buf = SequenceBuffer::new(3);
        buf.push(vec![1.0]);
        assert!(!buf.is_full());
        buf.push(vec![2.0]);
        assert!(!buf.is_full());
        buf.push(vec![3.0]);
        assert!(buf.is_full());
    }

    #[test]
    fn test_sequence_buffer_stays_full_after_eviction() {
        let mut buf = SequenceBuffer::new(2);
        buf.push(vec![1.0]);
        buf.push(vec![2.0]);
        assert!(buf.is_full());
        // スライディング後も満杯のまま
        buf.push(vec![3.0]);
        assert!(buf.is_full());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_sequence_buffer_snapshot_order_oldest_first() {
        let mut buf = SequenceBuffer::new(2);
        buf.push(vec![1.0]);
        buf.push(vec![2.0]);
        buf.push(vec![3.0]);
        let snap = buf.snapshot();
        assert_eq!(snap, vec![vec![2.0], vec![3.0]]);
    }

    #[test]
    fn test_score_window_mean() {
        let mut win = ScoreWindow::new(3);
        win.push(0.2);
        win.push(0.4);
        win.push(0.6);
        assert!((win.mean() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_score_window_evicts_oldest() {
        let mut win = ScoreWindow::new(3);
        win.push(0.2);
        win.push(0.4);
        win.push(0.6);
        win.push(0.8);
        // [0.4, 0.6, 0.8]
        assert_eq!(win.len(), 3);
        assert!((win.mean() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_score_window_partial_mean() {
        let mut win = ScoreWindow::new(5);
        win.push(1.0);
        assert!((win.mean() - 1.0).abs() < 1e-6);
        win.push(0.0);
        assert!((win.mean() - 0.5).abs() < 1e-6);
    }
}
