//! 受信PCMを一定長チャンクへまとめるバッファ
#[derive(Debug, Clone)]
pub struct AudioChunker {
    chunk_bytes: usize,
    buffer: Vec<u8>,
}

impl AudioChunker {
    pub fn new(chunk_bytes: usize) -> Self {
        let chunk_bytes = chunk_bytes.max(1);
        Self {
            chunk_bytes,
            buffer: Vec::with_capacity(chunk_bytes * 2),
        }
    }

    /// データを追加し、揃ったチャンクを古い順に返す
    pub fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(data);
        let ready = self.buffer.len() / self.chunk_bytes;
        if ready == 0 {
            return Vec::new();
        }
        let tail = self.buffer.split_off(ready * self.chunk_bytes);
        let full = std::mem::replace(&mut self.buffer, tail);
        full.chunks_exact(self.chunk_bytes)
            .map(<[u8]>::to_vec)
            .collect()
    }

    /// 割り込み時などに未送出分を破棄
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_fixed_size_chunks() {
        let mut chunker = AudioChunker::new(4);
        assert!(chunker.push(&[1, 2, 3]).is_empty());
        let chunks = chunker.push(&[4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(chunks, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);
        assert_eq!(chunker.pending(), 2);
        chunker.clear();
        assert_eq!(chunker.pending(), 0);
    }

    #[test]
    fn telephony_chunk_size() {
        // 8kHz * 2byte * 200ms
        let chunker = AudioChunker::new(8000 * 2 * 200 / 1000);
        assert_eq!(chunker.chunk_bytes(), 3200);
    }
}
