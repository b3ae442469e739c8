use async_trait::async_trait;

use crate::config::{SAMPLE_SIZE, SEGMENT_SIZE};
use crate::error::JobError;

/// Abstraction for byte-level access to the input file.
/// Lets the flat-file source walk the input in line-aligned segments
/// without holding the whole file in memory at once.
#[async_trait]
pub trait ByteReader: Send + Sync {
    /// Total size of the input in bytes.
    async fn size(&self) -> Result<u64, JobError>;

    /// Read the half-open byte range `[start, end)`.
    async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>, JobError>;
}

/// Find the byte offset of the first line start at or after `offset`.
/// Returns the file size when no further line break exists.
pub async fn next_line_start(reader: &dyn ByteReader, offset: u64) -> Result<u64, JobError> {
    let file_size = reader.size().await?;
    let mut current = offset;

    loop {
        if current >= file_size {
            return Ok(file_size);
        }

        let end = std::cmp::min(current + SEGMENT_SIZE as u64, file_size);
        let buffer = reader.read_range(current, end).await?;

        if buffer.is_empty() {
            // Reached end of file
            return Ok(current);
        }

        if let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            // Next line starts just past the newline
            return Ok(current + pos as u64 + 1);
        }

        current += buffer.len() as u64;
    }
}

/// Estimate the number of lines in the byte range `[start, end)` by
/// sampling the head of the range. Returns `None` when the sample holds no
/// complete line.
pub async fn estimate_line_count(
    reader: &dyn ByteReader,
    start: u64,
    end: u64,
) -> Result<Option<u64>, JobError> {
    if start >= end {
        return Ok(Some(0));
    }

    let sample_size = std::cmp::min(SAMPLE_SIZE as u64, end - start);
    let buffer = reader.read_range(start, start + sample_size).await?;

    if buffer.is_empty() {
        return Ok(Some(0));
    }

    let newline_count = buffer.iter().filter(|&&b| b == b'\n').count();
    if newline_count == 0 {
        return Ok(None);
    }

    let avg_bytes_per_line = buffer.len() / newline_count;
    let total_bytes = end - start;

    Ok(Some(total_bytes / avg_bytes_per_line as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mock ByteReader for testing
    struct MockByteReader {
        data: Vec<u8>,
    }

    #[async_trait]
    impl ByteReader for MockByteReader {
        async fn size(&self) -> Result<u64, JobError> {
            Ok(self.data.len() as u64)
        }

        async fn read_range(&self, start: u64, end: u64) -> Result<Vec<u8>, JobError> {
            let start = start as usize;
            let end = std::cmp::min(end as usize, self.data.len());
            Ok(self.data[start..end].to_vec())
        }
    }

    #[tokio::test]
    async fn test_next_line_start() {
        let data = b"2017-01-01|5.2\n2017-01-02|9.8\n2017-01-03|3.1\n";
        let reader = MockByteReader {
            data: data.to_vec(),
        };

        // From the start of the file, the next line begins after line 1
        let boundary = next_line_start(&reader, 0).await.unwrap();
        assert_eq!(boundary, 15);

        // Mid-line offsets resolve to the same boundary
        let boundary = next_line_start(&reader, 7).await.unwrap();
        assert_eq!(boundary, 15);

        // From a line start, the boundary is the following line
        let boundary = next_line_start(&reader, 15).await.unwrap();
        assert_eq!(boundary, 30);

        // Past the final newline there is nothing left
        let boundary = next_line_start(&reader, 45).await.unwrap();
        assert_eq!(boundary, 45);
    }

    #[tokio::test]
    async fn test_estimate_line_count() {
        let mut data = Vec::new();
        for i in 0..50 {
            data.extend_from_slice(format!("2017-01-{:02}|{}.5\n", i % 28 + 1, i).as_bytes());
        }
        let reader = MockByteReader { data };

        let size = reader.size().await.unwrap();
        let estimate = estimate_line_count(&reader, 0, size).await.unwrap();

        let count = estimate.expect("sample contains complete lines");
        assert!((40..=60).contains(&count), "estimate {count} out of range");
    }

    #[tokio::test]
    async fn test_estimate_without_newline_is_unknown() {
        let reader = MockByteReader {
            data: b"2017-01-01|5.2".to_vec(),
        };

        let estimate = estimate_line_count(&reader, 0, 14).await.unwrap();
        assert!(estimate.is_none());
    }
}
