use std::collections::VecDeque;

use async_trait::async_trait;

use crate::config::SEGMENT_SIZE;
use crate::error::JobError;
use crate::io::{ByteReader, estimate_line_count, next_line_start};
use crate::pipeline::{RecordSource, RiverRecord};

/// Configuration for the delimited flat-file format.
#[derive(Debug, Clone)]
pub struct DelimitedConfig {
    pub delimiter: u8,
}

impl Default for DelimitedConfig {
    fn default() -> Self {
        Self { delimiter: b'|' }
    }
}

/// Lazy, forward-only source of `RiverRecord`s parsed from a delimited text
/// file. Works with any ByteReader implementation; the file is consumed in
/// line-aligned segments so the whole input never has to fit in memory.
///
/// Raw rows are buffered per segment but mapped onto records one at a time,
/// so every row before a malformed line is still delivered before the parse
/// failure surfaces.
pub struct FlatFileSource<R: ByteReader> {
    reader: R,
    config: DelimitedConfig,
    /// Next unread byte offset; None until the first pull.
    position: Option<u64>,
    size: u64,
    /// Raw rows waiting to be mapped: (1-based line number, fields).
    pending: VecDeque<(u64, Vec<String>)>,
    /// Physical lines fully consumed by previous segments.
    line_base: u64,
}

impl<R: ByteReader + 'static> FlatFileSource<R> {
    pub fn new(reader: R, config: DelimitedConfig) -> Self {
        Self {
            reader,
            config,
            position: None,
            size: 0,
            pending: VecDeque::new(),
            line_base: 0,
        }
    }

    /// Estimate how many records the input holds, for progress reporting.
    pub async fn estimate_records(&self) -> Result<Option<u64>, JobError> {
        let size = self.reader.size().await?;
        estimate_line_count(&self.reader, 0, size).await
    }

    fn exhausted(&self) -> bool {
        matches!(self.position, Some(pos) if pos >= self.size)
    }

    /// Read the next line-aligned segment and split it into raw rows.
    async fn fill_segment(&mut self) -> Result<(), JobError> {
        let start = match self.position {
            Some(pos) => pos,
            None => {
                self.size = self.reader.size().await?;
                self.position = Some(0);
                0
            }
        };
        if start >= self.size {
            return Ok(());
        }

        let target = start.saturating_add(SEGMENT_SIZE as u64);
        let end = if target >= self.size {
            self.size
        } else {
            next_line_start(&self.reader, target).await?
        };

        let buffer = self.reader.read_range(start, end).await?;

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(buffer.as_slice());

        for result in csv_reader.records() {
            let record = result.map_err(|err| JobError::Parse {
                line: self.line_base + err.position().map(|p| p.line()).unwrap_or(0),
                message: format!("unreadable record: {err}"),
            })?;
            let line = self.line_base + record.position().map(|p| p.line()).unwrap_or(0);
            let fields = record.iter().map(|field| field.to_string()).collect();
            self.pending.push_back((line, fields));
        }

        self.line_base += buffer.iter().filter(|&&b| b == b'\n').count() as u64;
        self.position = Some(end);
        Ok(())
    }

    /// Map one raw row onto a record, positionally: field 0 is the date
    /// token, field 1 the height.
    fn map_row(&self, fields: &[String], line: u64) -> Result<RiverRecord, JobError> {
        if fields.len() != 2 {
            return Err(JobError::Parse {
                line,
                message: format!(
                    "expected 2 fields separated by '{}', found {}: {:?}",
                    self.config.delimiter as char,
                    fields.len(),
                    fields.join(&(self.config.delimiter as char).to_string()),
                ),
            });
        }

        let height = fields[1].trim().parse::<f64>().map_err(|_| JobError::Parse {
            line,
            message: format!("height is not numeric: '{}'", fields[1]),
        })?;

        Ok(RiverRecord {
            date_captured: fields[0].clone(),
            height,
        })
    }
}

#[async_trait]
impl<R: ByteReader + 'static> RecordSource for FlatFileSource<R> {
    async fn next(&mut self) -> Result<Option<RiverRecord>, JobError> {
        loop {
            if let Some((line, fields)) = self.pending.pop_front() {
                return self.map_row(&fields, line).map(Some);
            }
            if self.exhausted() {
                return Ok(None);
            }
            self.fill_segment().await?;
        }
    }
}
