//! I/O abstraction layer for reading bytes from the input file

pub mod byte_reader;
pub mod local_reader;

pub use byte_reader::{ByteReader, estimate_line_count, next_line_start};
pub use local_reader::LocalFileByteReader;
