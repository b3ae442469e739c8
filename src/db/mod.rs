//! Database layer - connection pooling and destination table access

pub mod pool;
pub mod sink;
pub mod source;
pub mod table;

pub use pool::{Pool, PoolArgs, PoolArgsBuilder};
pub use sink::TableSink;
pub use source::TableSource;
