pub mod codec;
pub mod engine;
pub mod format;
pub mod plan;
pub mod writer;

pub use engine::{compress_file, decompress_file, CompressOptions, RunSummary};
pub use format::{BlockDescriptor, ContainerHeader, DESCRIPTOR_SIZE, HEADER_SIZE, MAGIC};
pub use writer::SyncWriter;
