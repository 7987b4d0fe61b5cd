//! Blob store backend implementations

pub mod file;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;
#[cfg(feature = "s3")]
pub use s3::S3BlobStore;
