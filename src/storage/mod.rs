//! Blob storage for build artifacts and checksum pointers
//!
//! Everything the pipeline persists lives in one bucket (or a local directory
//! mirroring it), namespaced per service:
//!
//! - [`ArtifactStore`] keeps immutable dist archives keyed by checksum.
//! - [`ChecksumPointerStore`] keeps the mutable `last` and `live` pointers.
//!
//! Both sit on top of the [`BlobStore`] trait; the concrete backend is chosen
//! from the environment by [`StorageFactory`].

pub mod artifact;
pub mod backends;
pub mod config;
pub mod error;
pub mod factory;
pub mod keys;
pub mod pointer;
pub mod traits;

pub use artifact::ArtifactStore;
pub use backends::{FileBlobStore, MemoryBlobStore};
#[cfg(feature = "s3")]
pub use backends::S3BlobStore;
pub use config::{BackendConfig, BackendType, FileConfig, S3Config, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use factory::StorageFactory;
pub use pointer::{ChecksumPointerStore, PointerKind};
pub use traits::BlobStore;
