//! 🪣🚀🌐 S3 Backend: the ground-to-cloud data paratrooper.
//!
//! INT. AWS CONSOLE, NIGHT. A lone S3 bucket sits in us-east-1, empty, waiting for a
//! table's worth of tiny JSON objects. Each one keyed by an md5. Each one overwritable.
//! Each one arriving over a connection pool the SDK manages better than we ever would.
//!
//! 🧠 Knowledge graph:
//! - Config co-located: `S3StoreConfig` lives in `s3_store.rs`
//! - Trait impl: `impl ObjectStore for S3Store`
//! - Enum variant: `StoreBackend::S3(S3Store)`
//! - Transport: AWS SDK `PutObject`, retries and timeouts owned by the SDK config
//!
//! 🦆 The duck has no clearance for AWS. It watches from the edge of the VPC.

mod s3_store;

pub use s3_store::{S3Store, S3StoreConfig};
