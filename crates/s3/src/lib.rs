//! bf-s3: S3 backend for bucketfence
//!
//! Maps a bucket/object tree onto a single S3 (or S3-compatible) bucket.
//! Buckets are zero-length marker objects ending in `/`, objects are plain
//! keys, and listings use `ListObjectsV2` with a `/` delimiter.

mod client;
mod handle;

pub use client::S3Backend;
pub use handle::{S3Bucket, S3Object, key_of};
