pub mod download;
pub mod transcode;
pub mod version;
