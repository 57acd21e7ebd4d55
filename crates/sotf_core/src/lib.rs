pub mod archive;
pub mod core_api;
pub mod delete;
pub mod duplicates;
pub mod grouping;
pub mod locate;
pub mod merge;
pub mod structure;
pub mod transcode;
