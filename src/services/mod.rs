pub mod archive;
pub mod fetcher;
pub mod metadata;
pub mod profile;
pub mod stations;
pub mod uwyo;
