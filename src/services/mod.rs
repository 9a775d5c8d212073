pub mod catalog;
pub mod filesystem;
pub mod media;
pub mod s3;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
