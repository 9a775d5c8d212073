pub mod image_processor;
pub mod mime;
pub mod naming;
