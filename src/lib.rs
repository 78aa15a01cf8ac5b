pub mod logger;
pub mod vm;
