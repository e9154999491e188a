// Library interface for newsbot modules
// This allows tests and other binaries to import modules

pub mod extraction;
pub mod llm;
pub mod news;
pub mod server;
pub mod sessions;
