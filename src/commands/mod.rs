pub mod enrich;
pub mod init;
pub mod links;
pub mod stats;
