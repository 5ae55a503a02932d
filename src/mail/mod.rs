pub mod decoders;
pub mod imap_client;
pub mod parser;
pub mod provider;
