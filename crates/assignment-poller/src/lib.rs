pub mod activities;
pub mod config;
pub mod dedup;
pub mod extractor;
pub mod gmail_client;
pub mod notion_client;
pub mod processor;
pub mod service;
pub mod sync;
