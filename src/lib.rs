pub mod config;
pub mod contexts;
pub mod data;
pub mod manifest;
pub mod prompts;
pub mod registries;
