pub mod config;
pub mod disambiguation;
pub mod extract;
pub mod fetch;
pub mod format;
pub mod host;
pub mod wikitext;
