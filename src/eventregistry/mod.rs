//! Event Registry integration: typed wire format and the article-search client.

pub mod client;
pub mod types;
