//! Track resolver library - video title to catalog track matching.

pub mod catalog;
pub mod chat;
pub mod config;
pub mod error;
pub mod extract;
pub mod feedback;
pub mod http;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod queue;
pub mod resolver;
pub mod scoring;
pub mod search;
pub mod similarity;
pub mod store;
pub mod sync;
pub mod triage;

pub use config::ResolverConfig;
pub use error::ResolveError;
pub use resolver::{ResolutionReport, Resolver};
