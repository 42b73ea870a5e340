pub mod resolver;

pub use resolver::{CacheStats, Resolver, ResolverStats};
