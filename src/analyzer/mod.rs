mod analyzer;
mod dependencies;

pub use analyzer::{declared_info, Analyzer};
pub use dependencies::DependencyTreeBuilder;
