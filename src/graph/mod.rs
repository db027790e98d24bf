//! Chunk similarity graph: building edges and walking them.

pub mod builder;
pub mod traversal;

pub use builder::{GraphBuilder, ProgressFn, RelationshipCounts, RelationshipOptions};
pub use traversal::{RelatedOptions, related_chunks};
