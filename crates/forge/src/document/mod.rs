//! Markdown document primitives
//!
//! Line-level building blocks shared by the chapter transformer and the block
//! normalizer: front-matter extraction, heading anchors, named blocks and
//! cross-chapter links.

pub mod anchors;
pub mod blocks;
pub mod frontmatter;
pub mod links;

pub use anchors::{anchor_id, demote, plain_text, slugify, Heading, MAX_HEADING_LEVEL};
pub use blocks::{BlockError, NamedBlock, Segment};
pub use frontmatter::FrontMatterError;
pub use links::{LinkReference, LinkRewriter, LinkType};
