//! Process descriptors and the document they are loaded from.
//!
//! - [`ProcessDescriptor`] static configuration of one managed program
//! - [`DescriptorStore`] loads TOML/JSON documents into a [`LoadReport`]
//! - [`ConfigSource`] file or in-memory document

mod descriptor;
pub(crate) mod raw;
mod store;

pub use descriptor::{MAX_INSTANCES, ProcessDescriptor};
pub use store::{ConfigSource, DescriptorStore, LoadReport};
