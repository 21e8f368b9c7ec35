//! External dataset representations.
//!
//! Formats plug into the dataset layer through the producer/consumer
//! protocol; only the flat YAML format is built in.

pub mod yaml;

pub use yaml::{dataset_to_string, write_dataset, YamlDataSet, YamlWriter};
