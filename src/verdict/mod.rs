//! Classification labels and detection decoding.

mod label;

pub use label::{Label, UnknownLabel};
