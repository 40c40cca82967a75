pub mod id;
pub mod names;

pub use names::NameGenerator;
