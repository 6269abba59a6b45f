#[cfg(feature = "docker")]
pub mod docker;
#[cfg(test)]
pub mod memory;
pub mod web;
