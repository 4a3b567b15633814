pub mod compensator;
pub mod pipeline;
pub mod submission;
pub mod transport;
