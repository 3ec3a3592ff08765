// Domain layer - Pure models and rules, no I/O
pub mod curve;
pub mod sync;
pub mod training;
pub mod video;
