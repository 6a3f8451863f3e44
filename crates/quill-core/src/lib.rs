pub mod checker;
pub mod errors;
pub mod events;
pub mod feedback;
pub mod ids;
pub mod segmenter;
pub mod session;
