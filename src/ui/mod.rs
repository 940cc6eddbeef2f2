pub mod progress;

pub use progress::ProgressUi;
