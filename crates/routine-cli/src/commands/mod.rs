pub mod backup;
pub mod generate;
pub mod presets;
pub mod preview;
pub mod watch;
