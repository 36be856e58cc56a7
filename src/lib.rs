pub mod audio;
pub mod config;
pub mod effects;
pub mod error;
pub mod experience;
pub mod graphics;
pub mod ui;
