pub mod animation;
pub mod app;
pub mod audio;
pub mod camera;
pub mod config;
pub mod engine;
pub mod ifs;
pub mod present;
pub mod renderer;
pub mod scene_file;
pub mod terminal;
