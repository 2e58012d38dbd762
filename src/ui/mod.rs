pub mod app;
pub mod draw;
pub mod overlay;
pub mod panes;
pub mod terminal;
