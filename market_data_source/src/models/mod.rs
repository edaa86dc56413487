pub mod bar;
pub mod window;
