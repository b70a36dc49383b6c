pub mod command;
pub mod input;
pub mod settings;
pub mod terminal;
