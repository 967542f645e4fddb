pub mod console;
pub mod run;

pub use console::ConsoleArgs;
pub use run::RunArgs;
