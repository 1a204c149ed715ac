mod config;
mod instruction;
mod keyboard;
mod loader;
mod machine;
mod memory;
mod opcode;
mod registers;
mod terminal;
mod trap;
mod word;

pub use crate::config::Config;

use std::error::Error;

use crate::keyboard::StdinKeyboard;
use crate::machine::Machine;
use crate::terminal::TerminalGuard;

pub fn run(config: Config) -> Result<(), Box<dyn Error>> {
    let mut machine = Machine::new(Box::new(StdinKeyboard));

    for path in &config.images {
        loader::load_image(path, machine.memory_mut())
            .map_err(|_| format!("failed to load image: {}", path))?;
    }

    let _terminal = TerminalGuard::acquire()?;

    machine
        .run()
        .map_err(|e| format!("{}", e))?;

    Ok(())
}
