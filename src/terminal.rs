use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::termios::{self, LocalFlags, SetArg, Termios};

const STDIN_FILENO: i32 = libc::STDIN_FILENO;

// Read from the signal handler and from Drop; the interpreter is single-threaded so this
// does not race.
static mut SAVED_TERMIOS: Option<Termios> = None;
static RESTORED: AtomicBool = AtomicBool::new(false);

pub struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    pub fn acquire() -> nix::Result<Self> {
        let original = termios::tcgetattr(STDIN_FILENO)?;

        let mut raw = original.clone();
        raw.local_flags &= !(LocalFlags::ICANON | LocalFlags::ECHO);
        termios::tcsetattr(STDIN_FILENO, SetArg::TCSANOW, &raw)?;

        unsafe {
            SAVED_TERMIOS = Some(original);
        }
        RESTORED.store(false, Ordering::SeqCst);

        let action = SigAction::new(
            SigHandler::Handler(handle_sigint),
            SaFlags::empty(),
            SigSet::empty(),
        );
        unsafe {
            signal::sigaction(Signal::SIGINT, &action)?;
        }

        Ok(TerminalGuard { _private: () })
    }

    fn restore(&self) {
        if RESTORED.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(original) = unsafe { SAVED_TERMIOS.clone() } {
            let _ = termios::tcsetattr(STDIN_FILENO, SetArg::TCSANOW, &original);
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

// Drop does not run when the process is killed by a signal, so this restores and exits
// directly instead.
extern "C" fn handle_sigint(_signal: libc::c_int) {
    if !RESTORED.swap(true, Ordering::SeqCst) {
        if let Some(original) = unsafe { SAVED_TERMIOS.clone() } {
            let _ = termios::tcsetattr(STDIN_FILENO, SetArg::TCSANOW, &original);
        }
    }
    let _ = std::io::Write::write_all(&mut std::io::stdout(), b"\n");
    std::process::exit(-2);
}
