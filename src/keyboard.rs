use std::io::{self, Read};

// Kept behind a trait so Memory's KBSR poll can be driven by a canned byte queue in tests
// instead of real stdin.
pub trait Keyboard {
    fn poll(&mut self) -> Option<u8>;
    fn read_blocking(&mut self) -> Option<u8>;
}

pub struct StdinKeyboard;

impl Keyboard for StdinKeyboard {
    fn poll(&mut self) -> Option<u8> {
        use nix::sys::select::{select, FdSet};
        use nix::sys::time::{TimeVal, TimeValLike};

        let mut readfds = FdSet::new();
        readfds.insert(libc::STDIN_FILENO);

        let ready = select(None, &mut readfds, None, None, &mut TimeVal::zero())
            .map(|count| count > 0)
            .unwrap_or(false);

        if ready {
            self.read_blocking()
        } else {
            None
        }
    }

    fn read_blocking(&mut self) -> Option<u8> {
        let mut buffer = [0u8; 1];
        match io::stdin().read_exact(&mut buffer) {
            Ok(()) => Some(buffer[0]),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => None,
            Err(e) => panic!("error reading from stdin: {}", e),
        }
    }
}

#[cfg(test)]
pub struct FakeKeyboard {
    bytes: std::collections::VecDeque<u8>,
}

#[cfg(test)]
impl FakeKeyboard {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.iter().copied().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::new(&[])
    }
}

#[cfg(test)]
impl Keyboard for FakeKeyboard {
    fn poll(&mut self) -> Option<u8> {
        self.bytes.pop_front()
    }

    fn read_blocking(&mut self) -> Option<u8> {
        self.bytes.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_keyboard_polls_until_exhausted() {
        let mut kb = FakeKeyboard::new(&[b'a', b'b']);
        assert_eq!(kb.poll(), Some(b'a'));
        assert_eq!(kb.poll(), Some(b'b'));
        assert_eq!(kb.poll(), None);
    }

    #[test]
    fn fake_keyboard_read_blocking_reports_eof_as_none() {
        let mut kb = FakeKeyboard::empty();
        assert_eq!(kb.read_blocking(), None);
    }
}
