use std::fs::File;
use std::io::{self, BufReader};

use byteorder::{NativeEndian, ReadBytesExt};

use crate::memory::Memory;
use crate::word::swap16;

// Every word read, including the origin itself, is byte-swapped: images are big-endian and
// the host's native order is left undetected.
pub fn load_image(path: &str, memory: &mut Memory) -> io::Result<u16> {
    let mut reader = BufReader::new(File::open(path)?);

    let origin = swap16(reader.read_u16::<NativeEndian>()?);

    let mut words = Vec::new();
    let capacity = (1usize << 16) - origin as usize;
    for _ in 0..capacity {
        match reader.read_u16::<NativeEndian>() {
            Ok(word) => words.push(swap16(word)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
    }

    memory.load(origin, &words);
    Ok(origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::FakeKeyboard;
    use std::fs;
    use std::path::PathBuf;

    struct TempImage {
        path: PathBuf,
    }

    impl TempImage {
        fn new(words: &[u16]) -> Self {
            use byteorder::{BigEndian, WriteBytesExt};

            let path = std::env::temp_dir().join(format!(
                "lc3_loader_test_{}_{}.obj",
                std::process::id(),
                words.len()
            ));
            let mut file = fs::File::create(&path).unwrap();
            for word in words {
                file.write_u16::<BigEndian>(*word).unwrap();
            }
            Self { path }
        }

        fn path_str(&self) -> &str {
            self.path.to_str().unwrap()
        }
    }

    impl Drop for TempImage {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.path);
        }
    }

    #[test]
    fn loads_words_at_embedded_origin() {
        let image = TempImage::new(&[0x3000, 0x1025, 0xF025]);
        let mut memory = Memory::new(Box::new(FakeKeyboard::empty()));

        let origin = load_image(image.path_str(), &mut memory).unwrap();

        assert_eq!(origin, 0x3000);
        assert_eq!(memory.read(0x3000), 0x1025);
        assert_eq!(memory.read(0x3001), 0xF025);
    }

    #[test]
    fn short_image_leaves_upper_memory_zeroed() {
        let image = TempImage::new(&[0x3000, 0x1025]);
        let mut memory = Memory::new(Box::new(FakeKeyboard::empty()));

        load_image(image.path_str(), &mut memory).unwrap();

        assert_eq!(memory.read(0x3000), 0x1025);
        assert_eq!(memory.read(0x3001), 0);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut memory = Memory::new(Box::new(FakeKeyboard::empty()));
        assert!(load_image("/nonexistent/path/does-not-exist.obj", &mut memory).is_err());
    }
}
