use rand::rngs::ThreadRng;
use rand::{Rng, RngCore};

use crate::store::StoreError;

pub const LETTERS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DIGITS: &str = "0123456789";
pub const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

const NONCE_LENGTH: usize = 8;
const HANDLE_LENGTH: usize = 128;

/// Draws fixed-length strings uniformly from an explicit alphabet.
pub struct RandomStringGenerator {
    alphabet: Vec<char>,
    length: usize,
    rng: ThreadRng,
}

impl RandomStringGenerator {
    pub fn new(alphabet: &str, length: usize) -> Result<Self, StoreError> {
        let alphabet: Vec<char> = alphabet.chars().collect();
        if alphabet.is_empty() {
            return Err(StoreError::Config("random string alphabet is empty".to_string()));
        }

        Ok(Self {
            alphabet,
            length,
            rng: rand::thread_rng(),
        })
    }

    /// Eight alphanumeric characters, the shape of a consumer nonce.
    pub fn nonce() -> Result<Self, StoreError> {
        Self::new(&[LETTERS, DIGITS].concat(), NONCE_LENGTH)
    }

    /// 128 printable characters, the shape of a server issued handle.
    pub fn handle() -> Result<Self, StoreError> {
        Self::new(&[LETTERS, DIGITS, PUNCTUATION].concat(), HANDLE_LENGTH)
    }

    pub fn generate(&mut self) -> String {
        (0..self.length)
            .map(|_| self.alphabet[self.rng.gen_range(0..self.alphabet.len())])
            .collect()
    }

    /// Random raw bytes from the same generator, e.g. an association secret.
    pub fn bytes(&mut self, len: usize) -> Vec<u8> {
        let mut buffer = vec![0u8; len];
        self.rng.fill_bytes(&mut buffer);
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uses_alphabet() {
        let mut generator = RandomStringGenerator::new("ab", 64).unwrap();
        let value = generator.generate();
        assert_eq!(value.chars().count(), 64);
        assert!(value.chars().all(|c| c == 'a' || c == 'b'));
    }

    #[test]
    fn test_generate_unique() {
        let mut generator = RandomStringGenerator::nonce().unwrap();
        let values = (0..100).map(|_| generator.generate()).collect::<Vec<_>>();
        assert_eq!(values.len(), values.iter().collect::<std::collections::HashSet<_>>().len());
    }

    #[test]
    fn test_handle_shape() {
        let mut generator = RandomStringGenerator::handle().unwrap();
        let handle = generator.generate();
        assert_eq!(handle.len(), HANDLE_LENGTH);
        assert!(handle.chars().all(|c| c.is_ascii_graphic()));
    }

    #[test]
    fn test_bytes() {
        let mut generator = RandomStringGenerator::nonce().unwrap();
        let secret = generator.bytes(20);
        assert_eq!(secret.len(), 20);
        assert_ne!(secret, generator.bytes(20));
    }

    #[test]
    fn test_empty_alphabet() {
        assert!(matches!(RandomStringGenerator::new("", 4), Err(StoreError::Config(_))));
    }
}
