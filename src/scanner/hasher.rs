//! Streaming multi-algorithm file hasher.
//!
//! Every requested digest is updated from the same sequential read, so a
//! file is read exactly once no matter how many algorithms are asked for.
//! The RustCrypto [`DynDigest`] trait provides the common update/finalize
//! surface over MD5 and SHA-512.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use digest::{Digest, DynDigest};
use md5::Md5;
use sha2::Sha512;
use thiserror::Error;

/// Fixed read-buffer size: 1 MiB chunks.
pub const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Errors raised while hashing a file.
#[derive(Debug, Error)]
pub enum HashError {
    /// The file could not be opened or a read failed mid-stream.
    #[error("I/O error hashing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An algorithm identifier from the configuration is not supported.
    #[error("unknown hash algorithm '{0}'")]
    UnknownAlgorithm(String),
}

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// 128-bit legacy digest; fast, used as the collision cross-check.
    Md5,
    /// 512-bit strong digest; keys the content-addressed store.
    Sha512,
}

impl HashAlgorithm {
    /// Canonical lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha512 => "sha512",
        }
    }

    fn new_digest(self) -> Box<dyn DynDigest> {
        match self {
            Self::Md5 => Box::new(Md5::new()),
            Self::Sha512 => Box::new(Sha512::new()),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha512" | "sha-512" => Ok(Self::Sha512),
            other => Err(HashError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Hash a file with every requested algorithm in a single pass.
///
/// Returns lowercase hexadecimal digest strings keyed by algorithm.
///
/// # Errors
///
/// Returns [`HashError::Io`] if the file cannot be opened or a read fails.
/// There is no retry here - the caller decides whether to skip the file
/// and continue the batch.
pub fn hash_file(
    path: &Path,
    algorithms: &[HashAlgorithm],
) -> Result<HashMap<HashAlgorithm, String>, HashError> {
    let mut digests: Vec<(HashAlgorithm, Box<dyn DynDigest>)> = algorithms
        .iter()
        .map(|&algorithm| (algorithm, algorithm.new_digest()))
        .collect();

    let mut file = File::open(path).map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer).map_err(|source| HashError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if read == 0 {
            break;
        }
        for (_, digest) in &mut digests {
            digest.update(&buffer[..read]);
        }
    }

    Ok(digests
        .into_iter()
        .map(|(algorithm, digest)| (algorithm, hex::encode(digest.finalize())))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";
    const EMPTY_SHA512: &str = "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce\
                                47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e";

    #[test]
    fn test_known_digests_of_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::File::create(&path).unwrap();

        let hashes = hash_file(&path, &[HashAlgorithm::Md5, HashAlgorithm::Sha512]).unwrap();
        assert_eq!(hashes[&HashAlgorithm::Md5], EMPTY_MD5);
        assert_eq!(hashes[&HashAlgorithm::Sha512], EMPTY_SHA512);
    }

    #[test]
    fn test_known_md5_of_abc() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc");
        std::fs::write(&path, b"abc").unwrap();

        let hashes = hash_file(&path, &[HashAlgorithm::Md5]).unwrap();
        assert_eq!(hashes[&HashAlgorithm::Md5], "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_file_larger_than_one_chunk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big");
        let mut file = std::fs::File::create(&path).unwrap();
        // Three full chunks plus a partial one.
        let chunk = vec![0xABu8; READ_BUFFER_SIZE];
        for _ in 0..3 {
            file.write_all(&chunk).unwrap();
        }
        file.write_all(&[0xAB; 17]).unwrap();
        drop(file);

        let streamed = hash_file(&path, &[HashAlgorithm::Sha512]).unwrap();

        // Must agree with a one-shot digest over the same bytes.
        let bytes = std::fs::read(&path).unwrap();
        let expected = hex::encode(Sha512::digest(&bytes));
        assert_eq!(streamed[&HashAlgorithm::Sha512], expected);
    }

    #[test]
    fn test_identical_content_identical_digests() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let algorithms = [HashAlgorithm::Md5, HashAlgorithm::Sha512];
        assert_eq!(
            hash_file(&a, &algorithms).unwrap(),
            hash_file(&b, &algorithms).unwrap()
        );
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = hash_file(Path::new("/no/such/file"), &[HashAlgorithm::Md5]).unwrap_err();
        assert!(matches!(err, HashError::Io { .. }));
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("md5".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert_eq!(
            "SHA-512".parse::<HashAlgorithm>().unwrap(),
            HashAlgorithm::Sha512
        );
        assert!(matches!(
            "crc32".parse::<HashAlgorithm>(),
            Err(HashError::UnknownAlgorithm(_))
        ));
    }
}
