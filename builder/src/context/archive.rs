//! Archive-backed build contexts.
//!
//! The tar stream (optionally gzip, bzip2 or xz compressed) is unpacked into a
//! private temporary directory which then serves as the context root. The
//! directory is removed when the context is dropped.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use stevedore_core::config::DEFAULT_MAX_SYMLINKS;
use stevedore_core::error::{BuildError, Result};
use tar::Archive;
use tempfile::TempDir;

use super::{BuildContext, DirContext};

/// Compression detected from the first bytes of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Uncompressed,
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    fn detect(header: &[u8]) -> Self {
        const GZIP: &[u8] = &[0x1f, 0x8b, 0x08];
        const BZIP2: &[u8] = b"BZh";
        const XZ: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];

        if header.starts_with(GZIP) {
            Self::Gzip
        } else if header.starts_with(BZIP2) {
            Self::Bzip2
        } else if header.starts_with(XZ) {
            Self::Xz
        } else {
            Self::Uncompressed
        }
    }
}

/// A build context unpacked from a tar stream.
#[derive(Debug)]
pub struct ArchiveContext {
    inner: DirContext,
    // Held for its Drop: removes the unpacked tree.
    _dir: TempDir,
}

impl ArchiveContext {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_reader_with_max_symlinks(reader, DEFAULT_MAX_SYMLINKS)
    }

    pub fn from_reader_with_max_symlinks<R: Read>(reader: R, max_symlinks: usize) -> Result<Self> {
        let dir = TempDir::new().map_err(|e| {
            BuildError::ContextError(format!("Failed to create context directory: {}", e))
        })?;

        let mut reader = BufReader::new(reader);
        let compression = Compression::detect(reader.fill_buf()?);
        match compression {
            Compression::Uncompressed => unpack(reader, dir.path())?,
            Compression::Gzip => unpack(GzDecoder::new(reader), dir.path())?,
            Compression::Bzip2 => unpack(bzip2::read::BzDecoder::new(reader), dir.path())?,
            Compression::Xz => unpack(xz2::read::XzDecoder::new(reader), dir.path())?,
        }

        tracing::debug!(
            root = %dir.path().display(),
            compression = ?compression,
            "Unpacked build context archive"
        );

        let inner = DirContext::with_max_symlinks(dir.path(), max_symlinks)?;
        Ok(Self { inner, _dir: dir })
    }
}

impl BuildContext for ArchiveContext {
    fn root(&self) -> &Path {
        self.inner.root()
    }

    fn max_symlinks(&self) -> usize {
        self.inner.max_symlinks()
    }
}

fn unpack<R: Read>(reader: R, target_dir: &Path) -> Result<()> {
    let mut archive = Archive::new(reader);
    archive.unpack(target_dir).map_err(|e| {
        BuildError::ContextError(format!(
            "Failed to unpack build context to {}: {}",
            target_dir.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::locate_dockerfile;
    use std::io::Write;

    fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *content).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_detect_compression() {
        assert_eq!(Compression::detect(&[0x1f, 0x8b, 0x08, 0x00]), Compression::Gzip);
        assert_eq!(Compression::detect(b"BZh91AY"), Compression::Bzip2);
        assert_eq!(
            Compression::detect(&[0xfd, b'7', b'z', b'X', b'Z', 0x00, 0x00]),
            Compression::Xz
        );
        assert_eq!(Compression::detect(b"Dockerfile"), Compression::Uncompressed);
        assert_eq!(Compression::detect(&[]), Compression::Uncompressed);
    }

    #[test]
    fn test_uncompressed_archive() {
        let data = tar_bytes(&[("Dockerfile", b"FROM scratch\n"), ("app/main.py", b"print(1)\n")]);
        let context = ArchiveContext::from_reader(&data[..]).unwrap();

        let location = locate_dockerfile(&context, "").unwrap();
        assert_eq!(location.read(&context).unwrap(), "FROM scratch\n");
        assert_eq!(context.open("app/main.py").unwrap(), b"print(1)\n");
    }

    #[test]
    fn test_gzip_archive() {
        use flate2::write::GzEncoder;

        let data = tar_bytes(&[("Dockerfile", b"FROM alpine\n")]);
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&data).unwrap();
        let compressed = encoder.finish().unwrap();

        let context = ArchiveContext::from_reader(&compressed[..]).unwrap();
        assert_eq!(locate_dockerfile(&context, "Dockerfile").unwrap().size(), 12);
    }

    #[test]
    fn test_bzip2_archive() {
        let data = tar_bytes(&[("Dockerfile", b"FROM alpine\n")]);
        let mut encoder =
            bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(&data).unwrap();
        let compressed = encoder.finish().unwrap();

        let context = ArchiveContext::from_reader(&compressed[..]).unwrap();
        assert!(context.stat("Dockerfile").unwrap().is_some());
    }

    #[test]
    fn test_xz_archive() {
        let data = tar_bytes(&[("Dockerfile", b"FROM alpine\n")]);
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(&data).unwrap();
        let compressed = encoder.finish().unwrap();

        let context = ArchiveContext::from_reader(&compressed[..]).unwrap();
        assert!(context.stat("Dockerfile").unwrap().is_some());
    }

    #[test]
    fn test_unpacked_tree_removed_on_drop() {
        let data = tar_bytes(&[("Dockerfile", b"FROM alpine\n")]);
        let context = ArchiveContext::from_reader(&data[..]).unwrap();
        let root = context.root().to_path_buf();
        assert!(root.exists());
        drop(context);
        assert!(!root.exists());
    }

    #[test]
    fn test_corrupt_gzip_is_context_error() {
        let data = [0x1f, 0x8b, 0x08, 0x00, 0x01, 0x02, 0x03];
        let err = ArchiveContext::from_reader(&data[..]).unwrap_err();
        assert!(matches!(err, BuildError::ContextError(_)));
    }
}
