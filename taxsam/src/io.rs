use std::{fs::File, io::{BufWriter, Read, Write}, path::{Path, PathBuf}, str::FromStr};
use anyhow::{Context, Result, anyhow};

/// Open a file, possibly compressed. Supports gzip, zstd and bzip2.
pub fn open_file_for_read<P: AsRef<Path>>(file: P) -> Result<Box<dyn Read + Send>> {
    let path = file.as_ref();
    let open = || File::open(path).with_context(|| format!("cannot open file: {}", path.display()));
    let reader: Box<dyn Read + Send> = match detect_compression(path)? {
        Some(Compression::Gzip) => Box::new(flate2::read::MultiGzDecoder::new(open()?)),
        Some(Compression::Zstd) => Box::new(zstd::stream::read::Decoder::new(open()?)?),
        Some(Compression::Bzip2) => Box::new(bzip2::read::MultiBzDecoder::new(open()?)),
        None => Box::new(open()?),
    };
    Ok(reader)
}

/// Determine the file compression type. Gzip is recognised by its header,
/// zstd and bzip2 by extension.
fn detect_compression<P: AsRef<Path>>(file: P) -> Result<Option<Compression>> {
    let path = file.as_ref();
    let handle = File::open(path).with_context(|| format!("cannot open file: {}", path.display()))?;
    if flate2::read::MultiGzDecoder::new(handle).header().is_some() {
        return Ok(Some(Compression::Gzip));
    }
    let by_extension: Option<Compression> = path.to_path_buf().try_into().ok();
    Ok(by_extension.filter(|c| *c != Compression::Gzip))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Zstd,
    Bzip2,
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gzip" | "gz" => Ok(Compression::Gzip),
            "zstd" | "zstandard" | "zst" => Ok(Compression::Zstd),
            "bzip2" | "bz2" => Ok(Compression::Bzip2),
            _ => Err(format!("unsupported compression: {}", s)),
        }
    }
}

impl TryFrom<PathBuf> for Compression {
    type Error = anyhow::Error;

    fn try_from(path: PathBuf) -> Result<Self> {
        (&path).try_into()
    }
}

impl TryFrom<&PathBuf> for Compression {
    type Error = anyhow::Error;

    fn try_from(path: &PathBuf) -> Result<Self> {
        let ext = path.extension().unwrap_or(std::ffi::OsStr::new(""));
        if ext == "gz" {
            Ok(Compression::Gzip)
        } else if ext == "zst" {
            Ok(Compression::Zstd)
        } else if ext == "bz2" {
            Ok(Compression::Bzip2)
        } else {
            Err(anyhow!("unsupported compression: {:?}", path))
        }
    }
}

impl Compression {
    /// Level used when none is requested.
    pub fn default_level(self) -> u32 {
        match self {
            Compression::Gzip | Compression::Bzip2 => 6,
            Compression::Zstd => 9,
        }
    }

    /// Wrap `inner` in an encoder. Only zstd makes use of `num_threads`.
    pub fn encoder<W: Write + Send + 'static>(
        self,
        inner: W,
        level: Option<u32>,
        num_threads: u32,
    ) -> Result<Box<dyn Write + Send>> {
        let level = level.unwrap_or(self.default_level());
        let encoder: Box<dyn Write + Send> = match self {
            Compression::Gzip => Box::new(flate2::write::GzEncoder::new(inner, flate2::Compression::new(level))),
            Compression::Bzip2 => Box::new(bzip2::write::BzEncoder::new(inner, bzip2::Compression::new(level))),
            Compression::Zstd => {
                let level = i32::try_from(level).with_context(|| format!("invalid zstd level: {}", level))?;
                let mut zstd = zstd::stream::Encoder::new(inner, level)?;
                zstd.multithread(num_threads)?;
                Box::new(zstd.auto_finish())
            }
        };
        Ok(encoder)
    }
}

/// Create a buffered output file, compressed if `compression` is given.
pub fn open_file_for_write<P: AsRef<Path>>(
    filename: P,
    compression: Option<Compression>,
    compression_level: Option<u32>,
    num_threads: u32,
) -> Result<Box<dyn Write + Send>> {
    let path = filename.as_ref();
    let file = File::create(path).with_context(|| format!("cannot create file: {}", path.display()))?;
    let buffer = BufWriter::new(file);
    match compression {
        Some(compression) => compression.encoder(buffer, compression_level, num_threads),
        None => Ok(Box::new(buffer)),
    }
}
