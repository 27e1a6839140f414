use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{Result, TrainError};

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Make the corpus available at `dest` and return its path.
///
/// An existing non-empty `dest` is reused. `source` is either an
/// `http(s)://` URL, fetched with a blocking client, or a local file that
/// is copied into place.
pub fn fetch_corpus(source: &str, dest: &Path) -> Result<PathBuf> {
    if fs::metadata(dest).map(|m| m.len() > 0).unwrap_or(false) {
        tracing::debug!(path = %dest.display(), "corpus already cached");
        return Ok(dest.to_path_buf());
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    // Write beside the destination and rename, so an interrupted fetch
    // never leaves a truncated corpus that looks cached.
    let partial = dest.with_extension("part");
    if is_remote(source) {
        download_to_path(source, &partial)?;
    } else {
        fs::copy(source, &partial)?;
    }
    fs::rename(&partial, dest)?;
    tracing::info!(source, path = %dest.display(), "corpus fetched");
    Ok(dest.to_path_buf())
}

fn download_to_path(url: &str, dest: &Path) -> Result<()> {
    let client = Client::builder().timeout(Duration::from_secs(600)).build()?;

    let mut resp = client.get(url).send()?;
    if !resp.status().is_success() {
        return Err(TrainError::Download(format!("GET {url}: {}", resp.status())));
    }

    let mut out = fs::File::create(dest)?;
    let mut buf = [0u8; 128 * 1024];
    loop {
        let n = resp.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
    }
    out.flush()?;
    Ok(())
}

/// Read the corpus as UTF-8, replacing invalid sequences.
pub fn read_corpus(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copies_local_source_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.txt");
        fs::write(&source, "to be or not to be").unwrap();
        let dest = dir.path().join("data").join("corpus.txt");

        let path = fetch_corpus(source.to_str().unwrap(), &dest).unwrap();
        assert_eq!(read_corpus(&path).unwrap(), "to be or not to be");
        assert!(!dest.with_extension("part").exists());

        // Cached copy wins over a changed source.
        fs::write(&source, "something else").unwrap();
        let again = fetch_corpus(source.to_str().unwrap(), &dest).unwrap();
        assert_eq!(read_corpus(&again).unwrap(), "to be or not to be");
    }

    #[test]
    fn test_missing_local_source_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetch_corpus(
            dir.path().join("nope.txt").to_str().unwrap(),
            &dir.path().join("corpus.txt"),
        )
        .unwrap_err();
        assert!(matches!(err, TrainError::Io(_)));
    }

    #[test]
    fn test_read_is_lossy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(&path, [b'o', b'k', 0xff]).unwrap();
        assert_eq!(read_corpus(&path).unwrap(), "ok\u{fffd}");
    }
}
