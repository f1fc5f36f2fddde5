use std::{io::ErrorKind, path::Path};

use tokio::{
    fs::{self, File},
    io::{self, AsyncWriteExt},
};

/// Reads a whole file. A file that doesn't exist yet is not an error.
pub async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, io::Error> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replaces the contents of `path` with `bytes`. Data is written into a sibling temporary file
/// first and then renamed over the target, so an interrupted write leaves the previous version
/// in place.
pub async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), io::Error> {
    let mut temporary = path.as_os_str().to_owned();
    temporary.push(".tmp");
    let temporary = Path::new(&temporary);

    let mut file = File::create(temporary).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    match fs::rename(temporary, path).await {
        Ok(()) => Ok(()),
        Err(e) => {
            // Nothing useful can be done if the cleanup fails as well.
            let _ = fs::remove_file(temporary).await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use crate::fs::operations::{read_optional, write_atomically};

    #[tokio::test]
    async fn test_read_optional_missing() -> Result<()> {
        let dir = tempdir()?;
        assert_eq!(read_optional(&dir.path().join("missing")).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_atomically_replaces_content() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("state.json");

        write_atomically(&path, b"first version, longer").await?;
        write_atomically(&path, b"second").await?;

        assert_eq!(read_optional(&path).await?, Some(b"second".to_vec()));
        assert!(!dir.path().join("state.json.tmp").exists());
        Ok(())
    }
}
