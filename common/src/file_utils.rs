use std::io;
use std::path::{Path, PathBuf};

/// Ensure the output directory exists
pub async fn ensure_output_dir<P: AsRef<Path>>(output_dir: P) -> io::Result<()> {
    let path = output_dir.as_ref();
    if !path.exists() {
        tokio::fs::create_dir_all(path).await?;
    }
    Ok(())
}

/// Write an artifact into the output directory, replacing any previous copy
pub async fn save_artifact<P: AsRef<Path>>(
    output_dir: P,
    file_name: &str,
    contents: &[u8],
) -> io::Result<PathBuf> {
    let output_dir = output_dir.as_ref();
    ensure_output_dir(output_dir).await?;

    let file_path = output_dir.join(file_name);
    tokio::fs::write(&file_path, contents).await?;

    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_artifact_creates_missing_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested").join("exports");

        let path = save_artifact(&out, "story.txt", b"Once.").await.unwrap();
        assert_eq!(path, out.join("story.txt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"Once.");

        // Overwrites on a second export
        save_artifact(&out, "story.txt", b"Twice.").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"Twice.");
    }
}
