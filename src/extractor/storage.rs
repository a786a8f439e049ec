// Result persistence: one markdown file per job under the storage path

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Filesystem-hostile characters stripped from titles
const INVALID_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

const MAX_FILENAME_CHARS: usize = 100;

/// Turn a title into a safe filename: drop invalid characters, replace
/// spaces with underscores, cap the length.
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .filter(|c| !INVALID_CHARS.contains(c))
        .map(|c| if c == ' ' { '_' } else { c })
        .take(MAX_FILENAME_CHARS)
        .collect()
}

/// Write the markdown to `{storage_path}/{sanitized_title or job_id}.md`,
/// creating the directory if needed. Returns the file path.
pub async fn save_markdown(
    storage_path: &str,
    job_id: Uuid,
    title: &str,
    markdown: &str,
) -> std::io::Result<String> {
    tokio::fs::create_dir_all(storage_path).await?;

    let mut filename = sanitize_filename(title);
    if filename.is_empty() {
        filename = job_id.to_string();
    }

    let path: PathBuf = Path::new(storage_path).join(format!("{}.md", filename));
    tokio::fs::write(&path, markdown).await?;

    Ok(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_invalid_chars_and_replaces_spaces() {
        assert_eq!(
            sanitize_filename("What is SaaS? A/B Testing \"Guide\""),
            "What_is_SaaS_AB_Testing_Guide"
        );
    }

    #[test]
    fn truncates_long_titles() {
        let long = "a".repeat(300);
        assert_eq!(sanitize_filename(&long).len(), 100);
    }

    #[test]
    fn empty_title_yields_empty_name() {
        assert_eq!(sanitize_filename("?*|"), "");
    }

    #[tokio::test]
    async fn writes_file_under_storage_path() {
        let dir = std::env::temp_dir().join(format!("artex-test-{}", Uuid::new_v4()));
        let storage = dir.to_string_lossy().into_owned();
        let job_id = Uuid::new_v4();

        let path = save_markdown(&storage, job_id, "A Title", "# A Title\n")
            .await
            .unwrap();

        assert!(path.ends_with("A_Title.md"));
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, "# A Title\n");

        let path = save_markdown(&storage, job_id, "", "content").await.unwrap();
        assert!(path.ends_with(&format!("{}.md", job_id)));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
