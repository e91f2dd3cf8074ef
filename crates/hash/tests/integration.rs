//! Integration tests for hash crate

#[cfg(test)]
mod tests {
    use e14z_hash::*;
    use tempfile::tempdir;
    use tokio::fs;

    #[tokio::test]
    async fn test_verify_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.txt");

        let data = b"verify this content";
        fs::write(&file_path, data).await.unwrap();

        let hash = Hash::from_data(data);
        assert!(verify_file(&file_path, &hash).await.unwrap());

        let wrong_hash = Hash::from_data(b"different content");
        assert!(!verify_file(&file_path, &wrong_hash).await.unwrap());
    }

    #[test]
    fn test_hash_from_hex_errors() {
        // Too short
        assert!(Hash::from_hex("1234").is_err());

        // Too long
        assert!(Hash::from_hex(&"a".repeat(66)).is_err());

        // Invalid hex
        assert!(Hash::from_hex("xyz123").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_hashed_by_target() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("real.txt"), b"payload").await.unwrap();
        std::os::unix::fs::symlink("real.txt", dir.path().join("link.txt")).unwrap();

        let digest = hash_tree(dir.path(), &[]).await.unwrap();
        // only the regular file counts toward size
        assert_eq!(digest.files, 1);
        assert_eq!(digest.size, 7);
    }
}
