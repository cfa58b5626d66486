// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

#[cfg(test)]
mod tests {
    use ddcrawl::domain::models::job::Hint;
    use ddcrawl::infrastructure::workspace::{JobWorkspace, ID_FILE, SEEDS_FILE};

    #[test]
    fn test_directory_name_is_stable() {
        let first = JobWorkspace::directory_name("job-42", 1_700_000_000);
        let second = JobWorkspace::directory_name("job-42", 1_700_000_000);
        let other = JobWorkspace::directory_name("job-43", 1_700_000_000);

        assert_eq!(first, second);
        assert_ne!(first, other);
        let (timestamp, hash) = first.split_once('_').unwrap();
        assert_eq!(timestamp, "1700000000");
        assert_eq!(hash.len(), 12);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_same_job_gets_distinct_directories() {
        let root = tempfile::tempdir().unwrap();

        let first = JobWorkspace::create(root.path(), "job").await.unwrap();
        let second = JobWorkspace::create(root.path(), "job").await.unwrap();

        assert_ne!(first.root(), second.root());
        assert_eq!(first.read_file(ID_FILE).await.unwrap(), b"job");
        assert_eq!(second.read_file(ID_FILE).await.unwrap(), b"job");
    }

    #[tokio::test]
    async fn test_inputs_and_hints_round_trip_through_files() {
        let root = tempfile::tempdir().unwrap();
        let workspace = JobWorkspace::create(root.path(), "job").await.unwrap();

        workspace
            .write_inputs(
                &["http://a.com".to_string(), "http://b.com/?q=1,2".to_string()],
                b"page",
                None,
            )
            .await
            .unwrap();
        let seeds = String::from_utf8(workspace.read_file(SEEDS_FILE).await.unwrap()).unwrap();
        assert_eq!(seeds.lines().collect::<Vec<_>>(), vec!["http://a.com", "\"http://b.com/?q=1,2\""]);

        workspace
            .init_hints(&[Hint {
                url: "http://seed-hint.com".to_string(),
                pinned: true,
            }])
            .await
            .unwrap();
        workspace
            .append_hint(&Hint {
                url: "http://late-hint.com".to_string(),
                pinned: false,
            })
            .await
            .unwrap();

        // Items have not been written yet.
        assert!(!workspace.items_started().await);
        assert!(workspace.read_items().await.unwrap().is_empty());
        assert_eq!(workspace.latest_checkpoint().await.unwrap(), None);
    }
}
