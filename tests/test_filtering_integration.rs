// Integration test for the cleaning passes with exporter-shaped data
use tempfile::TempDir;
use whosaid::config::Config;
use whosaid::filtering::Cleaner;
use whosaid::messages::load_exports;

const EXPORT: &str = "\
AuthorID,Author,Date,Content,Attachments,Reactions
111,ana,2022-11-02T21:14:03.512+01:00,\"anyone up for pizza, tonight maybe?\",,🍕 (3)
222,bo,2022-11-02 20:10:00,\"who keeps renaming the channel\",,
333,cy,02-Nov-22 08:05 PM,\"  spacing   is   preserved here  \",,
222,bo,2022-11-02 20:11:00,\"check www.example.org for the details\",,
111,ana,2022-11-02 20:12:00,\"@everyone meeting moved to friday\",,
333,cy,2022-11-02 20:13:00,\"Pinned a message.\",,
444,eve,2022-11-02 20:14:00,\"eve is not in the group at all\",,
111,ana,not a date,\"this date cannot be read\",,
222,bo,2022-11-02 20:15:00,,,
222,bo,2022-11-02 20:16:00,\"one two three four five six seven eight nine ten eleven\",,
";

fn cleaner() -> Cleaner {
    let mut config = Config::default();
    config.game.users_to_include = vec!["ana".to_string(), "bo".to_string(), "cy".to_string()];
    Cleaner::from_config(&config).unwrap()
}

#[test]
fn test_clean_exporter_file() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("general.csv"), EXPORT).unwrap();

    let rows = load_exports(temp.path()).unwrap();
    assert_eq!(rows.len(), 10);

    let (history, pool, stats) = cleaner().clean(rows);

    assert_eq!(stats.raw_rows, 10);
    assert_eq!(stats.dropped_incomplete, 1);
    assert_eq!(stats.dropped_excluded_author, 1);
    assert_eq!(stats.dropped_bad_date, 1);
    assert_eq!(stats.history_rows, 7);

    // Sorted by UTC instant: 20:05 (cy), 20:10 (bo), 20:11, 20:12, 20:13, 20:14 UTC (ana), 20:16
    let authors: Vec<_> = history.iter().map(|m| m.author.as_str()).collect();
    assert_eq!(authors, vec!["cy", "bo", "bo", "ana", "cy", "ana", "bo"]);
    assert_eq!(history[5].reactions, "🍕 (3)");
    assert_eq!(history[5].formatted_date(), "2022-11-02T20:14:03.512+00:00");

    assert_eq!(stats.dropped_link, 1);
    assert_eq!(stats.dropped_mention, 1);
    assert_eq!(stats.dropped_system, 1);
    assert_eq!(stats.dropped_length, 1);

    let contents: Vec<_> = pool.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "  spacing   is   preserved here  ",
            "who keeps renaming the channel",
            "anyone up for pizza, tonight maybe?",
        ]
    );
    assert_eq!(stats.pool_rows, 3);
}

#[test]
fn test_clean_is_deterministic() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("general.csv"), EXPORT).unwrap();

    let first = cleaner().clean(load_exports(temp.path()).unwrap());
    let second = cleaner().clean(load_exports(temp.path()).unwrap());

    assert_eq!(first.0, second.0);
    assert_eq!(first.1, second.1);
    assert_eq!(first.2, second.2);
}
