/// Anki-importable TSV export of the learning set.
///
/// One row per word still being learned: excluded words and words already
/// at the top mastery level are left out. The header lines use Anki's
/// `#key:value` import directives so the file can be dragged straight into
/// the importer.
use super::{mastery_label, LedgerStore, WordFilter, WordQuery, WordSort, MASTERY_MAX};
use crate::error::LedgerError;
use std::fmt::Write as _;

/// A rendered export plus how many rows it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    pub tsv: String,
    pub word_count: usize,
}

/// Render a video-relative millisecond offset as `m:ss`.
pub fn format_timestamp_ms(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

impl LedgerStore {
    /// Build the Anki TSV for every word below the top mastery level that
    /// is not excluded. Columns: word, best context sentence, tags.
    pub async fn export_learning_set(&self) -> Result<ExportResult, LedgerError> {
        let words = self
            .query_words(&WordQuery {
                filter: WordFilter::All,
                search: None,
                sort: WordSort::Frequency,
            })
            .await;

        let mut tsv = String::new();
        tsv.push_str("#separator:tab\n");
        tsv.push_str("#html:false\n");
        tsv.push_str("#deck:Replay Vocab\n");
        tsv.push_str("#tags column:3\n");

        let mut word_count = 0;
        for word in words {
            if word.excluded || word.mastery_level >= MASTERY_MAX {
                continue;
            }

            let contexts = self.contexts_for(&word.id).await;
            let context_cell = match contexts.first() {
                Some(ctx) => format!(
                    "\"{}\" ({}, {})",
                    ctx.sentence,
                    ctx.video_title,
                    format_timestamp_ms(ctx.timestamp_ms)
                ),
                None => "(no context)".to_string(),
            };

            let _ = writeln!(
                tsv,
                "{}\t{}\tmastery::{} encounters::{}",
                word.word,
                context_cell,
                mastery_label(word.mastery_level),
                word.encounters
            );
            word_count += 1;
        }

        Ok(ExportResult { tsv, word_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LogEntry, WordUpdate};
    use tempfile::TempDir;

    async fn store_in(dir: &TempDir) -> LedgerStore {
        LedgerStore::open(dir.path().join("ledger.json"))
            .await
            .unwrap()
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp_ms(0), "0:00");
        assert_eq!(format_timestamp_ms(61_000), "1:01");
        assert_eq!(format_timestamp_ms(600_500), "10:00");
    }

    #[tokio::test]
    async fn test_export_skips_known_and_excluded() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;
        store
            .log_occurrences(
                &[
                    LogEntry::new("perro"),
                    LogEntry::new("gato"),
                    LogEntry::new("casa"),
                ],
                "",
                "",
                "es",
            )
            .await
            .unwrap();
        store
            .update_word(
                "es:gato",
                WordUpdate {
                    mastery_level: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .update_word(
                "es:casa",
                WordUpdate {
                    excluded: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let export = store.export_learning_set().await.unwrap();
        assert_eq!(export.word_count, 1);
        assert!(export.tsv.contains("perro\t(no context)"));
        assert!(!export.tsv.contains("gato"));
        assert!(!export.tsv.contains("casa"));
    }

    #[tokio::test]
    async fn test_export_header_and_context_row() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;
        store
            .log_occurrences(
                &[LogEntry {
                    word: "perro".to_string(),
                    sentence: Some("el perro ladra".to_string()),
                    timestamp_ms: 75_000,
                }],
                "vid123",
                "Lección uno",
                "es",
            )
            .await
            .unwrap();

        let export = store.export_learning_set().await.unwrap();
        assert!(export.tsv.starts_with(
            "#separator:tab\n#html:false\n#deck:Replay Vocab\n#tags column:3\n"
        ));
        assert!(export
            .tsv
            .contains("perro\t\"el perro ladra\" (Lección uno, 1:15)\tmastery::new encounters::1"));
    }

    #[tokio::test]
    async fn test_export_empty_ledger() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;
        let export = store.export_learning_set().await.unwrap();
        assert_eq!(export.word_count, 0);
        assert!(export.tsv.ends_with("#tags column:3\n"));
    }
}
