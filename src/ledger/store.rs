/// JSON-file-backed ledger store with an in-memory cache behind one
/// `RwLock`.
///
/// Every mutating operation takes the write guard for its whole
/// read-modify-write and persists before releasing it, so a batch touching
/// words, contexts, and the active session is one transactional unit and
/// concurrent batches cannot lose encounter increments.
use super::{
    mastery_label, word_key, ContextRecord, LedgerStats, LogEntry, LogOutcome, SessionRecord,
    SessionState, WordFilter, WordQuery, WordRecord, WordSort, WordUpdate, MASTERY_MAX,
    MAX_CONTEXTS_RETURNED,
};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerData {
    #[serde(default)]
    words: HashMap<String, WordRecord>,
    #[serde(default)]
    contexts: Vec<ContextRecord>,
    #[serde(default)]
    sessions: HashMap<u64, SessionRecord>,
    #[serde(default)]
    next_context_id: u64,
    #[serde(default)]
    next_session_id: u64,
    /// Pointer to the active session; persisted so "active" survives a
    /// process restart.
    #[serde(default)]
    active_session_id: Option<u64>,
}

/// Persistent vocabulary ledger: words, example contexts, and study
/// sessions.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
    data: Arc<RwLock<LedgerData>>,
}

impl LedgerStore {
    /// Open a ledger file, creating parent directories as needed. A missing
    /// file starts an empty ledger; a corrupt one is a typed error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let data = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LedgerData::default(),
            Err(e) => return Err(e.into()),
        };

        debug!(
            "ledger opened: {} words, {} contexts, {} sessions",
            data.words.len(),
            data.contexts.len(),
            data.sessions.len()
        );

        Ok(Self {
            path,
            data: Arc::new(RwLock::new(data)),
        })
    }

    async fn persist(&self, data: &LedgerData) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, json).await?;
        Ok(())
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Upsert a batch of word occurrences and their context sentences.
    ///
    /// Entries with an empty word are skipped, and the batch continues past
    /// them. Session bookkeeping is best-effort: its failure is logged and
    /// never rolls back the word and context writes.
    pub async fn log_occurrences(
        &self,
        entries: &[LogEntry],
        video_id: &str,
        video_title: &str,
        language: &str,
    ) -> Result<LogOutcome, LedgerError> {
        let mut data = self.data.write().await;
        let now = Self::now_ms();
        let mut outcome = LogOutcome::default();

        for entry in entries {
            if entry.word.is_empty() {
                debug!("skipping empty word entry");
                continue;
            }

            let id = word_key(language, &entry.word);
            match data.words.entry(id.clone()) {
                Entry::Occupied(mut occupied) => {
                    let existing = occupied.get_mut();
                    existing.encounters += 1;
                    existing.last_seen_ms = now;
                    outcome.updated_words += 1;
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(WordRecord {
                        id: id.clone(),
                        word: entry.word.clone(),
                        language: language.to_string(),
                        encounters: 1,
                        first_seen_ms: now,
                        last_seen_ms: now,
                        mastery_level: 0,
                        excluded: false,
                    });
                    outcome.new_words += 1;
                }
            }

            if let Some(sentence) = &entry.sentence {
                data.next_context_id += 1;
                let context_id = data.next_context_id;
                data.contexts.push(ContextRecord {
                    id: context_id,
                    word_id: id,
                    sentence: sentence.clone(),
                    video_id: video_id.to_string(),
                    video_title: video_title.to_string(),
                    timestamp_ms: entry.timestamp_ms,
                    captured_at_ms: now,
                });
            }

            outcome.total_logged += 1;
        }

        if let Err(e) = Self::update_active_session(&mut data, &outcome, video_id, now) {
            warn!("session bookkeeping failed (word writes kept): {}", e);
        }

        self.persist(&data).await?;
        Ok(outcome)
    }

    fn update_active_session(
        data: &mut LedgerData,
        outcome: &LogOutcome,
        video_id: &str,
        now: i64,
    ) -> Result<(), LedgerError> {
        let Some(session_id) = data.active_session_id else {
            return Ok(());
        };
        let session = data
            .sessions
            .get_mut(&session_id)
            .ok_or(LedgerError::SessionNotFound(session_id))?;

        session.words_encountered += outcome.total_logged as u64;
        session.new_words += outcome.new_words as u64;
        session.rewinds += 1;
        if !video_id.is_empty() && !session.video_ids.iter().any(|v| v == video_id) {
            session.video_ids.push(video_id.to_string());
        }
        session.end_ms = now;
        Ok(())
    }

    pub async fn query_words(&self, query: &WordQuery) -> Vec<WordRecord> {
        let data = self.data.read().await;
        let mut words: Vec<WordRecord> = data
            .words
            .values()
            .filter(|w| match query.filter {
                WordFilter::All => true,
                WordFilter::Known => w.mastery_level == MASTERY_MAX && !w.excluded,
                WordFilter::Learning => w.mastery_level == 1 && !w.excluded,
                WordFilter::New => w.mastery_level == 0 && !w.excluded,
                WordFilter::Excluded => w.excluded,
                WordFilter::Default => !w.excluded && w.mastery_level < MASTERY_MAX,
            })
            .cloned()
            .collect();

        if let Some(search) = &query.search {
            let needle = search.to_lowercase();
            words.retain(|w| w.word.to_lowercase().contains(&needle));
        }

        match query.sort {
            WordSort::Alphabetical => words.sort_by(|a, b| a.word.cmp(&b.word)),
            WordSort::MostRecent => words.sort_by(|a, b| b.last_seen_ms.cmp(&a.last_seen_ms)),
            WordSort::Mastery => words.sort_by(|a, b| {
                b.mastery_level
                    .cmp(&a.mastery_level)
                    .then(b.encounters.cmp(&a.encounters))
            }),
            WordSort::Frequency => words.sort_by(|a, b| b.encounters.cmp(&a.encounters)),
        }

        words
    }

    pub async fn get_word(&self, word_id: &str) -> Option<WordRecord> {
        self.data.read().await.words.get(word_id).cloned()
    }

    /// Apply a partial update. Mastery is clamped into `0..=MASTERY_MAX`.
    pub async fn update_word(
        &self,
        word_id: &str,
        updates: WordUpdate,
    ) -> Result<WordRecord, LedgerError> {
        let mut data = self.data.write().await;
        let word = data
            .words
            .get_mut(word_id)
            .ok_or_else(|| LedgerError::WordNotFound(word_id.to_string()))?;

        if let Some(level) = updates.mastery_level {
            word.mastery_level = level.clamp(0, MASTERY_MAX as i64) as u8;
        }
        if let Some(excluded) = updates.excluded {
            word.excluded = excluded;
        }

        let updated = word.clone();
        self.persist(&data).await?;
        debug!(
            "updated word {}: mastery={} ({}), excluded={}",
            updated.id,
            updated.mastery_level,
            mastery_label(updated.mastery_level),
            updated.excluded
        );
        Ok(updated)
    }

    /// Delete a word and cascade to all of its context records. Idempotent.
    pub async fn delete_word(&self, word_id: &str) -> Result<(), LedgerError> {
        let mut data = self.data.write().await;
        data.words.remove(word_id);
        data.contexts.retain(|c| c.word_id != word_id);
        self.persist(&data).await
    }

    /// Context sentences for a word, most recent first, capped to 10.
    pub async fn contexts_for(&self, word_id: &str) -> Vec<ContextRecord> {
        let data = self.data.read().await;
        let mut contexts: Vec<ContextRecord> = data
            .contexts
            .iter()
            .filter(|c| c.word_id == word_id)
            .cloned()
            .collect();
        contexts.sort_by(|a, b| b.captured_at_ms.cmp(&a.captured_at_ms).then(b.id.cmp(&a.id)));
        contexts.truncate(MAX_CONTEXTS_RETURNED);
        contexts
    }

    /// Start a session. Starting while one is already active is a no-op
    /// returning the existing session.
    pub async fn start_session(&self) -> Result<SessionState, LedgerError> {
        let mut data = self.data.write().await;

        if let Some(id) = data.active_session_id {
            if data.sessions.contains_key(&id) {
                debug!("session {} already active; start is a no-op", id);
                return Ok(SessionState {
                    active: true,
                    session_id: Some(id),
                });
            }
            warn!("active session pointer {} is dangling; starting fresh", id);
        }

        let now = Self::now_ms();
        data.next_session_id += 1;
        let id = data.next_session_id;
        data.sessions.insert(
            id,
            SessionRecord {
                id,
                date: chrono::Utc::now().format("%Y-%m-%d").to_string(),
                start_ms: now,
                end_ms: now,
                words_encountered: 0,
                new_words: 0,
                rewinds: 0,
                video_ids: Vec::new(),
            },
        );
        data.active_session_id = Some(id);
        self.persist(&data).await?;
        info!("session {} started", id);

        Ok(SessionState {
            active: true,
            session_id: Some(id),
        })
    }

    /// Stop the active session, stamping its end time. No-op when idle.
    pub async fn stop_session(&self) -> Result<SessionState, LedgerError> {
        let mut data = self.data.write().await;
        if let Some(id) = data.active_session_id.take() {
            let now = Self::now_ms();
            if let Some(session) = data.sessions.get_mut(&id) {
                session.end_ms = now;
            }
            self.persist(&data).await?;
            info!("session {} stopped", id);
        }
        Ok(SessionState {
            active: false,
            session_id: None,
        })
    }

    pub async fn session_state(&self) -> SessionState {
        let data = self.data.read().await;
        SessionState {
            active: data.active_session_id.is_some(),
            session_id: data.active_session_id,
        }
    }

    pub async fn active_session(&self) -> Option<SessionRecord> {
        let data = self.data.read().await;
        data.active_session_id
            .and_then(|id| data.sessions.get(&id).cloned())
    }

    pub async fn stats(&self) -> LedgerStats {
        let data = self.data.read().await;
        let active: Vec<&WordRecord> = data.words.values().filter(|w| !w.excluded).collect();
        LedgerStats {
            total_words: active.len(),
            learned_words: active
                .iter()
                .filter(|w| w.mastery_level == MASTERY_MAX)
                .count(),
            total_encounters: active.iter().map(|w| w.encounters).sum(),
            total_sessions: data.sessions.len(),
            current_session: data
                .active_session_id
                .and_then(|id| data.sessions.get(&id).cloned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_store(dir: &tempfile::TempDir) -> LedgerStore {
        LedgerStore::open(dir.path().join("ledger.json"))
            .await
            .unwrap()
    }

    fn entry(word: &str, sentence: &str) -> LogEntry {
        LogEntry::new(word).with_sentence(sentence)
    }

    #[tokio::test]
    async fn test_upsert_counts_encounters() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let outcome = store
            .log_occurrences(
                &[LogEntry::new("él"), LogEntry::new("él")],
                "abc",
                "Title",
                "es",
            )
            .await
            .unwrap();
        assert_eq!(outcome.new_words, 1);
        assert_eq!(outcome.updated_words, 1);
        assert_eq!(outcome.total_logged, 2);

        let word = store.get_word("es:él").await.unwrap();
        assert_eq!(word.encounters, 2);
        assert_eq!(word.mastery_level, 0);
    }

    #[tokio::test]
    async fn test_empty_words_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let outcome = store
            .log_occurrences(
                &[LogEntry::new(""), LogEntry::new("casa")],
                "abc",
                "",
                "es",
            )
            .await
            .unwrap();
        assert_eq!(outcome.total_logged, 1);
        assert_eq!(outcome.new_words, 1);
    }

    #[tokio::test]
    async fn test_encounter_count_matches_valid_occurrences_across_batches() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        for _ in 0..3 {
            store
                .log_occurrences(&[LogEntry::new("perro")], "v", "", "es")
                .await
                .unwrap();
        }
        store
            .log_occurrences(&[LogEntry::new("perro"), LogEntry::new("")], "v", "", "es")
            .await
            .unwrap();

        assert_eq!(store.get_word("es:perro").await.unwrap().encounters, 4);
    }

    #[tokio::test]
    async fn test_concurrent_batches_do_not_lose_increments() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .log_occurrences(&[LogEntry::new("gato")], "v", "", "es")
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get_word("es:gato").await.unwrap().encounters, 8);
    }

    #[tokio::test]
    async fn test_mastery_clamped_on_update() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store
            .log_occurrences(&[LogEntry::new("casa")], "v", "", "es")
            .await
            .unwrap();

        let word = store
            .update_word(
                "es:casa",
                WordUpdate {
                    mastery_level: Some(99),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(word.mastery_level, MASTERY_MAX);

        let word = store
            .update_word(
                "es:casa",
                WordUpdate {
                    mastery_level: Some(-5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(word.mastery_level, 0);
    }

    #[tokio::test]
    async fn test_update_missing_word_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let err = store
            .update_word("es:nada", WordUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::WordNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades_contexts() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store
            .log_occurrences(
                &[entry("casa", "mi casa es grande"), entry("casa", "otra casa")],
                "v1",
                "Video",
                "es",
            )
            .await
            .unwrap();
        assert_eq!(store.contexts_for("es:casa").await.len(), 2);

        store.delete_word("es:casa").await.unwrap();
        assert!(store.get_word("es:casa").await.is_none());
        assert!(store.contexts_for("es:casa").await.is_empty());

        // Deleting again is an ack, not an error.
        store.delete_word("es:casa").await.unwrap();
    }

    #[tokio::test]
    async fn test_contexts_capped_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        for i in 0..15 {
            store
                .log_occurrences(&[entry("sol", &format!("frase {}", i))], "v", "", "es")
                .await
                .unwrap();
        }

        let contexts = store.contexts_for("es:sol").await;
        assert_eq!(contexts.len(), MAX_CONTEXTS_RETURNED);
        assert_eq!(contexts[0].sentence, "frase 14");
        assert!(contexts[0].captured_at_ms >= contexts[9].captured_at_ms);
    }

    #[tokio::test]
    async fn test_query_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store
            .log_occurrences(
                &[
                    LogEntry::new("uno"),
                    LogEntry::new("dos"),
                    LogEntry::new("dos"),
                    LogEntry::new("tres"),
                ],
                "v",
                "",
                "es",
            )
            .await
            .unwrap();
        store
            .update_word(
                "es:uno",
                WordUpdate {
                    mastery_level: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .update_word(
                "es:tres",
                WordUpdate {
                    excluded: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Default: in-progress words only.
        let words = store.query_words(&WordQuery::default()).await;
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "dos");

        let known = store
            .query_words(&WordQuery {
                filter: WordFilter::Known,
                ..Default::default()
            })
            .await;
        assert_eq!(known.len(), 1);
        assert_eq!(known[0].word, "uno");

        let excluded = store
            .query_words(&WordQuery {
                filter: WordFilter::Excluded,
                ..Default::default()
            })
            .await;
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].word, "tres");

        let all_alpha = store
            .query_words(&WordQuery {
                filter: WordFilter::All,
                sort: WordSort::Alphabetical,
                ..Default::default()
            })
            .await;
        let names: Vec<&str> = all_alpha.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(names, vec!["dos", "tres", "uno"]);

        let frequent = store
            .query_words(&WordQuery {
                filter: WordFilter::All,
                ..Default::default()
            })
            .await;
        assert_eq!(frequent[0].word, "dos");
    }

    #[tokio::test]
    async fn test_query_search_is_case_insensitive_substring() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store
            .log_occurrences(
                &[LogEntry::new("perro"), LogEntry::new("gato")],
                "v",
                "",
                "es",
            )
            .await
            .unwrap();

        let words = store
            .query_words(&WordQuery {
                filter: WordFilter::All,
                search: Some("ERR".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "perro");
    }

    #[tokio::test]
    async fn test_session_accumulates_batch_stats() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        // Pre-seed so the batch has 2 updated + 1 new.
        store
            .log_occurrences(
                &[LogEntry::new("uno"), LogEntry::new("dos")],
                "xyz",
                "",
                "es",
            )
            .await
            .unwrap();

        let state = store.start_session().await.unwrap();
        assert!(state.active);

        store
            .log_occurrences(
                &[
                    LogEntry::new("uno"),
                    LogEntry::new("dos"),
                    LogEntry::new("tres"),
                ],
                "abc",
                "Video",
                "es",
            )
            .await
            .unwrap();

        let session = store.active_session().await.unwrap();
        assert_eq!(session.words_encountered, 3);
        assert_eq!(session.new_words, 1);
        assert_eq!(session.rewinds, 1);
        assert_eq!(session.video_ids, vec!["abc"]);

        let stopped = store.stop_session().await.unwrap();
        assert!(!stopped.active);
        assert!(store.active_session().await.is_none());
    }

    #[tokio::test]
    async fn test_start_session_while_active_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let first = store.start_session().await.unwrap();
        let second = store.start_session().await.unwrap();
        assert_eq!(first.session_id, second.session_id);
        assert_eq!(store.stats().await.total_sessions, 1);
    }

    #[tokio::test]
    async fn test_dangling_session_pointer_keeps_word_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        // Active pointer refers to a session record that does not exist.
        tokio::fs::write(&path, r#"{"active_session_id": 7}"#)
            .await
            .unwrap();

        let store = LedgerStore::open(path.clone()).await.unwrap();
        let outcome = store
            .log_occurrences(&[entry("casa", "mi casa")], "v", "Video", "es")
            .await
            .unwrap();
        assert_eq!(outcome.new_words, 1);
        assert_eq!(store.get_word("es:casa").await.unwrap().encounters, 1);
        assert_eq!(store.contexts_for("es:casa").await.len(), 1);

        // The batch was persisted despite the bookkeeping failure.
        let reopened = LedgerStore::open(path).await.unwrap();
        assert!(reopened.get_word("es:casa").await.is_some());
    }

    #[tokio::test]
    async fn test_logging_without_session_skips_bookkeeping() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store
            .log_occurrences(&[LogEntry::new("sin")], "v", "", "es")
            .await
            .unwrap();
        assert!(store.active_session().await.is_none());
        assert_eq!(store.stats().await.total_sessions, 0);
    }

    #[tokio::test]
    async fn test_reopen_retains_words_and_active_session_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let first_id = {
            let store = LedgerStore::open(path.clone()).await.unwrap();
            store
                .log_occurrences(&[LogEntry::new("casa")], "v", "", "es")
                .await
                .unwrap();
            store.start_session().await.unwrap().session_id
        };

        let reopened = LedgerStore::open(path.clone()).await.unwrap();
        assert_eq!(reopened.get_word("es:casa").await.unwrap().encounters, 1);
        let state = reopened.session_state().await;
        assert!(state.active);
        assert_eq!(state.session_id, first_id);
    }

    #[tokio::test]
    async fn test_stats_exclude_excluded_words() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store
            .log_occurrences(
                &[LogEntry::new("uno"), LogEntry::new("dos")],
                "v",
                "",
                "es",
            )
            .await
            .unwrap();
        store
            .update_word(
                "es:uno",
                WordUpdate {
                    excluded: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .update_word(
                "es:dos",
                WordUpdate {
                    mastery_level: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.total_words, 1);
        assert_eq!(stats.learned_words, 1);
        assert_eq!(stats.total_encounters, 1);
    }
}
