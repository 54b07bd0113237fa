use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use replay_vocab::detector::ReplaySegment;
use replay_vocab::ledger::{
    mastery_label, word_key, LedgerStore, WordFilter, WordQuery, WordSort, WordUpdate,
};
use replay_vocab::pipeline::{Pipeline, VideoMetadataResolver};
use replay_vocab::transcript::{SubtitleFileSource, TranscriptService, TranscriptSource};
use replay_vocab::words;
use replay_vocab::Config;

/// Fixed metadata for CLI runs, where the video identity is given up front.
struct CliMetadata {
    video_id: String,
    title: String,
}

impl VideoMetadataResolver for CliMetadata {
    fn video_id(&self) -> Option<String> {
        Some(self.video_id.clone())
    }

    fn video_title(&self) -> String {
        self.title.clone()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("replay_vocab=info,warn")
        .init();

    let matches = Command::new("replay-vocab")
        .version("0.1.0")
        .about("Vocabulary acquisition tracking for subtitled video")
        .subcommand_required(true)
        .subcommand(
            Command::new("log")
                .about("Log replayed segments of a subtitle file into the ledger")
                .arg(
                    Arg::new("subtitles")
                        .short('s')
                        .long("subtitles")
                        .value_name("FILE")
                        .help("WebVTT subtitle file")
                        .required(true),
                )
                .arg(
                    Arg::new("segments")
                        .long("segments")
                        .value_name("RANGES")
                        .help("Replayed windows in seconds, e.g. 10-14,71.5-80")
                        .required(true),
                )
                .arg(
                    Arg::new("video-id")
                        .long("video-id")
                        .value_name("ID")
                        .default_value("local"),
                )
                .arg(
                    Arg::new("title")
                        .long("title")
                        .value_name("TITLE")
                        .default_value(""),
                ),
        )
        .subcommand(
            Command::new("words")
                .about("List tracked words")
                .arg(
                    Arg::new("filter")
                        .short('f')
                        .long("filter")
                        .value_name("FILTER")
                        .help("all, known, learning, new, excluded")
                        .default_value("default"),
                )
                .arg(
                    Arg::new("search")
                        .long("search")
                        .value_name("TEXT")
                        .help("Case-insensitive substring match"),
                )
                .arg(
                    Arg::new("sort")
                        .long("sort")
                        .value_name("SORT")
                        .help("alpha, recent, mastery, frequency")
                        .default_value("frequency"),
                ),
        )
        .subcommand(
            Command::new("contexts")
                .about("Show captured example sentences for a word")
                .arg(Arg::new("word").value_name("WORD").required(true)),
        )
        .subcommand(
            Command::new("set")
                .about("Update a word's mastery level or exclusion flag")
                .arg(Arg::new("word").value_name("WORD").required(true))
                .arg(
                    Arg::new("mastery")
                        .short('m')
                        .long("mastery")
                        .value_name("LEVEL")
                        .help("0 = new, 1 = learning, 2 = known"),
                )
                .arg(
                    Arg::new("exclude")
                        .long("exclude")
                        .action(ArgAction::SetTrue)
                        .help("Exclude from lists and export"),
                )
                .arg(
                    Arg::new("include")
                        .long("include")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("exclude")
                        .help("Clear the exclusion flag"),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a word and its contexts")
                .arg(Arg::new("word").value_name("WORD").required(true)),
        )
        .subcommand(
            Command::new("export")
                .about("Export the learning set as an Anki TSV")
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Write to a file instead of stdout"),
                ),
        )
        .subcommand(Command::new("stats").about("Show ledger statistics"))
        .subcommand(
            Command::new("session")
                .about("Manage the study session")
                .subcommand_required(true)
                .subcommand(Command::new("start"))
                .subcommand(Command::new("stop"))
                .subcommand(Command::new("status")),
        )
        .get_matches();

    let config = Config::load().unwrap_or_else(|e| {
        warn!("failed to load config, using defaults: {}", e);
        Config::default()
    });
    config.validate()?;

    let ledger = LedgerStore::open(config.storage.ledger_path.clone()).await?;
    let language = config.tracking.language.clone();

    match matches.subcommand() {
        Some(("log", sub)) => {
            let subtitles = PathBuf::from(sub.get_one::<String>("subtitles").unwrap());
            let segments = parse_segments(sub.get_one::<String>("segments").unwrap())?;
            let video_id = sub.get_one::<String>("video-id").unwrap().clone();
            let title = sub.get_one::<String>("title").unwrap().clone();

            let chain: Vec<Box<dyn TranscriptSource>> =
                vec![Box::new(SubtitleFileSource::new(subtitles))];
            let transcript = TranscriptService::new(chain);
            let pipeline = Pipeline::new(
                transcript,
                ledger,
                Arc::new(CliMetadata {
                    video_id: video_id.clone(),
                    title,
                }),
                &language,
                config.tracking.filter_stop_words,
                config.tracking.min_rewind_secs,
            );
            pipeline.video_changed(&video_id).await;

            for segment in &segments {
                match pipeline.process_segment(segment).await? {
                    Some(outcome) => println!(
                        "{:.1}s-{:.1}s: {} words logged, {} new",
                        segment.start_secs,
                        segment.end_secs,
                        outcome.total_logged,
                        outcome.new_words
                    ),
                    None => println!(
                        "{:.1}s-{:.1}s: no words",
                        segment.start_secs, segment.end_secs
                    ),
                }
            }
        }
        Some(("words", sub)) => {
            let query = WordQuery {
                filter: WordFilter::parse(sub.get_one::<String>("filter").unwrap()),
                search: sub.get_one::<String>("search").cloned(),
                sort: WordSort::parse(sub.get_one::<String>("sort").unwrap()),
            };
            let records = ledger.query_words(&query).await;
            for record in &records {
                println!(
                    "{:<24} {:<10} x{:<5} {}",
                    record.word,
                    mastery_label(record.mastery_level),
                    record.encounters,
                    if record.excluded { "excluded" } else { "" }
                );
            }
            println!("{} words", records.len());
        }
        Some(("contexts", sub)) => {
            let id = resolve_word_id(&language, sub.get_one::<String>("word").unwrap());
            let contexts = ledger.contexts_for(&id).await;
            if contexts.is_empty() {
                println!("no contexts for {}", id);
            }
            for ctx in contexts {
                println!(
                    "\"{}\" ({}, {}:{:02})",
                    ctx.sentence,
                    ctx.video_title,
                    ctx.timestamp_ms / 60_000,
                    ctx.timestamp_ms % 60_000 / 1000
                );
            }
        }
        Some(("set", sub)) => {
            let id = resolve_word_id(&language, sub.get_one::<String>("word").unwrap());
            let update = WordUpdate {
                mastery_level: sub
                    .get_one::<String>("mastery")
                    .map(|m| m.parse())
                    .transpose()?,
                excluded: if sub.get_flag("exclude") {
                    Some(true)
                } else if sub.get_flag("include") {
                    Some(false)
                } else {
                    None
                },
            };
            let record = ledger.update_word(&id, update).await?;
            println!(
                "{}: mastery {} ({}){}",
                record.word,
                record.mastery_level,
                mastery_label(record.mastery_level),
                if record.excluded { ", excluded" } else { "" }
            );
        }
        Some(("delete", sub)) => {
            let id = resolve_word_id(&language, sub.get_one::<String>("word").unwrap());
            ledger.delete_word(&id).await?;
            println!("deleted {}", id);
        }
        Some(("export", sub)) => {
            let export = ledger.export_learning_set().await?;
            match sub.get_one::<String>("output") {
                Some(path) => {
                    tokio::fs::write(path, &export.tsv).await?;
                    info!("wrote {} cards to {}", export.word_count, path);
                }
                None => print!("{}", export.tsv),
            }
        }
        Some(("stats", _)) => {
            let stats = ledger.stats().await;
            println!("words:       {}", stats.total_words);
            println!("known:       {}", stats.learned_words);
            println!("encounters:  {}", stats.total_encounters);
            println!("sessions:    {}", stats.total_sessions);
            if let Some(session) = stats.current_session {
                println!(
                    "active session {} ({}): {} words, {} new, {} rewinds",
                    session.id,
                    session.date,
                    session.words_encountered,
                    session.new_words,
                    session.rewinds
                );
            }
        }
        Some(("session", sub)) => match sub.subcommand() {
            Some(("start", _)) => {
                let state = ledger.start_session().await?;
                println!("session {} active", state.session_id.unwrap_or_default());
            }
            Some(("stop", _)) => {
                ledger.stop_session().await?;
                println!("session stopped");
            }
            Some(("status", _)) => match ledger.active_session().await {
                Some(session) => println!(
                    "session {} active since {}: {} words, {} new, {} rewinds, {} videos",
                    session.id,
                    session.date,
                    session.words_encountered,
                    session.new_words,
                    session.rewinds,
                    session.video_ids.len()
                ),
                None => println!("no active session"),
            },
            _ => unreachable!(),
        },
        _ => unreachable!(),
    }

    Ok(())
}

/// Parse `10-14,71.5-80` into replay segments.
fn parse_segments(ranges: &str) -> Result<Vec<ReplaySegment>> {
    let mut segments = Vec::new();
    for part in ranges.split(',').filter(|p| !p.trim().is_empty()) {
        let (start, end) = part
            .trim()
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("bad segment '{}', expected start-end", part))?;
        let start_secs: f64 = start.trim().parse()?;
        let end_secs: f64 = end.trim().parse()?;
        if end_secs < start_secs {
            return Err(anyhow::anyhow!("segment '{}' ends before it starts", part));
        }
        segments.push(ReplaySegment {
            start_secs,
            end_secs,
        });
    }
    if segments.is_empty() {
        return Err(anyhow::anyhow!("no segments given"));
    }
    Ok(segments)
}

/// Accept either a full `lang:word` id or a bare word in the configured
/// language.
fn resolve_word_id(language: &str, input: &str) -> String {
    if input.contains(':') {
        input.to_string()
    } else {
        word_key(language, &words::normalize(input))
    }
}
