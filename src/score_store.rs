use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredScoreEntry {
    name: String,
    games: u64,
    #[serde(rename = "bestScore", alias = "best_score")]
    best_score: i32,
    #[serde(rename = "updatedAtMs", alias = "updated_at_ms")]
    updated_at_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ScoreStoreFile {
    version: u8,
    players: HashMap<String, StoredScoreEntry>,
}

#[derive(Clone, Debug, Deserialize)]
struct ScoreStoreFileRaw {
    version: u8,
    players: HashMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HighScoreEntry {
    pub name: String,
    pub games: u64,
    #[serde(rename = "bestScore")]
    pub best_score: i32,
    #[serde(rename = "updatedAtMs")]
    pub updated_at_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct HighScoreResponse {
    #[serde(rename = "generatedAt")]
    pub generated_at_iso: String,
    pub entries: Vec<HighScoreEntry>,
}

/// File-backed high-water score table. A pure collaborator of the
/// simulation: the engine reports final scores here at game over and never
/// reads it back during play.
pub struct HighScoreStore {
    file_path: PathBuf,
    players: HashMap<String, StoredScoreEntry>,
}

impl HighScoreStore {
    pub fn new(file_path: PathBuf) -> Self {
        let players = load_players(&file_path);
        Self { file_path, players }
    }

    /// Records a finished run. Returns true when the score is a new
    /// personal best for that name.
    pub fn record_score(&mut self, name: &str, score: i32) -> bool {
        let key = store_key(name);
        if key.is_empty() {
            return false;
        }
        let now_ms = now_ms();
        let entry = self.players.entry(key).or_insert_with(|| StoredScoreEntry {
            name: name.trim().to_string(),
            games: 0,
            best_score: 0,
            updated_at_ms: now_ms,
        });
        entry.name = name.trim().to_string();
        entry.games += 1;
        entry.updated_at_ms = now_ms;
        let is_best = score > entry.best_score;
        if is_best {
            entry.best_score = score;
        }
        self.save();
        is_best
    }

    pub fn best_overall(&self) -> i32 {
        self.players
            .values()
            .map(|entry| entry.best_score)
            .max()
            .unwrap_or(0)
    }

    pub fn build_response(&self, requested_limit: Option<usize>) -> HighScoreResponse {
        HighScoreResponse {
            generated_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            entries: self.get_top(requested_limit),
        }
    }

    fn get_top(&self, requested_limit: Option<usize>) -> Vec<HighScoreEntry> {
        let normalized_limit = requested_limit.unwrap_or(10).clamp(1, 100);
        let mut entries: Vec<HighScoreEntry> = self
            .players
            .values()
            .map(|entry| HighScoreEntry {
                name: entry.name.clone(),
                games: entry.games,
                best_score: entry.best_score,
                updated_at_ms: entry.updated_at_ms,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.best_score
                .cmp(&a.best_score)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        entries.truncate(normalized_limit);
        entries
    }

    fn save(&self) {
        if let Some(parent) = self.file_path.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                eprintln!(
                    "[score-store] failed to create parent dir {}: {error}",
                    parent.display()
                );
                return;
            }
        }

        let payload = ScoreStoreFile {
            version: 1,
            players: self.players.clone(),
        };
        match serde_json::to_string_pretty(&payload) {
            Ok(text) => {
                if let Err(error) = fs::write(&self.file_path, text) {
                    eprintln!(
                        "[score-store] failed to write {}: {error}",
                        self.file_path.display()
                    );
                }
            }
            Err(error) => {
                eprintln!(
                    "[score-store] failed to serialize payload for {}: {error}",
                    self.file_path.display()
                );
            }
        }
    }
}

fn load_players(path: &Path) -> HashMap<String, StoredScoreEntry> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                eprintln!("[score-store] failed to read {}: {error}", path.display());
            }
            return HashMap::new();
        }
    };
    let parsed: ScoreStoreFileRaw = match serde_json::from_str::<ScoreStoreFileRaw>(&text) {
        Ok(value) if value.version == 1 => value,
        Ok(value) => {
            eprintln!(
                "[score-store] unsupported version {} at {}",
                value.version,
                path.display()
            );
            return HashMap::new();
        }
        Err(error) => {
            eprintln!("[score-store] failed to parse {}: {error}", path.display());
            return HashMap::new();
        }
    };

    let mut sanitized = HashMap::<String, StoredScoreEntry>::new();
    for (player_key, raw_value) in parsed.players {
        let value: StoredScoreEntry = match serde_json::from_value(raw_value) {
            Ok(entry) => entry,
            Err(error) => {
                eprintln!(
                    "[score-store] failed to parse player entry '{}' in {}: {error}",
                    player_key,
                    path.display()
                );
                continue;
            }
        };
        let Some(normalized) = sanitize_stored_entry(value) else {
            continue;
        };
        let key = store_key(&normalized.name);
        if key.is_empty() {
            continue;
        }

        match sanitized.get_mut(&key) {
            Some(current) => {
                current.name = normalized.name;
                current.games += normalized.games;
                current.best_score = current.best_score.max(normalized.best_score);
                current.updated_at_ms = current.updated_at_ms.max(normalized.updated_at_ms);
            }
            None => {
                let _ = sanitized.insert(key, normalized);
            }
        }
    }

    sanitized
}

fn sanitize_stored_entry(value: StoredScoreEntry) -> Option<StoredScoreEntry> {
    let normalized_name = value.name.trim().to_string();
    if normalized_name.is_empty() {
        return None;
    }
    if value.best_score < 0 {
        return None;
    }
    Some(StoredScoreEntry {
        name: normalized_name,
        games: value.games,
        best_score: value.best_score,
        updated_at_ms: value.updated_at_ms,
    })
}

fn store_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
