//! Checkpoint files: one JSON file per save event, never rewritten.
//!
//! # Format
//!
//! Checkpoints are written as JSON objects tagged by `kind`:
//!
//! | kind             | file name                      | payload             |
//! |------------------|--------------------------------|---------------------|
//! | `per_generation` | `checkpoint_gen_{g}.json`      | [`TrainingSnapshot`] |
//! | `autosave`       | `autosave_gen_{g}.json`        | [`TrainingSnapshot`] |
//! | `milestone`      | `score_{s}_gen_{g}.json`       | [`GenomeRecord`]     |
//! | `error`          | `error_checkpoint_gen_{g}.json`| [`TrainingSnapshot`] |
//! | `interrupted`    | `interrupted_gen_{g}.json`     | [`TrainingSnapshot`] |
//! | `final`          | `final_gen_{g}.json`           | [`TrainingSnapshot`] |
//! | `manual_stop`    | `stopped_at_gen_{g}.json`      | [`TrainingSnapshot`] |
//! | `best`           | `best_genome_gen_{g}.json`     | [`GenomeRecord`]     |
//!
//! Files are opened with `create_new`. When a name is taken, `_1`, `_2`, ... is
//! appended to the stem, so an existing checkpoint is never overwritten.
//!
//! # Loading
//!
//! [`CheckpointManager::load`] accepts more than the current format. It tries,
//! in order:
//!
//! 1. a `kind`-tagged checkpoint
//! 2. an untagged snapshot object with a `best_genome` or `genome` field
//! 3. a bare genome
//! 4. the first object anywhere in the document that decodes as a genome
//!
//! and fails with [`CheckpointError::NoUsableGenome`] when none applies.
//! Untagged snapshots may carry their timestamp as RFC 3339 text or as Unix
//! seconds.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write as _},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    #[display("per_generation")]
    PerGeneration,
    #[display("autosave")]
    Autosave,
    #[display("milestone")]
    Milestone,
    #[display("error")]
    Error,
    #[display("interrupted")]
    Interrupted,
    #[display("final")]
    Final,
    #[display("manual_stop")]
    ManualStop,
    #[display("best")]
    Best,
}

const FILE_PREFIXES: [(&str, CheckpointKind); 7] = [
    ("checkpoint_gen_", CheckpointKind::PerGeneration),
    ("autosave_gen_", CheckpointKind::Autosave),
    ("error_checkpoint_gen_", CheckpointKind::Error),
    ("interrupted_gen_", CheckpointKind::Interrupted),
    ("final_gen_", CheckpointKind::Final),
    ("stopped_at_gen_", CheckpointKind::ManualStop),
    ("best_genome_gen_", CheckpointKind::Best),
];

impl CheckpointKind {
    /// File stem (without collision suffix or extension).
    #[must_use]
    pub fn file_stem(self, generation: u64, score: Option<u32>) -> String {
        if self == Self::Milestone {
            return format!("score_{}_gen_{generation}", score.unwrap_or_default());
        }
        let prefix = FILE_PREFIXES
            .iter()
            .find_map(|(prefix, kind)| (*kind == self).then_some(*prefix))
            .unwrap_or("checkpoint_gen_");
        format!("{prefix}{generation}")
    }
}

/// Full training state at a generation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSnapshot<G, P, S> {
    pub generation: u64,
    pub timestamp: DateTime<Utc>,
    pub best_genome: Option<G>,
    pub best_fitness: Option<f32>,
    pub population: Option<P>,
    pub species: Option<S>,
    /// The population was bred but its evaluation was cancelled, so its
    /// fitness values are partial
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unevaluated: bool,
    /// Failure that caused an `error` checkpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A single genome worth keeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeRecord<G> {
    pub generation: u64,
    pub timestamp: DateTime<Utc>,
    pub genome: G,
    pub fitness: f32,
    /// Shared score when the genome was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Checkpoint<G, P, S> {
    PerGeneration(TrainingSnapshot<G, P, S>),
    Autosave(TrainingSnapshot<G, P, S>),
    Milestone(GenomeRecord<G>),
    Error(TrainingSnapshot<G, P, S>),
    Interrupted(TrainingSnapshot<G, P, S>),
    Final(TrainingSnapshot<G, P, S>),
    ManualStop(TrainingSnapshot<G, P, S>),
    Best(GenomeRecord<G>),
}

impl<G, P, S> Checkpoint<G, P, S> {
    /// Wraps a snapshot into the given kind.
    ///
    /// Genome-only kinds (`milestone`, `best`) cannot hold a snapshot; `None`
    /// is returned for them.
    #[must_use]
    pub fn from_snapshot(
        kind: CheckpointKind,
        snapshot: TrainingSnapshot<G, P, S>,
    ) -> Option<Self> {
        Some(match kind {
            CheckpointKind::PerGeneration => Self::PerGeneration(snapshot),
            CheckpointKind::Autosave => Self::Autosave(snapshot),
            CheckpointKind::Error => Self::Error(snapshot),
            CheckpointKind::Interrupted => Self::Interrupted(snapshot),
            CheckpointKind::Final => Self::Final(snapshot),
            CheckpointKind::ManualStop => Self::ManualStop(snapshot),
            CheckpointKind::Milestone | CheckpointKind::Best => return None,
        })
    }

    #[must_use]
    pub fn kind(&self) -> CheckpointKind {
        match self {
            Self::PerGeneration(_) => CheckpointKind::PerGeneration,
            Self::Autosave(_) => CheckpointKind::Autosave,
            Self::Milestone(_) => CheckpointKind::Milestone,
            Self::Error(_) => CheckpointKind::Error,
            Self::Interrupted(_) => CheckpointKind::Interrupted,
            Self::Final(_) => CheckpointKind::Final,
            Self::ManualStop(_) => CheckpointKind::ManualStop,
            Self::Best(_) => CheckpointKind::Best,
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        match self {
            Self::PerGeneration(s)
            | Self::Autosave(s)
            | Self::Error(s)
            | Self::Interrupted(s)
            | Self::Final(s)
            | Self::ManualStop(s) => s.generation,
            Self::Milestone(r) | Self::Best(r) => r.generation,
        }
    }

    #[must_use]
    pub fn file_stem(&self) -> String {
        let score = match self {
            Self::Milestone(r) => r.score,
            _ => None,
        };
        self.kind().file_stem(self.generation(), score)
    }
}

/// What could be recovered from a checkpoint file of any supported shape.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCheckpoint<G, P, S> {
    /// `None` for untagged payloads
    pub kind: Option<CheckpointKind>,
    pub generation: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub genome: G,
    pub fitness: Option<f32>,
    pub score: Option<u32>,
    pub population: Option<P>,
    pub species: Option<S>,
    /// `population` still has to be evaluated for `generation`
    pub unevaluated: bool,
}

/// A checkpoint file found in the checkpoint directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointEntry {
    pub path: PathBuf,
    /// Parsed from the file name; `None` for names this crate does not write
    pub kind: Option<CheckpointKind>,
    pub generation: Option<u64>,
    pub score: Option<u32>,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CheckpointError {
    #[display("checkpoint I/O failed for {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to encode {kind} checkpoint: {source}")]
    Encode {
        kind: CheckpointKind,
        source: serde_json::Error,
    },
    #[display("failed to decode checkpoint {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("no usable genome in checkpoint {}", path.display())]
    NoUsableGenome { path: PathBuf },
}

/// Writes, reads and lists checkpoints inside one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    #[must_use]
    pub fn new<P>(dir: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `checkpoint` to a new file and returns its path.
    ///
    /// The directory is created when missing.
    pub fn save<G, P, S>(
        &self,
        checkpoint: &Checkpoint<G, P, S>,
    ) -> Result<PathBuf, CheckpointError>
    where
        G: Serialize,
        P: Serialize,
        S: Serialize,
    {
        let kind = checkpoint.kind();
        let mut bytes = serde_json::to_vec_pretty(checkpoint)
            .map_err(|source| CheckpointError::Encode { kind, source })?;
        bytes.push(b'\n');

        fs::create_dir_all(&self.dir).map_err(|source| CheckpointError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let stem = checkpoint.file_stem();
        let mut attempt = 0_u32;
        loop {
            let name = if attempt == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}_{attempt}.json")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&bytes)
                        .and_then(|()| file.sync_all())
                        .map_err(|source| CheckpointError::Io {
                            path: path.clone(),
                            source,
                        })?;
                    log::debug!("wrote {kind} checkpoint {}", path.display());
                    return Ok(path);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(source) => return Err(CheckpointError::Io { path, source }),
            }
        }
    }

    /// Loads a checkpoint of any supported shape.
    pub fn load<G, P, S, Q>(path: Q) -> Result<LoadedCheckpoint<G, P, S>, CheckpointError>
    where
        G: DeserializeOwned,
        P: DeserializeOwned,
        S: DeserializeOwned,
        Q: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| CheckpointError::Io {
            path: path.to_owned(),
            source,
        })?;
        let value: Value =
            serde_json::from_str(&text).map_err(|source| CheckpointError::Decode {
                path: path.to_owned(),
                source,
            })?;
        decode(&value).ok_or_else(|| CheckpointError::NoUsableGenome {
            path: path.to_owned(),
        })
    }

    /// Lists `*.json` files of the directory, sorted by file name.
    ///
    /// A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<CheckpointEntry>, CheckpointError> {
        let io_err = |source| CheckpointError::Io {
            path: self.dir.clone(),
            source,
        };
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_err(err)),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let path = entry.map_err(io_err)?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_file() || !name.ends_with(".json") {
                continue;
            }
            let parsed = parse_file_name(name);
            entries.push(CheckpointEntry {
                kind: parsed.map(|(kind, _, _)| kind),
                generation: parsed.map(|(_, generation, _)| generation),
                score: parsed.and_then(|(_, _, score)| score),
                path,
            });
        }
        entries.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        Ok(entries)
    }
}

fn parse_file_name(name: &str) -> Option<(CheckpointKind, u64, Option<u32>)> {
    let stem = name.strip_suffix(".json")?;
    let (kind, rest, score) = if let Some(rest) = stem.strip_prefix("score_") {
        let (score, rest) = rest.split_once("_gen_")?;
        (CheckpointKind::Milestone, rest, Some(score.parse().ok()?))
    } else {
        FILE_PREFIXES.iter().find_map(|(prefix, kind)| {
            stem.strip_prefix(prefix).map(|rest| (*kind, rest, None))
        })?
    };
    let generation = rest.split('_').next()?.parse().ok()?;
    Some((kind, generation, score))
}

fn decode<G, P, S>(value: &Value) -> Option<LoadedCheckpoint<G, P, S>>
where
    G: DeserializeOwned,
    P: DeserializeOwned,
    S: DeserializeOwned,
{
    if value.get("kind").is_some_and(Value::is_string)
        && let Ok(checkpoint) = Checkpoint::<G, P, S>::deserialize(value)
        && let Some(loaded) = from_tagged(checkpoint, value)
    {
        return Some(loaded);
    }
    if let Some(loaded) = from_untagged_snapshot(value) {
        return Some(loaded);
    }
    let genome = G::deserialize(value).ok().or_else(|| find_genome(value))?;
    Some(LoadedCheckpoint {
        kind: None,
        generation: None,
        timestamp: None,
        genome,
        fitness: None,
        score: None,
        population: None,
        species: None,
        unevaluated: false,
    })
}

fn from_tagged<G, P, S>(
    checkpoint: Checkpoint<G, P, S>,
    value: &Value,
) -> Option<LoadedCheckpoint<G, P, S>>
where
    G: DeserializeOwned,
{
    let kind = Some(checkpoint.kind());
    match checkpoint {
        Checkpoint::Milestone(record) | Checkpoint::Best(record) => Some(LoadedCheckpoint {
            kind,
            generation: Some(record.generation),
            timestamp: Some(record.timestamp),
            genome: record.genome,
            fitness: Some(record.fitness),
            score: record.score,
            population: None,
            species: None,
            unevaluated: false,
        }),
        Checkpoint::PerGeneration(snapshot)
        | Checkpoint::Autosave(snapshot)
        | Checkpoint::Error(snapshot)
        | Checkpoint::Interrupted(snapshot)
        | Checkpoint::Final(snapshot)
        | Checkpoint::ManualStop(snapshot) => {
            let (genome, fitness) = match snapshot.best_genome {
                Some(genome) => (genome, snapshot.best_fitness),
                None => (find_genome(value)?, None),
            };
            Some(LoadedCheckpoint {
                kind,
                generation: Some(snapshot.generation),
                timestamp: Some(snapshot.timestamp),
                genome,
                fitness,
                score: None,
                population: snapshot.population,
                species: snapshot.species,
                unevaluated: snapshot.unevaluated,
            })
        }
    }
}

fn from_untagged_snapshot<G, P, S>(value: &Value) -> Option<LoadedCheckpoint<G, P, S>>
where
    G: DeserializeOwned,
    P: DeserializeOwned,
    S: DeserializeOwned,
{
    let object = value.as_object()?;
    let (genome_field, genome) = ["best_genome", "genome"].into_iter().find_map(|field| {
        let genome = G::deserialize(object.get(field)?).ok()?;
        Some((field, genome))
    })?;
    let fitness_field = if genome_field == "best_genome" {
        "best_fitness"
    } else {
        "fitness"
    };
    #[expect(clippy::cast_possible_truncation)]
    let fitness = object
        .get(fitness_field)
        .and_then(Value::as_f64)
        .map(|f| f as f32);
    Some(LoadedCheckpoint {
        kind: None,
        generation: object.get("generation").and_then(Value::as_u64),
        timestamp: object.get("timestamp").and_then(parse_timestamp),
        genome,
        fitness,
        score: object
            .get("score")
            .and_then(Value::as_u64)
            .and_then(|s| u32::try_from(s).ok()),
        population: object.get("population").and_then(|v| P::deserialize(v).ok()),
        species: object.get("species").and_then(|v| S::deserialize(v).ok()),
        unevaluated: false,
    })
}

/// Depth-first search for the first nested object that decodes as a genome.
fn find_genome<G>(value: &Value) -> Option<G>
where
    G: DeserializeOwned,
{
    let children: Box<dyn Iterator<Item = &Value> + '_> = match value {
        Value::Object(map) => Box::new(map.values()),
        Value::Array(items) => Box::new(items.iter()),
        _ => return None,
    };
    for child in children {
        if child.is_object()
            && let Ok(genome) = G::deserialize(child)
        {
            return Some(genome);
        }
        if let Some(genome) = find_genome(child) {
            return Some(genome);
        }
    }
    None
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(number) => {
            #[expect(clippy::cast_possible_truncation)]
            let millis = (number.as_f64()? * 1000.0).round() as i64;
            DateTime::from_timestamp_millis(millis)
        }
        _ => None,
    }
}
