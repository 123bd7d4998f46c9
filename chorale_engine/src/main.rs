// Chorale engine CLI.
//
// Usage:
//   chorale voice <score.json> [--config engine.json] [--out voiced.json]
//     Voice every chord of the score's progression and print the result.
//   chorale edit <score.json> --note N --pitch P [--choice keep|cancel|chord:ID]
//                [--config engine.json] [--out edited.json]
//     Run one note edit through conflict detection. An unvoiced progression
//     is voiced first. Without --choice, a conflict is shown and the
//     resolution is read from stdin.
//
// Pitches are MIDI numbers or note names (C4 = 60). Logging goes to stderr
// and is controlled by RUST_LOG (e.g. RUST_LOG=chorale_engine=debug).

use chorale_engine::{
    ConflictPresenter, ConflictSession, EditOutcome, EditSession, EngineConfig, MemoryScore,
    Resolution, revoice_from, total_motion, voice_progression,
};
use chorale_theory::{ChordId, NoteId, Pitch};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "chorale", about = "SATB voicing and voice-leading conflict checks")]
struct Cli {
    /// Engine config (register bounds, session threshold) as JSON.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the resulting score here as JSON.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Voice the progression in a score file.
    Voice { score: PathBuf },
    /// Move one note and resolve any conflict it causes.
    Edit {
        score: PathBuf,
        #[arg(long)]
        note: u32,
        #[arg(long, value_parser = parse_pitch)]
        pitch: Pitch,
        /// keep, cancel, or chord:ID
        #[arg(long, value_parser = parse_choice)]
        choice: Option<Resolution>,
    },
}

fn parse_pitch(s: &str) -> Result<Pitch, String> {
    match s.parse::<i32>() {
        Ok(n) => Pitch::new(n).map_err(|e| e.to_string()),
        Err(_) => Pitch::parse(s).map_err(|e| e.to_string()),
    }
}

fn parse_choice(s: &str) -> Result<Resolution, String> {
    match s.trim() {
        "keep" | "k" => Ok(Resolution::KeptAsTension),
        "cancel" | "c" => Ok(Resolution::Cancelled),
        other => other
            .strip_prefix("chord:")
            .and_then(|id| id.parse().ok())
            .map(|id| Resolution::ChordChanged {
                new_chord: ChordId(id),
            })
            .ok_or_else(|| format!("expected keep, cancel or chord:ID, got `{other}`")),
    }
}

fn main() {
    if let Err(e) = setup_tracing() {
        eprintln!("Failed to initialise logging: {e}");
    }
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn setup_tracing() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .try_init()
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let score = match cli.command {
        Command::Voice { score } => {
            let mut score = load_score(&score)?;
            let assignments = voice_progression(&mut score.chords, &config.bounds)?;
            for (chord, assignment) in score.chords.iter().zip(&assignments) {
                let dropped: Vec<String> = assignment
                    .dropped
                    .iter()
                    .map(|t| chorale_theory::pitch::pitch_class_name(t.pitch_class).to_string())
                    .collect();
                print!("{:>4}  {:<12} {}", chord.start, chord.symbol(), assignment.voicing);
                if let Some(motion) = assignment.motion {
                    print!("  motion {motion}");
                }
                if !dropped.is_empty() {
                    print!("  (omits {})", dropped.join(", "));
                }
                println!();
            }
            println!("total motion: {}", total_motion(&score.chords));
            score
        }
        Command::Edit {
            score,
            note,
            pitch,
            choice,
        } => {
            let mut score = load_score(&score)?;
            edit(&mut score, NoteId(note), pitch, choice, &config)?;
            score
        }
    };

    if let Some(out) = &cli.out {
        std::fs::write(out, serde_json::to_string_pretty(&score)?)?;
        info!(path = %out.display(), "wrote score");
    }
    Ok(())
}

fn load_score(path: &Path) -> Result<MemoryScore, Box<dyn Error>> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("reading {}: {e}", path.display()))?;
    Ok(MemoryScore::from_json(&data)?)
}

fn edit(
    score: &mut MemoryScore,
    note: NoteId,
    pitch: Pitch,
    choice: Option<Resolution>,
    config: &EngineConfig,
) -> Result<(), Box<dyn Error>> {
    if score.chords.iter().any(|c| c.voicing.is_none()) {
        voice_progression(&mut score.chords, &config.bounds)?;
    }
    let session = EditSession::begin(&*score, note)?;
    let pending = match session.submit(&mut *score, pitch, config)? {
        EditOutcome::Committed { result, .. } => {
            println!("{note} -> {pitch}: {}", result.diagnostic.describe());
            return Ok(());
        }
        EditOutcome::Pending(pending) => pending,
    };

    let old_chord = pending.chord().id;
    let outcome = match choice {
        Some(resolution) => pending.resolve(&mut *score, resolution),
        None => pending.present(&mut StdinPresenter, &mut *score),
    }
    .map_err(|e| e.error)?;
    println!("{note} -> {} ({})", outcome.committed, outcome.resolution);

    if let Resolution::ChordChanged { new_chord } = outcome.resolution
        && let Some(index) = score.chord_index(new_chord)
    {
        revoice_from(&mut score.chords, index, &config.bounds)?;
        info!(%old_chord, %new_chord, "re-voiced after chord change");
        if let Some(voicing) = score.chords[index].voicing {
            println!("{new_chord} voiced as {voicing}");
        }
    }
    Ok(())
}

/// Shows the conflict on stdout and reads the choice from stdin.
/// End of input counts as cancel.
struct StdinPresenter;

impl ConflictPresenter for StdinPresenter {
    fn choose(&mut self, session: &ConflictSession) -> Resolution {
        let result = session.result();
        println!(
            "{} conflict: {}",
            result.severity,
            result.diagnostic.describe()
        );
        let chord = session.chord();
        match chord.voicing {
            Some(voicing) => println!("  {} at {}: {voicing}", chord.symbol(), chord.start),
            None => println!("  {} at {}", chord.symbol(), chord.start),
        }
        let (prev, next) = session.neighbors();
        let show = |n: Option<&chorale_theory::MelodicNote>| {
            n.map_or_else(|| "-".to_string(), |n| n.pitch.to_string())
        };
        println!(
            "  {}: {} -> [{} => {}] -> {}",
            session.voice(),
            show(prev),
            session.original_pitch(),
            session.proposed_pitch(),
            show(next)
        );
        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            print!("[k]eep as tension, [c]ancel, or chord:ID > ");
            let _ = io::stdout().flush();
            let Some(Ok(line)) = lines.next() else {
                return Resolution::Cancelled;
            };
            match parse_choice(&line) {
                Ok(resolution) => return resolution,
                Err(e) => println!("{e}"),
            }
        }
    }
}
