//! Inspector for shardgraph keys, write batches and shard configuration files.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use shardgraph::storage::keys::{self, KeyKind};
use shardgraph::storage::{decode_batch, BatchOp, IndexManager, MemCatalog, ShardConfig};
use shardgraph::types::{EdgeType, PartitionId, SpaceId};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "shardgraph-inspect",
    version,
    about = "Encode and decode shardgraph storage keys and batches",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Encode the record key (or prefix) of an edge")]
    EdgeKey(EdgeKeyCmd),

    #[command(about = "Classify a hex-encoded key and split it into components")]
    Classify {
        #[arg(long, help = "Vertex id width of the space")]
        vid_len: usize,
        #[arg(value_name = "HEX")]
        key: String,
    },

    #[command(about = "Decode a hex-encoded write batch")]
    DecodeBatch {
        #[arg(value_name = "HEX")]
        payload: String,
    },

    #[command(about = "Load a shard configuration file and summarise it")]
    CheckConfig {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct EdgeKeyCmd {
    #[arg(long, help = "Vertex id width of the space")]
    vid_len: usize,
    #[arg(long, default_value_t = 1)]
    part: u32,
    #[arg(long)]
    src: String,
    #[arg(long = "type", allow_hyphen_values = true, help = "Edge type; negative for reverse edges")]
    edge_type: i32,
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    rank: i64,
    #[arg(long)]
    dst: String,
    #[arg(long, help = "Treat --src and --dst as hex")]
    hex_ids: bool,
    #[arg(long, help = "Print the scan prefix instead of the record key")]
    prefix: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct KeyReport {
    key: String,
    len: usize,
}

#[derive(Serialize)]
struct ClassifyReport {
    kind: &'static str,
    part: Option<u32>,
    src: Option<String>,
    edge_type: Option<i32>,
    rank: Option<i64>,
    dst: Option<String>,
}

#[derive(Serialize)]
struct BatchOpReport {
    op: &'static str,
    key: String,
    value: Option<String>,
}

#[derive(Serialize)]
struct SpaceReport {
    id: u32,
    vid_len: usize,
    edge_types: usize,
    indexes: Vec<String>,
}

#[derive(Serialize)]
struct ConfigReport {
    log_conflict_keys: bool,
    spaces: Vec<SpaceReport>,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::EdgeKey(cmd) => {
            let report = edge_key(&cmd)?;
            emit(cli.format, &report, || println!("{}", report.key))?;
        }
        Command::Classify { vid_len, key } => {
            let raw = hex::decode(key.trim())?;
            let report = classify(vid_len, &raw);
            emit(cli.format, &report, || print_classify_text(&report))?;
        }
        Command::DecodeBatch { payload } => {
            let raw = hex::decode(payload.trim())?;
            let ops: Vec<BatchOpReport> = decode_batch(&raw)?
                .into_iter()
                .map(|op| match op {
                    BatchOp::Put(key, value) => BatchOpReport {
                        op: "put",
                        key: hex::encode(key),
                        value: Some(hex::encode(value)),
                    },
                    BatchOp::Remove(key) => BatchOpReport {
                        op: "remove",
                        key: hex::encode(key),
                        value: None,
                    },
                })
                .collect();
            emit(cli.format, &ops, || {
                for op in &ops {
                    match &op.value {
                        Some(value) => println!("{} {} = {}", op.op, op.key, value),
                        None => println!("{} {}", op.op, op.key),
                    }
                }
            })?;
        }
        Command::CheckConfig { path } => {
            let report = check_config(&path)?;
            emit(cli.format, &report, || print_config_text(&report))?;
        }
    }
    Ok(())
}

fn edge_key(cmd: &EdgeKeyCmd) -> Result<KeyReport, Box<dyn Error>> {
    let (src, dst) = if cmd.hex_ids {
        (hex::decode(&cmd.src)?, hex::decode(&cmd.dst)?)
    } else {
        (cmd.src.as_bytes().to_vec(), cmd.dst.as_bytes().to_vec())
    };
    if !keys::is_valid_vid_len(cmd.vid_len, &src, &dst) {
        return Err(format!(
            "vertex ids must be {} bytes (src {}, dst {})",
            cmd.vid_len,
            src.len(),
            dst.len()
        )
        .into());
    }
    let part = PartitionId(cmd.part);
    let edge_type = EdgeType(cmd.edge_type);
    let key = if cmd.prefix {
        keys::edge_prefix(cmd.vid_len, part, &src, edge_type, cmd.rank, &dst)
    } else {
        keys::edge_key(cmd.vid_len, part, &src, edge_type, cmd.rank, &dst)
    };
    Ok(KeyReport {
        len: key.len(),
        key: hex::encode(key),
    })
}

fn classify(vid_len: usize, raw: &[u8]) -> ClassifyReport {
    let kind = match keys::classify(vid_len, raw) {
        KeyKind::Lock => "lock",
        KeyKind::EdgeRecord => "edge-record",
        KeyKind::Other if keys::is_deferred_deletion(raw) => "deferred-deletion",
        KeyKind::Other => "other",
    };
    match keys::parse_edge_key(vid_len, raw) {
        Some(parsed) => ClassifyReport {
            kind,
            part: Some(parsed.part.0),
            src: Some(parsed.src.escape_ascii().to_string()),
            edge_type: Some(parsed.edge_type.0),
            rank: Some(parsed.rank),
            dst: Some(parsed.dst.escape_ascii().to_string()),
        },
        None => ClassifyReport {
            kind,
            part: None,
            src: None,
            edge_type: None,
            rank: None,
            dst: None,
        },
    }
}

fn check_config(path: &Path) -> Result<ConfigReport, Box<dyn Error>> {
    let config = ShardConfig::load(path)?;
    let catalog = MemCatalog::from_config(&config)?;
    debug!(spaces = config.spaces.len(), "inspect.config_loaded");
    let mut spaces = Vec::with_capacity(config.spaces.len());
    for space in &config.spaces {
        let indexes = catalog
            .edge_indexes(SpaceId(space.id))?
            .iter()
            .map(|index| index.name.clone())
            .collect();
        spaces.push(SpaceReport {
            id: space.id,
            vid_len: space.vid_len,
            edge_types: space.edges.len(),
            indexes,
        });
    }
    Ok(ConfigReport {
        log_conflict_keys: config.mutate.log_conflict_keys,
        spaces,
    })
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_classify_text(report: &ClassifyReport) {
    println!("kind: {}", report.kind);
    if let (Some(part), Some(src), Some(edge_type), Some(rank), Some(dst)) = (
        report.part,
        &report.src,
        report.edge_type,
        report.rank,
        &report.dst,
    ) {
        println!("  part={part} src={src} type={edge_type} rank={rank} dst={dst}");
    }
}

fn print_config_text(report: &ConfigReport) {
    println!("log_conflict_keys={}", report.log_conflict_keys);
    for space in &report.spaces {
        println!(
            "space {} vid_len={} edge_types={} indexes=[{}]",
            space.id,
            space.vid_len,
            space.edge_types,
            space.indexes.join(", ")
        );
    }
}
