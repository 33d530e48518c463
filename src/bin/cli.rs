//! persistkv CLI
//!
//! Inspect and edit a storage directory from the shell. Values are JSON.

use clap::{Parser, Subcommand};
use persistkv::{Config, JsonSerializer, Store, TextEncoding};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

/// persistkv CLI
#[derive(Parser, Debug)]
#[command(name = "persistkv-cli")]
#[command(about = "CLI for persistkv storage directories")]
#[command(version)]
struct Args {
    /// Storage directory
    #[arg(short, long, default_value = persistkv::config::DEFAULT_DIR)]
    dir: String,

    /// Text encoding of entry files (utf8, utf16le, latin1)
    #[arg(short, long, default_value = "utf8")]
    encoding: TextEncoding,

    /// Write indented JSON
    #[arg(long)]
    pretty: bool,

    /// Log every store operation
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value: JSON, or a bare string if it does not parse
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List all keys
    Keys,

    /// Print all values
    Values,

    /// Print the number of keys
    Len,

    /// Delete every key
    Clear,
}

fn main() {
    let args = Args::parse();

    // Initialize tracing/logging
    let default_filter = if args.verbose {
        "info,persistkv=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let serializer = if args.pretty {
        JsonSerializer::pretty()
    } else {
        JsonSerializer::new()
    };

    let config = Config::<Value>::builder()
        .dir(&args.dir)
        .serializer(serializer)
        .text_encoding(args.encoding)
        .logging(args.verbose)
        .build();

    let store = match Store::open(config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&store, args.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = store.shutdown() {
        tracing::error!("Failed to flush store: {}", e);
        std::process::exit(1);
    }
}

fn run(store: &Store<Value>, command: Commands) -> persistkv::Result<()> {
    match command {
        Commands::Get { key } => match store.get_item(&key) {
            Some(value) => println!("{}", value),
            None => println!("(nil)"),
        },
        Commands::Set { key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            store.set_item(&key, value)?;
            println!("OK");
        }
        Commands::Del { key } => {
            store.remove_item(&key)?;
            println!("OK");
        }
        Commands::Keys => {
            let mut keys = store.keys();
            keys.sort();
            for key in keys {
                println!("{}", key);
            }
        }
        Commands::Values => {
            let mut entries = store.entries();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (_, value) in entries {
                println!("{}", value);
            }
        }
        Commands::Len => println!("{}", store.length()),
        Commands::Clear => {
            store.clear()?;
            println!("OK");
        }
    }
    Ok(())
}
