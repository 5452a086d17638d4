mod client;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::DaemonClient;
use shared::ipc::{Command, CommandPhrases, Response, StatusInfo};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "notevox")]
#[command(about = "CLI tool for the notevox voice-controlled editor daemon")]
struct Cli {
    /// Daemon socket, if not the default
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start listening for voice commands
    Start,
    /// Stop listening after the current capture
    Stop,
    Toggle,
    Status,
    /// Show the event log
    Logs,
    /// Show the trigger phrases
    Commands,
    /// Replace all four trigger phrases
    SetCommands {
        #[arg(long)]
        create: String,
        #[arg(long)]
        open: String,
        #[arg(long)]
        save: String,
        #[arg(long)]
        close: String,
    },
    /// Restore the built-in trigger phrases
    ResetCommands,
    /// Set the energy threshold (clamped to 50..=400)
    Sensitivity {
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
    /// Set the directory notes are created in
    NotesDir { path: PathBuf },
    ResetSettings,
}

fn print_status(info: &StatusInfo) {
    println!("Status:");
    println!("  Listening: {} ({})", info.is_listening, info.phase);
    match &info.current_file {
        Some(file) if info.document_open => println!("  Open note: {}", file),
        _ => println!("  Open note: none"),
    }
    println!("  Last action: {}", info.last_action);
    println!("  Sensitivity: {}", info.sensitivity);
    println!("  Notes folder: {}", info.notes_dir);
    if let Some(fault) = &info.fault {
        println!("  Halted: {}", fault);
    }
}

fn print_commands(phrases: &CommandPhrases) {
    println!("Commands:");
    println!("  create: {}", phrases.create);
    println!("  open:   {}", phrases.open);
    println!("  save:   {}", phrases.save);
    println!("  close:  {}", phrases.close);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = DaemonClient::new(cli.socket);

    let command = match cli.command {
        Commands::Start => Command::Start,
        Commands::Stop => Command::Stop,
        Commands::Toggle => Command::Toggle,
        Commands::Status => Command::Status,
        Commands::Logs => Command::Logs,
        Commands::Commands => Command::GetCommands,
        Commands::SetCommands {
            create,
            open,
            save,
            close,
        } => Command::SetCommands(CommandPhrases {
            create,
            open,
            save,
            close,
        }),
        Commands::ResetCommands => Command::ResetCommands,
        Commands::Sensitivity { value } => Command::SetSensitivity(value),
        Commands::NotesDir { path } => {
            let path = std::fs::canonicalize(&path).unwrap_or(path);
            Command::SetNotesDir(path.display().to_string())
        }
        Commands::ResetSettings => Command::ResetSettings,
    };

    match client.send_command(command).await {
        Ok(Response::Ok) => {
            println!("Success");
        }
        Ok(Response::Status(info)) => print_status(&info),
        Ok(Response::Commands(phrases)) => print_commands(&phrases),
        Ok(Response::Logs(entries)) => {
            for (n, entry) in entries.iter().enumerate() {
                println!("{:>4}  {}", n + 1, entry);
            }
        }
        Ok(Response::Error(msg)) => {
            eprintln!("Error: {}", msg);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to talk to notevoxd: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
