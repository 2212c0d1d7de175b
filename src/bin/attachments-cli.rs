#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for listing and downloading IMAP attachments (read-only)

use anyhow::Context;
use clap::{Parser, Subcommand};
use imap_attachments::{AttachmentPayload, MailboxClient, MailboxConfig, MessageSummary};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "attachments-cli")]
#[command(about = "List and download email attachments over IMAP")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the configured credentials work
    Check,

    /// List recent messages that have attachments
    List {
        /// Number of most recent messages to inspect
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show a single message by UID
    Show {
        /// Message UID
        uid: u32,
    },

    /// Save all attachments of a message
    Download {
        /// Message UID
        uid: u32,

        /// Directory to write the files into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedFile {
    filename: String,
    content_type: String,
    size: usize,
    path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = MailboxConfig::from_env()?;
    let mut client = MailboxClient::new(config);

    let result = run(&mut client, &args).await;
    client.disconnect().await;
    result
}

async fn run(client: &mut MailboxClient, args: &Args) -> anyhow::Result<()> {
    match &args.command {
        Command::Check => cmd_check(client, args).await,
        Command::List { limit } => {
            connect(client).await?;
            cmd_list(client, args, *limit).await
        }
        Command::Show { uid } => {
            connect(client).await?;
            cmd_show(client, args, *uid).await
        }
        Command::Download { uid, out } => {
            connect(client).await?;
            cmd_download(client, args, *uid, out).await
        }
    }
}

async fn connect(client: &mut MailboxClient) -> anyhow::Result<()> {
    client.connect().await.context("Failed to reach mailbox")
}

async fn cmd_check(client: &mut MailboxClient, args: &Args) -> anyhow::Result<()> {
    let ok = client.test_connection().await;

    if args.json {
        println!("{}", serde_json::json!({ "ok": ok }));
    } else {
        println!("{}", if ok { "ok" } else { "failed" });
    }

    if ok {
        Ok(())
    } else {
        anyhow::bail!("Failed to reach mailbox")
    }
}

async fn cmd_list(client: &mut MailboxClient, args: &Args, limit: usize) -> anyhow::Result<()> {
    let messages = client.list_attachment_messages(limit).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else {
        print_message_table(&messages);
    }

    Ok(())
}

async fn cmd_show(client: &mut MailboxClient, args: &Args, uid: u32) -> anyhow::Result<()> {
    let message = client
        .message_details(uid)
        .await?
        .with_context(|| format!("No message with UID {uid}"))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        print_message_detail(&message);
    }

    Ok(())
}

async fn cmd_download(
    client: &mut MailboxClient,
    args: &Args,
    uid: u32,
    out: &Path,
) -> anyhow::Result<()> {
    let payloads = client.download_attachments(uid).await?;

    tokio::fs::create_dir_all(out)
        .await
        .with_context(|| format!("Failed to create {}", out.display()))?;

    let mut saved = Vec::with_capacity(payloads.len());
    for payload in &payloads {
        let path = unique_path(out, &payload.safe_filename()).await;
        tokio::fs::write(&path, &payload.content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        saved.push(saved_file(payload, path));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else if saved.is_empty() {
        println!("No attachments found.");
    } else {
        for file in &saved {
            println!("{} ({} bytes)", file.path.display(), file.size);
        }
    }

    Ok(())
}

fn saved_file(payload: &AttachmentPayload, path: PathBuf) -> SavedFile {
    SavedFile {
        filename: payload.filename.clone(),
        content_type: payload.content_type.clone(),
        size: payload.size(),
        path,
    }
}

/// `dir/name`, or `dir/stem (n).ext` if that already exists.
async fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    let mut n = 1;
    loop {
        let numbered = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = dir.join(numbered);
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

fn print_message_table(messages: &[MessageSummary]) {
    if messages.is_empty() {
        println!("No messages with attachments found.");
        return;
    }

    let header = format!(
        "{:<8} {:<17} {:<28} {:<5} {}",
        "UID", "Date", "From", "Att", "Subject"
    );
    println!("{header}");
    println!("{}", "-".repeat(100));

    for message in messages {
        println!(
            "{:<8} {:<17} {:<28} {:<5} {}",
            message.uid,
            format_date(message),
            truncate(&message.from, 26),
            message.attachments.len(),
            truncate(&message.subject, 40),
        );
    }

    println!("\n{} message(s)", messages.len());
}

fn print_message_detail(message: &MessageSummary) {
    println!("UID:     {}", message.uid);
    println!("Date:    {}", format_date(message));
    println!("From:    {}", message.from);
    println!("Subject: {}", message.subject);
    println!("Msg-ID:  {}", message.message_id);

    if !message.attachments.is_empty() {
        println!("\n--- Attachments ---");
        for attachment in &message.attachments {
            println!(
                "  {} ({}, {} bytes)",
                attachment.filename, attachment.content_type, attachment.size
            );
        }
    }

    println!("\n--- Body ---\n");
    println!("{}", message.body.as_deref().unwrap_or_default());
}

fn format_date(message: &MessageSummary) -> String {
    message
        .date
        .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
