//! Main entry point for the zipvfs CLI.
//!
//! Mounts a ZIP archive — local file or HTTP URL — as a read-only
//! filesystem and lists, pipes, or extracts its members.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use zipvfs::{ByteSource, Cli, FileSource, HttpSource, ZipArchive};

/// Read/write chunk size for streaming member data.
const COPY_CHUNK: usize = 8 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.is_http_url() {
        let source = HttpSource::open(cli.file.clone()).await?;
        let before = source.transferred_bytes();
        let source = Arc::new(source);

        run(Arc::clone(&source), &cli).await?;

        if !cli.is_quiet() {
            let transferred = source.transferred_bytes() - before;
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
        }
    } else {
        let source = Arc::new(FileSource::open(Path::new(&cli.file))?);
        run(source, &cli).await?;
    }

    Ok(())
}

/// Mount the archive and dispatch on the requested mode.
async fn run<S: ByteSource + 'static>(source: Arc<S>, cli: &Cli) -> Result<()> {
    let mut archive = ZipArchive::open(source, cli.file.clone())
        .await
        .with_context(|| format!("cannot open {}", cli.file))?;

    if cli.list || cli.verbose {
        list(&archive, cli.verbose);
        return Ok(());
    }
    if cli.pipe {
        return pipe(&mut archive, cli).await;
    }
    extract(&mut archive, cli).await
}

/// Print the archive index, plainly or as a verbose table.
fn list<S: ByteSource>(archive: &ZipArchive<S>, verbose: bool) {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>16}  Name",
            "Length", "Size", "Cmpr", "Modified"
        );
        println!("{}", "-".repeat(64));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut count = 0usize;

    for info in archive.entries() {
        if !verbose {
            println!("{}", info.name);
            continue;
        }

        let ratio = if info.uncompressed_size > 0 {
            100 - (info.compressed_size as u64 * 100 / info.uncompressed_size as u64)
        } else {
            0
        };
        // Mark symlink members like `ls -F` does.
        let marker = if info.is_symlink { "@" } else { "" };
        println!(
            "{:>10}  {:>10}  {:>4}%  {:>16}  {}{}",
            info.uncompressed_size,
            info.compressed_size,
            ratio,
            format_mtime(info.last_modified),
            info.name,
            marker
        );

        if !info.name.ends_with('/') {
            total_uncompressed += info.uncompressed_size as u64;
            total_compressed += info.compressed_size as u64;
            count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(64));
        println!(
            "{:>10}  {:>10}  {:>23}  {} files",
            total_uncompressed, total_compressed, "", count
        );
    }
}

/// Stream the requested members (default: all of them) to stdout.
async fn pipe<S: ByteSource>(archive: &mut ZipArchive<S>, cli: &Cli) -> Result<()> {
    let names: Vec<String> = if cli.paths.is_empty() {
        archive
            .entries()
            .filter(|info| !info.name.ends_with('/'))
            .map(|info| info.name.to_string())
            .collect()
    } else {
        cli.paths.clone()
    };

    let mut stdout = tokio::io::stdout();
    for name in &names {
        let mut file = archive
            .open_read(name)
            .await
            .with_context(|| format!("cannot open {name}"))?;

        let mut buf = [0u8; COPY_CHUNK];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            stdout.write_all(&buf[..n]).await?;
        }
    }
    stdout.flush().await?;
    Ok(())
}

/// Extract members to the filesystem.
async fn extract<S: ByteSource>(archive: &mut ZipArchive<S>, cli: &Cli) -> Result<()> {
    // Collect names first; extraction needs the archive mutably.
    let names: Vec<String> = archive
        .entries()
        .filter(|info| !info.name.ends_with('/'))
        .filter(|info| selected(&cli.paths, info.name))
        .map(|info| info.name.to_string())
        .collect();

    for name in names {
        let output = match &cli.dest {
            Some(dir) => PathBuf::from(dir).join(&name),
            None => PathBuf::from(&name),
        };

        if output.exists() {
            if cli.never_overwrite || !cli.overwrite {
                if !cli.is_quiet() {
                    eprintln!("Skipping: {name} (use -o to overwrite)");
                }
                continue;
            }
        }

        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        if !cli.is_quiet() {
            println!("  extracting: {name}");
        }

        let mut file = archive
            .open_read(&name)
            .await
            .with_context(|| format!("cannot open {name}"))?;
        let mut out = tokio::fs::File::create(&output).await?;
        let mut buf = [0u8; COPY_CHUNK];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).await?;
        }
        out.flush().await?;
    }

    Ok(())
}

/// True when `name` matches the requested paths (or none were given).
fn selected(paths: &[String], name: &str) -> bool {
    if paths.is_empty() {
        return true;
    }
    let basename = name.rsplit('/').next().unwrap_or(name);
    paths.iter().any(|p| p == name || p == basename)
}

/// Render an epoch timestamp for the verbose listing.
fn format_mtime(mtime: Option<i64>) -> String {
    use chrono::TimeZone;
    mtime
        .and_then(|secs| chrono::Local.timestamp_opt(secs, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "----------------".to_string())
}

/// Human-readable byte count for the transfer summary.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
