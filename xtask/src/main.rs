use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use fs_err as fs;
use std::io::Write;
use std::process::Command as ProcessCommand;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

#[derive(Debug, Parser)]
#[command(name = "xtask", about = "Workspace helper tasks")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print schema identifiers used by statedump artifacts.
    PrintSchemas,
    /// Zip a statedump directory (e.g. a template) into an importable archive.
    PackArchive {
        /// Directory to pack; entry names are relative to it.
        dir: Utf8PathBuf,
        #[arg(long, default_value = "statedump.zip")]
        out: Utf8PathBuf,
    },
    /// Run the cucumber acceptance suite.
    Acceptance,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::PrintSchemas => {
            println!("{}", statedump_types::schema::STATEDUMP_PLAN_V1);
            println!("{}", statedump_types::schema::STATEDUMP_DECISIONS_V1);
            println!("{}", statedump_types::schema::STATEDUMP_RESULT_V1);
        }
        Command::PackArchive { dir, out } => {
            let files = collect_files(&dir)?;
            let bytes = pack(&dir, &files)?;
            fs::write(&out, bytes).with_context(|| format!("write {out}"))?;
            println!("packed {} files into {out}", files.len());
        }
        Command::Acceptance => {
            let status = ProcessCommand::new("cargo")
                .args(["test", "-p", "statedump-bdd", "--test", "cucumber"])
                .status()
                .context("run cucumber suite")?;
            if !status.success() {
                anyhow::bail!("acceptance failed");
            }
        }
    }
    Ok(())
}

/// Regular files under `dir`, relative and sorted so archives are reproducible.
fn collect_files(dir: &Utf8Path) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let path = Utf8PathBuf::from_path_buf(entry.path())
                .map_err(|p| anyhow::anyhow!("non UTF-8 path {}", p.display()))?;
            if entry.file_type()?.is_dir() {
                pending.push(path);
            } else {
                out.push(path.strip_prefix(dir)?.to_path_buf());
            }
        }
    }
    out.sort();
    Ok(out)
}

fn pack(dir: &Utf8Path, files: &[Utf8PathBuf]) -> anyhow::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for rel in files {
        let name = rel.components().map(|c| c.as_str()).collect::<Vec<_>>().join("/");
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("add {name}"))?;
        zip.write_all(&fs::read(dir.join(rel))?)?;
    }
    Ok(zip.finish()?.into_inner())
}
