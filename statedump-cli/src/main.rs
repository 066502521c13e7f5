mod config;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use config::{CliOverrides, ConfigMerger};
use fs_err as fs;
use statedump_core::adapters::RequirePrincipal;
use statedump_core::{Decisions, ImportError, ImportOptions, ImportSource, Importer};
use statedump_render::{render_plan_md, render_result_md};
use statedump_types::{ImportPlan, ImportResult};
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "statedump",
    version,
    about = "Plan-first import of statedump archives into a configuration store."
)]
struct Cli {
    /// Principal performing the operation (default: $USER).
    #[arg(long, global = true, env = "STATEDUMP_PRINCIPAL")]
    principal: Option<String>,

    /// Directory containing statedump.toml (default: current directory).
    #[arg(long, global = true, default_value = ".")]
    config_dir: Utf8PathBuf,

    /// Configuration store root (overrides [store] root).
    #[arg(long, global = true)]
    store: Option<Utf8PathBuf>,

    /// Templates base directory (overrides [templates] dir).
    #[arg(long, global = true)]
    templates_dir: Option<Utf8PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Dry run: show what an import would do. Never writes to the store.
    Plan(PlanArgs),
    /// Import using a decisions file written after reviewing the plan.
    Commit(CommitArgs),
    /// Plan and import in one go.
    Import(ImportArgs),
    /// Permanently disable statedump import.
    Lockdown,
    /// Show whether statedump import is still available.
    Status,
    /// List the available templates.
    Templates,
}

#[derive(Debug, Args)]
#[group(multiple = false)]
struct SourceArgs {
    /// Zip archive to import.
    #[arg(long)]
    archive: Option<Utf8PathBuf>,

    /// Already extracted statedump directory.
    #[arg(long)]
    dir: Option<Utf8PathBuf>,

    /// Template name under the templates directory.
    #[arg(long)]
    template: Option<String>,
}

#[derive(Debug, Args)]
struct ImportFlags {
    /// Overrides file (default: overrides.properties inside the source).
    #[arg(long)]
    overrides: Option<Utf8PathBuf>,

    /// Cap on decompressed archive bytes.
    #[arg(long)]
    max_total_bytes: Option<u64>,

    /// Replace overwritten crypto tokens instead of merging into them.
    #[arg(long, default_value_t = false)]
    no_merge_crypto_tokens: bool,
}

#[derive(Debug, Parser)]
struct PlanArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    flags: ImportFlags,

    /// Where to write the plan JSON; a markdown rendering is written next to it.
    #[arg(long, default_value = "statedump-plan.json")]
    out: Utf8PathBuf,
}

#[derive(Debug, Parser)]
struct CommitArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    flags: ImportFlags,

    /// Decisions JSON (resolutions and secrets).
    #[arg(long)]
    decisions: Utf8PathBuf,

    /// Lock down statedump import after a successful import.
    #[arg(long, default_value_t = false)]
    lockdown: bool,

    /// Where to write the result JSON; a markdown rendering is written next to it.
    #[arg(long)]
    out: Option<Utf8PathBuf>,
}

#[derive(Debug, Parser)]
struct ImportArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    flags: ImportFlags,

    /// Overwrite every conflict and give every crypto token the placeholder
    /// secret. The secrets must be changed afterwards.
    #[arg(long, default_value_t = false)]
    auto_resolve: bool,

    /// Lock down statedump import after a successful import. Without a
    /// source, only locks down.
    #[arg(long, default_value_t = false)]
    lockdown: bool,

    /// Where to write the result JSON; a markdown rendering is written next to it.
    #[arg(long)]
    out: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match real_main() {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn exit_code(e: &anyhow::Error) -> u8 {
    e.downcast_ref::<ImportError>()
        .map(ImportError::exit_code)
        .unwrap_or(1)
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let principal = principal(&cli);
    let overrides = match &cli.cmd {
        Command::Plan(a) => cli_overrides(&cli, Some(&a.flags), false),
        Command::Commit(a) => cli_overrides(&cli, Some(&a.flags), a.lockdown),
        Command::Import(a) => cli_overrides(&cli, Some(&a.flags), a.lockdown),
        _ => cli_overrides(&cli, None, false),
    };

    let file_config =
        config::load_or_default(&cli.config_dir).context("load statedump.toml config")?;
    let merged = ConfigMerger::new(file_config, cli.config_dir.clone()).merge(&overrides);
    debug!(settings = ?merged.settings, "merged config");

    let mut importer = Importer::from_settings(merged.settings)?;
    if !merged.principals.is_empty() {
        importer = importer.with_authorizer(RequirePrincipal::new(merged.principals));
    }

    match cli.cmd {
        Command::Plan(args) => cmd_plan(&importer, &principal?, args),
        Command::Commit(args) => cmd_commit(&importer, &principal?, args),
        Command::Import(args) => cmd_import(&importer, &principal?, args),
        Command::Lockdown => cmd_lockdown(&importer, &principal?),
        Command::Status => cmd_status(&importer),
        Command::Templates => cmd_templates(&importer, &principal?),
    }
}

fn principal(cli: &Cli) -> anyhow::Result<String> {
    match &cli.principal {
        Some(p) if !p.trim().is_empty() => Ok(p.clone()),
        _ => std::env::var("USER")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .context("no principal: pass --principal or set USER"),
    }
}

fn cli_overrides(cli: &Cli, flags: Option<&ImportFlags>, lockdown: bool) -> CliOverrides {
    CliOverrides {
        store_root: cli.store.clone(),
        templates_dir: cli.templates_dir.clone(),
        max_total_bytes: flags.and_then(|f| f.max_total_bytes),
        no_merge_crypto_tokens: flags.is_some_and(|f| f.no_merge_crypto_tokens),
        lockdown_after_import: lockdown,
    }
}

fn cmd_plan(importer: &Importer, principal: &str, args: PlanArgs) -> anyhow::Result<()> {
    let source = read_source(&args.source)?
        .context("a source is required: --archive, --dir or --template")?;
    let options = import_options(importer, &args.flags);

    let plan = importer.dry_run(principal, &source, &options)?;
    write_plan(&args.out, &plan)?;

    println!(
        "plan: {} objects, {} conflicts, {} secrets needed",
        plan.summary.objects_total, plan.summary.conflicts, plan.summary.passwords_needed
    );
    for notice in &plan.notices {
        println!("  {notice}");
    }
    info!("wrote plan to {}", args.out);
    Ok(())
}

fn cmd_commit(importer: &Importer, principal: &str, args: CommitArgs) -> anyhow::Result<()> {
    let source = read_source(&args.source)?
        .context("a source is required: --archive, --dir or --template")?;
    let mut options = import_options(importer, &args.flags);
    options.lockdown_after_import |= args.lockdown;

    let text = fs::read_to_string(&args.decisions)
        .with_context(|| format!("read {}", args.decisions))?;
    let decisions: Decisions = serde_json::from_str(&text)
        .with_context(|| format!("parse decisions {}", args.decisions))?;

    let result = importer.commit(principal, &source, &decisions, &options)?;
    report_result(&result, args.out.as_deref())
}

fn cmd_import(importer: &Importer, principal: &str, args: ImportArgs) -> anyhow::Result<()> {
    let Some(source) = read_source(&args.source)? else {
        if args.lockdown {
            return cmd_lockdown(importer, principal);
        }
        anyhow::bail!("a source is required: --archive, --dir or --template");
    };
    let mut options = import_options(importer, &args.flags);
    options.lockdown_after_import |= args.lockdown;

    let placeholder = importer.settings().placeholder_secret.clone();
    let auto_resolve = args.auto_resolve;
    let result = importer.import_with(principal, &source, &options, |plan| {
        if !auto_resolve {
            return Decisions::new();
        }
        for conflict in &plan.conflicts {
            warn!(key = %conflict.key, "overwriting existing object");
        }
        for req in &plan.passwords_needed {
            warn!(key = %req.key, "placeholder secret set; change it after the import");
        }
        Decisions::overwrite_all(plan, &placeholder)
    })?;
    report_result(&result, args.out.as_deref())
}

fn cmd_lockdown(importer: &Importer, principal: &str) -> anyhow::Result<()> {
    importer.lockdown(principal)?;
    println!("statedump import is locked down");
    Ok(())
}

fn cmd_status(importer: &Importer) -> anyhow::Result<()> {
    if importer.is_available() {
        println!("available");
    } else {
        println!("locked down");
    }
    Ok(())
}

fn cmd_templates(importer: &Importer, principal: &str) -> anyhow::Result<()> {
    for t in importer.available_templates(principal)? {
        match t.description {
            Some(d) => println!("{}\t{}", t.name, d),
            None => println!("{}", t.name),
        }
    }
    Ok(())
}

fn read_source(args: &SourceArgs) -> anyhow::Result<Option<ImportSource>> {
    if let Some(path) = &args.archive {
        let bytes = fs::read(path).with_context(|| format!("read {path}"))?;
        return Ok(Some(ImportSource::Archive(bytes)));
    }
    if let Some(dir) = &args.dir {
        return Ok(Some(ImportSource::Directory(dir.clone())));
    }
    Ok(args.template.clone().map(ImportSource::Template))
}

fn import_options(importer: &Importer, flags: &ImportFlags) -> ImportOptions {
    let mut options = importer.settings().import_options();
    options.overrides_file = flags.overrides.clone();
    options
}

fn report_result(result: &ImportResult, out: Option<&Utf8Path>) -> anyhow::Result<()> {
    if let Some(out) = out {
        write_json(out, result)?;
        fs::write(out.with_extension("md"), render_result_md(result))
            .with_context(|| format!("write {}", out.with_extension("md")))?;
    }

    println!(
        "import: {} applied, {} merged, {} skipped",
        result.summary.applied, result.summary.merged, result.summary.skipped
    );
    if let Some(id) = &result.source_id {
        println!("statedump id: {id}");
    }
    for notice in &result.notices {
        println!("  {notice}");
    }
    if result.lockdown_engaged {
        println!("statedump import is locked down");
    }
    Ok(())
}

fn write_plan(out: &Utf8Path, plan: &ImportPlan) -> anyhow::Result<()> {
    write_json(out, plan)?;
    let md = out.with_extension("md");
    fs::write(&md, render_plan_md(plan)).with_context(|| format!("write {}", md))?;
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Utf8Path, v: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent))?;
    }
    let s = serde_json::to_string_pretty(v).context("serialize json")?;
    fs::write(path, s).with_context(|| format!("write {}", path))?;
    Ok(())
}
