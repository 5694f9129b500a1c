use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};

mod config;
mod error;
mod seo;
mod site;


use config::{Limits, SiteConfig};
use error::{Result, SiteError};
use seo::audit::{self, AuditOptions};
use seo::fix::{self, FixOptions};
use seo::{analytics, services, sitemap, FieldKind, MetaTextNormalizer, TextField};

/// How many changed files `fix` lists after a run
const CHANGED_SAMPLE: usize = 12;

#[derive(Parser)]
#[command(name = "sitesmith")]
#[command(about = "SEO audit and maintenance for a static contractor site")]
struct Cli {
    /// Config file (missing file means built-in defaults)
    #[arg(long, short, global = true, default_value = "sitesmith.toml")]
    config: PathBuf,

    /// Site root folder
    #[arg(long, short, global = true, default_value = ".")]
    root: PathBuf,

    #[command(flatten)]
    window: WindowArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the recommended length windows
#[derive(Args)]
struct WindowArgs {
    #[arg(long, global = true)]
    title_min: Option<usize>,
    #[arg(long, global = true)]
    title_max: Option<usize>,
    #[arg(long, global = true)]
    desc_min: Option<usize>,
    #[arg(long, global = true)]
    desc_max: Option<usize>,
}

impl WindowArgs {
    fn apply(&self, mut limits: Limits) -> Limits {
        limits.title_min = self.title_min.unwrap_or(limits.title_min);
        limits.title_max = self.title_max.unwrap_or(limits.title_max);
        limits.desc_min = self.desc_min.unwrap_or(limits.desc_min);
        limits.desc_max = self.desc_max.unwrap_or(limits.desc_max);
        limits
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Audit titles, meta descriptions, headings and image alt text
    Audit {
        /// Base URL used to show page URLs in the report
        #[arg(long)]
        base_url: Option<String>,
        /// JSON report path (relative to root)
        #[arg(long, default_value = "seo_audit_report.json")]
        out_json: PathBuf,
        /// CSV report path (relative to root)
        #[arg(long, default_value = "seo_audit_report.csv")]
        out_csv: PathBuf,
        /// Extra directory name to exclude (repeatable)
        #[arg(long)]
        exclude_dir: Vec<String>,
        /// Max sample entries per page for images missing alt
        #[arg(long, default_value_t = 10)]
        max_image_samples: usize,
    },
    /// Fix title and meta description lengths on pages flagged by the audit
    Fix {
        /// Audit JSON report path (relative to root)
        #[arg(long, default_value = "seo_audit_report.json")]
        report: PathBuf,
        /// Also update og:title/og:description if present
        #[arg(long)]
        update_og: bool,
        /// Also update twitter:title/twitter:description if present
        #[arg(long)]
        update_twitter: bool,
        /// Compute changes but do not write files
        #[arg(long)]
        dry_run: bool,
    },
    /// Compare the services page cards against a source list of services
    AuditServices {
        /// Services page (relative to root)
        #[arg(long, default_value = "services.html")]
        services_html: PathBuf,
        /// Text file with one service per line, bullets allowed (relative to root)
        #[arg(long, default_value = "services_source.txt")]
        source: PathBuf,
        /// Suggestions per missing item
        #[arg(long, default_value_t = 3)]
        max_suggestions: usize,
    },
    /// Add the configured analytics snippet to every page head
    Analytics {
        #[arg(long)]
        dry_run: bool,
    },
    /// Regenerate sitemap.xml
    Sitemap {
        /// Output path (relative to root)
        #[arg(long, default_value = "sitemap.xml")]
        out: PathBuf,
    },
    /// Print the normalized form of a title or description
    Normalize {
        #[arg(long, value_enum, default_value_t = KindArg::Title)]
        kind: KindArg,
        text: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Title,
    Description,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = SiteConfig::load(&cli.config)?;
    let limits = cli.window.apply(cfg.limits);
    let root = cli
        .root
        .canonicalize()
        .map_err(|e| SiteError::io(&cli.root, e))?;

    match cli.command {
        Commands::Audit {
            base_url,
            out_json,
            out_csv,
            exclude_dir,
            max_image_samples,
        } => {
            let mut exclude_dirs = cfg.site.exclude_dirs.clone();
            exclude_dirs.extend(exclude_dir);
            let opts = AuditOptions {
                base_url: base_url.unwrap_or_else(|| cfg.site.base_url.clone()),
                limits,
                exclude_dirs,
                max_image_samples,
            };
            run_audit(&root, &opts, &root.join(out_json), &root.join(out_csv))
        }
        Commands::Fix {
            report,
            update_og,
            update_twitter,
            dry_run,
        } => {
            let opts = FixOptions {
                limits,
                update_og,
                update_twitter,
                dry_run,
            };
            run_fix(&root, &root.join(report), &cfg, &opts)
        }
        Commands::AuditServices {
            services_html,
            source,
            max_suggestions,
        } => run_audit_services(&root.join(services_html), &root.join(source), max_suggestions),
        Commands::Analytics { dry_run } => {
            let changed =
                analytics::inject_site(&root, &cfg.site.exclude_dirs, &cfg.analytics, dry_run)?;
            if dry_run {
                println!("Analytics snippet would be added to {} file(s).", changed);
            } else {
                println!("Analytics snippet added to {} file(s).", changed);
            }
            Ok(())
        }
        Commands::Sitemap { out } => {
            let today = chrono::Local::now().date_naive();
            let (xml, count) = sitemap::generate_sitemap(
                &root,
                &cfg.site.exclude_dirs,
                &cfg.site.base_url,
                &cfg.sitemap,
                today,
            )?;
            let out = root.join(out);
            fs::write(&out, xml).map_err(|e| SiteError::io(&out, e))?;
            println!("Generated sitemap with {} URLs", count);
            println!("Saved to: {}", out.display());
            Ok(())
        }
        Commands::Normalize { kind, text } => {
            let normalizer = MetaTextNormalizer::new(&cfg.brand);
            let field = match kind {
                KindArg::Title => TextField::title(&text, &limits),
                KindArg::Description => TextField::description(&text, &limits),
            };
            let out = normalizer.normalize(&field);
            let label = match field.kind {
                FieldKind::Title => "title",
                FieldKind::Description => "description",
            };
            info!("{} normalized to {} chars", label, out.chars().count());
            println!("{}", out);
            Ok(())
        }
    }
}

fn run_audit(root: &Path, opts: &AuditOptions, out_json: &Path, out_csv: &Path) -> Result<()> {
    let report = audit::audit_site(root, opts)?;
    audit::write_json(out_json, &report)?;
    audit::write_csv(out_csv, &report.pages)?;

    let summary = &report.summary;
    println!("SEO audit complete");
    println!("Pages scanned: {}", summary.pages);
    println!("Pages with errors: {}", summary.pages_with_errors);
    println!("Pages with warnings: {}", summary.pages_with_warnings);
    println!("JSON report: {}", out_json.display());
    println!("CSV report:  {}", out_csv.display());

    if !summary.top_issues.is_empty() {
        println!("\nTop issues:");
        for item in summary.top_issues.iter().take(10) {
            println!("- {}x {}", item.count, item.issue);
        }
    }
    Ok(())
}

fn run_audit_services(services_html: &Path, source: &Path, max_suggestions: usize) -> Result<()> {
    let html = fs::read(services_html).map_err(|e| SiteError::io(services_html, e))?;
    let list = fs::read(source).map_err(|e| SiteError::io(source, e))?;
    let audit = services::audit_services(
        &String::from_utf8_lossy(&html),
        &String::from_utf8_lossy(&list),
        max_suggestions,
    );

    println!("services.html H4 count: {}", audit.page_titles);
    println!("Source service lines: {}", audit.source_items);
    println!("Matched: {}", audit.matched);
    println!("Missing: {}", audit.missing.len());

    if !audit.missing.is_empty() {
        println!("\nMissing items (with suggestions):");
        for item in &audit.missing {
            if item.suggestions.is_empty() {
                println!("- {}", item.name);
            } else {
                println!("- {}  ->  maybe: {}", item.name, item.suggestions.join(", "));
            }
        }
    }
    Ok(())
}

fn run_fix(root: &Path, report_path: &Path, cfg: &SiteConfig, opts: &FixOptions) -> Result<()> {
    let report = audit::read_json(report_path)?;
    let normalizer = MetaTextNormalizer::new(&cfg.brand);
    let results = fix::fix_from_report(root, &report, &normalizer, opts);
    let changed: Vec<_> = results.iter().filter(|r| r.changed).collect();

    println!("SEO fix complete{}", if opts.dry_run { " (dry run)" } else { "" });
    println!("Files considered: {}", results.len());
    println!("Files changed:    {}", changed.len());
    for r in changed.iter().take(CHANGED_SAMPLE) {
        println!("- {}", site::relative_path(root, &r.file));
    }
    Ok(())
}
