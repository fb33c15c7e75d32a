use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use boxpack_core::{
    AtlasConfig, FilterMode, PackId, PixelType, ReclaimPolicy, TextureAtlas, to_json,
};
use clap::{ArgAction, Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use image::{DynamicImage, ImageReader};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "boxpack",
    about = "Pack images into fixed-size texture atlas pages",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack images into one or more atlas pages
    Pack(PackArgs),
    /// Stream random glyph-sized requests through one atlas and report cache behavior
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug, Clone)]
struct AtlasArgs {
    /// Atlas width and height in pixels
    #[arg(long, default_value_t = 1024, help_heading = "Atlas")]
    size: u32,
    /// Pixel type: l8 | la8 | rgb8 | rgba8
    #[arg(long, default_value = "rgba8", help_heading = "Atlas")]
    pixel_type: String,
    /// Texture filter: nearest | linear
    #[arg(long, default_value = "linear", help_heading = "Atlas")]
    filter: String,
    /// Border reserved around every item
    #[arg(long, default_value_t = 1, help_heading = "Atlas")]
    border: u32,
    /// Behavior when a page is full: never | lru (`pack` always uses never)
    #[arg(long, default_value = "never", help_heading = "Atlas")]
    reclaim: String,
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    // Input/Output
    /// Input file or directory
    #[arg(help_heading = "Input/Output")]
    input: PathBuf,
    /// Output directory
    #[arg(short, long, default_value = "out", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// Atlas base name (files will be name.png/.json)
    #[arg(short, long, default_value = "atlas", help_heading = "Input/Output")]
    name: String,
    /// YAML config file path (overrides atlas options)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Include patterns (glob). If set, only files matching any pattern are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob). Files matching any pattern will be ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,

    #[command(flatten)]
    atlas: AtlasArgs,

    // Layout
    /// Maximum number of pages to open (unlimited if unset)
    #[arg(long, help_heading = "Layout")]
    max_pages: Option<usize>,
    /// Insert order: area_desc | height_desc | name_asc | none
    #[arg(long, default_value = "height_desc", help_heading = "Layout")]
    sort_order: String,

    // Export
    /// Export occupancy stats (JSON) to this file
    #[arg(long, help_heading = "Export")]
    export_stats: Option<PathBuf>,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
    /// Dry run: pack and report but do not write files
    #[arg(long, default_value_t = false, help_heading = "Export")]
    dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
struct SimulateArgs {
    #[command(flatten)]
    atlas: AtlasArgs,
    /// Number of requests
    #[arg(long, default_value_t = 10_000)]
    requests: usize,
    /// Smallest glyph edge
    #[arg(long, default_value_t = 6)]
    min_edge: u32,
    /// Largest glyph edge
    #[arg(long, default_value_t = 32)]
    max_edge: u32,
    /// Fraction of requests that look up an earlier glyph instead of adding a new one
    #[arg(long, default_value_t = 0.5)]
    hit_rate: f64,
    /// Reset the atlas when an insert fails (only meaningful with --reclaim never)
    #[arg(long, default_value_t = false)]
    reset_on_full: bool,
    /// RNG seed
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Pack(args) => run_pack(args, cli.progress && !cli.quiet),
        Commands::Simulate(args) => run_simulate(args),
    }
}

#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    size: Option<u32>,
    pixel_type: Option<String>,
    filter: Option<String>,
    border: Option<u32>,
    reclaim: Option<String>,
}

impl YamlConfig {
    fn into_atlas_config(self, mut base: AtlasConfig) -> anyhow::Result<AtlasConfig> {
        if let Some(v) = self.size {
            base.size = v;
        }
        if let Some(v) = self.pixel_type {
            base.pixel_type = parse_pixel_type(&v)?;
        }
        if let Some(v) = self.filter {
            base.filter = parse_filter(&v)?;
        }
        if let Some(v) = self.border {
            base.border = v;
        }
        if let Some(v) = self.reclaim {
            base.reclaim = parse_reclaim(&v)?;
        }
        Ok(base)
    }
}

struct InputImage {
    key: String,
    image: DynamicImage,
}

struct Page {
    atlas: TextureAtlas,
    keys: Vec<(PackId, String)>,
}

fn run_pack(cli: &PackArgs, show_progress: bool) -> anyhow::Result<()> {
    let mut cfg = atlas_config(&cli.atlas)?;
    if let Some(path) = &cli.config {
        let file =
            fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        let y: YamlConfig = serde_yaml::from_str(&file)?;
        cfg = y.into_atlas_config(cfg)?;
    }
    let cfg = pack_config(cfg);
    cfg.validate()?;

    if cli.print_config {
        match cli.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }

    let filter = InputFilter::new(&cli.include, &cli.exclude)?;
    let paths = gather_paths(&cli.input, &filter);
    let mut inputs = load_images_with_progress(&cli.input, &paths, show_progress)?;
    info!(count = inputs.len(), "loaded input images");
    sort_inputs(&mut inputs, &cli.sort_order)?;

    let start = Instant::now();
    let mut pages: Vec<Page> = Vec::new();
    let mut skipped = 0usize;
    for inp in &inputs {
        if place(&mut pages, &cfg, cli.max_pages, inp)? {
            continue;
        }
        skipped += 1;
    }
    let elapsed = start.elapsed();
    info!(
        pages = pages.len(),
        skipped,
        ?elapsed,
        "packing done"
    );

    if !cli.dry_run {
        fs::create_dir_all(&cli.out_dir)
            .with_context(|| format!("create out_dir {}", cli.out_dir.display()))?;
    }

    let mut page_values = Vec::with_capacity(pages.len());
    for (i, page) in pages.iter().enumerate() {
        let file_name = if pages.len() == 1 {
            format!("{}.png", cli.name)
        } else {
            format!("{}_{}.png", cli.name, i)
        };
        if !cli.dry_run {
            let png_path = cli.out_dir.join(&file_name);
            page.atlas
                .texture()
                .save(&png_path)
                .with_context(|| format!("write {}", png_path.display()))?;
            debug!(?png_path, "page written");
        }
        let keys: serde_json::Map<String, serde_json::Value> = page
            .keys
            .iter()
            .map(|(id, key)| (key.clone(), serde_json::json!(id)))
            .collect();
        page_values.push(serde_json::json!({
            "page": i,
            "image": file_name,
            "atlas": to_json(&page.atlas),
            "keys": keys,
        }));
    }

    if !cli.dry_run {
        let json_path = cli.out_dir.join(format!("{}.json", cli.name));
        let json = serde_json::to_string_pretty(&serde_json::Value::Array(page_values))?;
        fs::write(&json_path, json).with_context(|| format!("write {}", json_path.display()))?;
        info!(?json_path, pages = pages.len(), "atlas written");
    }

    let occupancy: Vec<f32> = pages.iter().map(|p| p.atlas.percentage_used()).collect();
    if let Some(stats_path) = &cli.export_stats {
        let value = serde_json::json!({
            "pages": pages.len(),
            "items": inputs.len() - skipped,
            "skipped": skipped,
            "occupancy": occupancy,
            "wastedArea": pages.iter().map(|p| p.atlas.stats().wasted_area()).sum::<u64>(),
            "stats": pages.iter().map(|p| p.atlas.stats()).collect::<Vec<_>>(),
        });
        if !cli.dry_run {
            fs::write(stats_path, serde_json::to_string_pretty(&value)?)
                .with_context(|| format!("write {}", stats_path.display()))?;
            info!(?stats_path, "stats exported");
        }
    }
    if cli.dry_run {
        for (i, page) in pages.iter().enumerate() {
            println!("page {}: {}", i, page.atlas.stats().summary());
        }
    }
    Ok(())
}

/// `pack` keeps every input it reports as placed, so pages never reclaim space.
fn pack_config(mut cfg: AtlasConfig) -> AtlasConfig {
    if cfg.reclaim != ReclaimPolicy::Never {
        warn!(
            reclaim = cfg.reclaim.as_str(),
            "pack opens new pages instead of reclaiming, using reclaim=never"
        );
        cfg.reclaim = ReclaimPolicy::Never;
    }
    cfg
}

// First fit across open pages; opens a new page when none has room.
fn place(
    pages: &mut Vec<Page>,
    cfg: &AtlasConfig,
    max_pages: Option<usize>,
    inp: &InputImage,
) -> anyhow::Result<bool> {
    for page in pages.iter_mut() {
        if let Some(item) = page.atlas.add_item(&inp.image) {
            page.keys.push((item.id, inp.key.clone()));
            return Ok(true);
        }
    }
    if max_pages.is_some_and(|m| pages.len() >= m) {
        warn!(key = %inp.key, "all pages full, skipping");
        return Ok(false);
    }
    let mut atlas = TextureAtlas::new(cfg.clone())?;
    match atlas.add_item(&inp.image) {
        Some(item) => {
            debug!(page = pages.len(), "opened page");
            pages.push(Page {
                atlas,
                keys: vec![(item.id, inp.key.clone())],
            });
            Ok(true)
        }
        None => {
            warn!(
                key = %inp.key,
                w = inp.image.width(),
                h = inp.image.height(),
                max = cfg.max_item_size(),
                "image larger than an empty page, skipping"
            );
            Ok(false)
        }
    }
}

fn run_simulate(args: &SimulateArgs) -> anyhow::Result<()> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    if args.min_edge == 0 || args.min_edge > args.max_edge {
        anyhow::bail!("invalid edge range: {}..={}", args.min_edge, args.max_edge);
    }
    let cfg = atlas_config(&args.atlas)?;
    let mut atlas = TextureAtlas::new(cfg)?;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut known: Vec<PackId> = Vec::new();
    let (mut added, mut full, mut resets) = (0usize, 0usize, 0usize);
    let (mut reclaims, mut evicted) = (0usize, 0usize);
    let (mut hits, mut misses) = (0usize, 0usize);
    let mut peak = 0f32;

    let start = Instant::now();
    for _ in 0..args.requests {
        if !known.is_empty() && rng.gen_bool(args.hit_rate.clamp(0.0, 1.0)) {
            let id = known[rng.gen_range(0..known.len())];
            if atlas.get_item(id).is_some() {
                hits += 1;
            } else {
                misses += 1;
            }
            continue;
        }
        let w = rng.gen_range(args.min_edge..=args.max_edge);
        let h = rng.gen_range(args.min_edge..=args.max_edge);
        let glyph = DynamicImage::new_luma8(w, h);
        let live = atlas.packer().len();
        match atlas.add_item(&glyph) {
            Some(item) => {
                added += 1;
                known.push(item.id);
                // ids dropped by a reclaim to make room
                let dropped = (live + 1).saturating_sub(atlas.packer().len());
                if dropped > 0 {
                    reclaims += 1;
                    evicted += dropped;
                }
            }
            None => {
                full += 1;
                peak = peak.max(atlas.percentage_used());
                if args.reset_on_full {
                    atlas.reset();
                    known.clear();
                    resets += 1;
                }
            }
        }
        atlas.take_updates();
    }
    let elapsed = start.elapsed();
    peak = peak.max(atlas.percentage_used());

    println!(
        "policy={} requests={} added={} full={} reclaims={} evicted={} resets={} hits={} misses={} live={} occupancy={:.2}% peak={:.2}% time={:?}",
        atlas.config().reclaim.as_str(),
        args.requests,
        added,
        full,
        reclaims,
        evicted,
        resets,
        hits,
        misses,
        atlas.packer().len(),
        atlas.percentage_used() * 100.0,
        peak * 100.0,
        elapsed
    );
    debug!("{}", atlas.stats().summary());
    Ok(())
}

fn atlas_config(a: &AtlasArgs) -> anyhow::Result<AtlasConfig> {
    Ok(AtlasConfig {
        size: a.size,
        pixel_type: parse_pixel_type(&a.pixel_type)?,
        filter: parse_filter(&a.filter)?,
        border: a.border,
        reclaim: parse_reclaim(&a.reclaim)?,
    })
}

fn parse_pixel_type(s: &str) -> anyhow::Result<PixelType> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("unknown pixel type: {}", s))
}

fn parse_filter(s: &str) -> anyhow::Result<FilterMode> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("unknown filter: {}", s))
}

fn parse_reclaim(s: &str) -> anyhow::Result<ReclaimPolicy> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("unknown reclaim policy: {}", s))
}

fn sort_inputs(inputs: &mut [InputImage], order: &str) -> anyhow::Result<()> {
    match order.to_ascii_lowercase().as_str() {
        "area_desc" => inputs.sort_by_key(|i| {
            std::cmp::Reverse((i.image.width() as u64) * (i.image.height() as u64))
        }),
        "height_desc" => inputs.sort_by_key(|i| std::cmp::Reverse(i.image.height())),
        "name_asc" => inputs.sort_by(|a, b| a.key.cmp(&b.key)),
        "none" => {}
        other => anyhow::bail!("unknown sort order: {}", other),
    }
    Ok(())
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Decides which files under the input root are packed.
struct InputFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl InputFilter {
    fn new(include: &[String], exclude: &[String]) -> anyhow::Result<Self> {
        Ok(Self {
            include: glob_set(include)?,
            exclude: glob_set(exclude)?,
        })
    }

    fn accepts(&self, p: &Path) -> bool {
        let has_image_ext = p
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)));
        if !has_image_ext {
            return false;
        }
        // globs always see forward slashes
        let s = p.to_string_lossy().replace('\\', "/");
        if self.exclude.as_ref().is_some_and(|ex| ex.is_match(&s)) {
            return false;
        }
        self.include.as_ref().is_none_or(|inc| inc.is_match(&s))
    }
}

fn glob_set(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat).with_context(|| format!("bad glob {pat:?}"))?);
    }
    Ok(Some(b.build()?))
}

// WalkDir yields a lone file as its only entry, so `root` may be either.
fn gather_paths(root: &Path, filter: &InputFilter) -> Vec<PathBuf> {
    let mut list: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!(error = %e, "walk error");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && filter.accepts(e.path()))
        .map(|e| e.into_path())
        .collect();
    list.sort();
    list
}

/// Key recorded in the JSON for an input: its path relative to the input root.
fn input_key(root: &Path, p: &Path) -> String {
    let rel = match p.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => p.file_name().map(Path::new).unwrap_or(p),
    };
    rel.to_string_lossy().replace('\\', "/")
}

fn load_images_with_progress(
    root: &Path,
    paths: &[PathBuf],
    progress: bool,
) -> anyhow::Result<Vec<InputImage>> {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(paths.len() as u64);
        b.set_style(ProgressStyle::with_template(
            "{spinner:.green} loading {pos}/{len} [{elapsed_precise}] {wide_msg}",
        )?);
        Some(b)
    } else {
        None
    };
    let mut list = Vec::with_capacity(paths.len());
    for p in paths {
        let key = input_key(root, p);
        if let Some(b) = &bar {
            b.set_message(key.clone());
        }
        match decode(p) {
            Ok(image) => list.push(InputImage { key, image }),
            Err(e) => error!(%key, error = %e, "skip image"),
        }
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    Ok(list)
}

fn decode(p: &Path) -> anyhow::Result<DynamicImage> {
    ImageReader::open(p)
        .with_context(|| format!("open {}", p.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("decode {}", p.display()))
}

// RUST_LOG wins over -q/-v when set.
fn init_tracing(quiet: bool, verbose: u8) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
