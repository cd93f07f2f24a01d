//! bundlekit CLI - inspect Unity asset files and bundles.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use bundlekit::classes::{ClassId, DecodedObject};
use bundlekit::core::CompressionChoice;
use bundlekit::manager::{LoadOptions, LoadReport, LoadSession};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bundlekit")]
#[command(about = "Inspect Unity serialized files, asset bundles and web data")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUNDLEKIT_BUILD_DATE"), ")"))]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    load: LoadArgs,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Args)]
struct LoadArgs {
    /// Unity version for files whose version was stripped, e.g. 2017.4.39f1
    #[arg(long, global = true)]
    unity_version: Option<String>,

    /// Decode with the compiled layouts only, ignoring type trees
    #[arg(long, global = true)]
    no_typetree: bool,

    /// Only decode these classes (names or ids, comma separated)
    #[arg(long, global = true, value_delimiter = ',')]
    classes: Vec<ClassId>,

    /// Block codec: auto, none, lzma, lz4, lz4hc, lzham
    #[arg(long, global = true, default_value = "auto")]
    block_compression: CompressionChoice,

    /// Block-info codec: auto, none, lzma, lz4, lz4hc, lzham
    #[arg(long, global = true, default_value = "auto")]
    block_info_compression: CompressionChoice,

    /// Decode worker threads
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Show members, object counts per class and failures
    #[command(alias = "i")]
    Info {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List every decoded object
    #[command(alias = "l")]
    List {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Dump the schema tree of an object as JSON
    #[command(alias = "d")]
    Dump {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Path id of the object
        #[arg(long, allow_hyphen_values = true)]
        path_id: i64,

        /// Member holding the object (when the id is ambiguous)
        #[arg(long)]
        member: Option<String>,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}

fn build_options(args: &LoadArgs) -> bundlekit::Result<LoadOptions> {
    let mut options = LoadOptions::new().with_type_tree(!args.no_typetree);
    if let Some(version) = &args.unity_version {
        options = options.with_version_str(version)?;
    }
    if !args.classes.is_empty() {
        options = options.with_class_filter(args.classes.iter().copied());
    }
    if let Some(threads) = args.threads {
        options = options.with_threads(threads);
    }
    options.block_compression = args.block_compression;
    options.block_info_compression = args.block_info_compression;
    Ok(options)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let options = match build_options(&cli.load) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut session = LoadSession::new(options);

    match &cli.command {
        Command::Info { paths } => {
            let report = session.load_paths(paths);
            cmd_info(&session, &report, cli.json);
            if session.members().is_empty() {
                return ExitCode::FAILURE;
            }
        }
        Command::List { paths } => {
            session.load_paths(paths);
            cmd_list(&session, cli.json);
        }
        Command::Dump { paths, path_id, member } => {
            session.load_paths(paths);
            return cmd_dump(&session, *path_id, member.as_deref());
        }
    }
    ExitCode::SUCCESS
}

fn cmd_info(session: &LoadSession, report: &LoadReport, as_json: bool) {
    let mut classes: BTreeMap<String, usize> = BTreeMap::new();
    for obj in session.objects() {
        *classes.entry(obj.class_id.to_string()).or_default() += 1;
    }
    debug!("Counted {} classes", classes.len());

    if as_json {
        let members: Vec<_> = session
            .members()
            .iter()
            .map(|m| {
                json!({
                    "name": &*m.name,
                    "source": m.source.display().to_string(),
                    "format": m.file.format_version(),
                    "unity_version": m.file.version.to_string(),
                    "platform": m.file.target_platform,
                    "objects": m.objects.len(),
                    "externals": m.file.externals.iter().map(|e| e.path_name.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();
        let failures: Vec<_> = report.failures.iter().map(|f| json!({"path": f.path, "path_id": f.path_id, "error": f.error.to_string()})).collect();
        let doc = json!({
            "members": members,
            "classes": classes,
            "failures": failures,
            "missing_dependencies": report.missing_dependencies,
        });
        print_json(&doc);
        return;
    }

    println!("Files read: {}", report.files);
    println!();
    println!("Members ({}):", session.members().len());
    for m in session.members() {
        println!(
            "  {}  format {}  version {}  platform {}  {} objects",
            m.name,
            m.file.format_version(),
            m.file.version,
            m.file.target_platform,
            m.objects.len()
        );
    }
    println!();
    println!("Objects by class:");
    for (class, count) in &classes {
        println!("  {class:<28} {count}");
    }
    println!();
    println!("Total objects: {}", report.objects);

    if !report.missing_dependencies.is_empty() {
        println!();
        println!("Missing dependencies:");
        for name in &report.missing_dependencies {
            println!("  {name}");
        }
    }
    if !report.failures.is_empty() {
        println!();
        println!("Failures ({}):", report.failures.len());
        for failure in &report.failures {
            println!("  {failure}");
        }
        if report.stripped_versions().next().is_some() {
            println!();
            println!("Some files have a stripped Unity version; pass --unity-version <version>.");
        }
    }
}

fn cmd_list(session: &LoadSession, as_json: bool) {
    if as_json {
        let rows: Vec<_> = session.objects().map(object_json).collect();
        print_json(&serde_json::Value::Array(rows));
        return;
    }
    for obj in session.objects() {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            obj.member_name,
            obj.path_id,
            obj.class_id,
            obj.name.as_deref().unwrap_or(""),
            obj.byte_size
        );
    }
}

fn object_json(obj: &DecodedObject) -> serde_json::Value {
    json!({
        "member": &*obj.member_name,
        "path_id": obj.path_id,
        "class_id": obj.class_id.0,
        "class": obj.class_id.to_string(),
        "name": obj.name,
        "size": obj.byte_size,
    })
}

fn cmd_dump(session: &LoadSession, path_id: i64, member: Option<&str>) -> ExitCode {
    let matches: Vec<&DecodedObject> = session
        .objects()
        .filter(|o| o.path_id == path_id)
        .filter(|o| member.map_or(true, |m| o.member_name.eq_ignore_ascii_case(m)))
        .collect();
    if matches.is_empty() {
        eprintln!("No object with path id {path_id}");
        return ExitCode::FAILURE;
    }
    if matches.len() > 1 {
        info!("{} members hold path id {path_id}; use --member to pick one", matches.len());
    }

    let mut status = ExitCode::SUCCESS;
    for obj in matches {
        match session.read_tree(obj) {
            Ok(tree) => {
                let doc = json!({ "object": object_json(obj), "tree": tree.to_json() });
                print_json(&doc);
            }
            Err(e) => {
                eprintln!("{} [{}]: {e}", obj.member_name, obj.path_id);
                status = ExitCode::FAILURE;
            }
        }
    }
    status
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("JSON error: {e}"),
    }
}
