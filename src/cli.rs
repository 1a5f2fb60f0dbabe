//! CLI: declarations → (schema | check | encode)
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use tracing::{debug, info};

use json_kobj::{Context, Declarations, Error, TypeKey};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// validate JSON documents against declared object types, re-encode them, or
/// emit a JSON Schema for a declared type
#[derive(Parser, Debug)]
#[command(name = "json-kobj", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the Draft 7 JSON Schema of the root type
    Schema(SchemaOut),
    /// decode and validate every input document
    Check(CheckOut),
    /// decode every input document and write it back out as compact JSON
    Encode(EncodeOut),
}

#[derive(Args, Debug, Clone)]
struct TypeSettings {
    /// declaration file (enums and object types)
    #[arg(long, short)]
    types: PathBuf,

    /// name of the declared type documents are decoded as
    #[arg(long, short)]
    root: String,

    /// stop at the first failing field
    #[arg(long, default_value_t = false)]
    lazy: bool,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    type_settings: TypeSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    type_settings: TypeSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// print failures as JSON lines instead of text
    #[arg(long, default_value_t = false)]
    json_report: bool,
}

#[derive(clap::Parser, Debug)]
struct EncodeOut {
    #[command(flatten)]
    type_settings: TypeSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// drop null-valued fields and entries
    #[arg(long, default_value_t = false)]
    remove_nones: bool,

    /// output .ndjson file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// One input document, already narrowed by `--json-pointer`.
struct Document {
    origin: String,
    payload: Vec<u8>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeSettings {
    fn load(&self) -> Result<(Context, TypeKey)> {
        let ctx = Context::new();
        ctx.set_lazy_type_check(self.lazy);
        let decls = Declarations::load(&self.types, &ctx)
            .with_context(|| format!("failed to load declarations from {}", self.types.display()))?;
        let declared = decls.declare_into(&ctx);
        debug!(count = declared.len(), "declared types");
        let key = ctx.key(&self.root).map_err(|e| anyhow!("{e} (declared in {})", self.types.display()))?;
        Ok((ctx, key))
    }
}

impl InputSettings {
    fn load(&self) -> Result<Vec<Document>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .map_err(|e| anyhow!("failed to resolve input file paths: {e}"))?;
        let mut docs = Vec::new();
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read(&source_path)
                .with_context(|| format!("failed to read source file {source_path_str}"))?;
            if self.ndjson {
                for (i, line) in source.split(|b| *b == b'\n').enumerate() {
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    docs.push(self.select(format!("{source_path_str}:{}", i + 1), line.to_vec())?);
                }
            } else {
                docs.push(self.select(source_path_str, source)?);
            }
        }
        Ok(docs)
    }

    /// Apply `--json-pointer`. Without one the raw bytes are kept, so that
    /// malformed documents reach the decoder as they are.
    fn select(&self, origin: String, payload: Vec<u8>) -> Result<Document> {
        let Some(pointer) = self.json_pointer.as_ref() else {
            return Ok(Document { origin, payload });
        };
        let value = serde_json::from_slice::<serde_json::Value>(&payload)
            .with_context(|| format!("failed to parse JSON source ({origin})"))?;
        let node = value
            .pointer(pointer)
            .ok_or_else(|| anyhow!("JSON pointer {pointer} selects nothing in {origin}"))?;
        Ok(Document { origin, payload: serde_json::to_vec(node)? })
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Run the selected command; returns the process exit code.
    pub fn run(&self) -> Result<i32> {
        match &self.cmd {
            Command::Schema(target) => {
                let (ctx, key) = target.type_settings.load()?;
                let schema = ctx.json_schema(&key)?;
                let schema_src = serde_json::to_string_pretty(&schema)?;
                write_output(target.out.as_deref(), &schema_src)?;
                Ok(0)
            }
            Command::Check(target) => {
                let (ctx, key) = target.type_settings.load()?;
                let docs = target.input_settings.load()?;
                let results = docs
                    .par_iter()
                    .map(|doc| (doc, ctx.from_json(&doc.payload, &key)))
                    .collect::<Vec<_>>();

                let mut failures = 0;
                for (doc, result) in &results {
                    match result {
                        Ok(_) if !target.json_report => println!("{} {}", "✓".green(), doc.origin),
                        Ok(_) => {}
                        Err(error) => {
                            failures += 1;
                            report(&doc.origin, error, target.json_report)?;
                        }
                    }
                }
                info!(documents = results.len(), failures, "check finished");
                if !target.json_report {
                    let summary = format!("{} of {} documents valid", results.len() - failures, results.len());
                    if failures == 0 { eprintln!("{}", summary.green()) } else { eprintln!("{}", summary.red()) }
                }
                Ok(if failures == 0 { 0 } else { 1 })
            }
            Command::Encode(target) => {
                let (ctx, key) = target.type_settings.load()?;
                let docs = target.input_settings.load()?;
                let lines = docs
                    .par_iter()
                    .map(|doc| -> Result<String> {
                        let value = ctx
                            .from_json(&doc.payload, &key)
                            .with_context(|| format!("failed to decode {}", doc.origin))?;
                        let bytes = ctx.to_json(&value, target.remove_nones)?;
                        Ok(String::from_utf8(bytes)?)
                    })
                    .collect::<Result<Vec<_>>>()?;
                write_output(target.out.as_deref(), &lines.join("\n"))?;
                Ok(0)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn report(origin: &str, error: &Error, json: bool) -> Result<()> {
    if json {
        let line = serde_json::json!({
            "origin": origin,
            "error": error.to_string(),
            "items": error.items(),
        });
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }
    println!("{} {}", "✗".red(), origin.bold());
    if error.items().is_empty() {
        println!("    {}", error.to_string().red());
    }
    for item in error.items() {
        println!("    {} {}", "-".dimmed(), item);
    }
    Ok(())
}

fn write_output(out: Option<&Path>, contents: &str) -> Result<()> {
    let Some(out) = out else {
        println!("{contents}");
        return Ok(());
    };
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, format!("{contents}\n")).with_context(|| format!("failed to write {}", out.display()))?;
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                matched_any = true;
                out.push(entry?);
            }
            if !matched_any {
                return Err(format!("glob pattern matched no files: {pattern}").into());
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    if out.is_empty() {
        return Err("no input files".into());
    }
    Ok(out)
}
