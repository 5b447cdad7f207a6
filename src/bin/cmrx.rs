//! cmrx CLI: compiled markup records to node text.

#[cfg(feature = "fast-alloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Args, Parser, Subcommand};
use cmrx::node_serializer::TextSerializer;
use cmrx::{
    DecoderOptions, DeferredContent, EmptyRegistry, KeyPayload, Node, SchemaRegistry,
    SharedSource, StaticRegistry, Value, decode_iter, nodes_to_text_writer,
};
use serde_json::json;
use std::io::{IsTerminal, Read, Write};
use std::process;
use std::rc::Rc;

#[derive(Parser)]
#[command(name = "cmrx", about = "Compiled markup record stream decoder")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a record stream and print the node stream as text
    Dump(DumpArgs),
    /// List deferred regions and their keys as JSON
    Keys(KeysArgs),
    /// Decode one entry of a deferred region
    Entry(EntryArgs),
}

#[derive(Args)]
struct DumpArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Decode and print every entry of every deferred region
    #[arg(long)]
    expand_deferred: bool,
}

#[derive(Args)]
struct KeysArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Pretty-printed JSON output (2-space indent)
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct EntryArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Deferred region, in document order (0-based)
    #[arg(long, default_value_t = 0)]
    region: usize,

    /// Entry index within the region (0-based)
    #[arg(long)]
    index: usize,
}

#[derive(Args)]
struct CommonArgs {
    /// Input file (- for stdin)
    #[arg(short, long)]
    input: String,

    /// Output file (default: stdout)
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Type catalog (JSON); without catalog only declared descriptors resolve
    #[arg(short, long)]
    catalog: Option<String>,

    /// Emit line information from line records
    #[arg(long)]
    line_info: bool,

    /// Keep custom-serialized property values as raw bytes
    #[arg(long)]
    values_as_string: bool,

    /// Maximum record payload size in bytes
    #[arg(long)]
    max_record_size: Option<usize>,

    /// Accept any header signature
    #[arg(long)]
    no_signature_check: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Fehler: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Dump(args) => run_dump(args),
        Command::Keys(args) => run_keys(args),
        Command::Entry(args) => run_entry(args),
    }
}

fn read_input(path: &str) -> Result<SharedSource, String> {
    if path == "-" {
        if std::io::stdin().is_terminal() {
            eprintln!("Lese von stdin (Ctrl+D zum Beenden)...");
        }
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| format!("Lesefehler (stdin): {e}"))?;
        Ok(SharedSource::from_bytes(buf))
    } else {
        let file = std::fs::File::open(path).map_err(|e| format!("Lesefehler '{path}': {e}"))?;
        SharedSource::new(std::io::BufReader::new(file))
            .map_err(|e| format!("Lesefehler '{path}': {e}"))
    }
}

fn load_registry(catalog: Option<&str>) -> Result<Rc<dyn SchemaRegistry>, String> {
    match catalog {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("Lesefehler '{path}': {e}"))?;
            let registry = StaticRegistry::from_json(&json).map_err(|e| e.to_string())?;
            log::debug!("catalog '{path}': {} types", registry.type_count());
            Ok(Rc::new(registry))
        }
        None => Ok(Rc::new(EmptyRegistry)),
    }
}

fn build_options(args: &CommonArgs) -> DecoderOptions {
    let mut opts = DecoderOptions::default();
    opts.set_provide_line_info(args.line_info);
    opts.set_values_must_be_string(args.values_as_string);
    if let Some(size) = args.max_record_size {
        opts.set_max_record_size(size);
    }
    if args.no_signature_check {
        opts.set_expected_signature(None);
    }
    opts
}

fn create_decoder(args: &CommonArgs) -> Result<cmrx::Decoder, String> {
    let source = read_input(&args.input)?;
    let registry = load_registry(args.catalog.as_deref())?;
    decode_iter(source, registry, build_options(args)).map_err(|e| e.to_string())
}

fn create_buf_writer(path: &str) -> Result<std::io::BufWriter<Box<dyn Write>>, String> {
    if path == "-" {
        Ok(std::io::BufWriter::new(Box::new(std::io::stdout())))
    } else {
        let file = std::fs::File::create(path).map_err(|e| format!("Schreibfehler: {e}"))?;
        Ok(std::io::BufWriter::new(Box::new(file)))
    }
}

/// Schreibt Output entweder nach stdout ("-") oder atomar in eine Datei (tmp+rename).
fn write_to_output(
    output_path: &str,
    write_fn: impl FnOnce(std::io::BufWriter<Box<dyn Write>>) -> Result<(), String>,
) -> Result<(), String> {
    if output_path == "-" {
        return write_fn(create_buf_writer("-")?);
    }

    let tmp_path = format!("{output_path}.tmp");
    let writer = create_buf_writer(&tmp_path)?;
    if let Err(e) = write_fn(writer) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    std::fs::rename(&tmp_path, output_path).map_err(|e| format!("Rename-Fehler: {e}"))
}

fn run_dump(args: DumpArgs) -> Result<(), String> {
    let decoder = create_decoder(&args.common)?;
    write_to_output(&args.common.output, |writer| {
        let mut ser = TextSerializer::new(writer).expand_deferred(args.expand_deferred);
        for node in decoder {
            let node = node.map_err(|e| e.to_string())?;
            ser.process(&node).map_err(|e| e.to_string())?;
        }
        ser.finish().map_err(|e| e.to_string())
    })
}

/// Sammelt alle deferred Regionen in Dokumentreihenfolge, auch aus gespoolten Listen.
fn collect_regions<'a>(nodes: impl IntoIterator<Item = &'a Node>, out: &mut Vec<Rc<DeferredContent>>) {
    for node in nodes {
        match node {
            Node::Value(Value::Deferred(content)) => out.push(Rc::clone(content)),
            Node::Value(Value::Nodes(inner)) => collect_regions(inner.iter(), out),
            _ => {}
        }
    }
}

fn decode_regions(args: &CommonArgs) -> Result<Vec<Rc<DeferredContent>>, String> {
    let decoder = create_decoder(args)?;
    let mut nodes = Vec::new();
    for node in decoder {
        nodes.push(node.map_err(|e| e.to_string())?);
    }
    let mut regions = Vec::new();
    collect_regions(&nodes, &mut regions);
    Ok(regions)
}

fn key_json(content: &DeferredContent, index: usize) -> serde_json::Value {
    let Some(key) = content.key(index) else {
        return serde_json::Value::Null;
    };
    let payload = match key.payload() {
        KeyPayload::String(s) => json!({ "string": s }),
        KeyPayload::Type(t) => json!({ "type": t.to_string() }),
        KeyPayload::Nodes(n) => json!({ "nodes": n.len() }),
    };
    json!({
        "index": index,
        "key": payload,
        "position": key.position(),
        "size": key.size(),
        "shared": key.shared(),
        "shared_set": key.shared_set(),
        "static_resources": key.static_resources().len(),
    })
}

fn run_keys(args: KeysArgs) -> Result<(), String> {
    let regions = decode_regions(&args.common)?;
    let doc: Vec<serde_json::Value> = regions
        .iter()
        .enumerate()
        .map(|(i, content)| {
            json!({
                "region": i,
                "start": content.region_start(),
                "table_end": content.table_end(),
                "end": content.region_end(),
                "keys": (0..content.len()).map(|k| key_json(content, k)).collect::<Vec<_>>(),
            })
        })
        .collect();
    write_to_output(&args.common.output, |mut writer| {
        let text = if args.pretty {
            serde_json::to_string_pretty(&doc)
        } else {
            serde_json::to_string(&doc)
        }
        .map_err(|e| format!("JSON-Fehler: {e}"))?;
        writeln!(writer, "{text}").map_err(|e| format!("Schreibfehler: {e}"))?;
        writer.flush().map_err(|e| format!("Schreibfehler: {e}"))
    })
}

fn run_entry(args: EntryArgs) -> Result<(), String> {
    let regions = decode_regions(&args.common)?;
    let content = regions.get(args.region).ok_or_else(|| {
        format!("deferred region {} not found ({} regions)", args.region, regions.len())
    })?;
    let entry = content.read_entry(args.index).map_err(|e| e.to_string())?;
    write_to_output(&args.common.output, |mut writer| match entry {
        Some(nodes) => nodes_to_text_writer(&nodes, writer).map_err(|e| e.to_string()),
        None => {
            writeln!(writer, "(empty)").map_err(|e| format!("Schreibfehler: {e}"))?;
            writer.flush().map_err(|e| format!("Schreibfehler: {e}"))
        }
    })
}
