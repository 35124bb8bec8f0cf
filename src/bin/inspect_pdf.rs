use anyhow::Result;
use clap::Parser;
use siss_tariffs::{
    extract::{extract_from_lines, extract_from_table, select_rate, table::detect_structure},
    pdf,
};
use std::path::PathBuf;

/// Dump what the extractors see in one PDF.
#[derive(Parser, Debug)]
#[command(name = "inspect_pdf")]
struct Args {
    file: PathBuf,
    /// Also print every decoded line.
    #[arg(long)]
    lines: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let doc = pdf::read_document(&args.file)?;
    let label = args.file.display().to_string();

    println!("=== {} ===", label);
    println!("lines:           {}", doc.lines.len());
    println!("table structure: {}", doc.has_table_structure());
    println!("layout:          {:?}", detect_structure(&doc.rows));
    println!();

    if args.lines {
        println!("=== Lines ===");
        for (i, line) in doc.lines.iter().enumerate() {
            println!("{:>4} | {}", i, line);
        }
        println!();
    }

    println!("=== Sections ===");
    println!("{}", serde_json::to_string_pretty(&extract_from_lines(&doc.lines))?);
    println!();

    println!("=== Table record ===");
    println!(
        "{}",
        serde_json::to_string_pretty(&extract_from_table(&doc.rows, &label))?
    );
    println!();

    println!("=== Headline rate ===");
    match select_rate(&doc.lines) {
        Some(c) => println!("{} (raw {:?}, line {}, score {})", c.value, c.raw, c.line, c.score),
        None => println!("<none>"),
    }
    Ok(())
}
