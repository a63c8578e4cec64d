use std::io::{IsTerminal, Write};
use std::net::SocketAddr;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rpregs_frame::WORD_SIZE;
use rpregs_registers::{Module, Value};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct WordOutput {
    address: u32,
    value: u32,
}

#[derive(Serialize)]
struct WordsOutput {
    address: u32,
    count: usize,
    words: Vec<WordOutput>,
}

#[derive(Serialize)]
struct ValueOutput<'a> {
    module: &'a str,
    register: &'a str,
    address: u32,
    value: &'a Value,
}

#[derive(Serialize)]
struct RegisterOutput {
    name: String,
    offset: u32,
    address: u32,
    codec: &'static str,
    parameters: String,
    bitmask: Option<u64>,
    doc: Option<String>,
}

#[derive(Serialize)]
struct ListeningOutput {
    listening: SocketAddr,
}

pub fn print_words(addr: u32, words: &[u32], format: OutputFormat) {
    let rows: Vec<WordOutput> = words
        .iter()
        .enumerate()
        .map(|(i, word)| WordOutput {
            address: addr.wrapping_add((i * WORD_SIZE) as u32),
            value: *word,
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&WordsOutput {
            address: addr,
            count: rows.len(),
            words: rows,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["ADDRESS", "HEX", "DEC"]);
            for row in &rows {
                table.add_row(vec![
                    format!("{:#010x}", row.address),
                    format!("{:#010x}", row.value),
                    row.value.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                println!("{:#010x}: {:#010x} ({})", row.address, row.value, row.value);
            }
        }
    }
}

pub fn print_written(addr: u32, count: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "address": addr,
            "written": count,
        })),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("wrote {count} word(s) at {addr:#010x}");
        }
    }
}

pub fn print_value(
    module: &Module,
    register: &str,
    address: u32,
    value: &Value,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&ValueOutput {
            module: module.name(),
            register,
            address,
            value,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["MODULE", "REGISTER", "ADDRESS", "VALUE"]);
            table.add_row(vec![
                module.name().to_string(),
                register.to_string(),
                format!("{address:#010x}"),
                value.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}.{register} = {value}", module.name()),
    }
}

pub fn print_registers(module: &Module, format: OutputFormat) {
    let rows: Vec<RegisterOutput> = module
        .bindings()
        .iter()
        .map(|binding| {
            let spec = binding.spec();
            RegisterOutput {
                name: spec.name().to_string(),
                offset: spec.address(),
                address: binding.absolute_address(),
                codec: spec.codec().kind(),
                parameters: spec.codec().describe(),
                bitmask: spec.bitmask(),
                doc: spec.doc().map(str::to_string),
            }
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = new_table(vec![
                "REGISTER",
                "ADDRESS",
                "CODEC",
                "PARAMETERS",
                "MASK",
                "DESCRIPTION",
            ]);
            for row in &rows {
                table.add_row(vec![
                    row.name.clone(),
                    format!("{:#010x}", row.address),
                    row.codec.to_string(),
                    row.parameters.clone(),
                    row.bitmask.map(|m| format!("{m:#x}")).unwrap_or_default(),
                    row.doc.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                println!(
                    "{:<28} {:#010x} {:<10} {}",
                    row.name, row.address, row.codec, row.parameters
                );
            }
        }
    }
}

/// First line of `serve` output; scripts read it to find the bound port.
pub fn print_listening(addr: SocketAddr, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ListeningOutput { listening: addr }),
        OutputFormat::Table | OutputFormat::Pretty => println!("listening on {addr}"),
    }
    let _ = std::io::stdout().flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}
