use clap::{Parser, Subcommand, ValueEnum};
use jade_lexer::{IndentStyle, Lexer, Options};
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::Path;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "jadelex")]
#[command(about = "Tokenize Jade templates and inspect the token stream")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the token stream of .jade files
    Dump {
        /// .jade files to lex (if none specified, finds all in current directory)
        files: Vec<String>,

        /// Read from stdin
        #[arg(long)]
        stdin: bool,

        /// Output tokens as JSON
        #[arg(long)]
        json: bool,

        /// Force the indentation style instead of auto-detecting
        #[arg(long, value_enum)]
        indent_style: Option<StyleArg>,

        /// Force the indentation width instead of auto-detecting
        #[arg(long)]
        indent_width: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StyleArg {
    Tab,
    Space,
}

impl From<StyleArg> for IndentStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Tab => IndentStyle::Tab,
            StyleArg::Space => IndentStyle::Space,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Dump {
            files,
            stdin,
            json,
            indent_style,
            indent_width,
        } => {
            let options = Options {
                indent_style: indent_style.map(Into::into),
                indent_width,
            };
            if stdin {
                dump_stdin(&options, json);
            } else {
                dump_files(files, &options, json);
            }
        }
    }
}

fn dump_stdin(options: &Options, json: bool) {
    let mut source = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut source) {
        eprintln!("Error reading stdin: {}", e);
        std::process::exit(1);
    }
    if !dump_source(&source, "stdin", options, json) {
        std::process::exit(1);
    }
}

fn dump_files(files: Vec<String>, options: &Options, json: bool) {
    let files_to_process: Vec<String> = if files.is_empty() {
        discover_jade_files(".")
    } else {
        let mut result = Vec::new();
        for arg in &files {
            let path = Path::new(arg);
            if path.is_dir() {
                result.extend(discover_jade_files(arg));
            } else {
                result.push(arg.clone());
            }
        }
        result
    };

    if files_to_process.is_empty() {
        eprintln!("No .jade files found");
        std::process::exit(1);
    }

    let mut has_errors = false;
    for file_path in files_to_process {
        let source = match fs::read_to_string(&file_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error reading {}: {}", file_path, e);
                has_errors = true;
                continue;
            }
        };
        if !dump_source(&source, &file_path, options, json) {
            has_errors = true;
        }
    }

    if has_errors {
        std::process::exit(1);
    }
}

/// Lex one source and print its dump. Returns false on a lex failure, which
/// is rendered to stderr with source context.
fn dump_source(source: &str, filename: &str, options: &Options, json: bool) -> bool {
    let lexer = Lexer::with_options(options.clone());

    if json {
        let tokens: Result<Vec<_>, _> = lexer.lex(source).collect();
        match tokens {
            Ok(tokens) => {
                println!(
                    "{}",
                    serde_json::to_string(&tokens)
                        .unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
                );
                true
            }
            Err(e) => {
                println!(r#"{{"error":"{}"}}"#, e.to_string().replace('"', "\\\""));
                false
            }
        }
    } else {
        match lexer.dump(source) {
            Ok(dump) => {
                print!("{}", dump);
                true
            }
            Err(e) => {
                if io::stderr().is_terminal() {
                    eprint!("{}", e.render_color(source, filename));
                } else {
                    eprint!("{}", e.render(source, filename));
                }
                false
            }
        }
    }
}

fn discover_jade_files(dir: &str) -> Vec<String> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "jade"))
        .map(|e| e.path().to_string_lossy().to_string())
        .collect()
}
