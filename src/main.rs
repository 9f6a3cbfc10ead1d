use std::env;
use std::io;
use std::process;
use std::sync::Arc;

use crossterm::style::{Color, Stylize};
use supports_color::Stream;
use tokio::runtime::Runtime;
use tracing::warn;

use serava_theme::config::Settings;
use serava_theme::error::ThemeError;
use serava_theme::logging;
use serava_theme::services::storage::{FileStorage, KeyValueStorage, MemoryStorage};
use serava_theme::services::theme_store::ThemeStore;
use serava_theme::ui::class_names::ClassRewriter;
use serava_theme::ui::styling::StylingTable;
use serava_theme::ui::theme::{HexColor, ThemeId, ThemeRegistry};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!("serava-theme {} - Mood theme engine", VERSION);
    println!();
    println!("USAGE:");
    println!("    serava-theme [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help                  Print help information");
    println!("    -v, --version               Print version information");
    println!("    --list                      List themes and their palettes");
    println!("    --current                   Print the stored theme state");
    println!("    --set <THEME>               Change the active theme");
    println!("    --ambient <on|off>          Toggle ambient sounds");
    println!("    --rewrite <CLASSES> [THEME] Rewrite a class string for a theme");
    println!("    --colors                    Print the styling color table as JSON");
}

fn print_version() {
    println!("serava-theme {}", VERSION);
}

/// Check if terminal supports true color (24-bit RGB)
fn supports_true_color() -> bool {
    supports_color::on(Stream::Stdout)
        .map(|support| support.has_16m)
        .unwrap_or(false)
}

fn swatch(color: HexColor, true_color: bool) -> String {
    if true_color {
        format!(
            "{} {}",
            "  ".on(Color::Rgb {
                r: color.r,
                g: color.g,
                b: color.b
            }),
            color
        )
    } else {
        color.to_string()
    }
}

fn load_registry(settings: &Settings) -> ThemeRegistry {
    match settings.themes_dir() {
        Some(dir) => ThemeRegistry::with_overrides(&dir),
        None => ThemeRegistry::built_in(),
    }
}

fn open_store(settings: &Settings) -> ThemeStore {
    let storage: Arc<dyn KeyValueStorage> = match settings.storage_path() {
        Some(path) => Arc::new(FileStorage::new(path)),
        None => {
            warn!("no home directory; settings will not survive this run");
            Arc::new(MemoryStorage::new())
        }
    };
    ThemeStore::with_keys(load_registry(settings), storage, settings.storage_keys.clone())
}

fn list_themes(settings: &Settings) {
    let registry = load_registry(settings);
    let true_color = supports_true_color();
    for theme in registry.list_themes() {
        println!("{} ({})", theme, theme.emotion());
        for (role, color) in registry.palette(theme).roles() {
            println!("    {:<14} {}", role, swatch(color, true_color));
        }
    }
}

fn print_state(store: &ThemeStore) {
    match serde_json::to_string_pretty(&store.state()) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: {}", e),
    }
}

/// Accepted spellings for `--ambient`
fn parse_ambient(value: &str) -> Option<bool> {
    match value {
        "on" | "true" => Some(true),
        "off" | "false" => Some(false),
        _ => None,
    }
}

fn handle_set(store: &ThemeStore, name: &str) -> bool {
    match store.set_theme(name) {
        Ok(theme) => {
            println!("Theme changed to {}", theme);
            true
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            let names: Vec<&str> = ThemeId::ALL.iter().map(|id| id.as_str()).collect();
            eprintln!("Available themes: {}", names.join(", "));
            false
        }
    }
}

fn handle_ambient(store: &ThemeStore, value: &str) -> bool {
    let Some(enabled) = parse_ambient(value) else {
        eprintln!("Error: --ambient expects 'on' or 'off'");
        return false;
    };
    store.set_ambient_sounds(enabled);
    println!("Ambient sounds {}", if enabled { "on" } else { "off" });
    true
}

/// Explicit theme name, or the active theme when none is given
fn rewrite_theme(store: &ThemeStore, name: Option<&str>) -> Result<ThemeId, ThemeError> {
    match name {
        Some(name) => store.registry().resolve(name),
        None => Ok(store.active_theme()),
    }
}

fn handle_rewrite(store: &ThemeStore, classes: &str, theme: Option<&str>) -> bool {
    match rewrite_theme(store, theme) {
        Ok(theme) => {
            println!("{}", store.rewriter().rewrite(classes, theme));
            true
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            false
        }
    }
}

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    let settings = Settings::load();
    logging::init(&settings.log_level);

    match args[1].as_str() {
        "-h" | "--help" => print_help(),
        "-v" | "--version" => print_version(),
        "--list" => list_themes(&settings),
        "--colors" => {
            let registry = load_registry(&settings);
            let rewriter = ClassRewriter::new(&registry);
            println!("{}", StylingTable::generate(&registry, &rewriter).to_json());
        }
        "--current" | "--set" | "--ambient" | "--rewrite" => {
            let command = args[1].as_str();
            let operand = args.get(2).map(String::as_str);
            if command != "--current" && operand.is_none() {
                eprintln!("Error: {} requires an argument", command);
                eprintln!("Use --help for usage information");
                process::exit(2);
            }

            let runtime = Runtime::new()?;
            let succeeded = runtime.block_on(async {
                let store = open_store(&settings);
                store.initialize().await;
                let succeeded = match (command, operand) {
                    ("--set", Some(name)) => handle_set(&store, name),
                    ("--ambient", Some(value)) => handle_ambient(&store, value),
                    ("--rewrite", Some(classes)) => {
                        handle_rewrite(&store, classes, args.get(3).map(String::as_str))
                    }
                    _ => {
                        print_state(&store);
                        true
                    }
                };
                store.flush().await;
                succeeded
            });
            if !succeeded {
                process::exit(1);
            }
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            eprintln!("Use --help for usage information");
            process::exit(2);
        }
    }

    Ok(())
}
