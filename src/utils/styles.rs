//! Used to color various bits of output using the [styles] table in
//! ~/.coreptr/config.toml.
use crate::config::{ColorChoice, Config, StyleConfig};
use nu_ansi_term::{Color, Style};
use std::io::IsTerminal;
use std::sync::OnceLock;

struct Styles {
    stdout: bool, // whether to color text going to stdout
    stderr: bool,
    warn: Style,
    note: Style,
    address: Style,
    label: Style,
    module: Style,
    table_header: Style,
}

static STYLES: OnceLock<Styles> = OnceLock::new();

/// Should be called once before any output. If it isn't (e.g. in unit tests) output is
/// not colored.
pub fn init_styles(config: &Config, choice: Option<ColorChoice>) {
    let (stdout, stderr) = match choice.unwrap_or(config.color) {
        ColorChoice::Always => (true, true),
        ColorChoice::Never => (false, false),
        ColorChoice::Auto => (
            std::io::stdout().is_terminal(),
            std::io::stderr().is_terminal(),
        ),
    };
    let _ = STYLES.set(Styles::new(&config.styles, stdout, stderr));
}

fn styles() -> &'static Styles {
    STYLES.get_or_init(|| Styles::new(&StyleConfig::default(), false, false))
}

impl Styles {
    fn new(config: &StyleConfig, stdout: bool, stderr: bool) -> Self {
        Styles {
            stdout,
            stderr,
            warn: parse_style("warn", &config.warn),
            note: parse_style("note", &config.note),
            address: parse_style("address", &config.address),
            label: parse_style("label", &config.label),
            module: parse_style("module", &config.module),
            table_header: parse_style("table_header", &config.table_header),
        }
    }
}

/// "bold red", "cyan", "bold", etc.
fn parse_style(name: &str, text: &str) -> Style {
    let mut style = Style::new();
    for word in text.split_whitespace() {
        style = match word.to_lowercase().as_str() {
            "bold" => style.bold(),
            "italic" => style.italic(),
            "underline" => style.underline(),
            "dimmed" => style.dimmed(),
            "black" => style.fg(Color::Black),
            "red" => style.fg(Color::Red),
            "green" => style.fg(Color::Green),
            "yellow" => style.fg(Color::Yellow),
            "blue" => style.fg(Color::Blue),
            "purple" | "magenta" => style.fg(Color::Purple),
            "cyan" => style.fg(Color::Cyan),
            "white" => style.fg(Color::White),
            "dark_gray" => style.fg(Color::DarkGray),
            _ => {
                eprintln!("ignoring unknown style '{word}' for {name}"); // don't use warn() here
                style
            }
        };
    }
    style
}

fn paint(enabled: bool, style: Style, text: &str) -> String {
    if enabled {
        style.paint(text).to_string()
    } else {
        text.to_string()
    }
}

pub trait Styling {
    fn warn(&self) -> String;
    fn note(&self) -> String;
    fn address(&self) -> String;
    fn label(&self) -> String;
    fn module(&self) -> String;
    fn table_header(&self) -> String;
}

impl<T: AsRef<str> + ?Sized> Styling for T {
    fn warn(&self) -> String {
        let s = styles();
        paint(s.stderr, s.warn, self.as_ref())
    }

    fn note(&self) -> String {
        let s = styles();
        paint(s.stderr, s.note, self.as_ref())
    }

    fn address(&self) -> String {
        let s = styles();
        paint(s.stdout, s.address, self.as_ref())
    }

    fn label(&self) -> String {
        let s = styles();
        paint(s.stdout, s.label, self.as_ref())
    }

    fn module(&self) -> String {
        let s = styles();
        paint(s.stdout, s.module, self.as_ref())
    }

    fn table_header(&self) -> String {
        let s = styles();
        paint(s.stdout, s.table_header, self.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_styles() {
        assert_eq!(parse_style("warn", "bold red"), Style::new().bold().fg(Color::Red));
        assert_eq!(parse_style("label", "dark_gray"), Style::new().fg(Color::DarkGray));
        assert_eq!(parse_style("label", "sparkly"), Style::new());
    }

    #[test]
    fn disabled_styles_are_plain() {
        assert_eq!(paint(false, Style::new().bold(), "0x10"), "0x10");
        assert_ne!(paint(true, Style::new().bold(), "0x10"), "0x10");
        assert_eq!("libfoo.so".module(), "libfoo.so");
    }
}
