use std::path::PathBuf;

use clap::{arg, command, value_parser, ArgAction, Command};

const BEHAVIOR: &str = "Template Behavior";
const SECURITY: &str = "Security";
#[cfg(feature = "csv")]
const CSV: &str = "CSV Input";

/// Supported data formats with their detected file extensions.
pub static SUPPORTED_FORMATS: &[(&str, &str, &[&str])] = &[
    ("json", "JSON", &["json"]),
    #[cfg(feature = "toml")]
    ("toml", "TOML", &["toml"]),
    #[cfg(feature = "yaml")]
    ("yaml", "YAML", &["yaml", "yml"]),
    #[cfg(feature = "csv")]
    ("csv", "CSV", &["csv"]),
];

fn format_formats(s: &str) -> String {
    use std::fmt::Write;
    let mut formats = String::new();

    for (fmt, title, exts) in SUPPORTED_FORMATS.iter() {
        write!(formats, "- {} ({}): ", fmt, title).ok();
        for (idx, ext) in exts.iter().enumerate() {
            if idx > 0 {
                formats.push_str(", ");
            }
            formats.push_str("*.");
            formats.push_str(ext);
        }
        formats.push('\n');
    }

    s.replace("###FORMATS###", &formats)
}

pub(super) fn make_command() -> Command {
    command!()
        .name("ghostwriter")
        .disable_help_flag(true)
        .max_term_width(120)
        .args([
            #[cfg(feature = "toml")]
            arg!(--"config-file" <PATH> "Alternative path to the config file")
                .value_parser(value_parser!(PathBuf))
                .long_help("\
                    Sets an alternative path to the config file.  By default the config file \
                    is loaded from $HOME/.ghostwriter.toml if it exists.\n\n\
                    \
                    To see the possible config values use --print-config which will print the \
                    current state of the config.\n\n\
                    [env var: GHOSTWRITER_CONFIG_FILE]"),
            arg!(-f --format <FORMAT> "The format of the input data")
                .long_help(format_formats("\
                    Sets the format of the input data.\n\n\
                    \
                    The following formats are supported (and the default detected file extensions):\n\n\
                    - auto\n\
                    ###FORMATS###\n\
                    Auto detection (auto) is unavailable when stdin is used as input format.\n\n\
                    \
                    [env var: GHOSTWRITER_FORMAT]"))
                .value_parser([
                    "auto",
                    "json",
                    #[cfg(feature = "toml")]
                    "toml",
                    #[cfg(feature = "yaml")]
                    "yaml",
                    #[cfg(feature = "csv")]
                    "csv",
                ]),
            #[cfg(feature = "csv")]
            arg!(--"csv-rows-name" <NAME> "The variable holding the rows of CSV data")
                .long_help("\
                    Sets the name of the template variable that holds the list of rows when \
                    the input data is CSV.  Each row is a map from column header to cell.  \
                    Defaults to csv_rows.\n\n\
                    \
                    [env var: GHOSTWRITER_CSV_ROWS_NAME]")
                .help_heading(CSV),
            #[cfg(feature = "csv")]
            arg!(--"fill-nan" "Replace missing CSV cells")
                .long_help("\
                    Replaces empty and missing CSV cells (NaN, NA, null and similar) with the \
                    value of --fill-nan-with instead of none.\n\n\
                    \
                    [env var: GHOSTWRITER_FILL_NAN]")
                .help_heading(CSV),
            #[cfg(feature = "csv")]
            arg!(--"fill-nan-with" <VALUE> "The replacement for missing CSV cells")
                .long_help("\
                    Sets the string that replaces missing CSV cells.  Passing it turns on \
                    --fill-nan.  Defaults to an empty string.\n\n\
                    \
                    [env var: GHOSTWRITER_FILL_NAN_WITH]")
                .help_heading(CSV),
            arg!(-F --"output-format" <TYPE> "How blank lines in the output are treated")
                .long_help("\
                    Sets how blank lines in the rendered output are treated.\n\n\
                    \
                    raw (0) and normalize-breaks (2) keep the output as rendered.  remove-spaces (1) \
                    and remove-and-normalize (3) collapse every run of blank lines into a single \
                    one.  compact (4) removes all blank lines.  The numeric codes are accepted as \
                    well.\n\n\
                    \
                    [env var: GHOSTWRITER_OUTPUT_FORMAT]")
                .help_heading(BEHAVIOR),
            arg!(-D --define <EXPR> "Defines an input variable (key=value / key:=json_value)")
                .long_help("\
                    This defines an input variable for the template.  This is used in addition \
                    to the input data file.  It supports three forms: key defines a single bool, \
                    key=value defines a string value, key:=json_value defines a JSON value.  \
                    It can be supplied multiple times to set more than one value.\n\n\
                    \
                    Examples:\n\
                    -D name=Peter       defines a basic string\n\
                    -D user_id:=42      defines an integer\n\
                    -D is_true          shortform to define true boolean")
                .action(ArgAction::Append),
            arg!(--strict "Fail on undefined variables")
                .long_help("\
                    Fail on undefined variables instead of rendering them as empty strings.\n\n\
                    \
                    By default every missing variable renders as nothing and arithmetic with a \
                    missing operand yields an empty string.  In strict mode the first missing \
                    value fails the render with a message naming it.\n\n\
                    \
                    [env var: GHOSTWRITER_STRICT]")
                .help_heading(BEHAVIOR),
            arg!(-n --"no-newline" "Do not output a trailing newline")
                .long_help("\
                    Do not output a trailing newline after the rendered template.\n\n\
                    \
                    [env var: GHOSTWRITER_NEWLINE]")
                .help_heading(BEHAVIOR),
            arg!(--"max-file-size" <BYTES> "Maximum size of the template source")
                .long_help("\
                    Sets the maximum size of the template source in bytes.  Larger templates \
                    are rejected before they are read.\n\n\
                    \
                    [env var: GHOSTWRITER_MAX_FILE_SIZE]")
                .value_parser(value_parser!(u64))
                .help_heading(SECURITY),
            arg!(--"max-output-size" <BYTES> "Maximum size of the rendered output")
                .long_help("\
                    Sets the maximum size of the rendered output in bytes.\n\n\
                    \
                    [env var: GHOSTWRITER_MAX_OUTPUT_SIZE]")
                .value_parser(value_parser!(u64))
                .help_heading(SECURITY),
            arg!(--"max-range-size" <COUNT> "Maximum length of a literal range loop")
                .long_help("\
                    Sets the maximum number of iterations a for loop over a literal range() \
                    may declare.  Templates exceeding it are rejected before rendering.\n\n\
                    \
                    [env var: GHOSTWRITER_MAX_RANGE_SIZE]")
                .value_parser(value_parser!(u64))
                .help_heading(SECURITY),
            arg!(--check "Only validate the template")
                .long_help("\
                    Runs the load time checks (size, encoding, syntax and forbidden tags) \
                    without rendering and prints 'ok' if they pass."),
            arg!(-o --output <FILENAME> "Path to the output file")
                .long_help("\
                    Path to the output file instead of stdout.\n\n\
                    \
                    Files are written atomically.  If the template fails to render the original \
                    file remains.")
                .default_value("-")
                .value_parser(value_parser!(PathBuf)),
            arg!(--select <SELECTOR> "Select a subset of the input data")
                .long_help("\
                    Select a subset of the input data with a dotted path expression \
                    (eg: --select=values.0.box).  The selected value must be a map."),
            arg!(--"print-config" "Print out the loaded config"),
            arg!(-h --help "Print short help (short texts)")
                .action(ArgAction::HelpShort),
            arg!(--"long-help" "Print long help (extended, long explanation texts)")
                .action(ArgAction::HelpLong),
            arg!(template_file: [TEMPLATE_FILE] "Path to the input template")
                .long_help("\
                    This is the path to the input template in Jinja2 syntax.  If not provided \
                    this defaults to '-' which means the template is loaded from stdin.")
                .default_value("-"),
            arg!(data_file: [DATA_FILE] "Path to the data file")
                .long_help("\
                    Path to the data file in the given format.\n\n\
                    \
                    The data file supplies the context (variables) to the template.  When data \
                    is read from stdin (by using '-' as file name), --format must be specified \
                    as auto detection is based on file extensions.")
                .value_parser(value_parser!(PathBuf)),
        ])
        .before_help("ghostwriter renders untrusted jinja2 templates in a sandbox.")
        .after_help("For a short help use --help, for extended help --long-help.")
        .about("Pass a template and optionally a file with template variables to render it to stdout.")
}
