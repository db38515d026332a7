//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "quill")]
#[command(about = "Render and inspect quill templates")]
#[command(version)]
pub struct Cli {
    /// Log filter in env_logger syntax, e.g. `quill_template=trace`
    #[arg(long, global = true, env = "QUILL_LOG")]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render a template against a JSON data context
    Render {
        #[command(flatten)]
        templates: TemplateArgs,

        /// Data context as inline JSON, or `@path` to read it from a file
        #[arg(long, short)]
        context: Option<String>,
    },

    /// Print the compiled instruction listing of a template
    Listing {
        #[command(flatten)]
        templates: TemplateArgs,
    },

    /// Render the built-in counter and click it
    Counter {
        /// Number of clicks on the `+` button
        #[arg(long, default_value_t = 3)]
        clicks: u32,
    },
}

#[derive(Debug, Args)]
pub struct TemplateArgs {
    /// Template files; each registers under its file stem
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Template to render (defaults to the first file's stem)
    #[arg(long, short)]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn render_arguments() {
        let cli = Cli::try_parse_from([
            "quill", "render", "a.xml", "b.xml", "--name", "b", "-c", "{}",
        ])
        .unwrap();
        let Command::Render { templates, context } = cli.command else { panic!("wrong command") };
        assert_eq!(templates.files, [PathBuf::from("a.xml"), PathBuf::from("b.xml")]);
        assert_eq!(templates.name.as_deref(), Some("b"));
        assert_eq!(context.as_deref(), Some("{}"));
    }

    #[test]
    fn render_requires_files() {
        assert!(Cli::try_parse_from(["quill", "render"]).is_err());
    }

    #[test]
    fn counter_defaults() {
        let cli = Cli::try_parse_from(["quill", "--log", "debug", "counter"]).unwrap();
        assert_eq!(cli.log.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Counter { clicks: 3 }));
    }
}
