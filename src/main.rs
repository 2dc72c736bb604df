use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::Parser;

use quickjs_bind::{init_logging, BindingConfig, BindingError, EvalFlags, Runtime};

/// Evaluate a JavaScript file, URL or inline expression and print the result
#[derive(Parser, Debug)]
#[command(name = "quickjs-bind", version, about)]
struct Cli {
    /// Script path, bare module name or http(s) URL
    script: Option<String>,

    /// Evaluate this source text instead of a script
    #[arg(short = 'e', long = "eval", conflicts_with = "script")]
    eval: Option<String>,

    /// Evaluate as an ES module
    #[arg(short, long)]
    module: bool,

    /// Evaluate in strict mode
    #[arg(long)]
    strict: bool,

    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the structure of objects instead of their rendering
    #[arg(long)]
    materialize: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) if path.extension().is_some_and(|ext| ext == "json") => {
            BindingConfig::from_json_file(path)?
        }
        Some(path) => BindingConfig::from_toml_file(path)?,
        None => BindingConfig::load_or_default(),
    };
    config.apply_env_overrides();
    init_logging(&config.logging);

    let mut flags = if cli.module {
        EvalFlags::MODULE
    } else {
        EvalFlags::GLOBAL
    };
    if cli.strict {
        flags |= EvalFlags::STRICT;
    }

    let runtime = Runtime::with_config(config).map_err(report)?;
    let context = runtime.new_context().map_err(report)?;

    let result = match (&cli.eval, &cli.script) {
        (Some(source), _) => context.eval(source, "<cmdline>", flags),
        (None, Some(script)) => context.load(script, flags),
        (None, None) => bail!("nothing to run: pass a script or --eval <SOURCE>"),
    };
    let result = result.map_err(report)?;

    let result = if cli.materialize {
        result.materialize().map_err(report)?
    } else {
        result
    };
    if !result.is_undefined() {
        println!("{}", result);
    }
    Ok(())
}

/// Render a binding error, appending the script stack when there is one
fn report(err: BindingError) -> anyhow::Error {
    match err.as_exception().and_then(|e| e.stack()) {
        Some(stack) => anyhow!("{}\n{}", err, stack),
        None => anyhow!("{}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_inline_eval() {
        let cli = Cli::try_parse_from(["quickjs-bind", "-e", "1 + 1", "--module"]).unwrap();
        assert_eq!(cli.eval.as_deref(), Some("1 + 1"));
        assert!(cli.module);
        assert!(cli.script.is_none());
    }

    #[test]
    fn test_cli_rejects_script_with_eval() {
        assert!(Cli::try_parse_from(["quickjs-bind", "main.js", "-e", "1"]).is_err());
    }

    #[test]
    fn test_report_renders_message() {
        let err = report(BindingError::Released);
        assert!(err.to_string().contains("released"));
    }
}
