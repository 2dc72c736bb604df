//! Built-in `std` and `os` modules.
//!
//! Every context can `import * as std from 'std'` and `import * as os from 'os'`.
//! The modules are native: their exports are Rust closures declared through
//! [`ModuleDef`]. Only the commonly used part of the engine's standard library
//! is provided. Functions that report OS failures follow the engine's
//! convention of returning `0` on success and `-errno` on failure.

use std::fs;
use std::io::Write;
use std::time::{Duration, Instant};

use rquickjs::convert::{Coerced, List};
use rquickjs::function::{Opt, Rest};
use rquickjs::loader::{BuiltinResolver, Loader};
use rquickjs::module::{Declarations, Exports, ModuleData, ModuleDef};
use rquickjs::{Ctx, Error, FromJs, Function, Result, Value};
use tracing::debug;

/// Names of the built-in modules
pub const BUILTIN_MODULES: [&str; 2] = ["std", "os"];

/// Resolver that accepts the built-in module names
pub fn builtin_resolver() -> BuiltinResolver {
    BUILTIN_MODULES
        .iter()
        .fold(BuiltinResolver::default(), |resolver, name| resolver.with_module(*name))
}

/// Loader for the built-in modules.
///
/// Unlike [`rquickjs::loader::ModuleLoader`] it can serve the same module to
/// every context of the runtime.
#[derive(Debug, Default)]
pub struct BuiltinModules;

impl Loader for BuiltinModules {
    fn load<'js>(&mut self, _ctx: &Ctx<'js>, name: &str) -> Result<ModuleData> {
        debug!(target: "quickjs_bind::loader", module = name, "Loading built-in module");
        match name {
            "std" => Ok(ModuleData::native::<StdModule, _>(name)),
            "os" => Ok(ModuleData::native::<OsModule, _>(name)),
            _ => Err(Error::new_loading(name)),
        }
    }
}

fn errno(err: &std::io::Error) -> i32 {
    -err.raw_os_error().unwrap_or(1)
}

// ============================================================================
// std
// ============================================================================

pub struct StdModule;

const STD_EXPORTS: [&str; 7] = [
    "puts", "printf", "sprintf", "getenv", "setenv", "unsetenv", "loadFile",
];

impl ModuleDef for StdModule {
    fn declare(declare: &mut Declarations) -> Result<()> {
        for name in STD_EXPORTS {
            declare.declare(name)?;
        }
        Ok(())
    }

    fn evaluate<'js>(ctx: &Ctx<'js>, exports: &mut Exports<'js>) -> Result<()> {
        exports.export(
            "puts",
            Function::new(ctx.clone(), |text: Coerced<String>| -> Result<()> {
                write_stdout(&text.0)
            })?,
        )?;
        exports.export(
            "printf",
            Function::new(
                ctx.clone(),
                |ctx: Ctx<'js>, format: Coerced<String>, args: Rest<Value<'js>>| -> Result<usize> {
                    let text = sprintf(&format.0, &printf_args(&ctx, args.0)?);
                    write_stdout(&text)?;
                    Ok(text.len())
                },
            )?,
        )?;
        exports.export(
            "sprintf",
            Function::new(
                ctx.clone(),
                |ctx: Ctx<'js>, format: Coerced<String>, args: Rest<Value<'js>>| -> Result<String> {
                    Ok(sprintf(&format.0, &printf_args(&ctx, args.0)?))
                },
            )?,
        )?;
        exports.export(
            "getenv",
            Function::new(ctx.clone(), |name: Coerced<String>| std::env::var(name.0).ok())?,
        )?;
        exports.export(
            "setenv",
            Function::new(ctx.clone(), |name: Coerced<String>, value: Coerced<String>| {
                std::env::set_var(name.0, value.0)
            })?,
        )?;
        exports.export(
            "unsetenv",
            Function::new(ctx.clone(), |name: Coerced<String>| std::env::remove_var(name.0))?,
        )?;
        exports.export(
            "loadFile",
            Function::new(ctx.clone(), |path: Coerced<String>| fs::read_to_string(path.0).ok())?,
        )?;
        Ok(())
    }
}

fn write_stdout(text: &str) -> Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(())
}

// ============================================================================
// os
// ============================================================================

pub struct OsModule;

const OS_EXPORTS: [&str; 8] = [
    "platform", "getcwd", "now", "sleep", "remove", "rename", "mkdir", "readdir",
];

fn platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

impl ModuleDef for OsModule {
    fn declare(declare: &mut Declarations) -> Result<()> {
        for name in OS_EXPORTS {
            declare.declare(name)?;
        }
        Ok(())
    }

    fn evaluate<'js>(ctx: &Ctx<'js>, exports: &mut Exports<'js>) -> Result<()> {
        let started = Instant::now();

        exports.export("platform", platform())?;
        exports.export(
            "getcwd",
            Function::new(ctx.clone(), || match std::env::current_dir() {
                Ok(dir) => List((dir.to_string_lossy().into_owned(), 0)),
                Err(err) => List((String::new(), errno(&err))),
            })?,
        )?;
        exports.export(
            "now",
            Function::new(ctx.clone(), move || started.elapsed().as_secs_f64() * 1000.0)?,
        )?;
        exports.export(
            "sleep",
            Function::new(ctx.clone(), |ms: f64| {
                if ms.is_finite() && ms > 0.0 {
                    std::thread::sleep(Duration::from_secs_f64(ms / 1000.0));
                }
            })?,
        )?;
        exports.export(
            "remove",
            Function::new(ctx.clone(), |path: Coerced<String>| {
                let path = path.0;
                let result = match fs::metadata(&path) {
                    Ok(meta) if meta.is_dir() => fs::remove_dir(&path),
                    _ => fs::remove_file(&path),
                };
                result.map_or_else(|err| errno(&err), |_| 0)
            })?,
        )?;
        exports.export(
            "rename",
            Function::new(ctx.clone(), |from: Coerced<String>, to: Coerced<String>| {
                fs::rename(from.0, to.0).map_or_else(|err| errno(&err), |_| 0)
            })?,
        )?;
        exports.export(
            "mkdir",
            Function::new(ctx.clone(), |path: Coerced<String>, _mode: Opt<i32>| {
                fs::create_dir(path.0).map_or_else(|err| errno(&err), |_| 0)
            })?,
        )?;
        exports.export(
            "readdir",
            Function::new(ctx.clone(), |path: Coerced<String>| {
                match fs::read_dir(path.0) {
                    Ok(entries) => {
                        let mut names = vec![".".to_string(), "..".to_string()];
                        names.extend(
                            entries
                                .filter_map(|entry| entry.ok())
                                .map(|entry| entry.file_name().to_string_lossy().into_owned()),
                        );
                        List((names, 0))
                    }
                    Err(err) => List((Vec::new(), errno(&err))),
                }
            })?,
        )?;
        Ok(())
    }
}

// ============================================================================
// printf
// ============================================================================

/// 已经从引擎值取出的 printf 参数
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PrintfArg {
    Number(f64),
    Text(String),
}

impl PrintfArg {
    fn number(&self) -> f64 {
        match self {
            PrintfArg::Number(n) => *n,
            PrintfArg::Text(text) => text.trim().parse().unwrap_or(f64::NAN),
        }
    }

    fn text(&self) -> String {
        match self {
            PrintfArg::Number(n) if n.fract() == 0.0 && n.abs() < 1e21 => format!("{}", *n as i64),
            PrintfArg::Number(n) => n.to_string(),
            PrintfArg::Text(text) => text.clone(),
        }
    }
}

fn printf_args<'js>(ctx: &Ctx<'js>, values: Vec<Value<'js>>) -> Result<Vec<PrintfArg>> {
    values
        .into_iter()
        .map(|value| match value.as_number() {
            Some(n) => Ok(PrintfArg::Number(n)),
            None => Coerced::<String>::from_js(ctx, value).map(|s| PrintfArg::Text(s.0)),
        })
        .collect()
}

/// C 风格格式化：支持 `- + 0` 标志、宽度、精度与 `d i u x X o f F e E g G s c %`
pub(crate) fn sprintf(format: &str, args: &[PrintfArg]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut args = args.iter();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let (mut left, mut zero, mut plus) = (false, false, false);
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => left = true,
                '0' => zero = true,
                '+' => plus = true,
                _ => break,
            }
            chars.next();
        }
        let width = take_digits(&mut chars);
        let precision = if chars.peek() == Some(&'.') {
            chars.next();
            Some(take_digits(&mut chars).unwrap_or(0))
        } else {
            None
        };
        while matches!(chars.peek(), Some('l' | 'h' | 'z')) {
            chars.next();
        }

        let Some(conv) = chars.next() else {
            out.push('%');
            break;
        };
        if conv == '%' {
            out.push('%');
            continue;
        }
        if !"diuxXoFfeEgGsc".contains(conv) {
            out.push('%');
            out.push(conv);
            continue;
        }

        let arg = args.next();
        let number = arg.map_or(0.0, PrintfArg::number);
        let int = if number.is_finite() { number.trunc() as i64 } else { 0 };
        let (body, numeric) = match conv {
            'd' | 'i' | 'u' if plus && int >= 0 => (format!("+{}", int), true),
            'd' | 'i' | 'u' => (int.to_string(), true),
            'x' => (format!("{:x}", int), true),
            'X' => (format!("{:X}", int), true),
            'o' => (format!("{:o}", int), true),
            'f' | 'F' => (signed(format!("{:.*}", precision.unwrap_or(6), number), plus), true),
            'e' | 'E' => {
                let text = exponent(number, precision.unwrap_or(6));
                let text = if conv == 'E' { text.to_uppercase() } else { text };
                (signed(text, plus), true)
            }
            'g' | 'G' => (signed(PrintfArg::Number(number).text(), plus), true),
            'c' => {
                let ch = match arg {
                    Some(PrintfArg::Text(text)) => text.chars().next(),
                    _ => char::from_u32(int as u32),
                };
                (ch.map(String::from).unwrap_or_default(), false)
            }
            _ => {
                let text = arg.map(PrintfArg::text).unwrap_or_default();
                let text = match precision {
                    Some(max) => text.chars().take(max).collect(),
                    None => text,
                };
                (text, false)
            }
        };
        out.push_str(&pad(body, width.unwrap_or(0), left, zero && numeric));
    }
    out
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut value: Option<usize> = None;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        value = Some(value.unwrap_or(0) * 10 + digit as usize);
        chars.next();
    }
    value
}

fn signed(text: String, plus: bool) -> String {
    if plus && !text.starts_with('-') {
        format!("+{}", text)
    } else {
        text
    }
}

/// `1.5e0` -> `1.500000e+00`
fn exponent(number: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, number);
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => text,
    }
}

fn pad(body: String, width: usize, left: bool, zero: bool) -> String {
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let fill = width - len;
    if left {
        format!("{}{}", body, " ".repeat(fill))
    } else if zero {
        let (sign, digits) = match body.chars().next() {
            Some(c @ ('-' | '+')) => (c.to_string(), &body[1..]),
            _ => (String::new(), body.as_str()),
        };
        format!("{}{}{}", sign, "0".repeat(fill), digits)
    } else {
        format!("{}{}", " ".repeat(fill), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: f64) -> PrintfArg {
        PrintfArg::Number(v)
    }

    fn s(v: &str) -> PrintfArg {
        PrintfArg::Text(v.to_string())
    }

    #[test]
    fn test_sprintf_integers() {
        assert_eq!(sprintf("%d|%5d|%-5d|%05d", &[n(42.0), n(7.0), n(7.0), n(-7.0)]), "42|    7|7    |-0007");
        assert_eq!(sprintf("%x %X %o %+d", &[n(255.0), n(255.0), n(8.0), n(3.0)]), "ff FF 10 +3");
    }

    #[test]
    fn test_sprintf_floats() {
        assert_eq!(sprintf("%.2f", &[n(3.14159)]), "3.14");
        assert_eq!(sprintf("%05.1f", &[n(2.5)]), "002.5");
        assert_eq!(sprintf("%e", &[n(1500.0)]), "1.500000e+03");
        assert_eq!(sprintf("%g", &[n(4.0)]), "4");
    }

    #[test]
    fn test_sprintf_strings() {
        assert_eq!(sprintf("[%s] [%.2s] [%4s]", &[s("abc"), s("abc"), s("x")]), "[abc] [ab] [   x]");
        assert_eq!(sprintf("%c%c", &[s("hi"), n(65.0)]), "hA");
        assert_eq!(sprintf("%s", &[n(12.0)]), "12");
    }

    #[test]
    fn test_sprintf_literals_and_missing_args() {
        assert_eq!(sprintf("100%% %q", &[]), "100% %q");
        assert_eq!(sprintf("%d %s.", &[]), "0 .");
        assert_eq!(sprintf("trailing %", &[]), "trailing %");
    }

    #[test]
    fn test_builtin_module_names() {
        let names: Vec<&str> = BUILTIN_MODULES.to_vec();
        assert_eq!(names, vec!["std", "os"]);
        assert!(!platform().is_empty());
    }
}
