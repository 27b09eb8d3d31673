// ABOUTME: CLI entry point - load a flatfile, validate it, evaluate softcode

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use softmush::config;
use softmush::db::{Db, Dbref, GOD};
use softmush::eval::{eval_top, EvalContext};
use softmush::flatfile;
use softmush::functions;
use softmush::host::NullHost;
use softmush::validator::Validator;
use std::path::PathBuf;

/// TinyMUSH-family softcode evaluator
#[derive(Parser, Debug)]
#[command(name = "softmush")]
#[command(version = config::VERSION)]
#[command(about = "A TinyMUSH-family softcode evaluator")]
#[command(long_about = "Loads a flatfile database, validates legacy softcode, \
and evaluates expressions interactively or one-shot")]
struct CliArgs {
    /// Flatfile database to load (optional - starts with a minimal world)
    #[arg(value_name = "FLATFILE")]
    flatfile: Option<PathBuf>,

    /// Run the validator and print the JSON report
    #[arg(long)]
    validate: bool,

    /// Apply every fixable finding in a category, then re-dump the database
    #[arg(long, value_name = "CATEGORY")]
    fix_category: Option<String>,

    /// Where --fix-category writes the repaired dump
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Evaluate one expression and exit
    #[arg(long, value_name = "EXPR")]
    eval: Option<String>,

    /// Executing object
    #[arg(long, value_name = "DBREF", default_value_t = GOD)]
    executor: Dbref,

    /// Enacting object (defaults to the executor)
    #[arg(long, value_name = "DBREF")]
    enactor: Option<Dbref>,

    /// Function nesting limit
    #[arg(long, default_value_t = config::DEFAULT_FUNCTION_NEST_LIMIT)]
    nest_limit: usize,

    /// Cumulative function invocation limit
    #[arg(long, default_value_t = config::DEFAULT_FUNCTION_INVOCATION_LIMIT)]
    invocation_limit: usize,

    /// Disable ANSI output
    #[arg(long)]
    no_ansi: bool,
}

fn deliver(ctx: &mut EvalContext) {
    for note in ctx.take_notifications() {
        println!("[{:?} -> #{}] {}", note.kind, note.target, note.message);
    }
}

fn repl(ctx: &mut EvalContext) -> Result<(), ReadlineError> {
    println!("{}", config::WELCOME_MESSAGE);
    println!("{}", config::WELCOME_SUBTITLE);
    println!("Type softcode to evaluate it; .help for commands.\n");
    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("mush> ") {
            Ok(line) => {
                let line = line.trim_end();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                match line {
                    ".quit" | ".exit" => break,
                    ".help" => {
                        println!("{}", config::HELP_TEXT);
                        continue;
                    }
                    ".validate" => {
                        let funcs = functions::builtin_table();
                        let validator = Validator::run(ctx.db, &funcs);
                        println!("{}", validator.report_json());
                        continue;
                    }
                    _ => {}
                }
                if let Some(rest) = line.strip_prefix(".executor ") {
                    let dbref: Dbref = rest.trim().trim_start_matches('#').parse().unwrap_or(GOD);
                    if ctx.db.exists(dbref) {
                        ctx.executor = dbref;
                        ctx.caller = dbref;
                        ctx.enactor = dbref;
                        println!("executor is now #{}", dbref);
                    } else {
                        println!("no such object #{}", dbref);
                    }
                    continue;
                }
                let out = eval_top(ctx, line);
                println!("{}", out);
                deliver(ctx);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn main() {
    let args = CliArgs::parse();

    let mut db = match &args.flatfile {
        Some(path) => match flatfile::load_file(path) {
            Ok(db) => db,
            Err(err) => {
                eprintln!("failed to load {}: {}", path.display(), err);
                std::process::exit(1);
            }
        },
        None => Db::minimal(),
    };

    if args.validate || args.fix_category.is_some() {
        let funcs = functions::builtin_table();
        let mut validator = Validator::run(&db, &funcs);
        if let Some(category) = &args.fix_category {
            let applied = validator.apply_category(&mut db, category);
            eprintln!("applied {} fix(es) in category '{}'", applied, category);
            let target = args
                .output
                .clone()
                .or_else(|| args.flatfile.clone())
                .unwrap_or_else(|| PathBuf::from("repaired.flat"));
            if let Err(err) = flatfile::dump_file(&db, &target) {
                eprintln!("failed to write {}: {}", target.display(), err);
                std::process::exit(1);
            }
            eprintln!("wrote {}", target.display());
        }
        println!("{}", validator.report_json());
        if args.eval.is_none() {
            return;
        }
    }

    let host = NullHost;
    let mut ctx = EvalContext::new(&mut db, &host);
    ctx.executor = args.executor;
    ctx.caller = args.executor;
    ctx.enactor = args.enactor.unwrap_or(args.executor);
    ctx.nest_limit = args.nest_limit;
    ctx.invocation_limit = args.invocation_limit;
    ctx.ansi_enabled = !args.no_ansi;

    if let Some(expr) = &args.eval {
        let out = eval_top(&mut ctx, expr);
        println!("{}", out);
        deliver(&mut ctx);
        return;
    }

    if let Err(err) = repl(&mut ctx) {
        eprintln!("readline error: {}", err);
        std::process::exit(1);
    }
}
