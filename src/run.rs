//! Command-line front end.

use crate::fs::RealFileSystem;
use crate::graph::TargetId;
use crate::{hash, load};
use crate::mode::DEFAULT_MODE;
use crate::progress::ConsoleProgress;
use crate::status::StatusStore;
use crate::work::{Options, Work};
use crate::{signal, trace};
use anyhow::{anyhow, bail};
use argh::FromArgs;
use std::path::Path;

/// Target planned before any requested target, when the manifest defines it.
pub const BOOTSTRAP_TARGET: &str = "setup";
/// Target built when neither the command line nor the manifest names one.
pub const FALLBACK_TARGET: &str = "all";

#[derive(FromArgs)]
/// hashmake, a content-hash incremental build orchestrator
struct Args {
    /// chdir before running
    #[argh(option, short = 'C')]
    chdir: Option<String>,

    /// input build file [default=build.hm]
    #[argh(option, short = 'f', default = "(\"build.hm\".into())")]
    build_file: String,

    /// build mode [default=debug]
    #[argh(option, short = 'm', default = "DEFAULT_MODE.to_string()")]
    mode: String,

    /// parallelism; a bare -j or -j 0 uses all processors [default=1]
    #[argh(option, short = 'j')]
    parallelism: Option<usize>,

    /// status file [default=.hashmake_status.json]
    #[argh(option, short = 's', default = "(\".hashmake_status.json\".into())")]
    status_file: String,

    /// debugging tools
    #[argh(option, short = 'd')]
    debug: Option<String>,

    /// subcommands
    #[argh(option, short = 't')]
    tool: Option<String>,

    /// print executed command lines
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// targets to build
    #[argh(positional)]
    targets: Vec<String>,
}

/// A bare `-j` means "all processors"; give it an explicit 0 so the flag
/// parser sees a value.
fn expand_bare_j(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len() + 1);
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        out.push(arg.clone());
        if arg == "-j" {
            let has_value = iter
                .peek()
                .map_or(false, |next| next.parse::<usize>().is_ok());
            if !has_value {
                out.push("0".to_string());
            }
        }
    }
    out
}

fn parallelism(flag: Option<usize>) -> anyhow::Result<usize> {
    Ok(match flag {
        None => 1,
        Some(0) => usize::from(std::thread::available_parallelism()?),
        Some(n) => n,
    })
}

fn list_targets(state: &load::State) {
    for (_, spec) in state.graph.targets() {
        let mut line = spec.name.clone();
        if spec.is_virtual {
            line.push_str(" [virtual]");
        }
        if let Some(doc) = &spec.doc {
            line.push_str(": ");
            line.push_str(doc);
        }
        println!("{}", line);
    }
}

/// The targets to build, in order: the bootstrap target if defined, then the
/// requested targets or the manifest's defaults.
fn roots(state: &load::State, requested: &[String]) -> anyhow::Result<Vec<TargetId>> {
    let graph = &state.graph;
    let mut roots = Vec::new();
    if let Some(id) = graph.lookup(BOOTSTRAP_TARGET) {
        roots.push(id);
    }
    if !requested.is_empty() {
        for name in requested {
            roots.push(graph.id(name)?);
        }
    } else if !state.default.is_empty() {
        roots.extend(state.default.iter().copied());
    } else if let Some(id) = graph.lookup(FALLBACK_TARGET) {
        roots.push(id);
    } else {
        bail!("no target specified and no default");
    }
    Ok(roots)
}

fn build(args: &Args) -> anyhow::Result<i32> {
    let mut state = trace::scope("load::read", || load::read(&args.build_file))?;

    if let Some(tool) = &args.tool {
        match tool.as_str() {
            "targets" => list_targets(&state),
            "modes" => {
                for name in state.modes.names() {
                    println!("{}", name);
                }
            }
            _ => bail!("unknown -t {:?}, use -t list to list", tool),
        }
        return Ok(0);
    }

    state.graph.tool_stamp = trace::scope("hash::tool_stamp", hash::tool_stamp);
    let wanted = roots(&state, &args.targets)?;
    let mut store = trace::scope("status::open", || {
        StatusStore::open(Path::new(&args.status_file))
    })?;
    let fs = RealFileSystem::new();
    let mut progress = ConsoleProgress::new(args.verbose);
    let options = Options {
        mode: args.mode.clone(),
        parallelism: parallelism(args.parallelism)?,
    };
    let mut work = Work::new(
        &state.graph,
        &fs,
        &mut store,
        &state.modes,
        &mut progress,
        options,
    )?;

    trace::scope("plan", || -> anyhow::Result<()> {
        for &id in &wanted {
            work.want_id(id)?;
        }
        Ok(())
    })?;
    let code = trace::scope("work.run", || work.run())?;
    let stats = work.stats();
    tracing::debug!(
        spawned = stats.spawned,
        rebuilt = stats.rebuilt,
        peak = stats.peak_running,
        "build finished"
    );

    if code == 0 {
        match stats.spawned {
            // Special case: don't print numbers when no work done.
            0 => println!("hashmake: no work to do"),
            n => println!("hashmake: ran {} tasks, now up to date", n),
        }
    }
    Ok(code)
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("HASHMAKE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // Fails only if a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn run_impl() -> anyhow::Result<i32> {
    let argv: Vec<String> = std::env::args().collect();
    let (cmd, rest) = argv
        .split_first()
        .ok_or_else(|| anyhow!("missing program name"))?;
    let rest = expand_bare_j(rest);
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
    let args = match Args::from_args(&[cmd.as_str()], &rest) {
        Ok(args) => args,
        Err(early) => {
            return match early.status {
                Ok(()) => {
                    println!("{}", early.output);
                    Ok(0)
                }
                Err(()) => Err(anyhow!("{}", early.output.trim_end())),
            };
        }
    };

    init_logging();

    if let Some(debug) = &args.debug {
        match debug.as_str() {
            "list" => {
                println!("debug tools:");
                println!("  trace  generate json performance trace");
                return Ok(0);
            }
            "trace" => trace::open("trace.json")?,
            _ => bail!("unknown -d {:?}, use -d list to list", debug),
        }
    }

    if args.tool.as_deref() == Some("list") {
        println!("subcommands:");
        println!("  targets  list targets with their descriptions");
        println!("  modes    list build modes");
        return Ok(0);
    }

    if let Some(dir) = &args.chdir {
        let dir = Path::new(dir);
        std::env::set_current_dir(dir).map_err(|err| anyhow!("chdir {:?}: {}", dir, err))?;
    }

    signal::register_sigint();
    build(&args)
}

pub fn run() -> anyhow::Result<i32> {
    let res = run_impl();
    trace::close();
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_j() {
        assert_eq!(expand_bare_j(&strings(&["-j"])), strings(&["-j", "0"]));
        assert_eq!(
            expand_bare_j(&strings(&["-j", "all"])),
            strings(&["-j", "0", "all"])
        );
        assert_eq!(expand_bare_j(&strings(&["-j", "4", "all"])), strings(&["-j", "4", "all"]));
        assert_eq!(expand_bare_j(&strings(&["-v"])), strings(&["-v"]));
    }

    #[test]
    fn parse_flags() {
        let args = Args::from_args(&["hashmake"], &["-m", "release", "-j", "3", "-v", "bin/x"])
            .map_err(|e| e.output)
            .unwrap();
        assert_eq!(args.mode, "release");
        assert_eq!(args.parallelism, Some(3));
        assert!(args.verbose);
        assert_eq!(args.build_file, "build.hm");
        assert_eq!(args.status_file, ".hashmake_status.json");
        assert_eq!(args.targets, vec!["bin/x"]);
        assert_eq!(parallelism(None).unwrap(), 1);
        assert!(parallelism(Some(0)).unwrap() >= 1);
    }

    #[test]
    fn roots_order() -> anyhow::Result<()> {
        let state = load::parse(
            "build.hm",
            b"default b\ntarget setup\ntarget all\ntarget b\n".to_vec(),
        )?;
        let names = |ids: Vec<TargetId>| -> Vec<String> {
            ids.into_iter()
                .map(|id| state.graph.target(id).name.clone())
                .collect()
        };
        assert_eq!(names(roots(&state, &[])?), vec!["setup", "b"]);
        assert_eq!(names(roots(&state, &strings(&["all"]))?), vec!["setup", "all"]);
        assert!(roots(&state, &strings(&["nope"])).is_err());

        let state = load::parse("build.hm", b"target x\n".to_vec())?;
        assert!(roots(&state, &[]).is_err());
        Ok(())
    }
}
