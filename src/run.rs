use anyhow::anyhow;
use argh::FromArgs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::fs::{RealFileSystem, StatCache};
use crate::progress::ConsoleProgress;
use crate::task::Runner;
use crate::work::{Options, Scheduler};
use crate::{load, logging, trace};

/// fringe, a make-style build scheduler.
#[derive(FromArgs, Debug)]
struct Args {
    /// chdir before running
    #[argh(option, short = 'C')]
    chdir: Option<String>,

    /// input build file [default=Makefile.fringe]
    #[argh(option, short = 'f', default = "String::from(\"Makefile.fringe\")")]
    file: String,

    /// debugging tools, use -d list to list
    #[argh(option, short = 'd')]
    debug: Option<String>,

    /// parallelism [default from system]
    #[argh(option, short = 'j')]
    jobs: Option<usize>,

    /// keep going until at least N failures (0 means infinity) [default=1]
    #[argh(option, short = 'k', default = "1")]
    keep_going: usize,

    /// print commands instead of running them
    #[argh(switch, short = 'n')]
    dry_run: bool,

    /// build nothing; exit 1 if anything is out of date
    #[argh(switch, short = 'q')]
    query: bool,

    /// randomize build order (also enabled by RANDOM_ORDER in the environment)
    #[argh(switch, short = 'r')]
    random: bool,

    /// seed for -r, to replay a given order
    #[argh(option)]
    seed: Option<u64>,

    /// print node names as they start
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// targets to build [default=first in file]
    #[argh(positional)]
    targets: Vec<String>,
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

fn build(args: &Args, progress: &mut ConsoleProgress) -> anyhow::Result<i32> {
    let load::State { graph, default } = trace::scope("load", || load::read(&args.file))?;

    let fs = StatCache::new(RealFileSystem::new());
    // Sources are stat()ed up front in parallel; everything else on demand.
    trace::scope("stat", || {
        fs.prime(
            graph
                .all_ids()
                .map(|id| graph.node(id))
                .filter(|node| node.children.is_empty())
                .map(|node| node.name.as_str())
                .collect::<Vec<_>>(),
        )
    })?;

    let randomize = args.random || std::env::var_os("RANDOM_ORDER").is_some();
    let seed = args.seed.unwrap_or_else(time_seed);
    if randomize {
        tracing::info!(seed, "randomizing build order");
    }
    let options = Options {
        randomize,
        seed,
        dry_run: args.dry_run,
        keep_going: args.keep_going,
        query: args.query,
    };

    let parallelism = match args.jobs {
        Some(n) => n,
        None => usize::from(std::thread::available_parallelism()?),
    };
    let mut runner = Runner::new(parallelism, args.dry_run);

    let mut work = Scheduler::new(graph, &fs, progress, options);
    if !args.targets.is_empty() {
        for name in &args.targets {
            work.want_file(name)?;
        }
    } else if let Some(id) = default {
        work.want_node(id);
    } else {
        anyhow::bail!("no target specified and no default");
    }

    let summary = trace::scope("work.run", || work.run(&mut runner))?;

    if args.query {
        return Ok(if summary.out_of_date { 1 } else { 0 });
    }
    if !summary.success() {
        // The failing task output is enough info.
        return Ok(1);
    }
    match summary.ran {
        0 => println!("fringe: no work to do"),
        n => println!("fringe: ran {} tasks, now up to date", n),
    }
    Ok(0)
}

fn run_impl() -> anyhow::Result<i32> {
    let args: Args = argh::from_env();

    let mut debug_make = false;
    if let Some(debug) = &args.debug {
        match debug.as_str() {
            "list" => {
                println!("debug tools:");
                println!("  make   log scheduling decisions");
                println!("  trace  generate json performance trace");
                return Ok(1);
            }
            "make" => debug_make = true,
            "trace" => trace::open("trace.json")?,
            _ => anyhow::bail!("unknown -d {:?}, use -d list to list", debug),
        }
    }
    logging::init(debug_make);

    if let Some(dir) = &args.chdir {
        let dir = Path::new(dir);
        std::env::set_current_dir(dir).map_err(|err| anyhow!("chdir {:?}: {}", dir, err))?;
    }

    let mut progress = ConsoleProgress::new(args.verbose);
    build(&args, &mut progress)
}

pub fn run() -> anyhow::Result<i32> {
    let res = run_impl();
    trace::close()?;
    res
}
