//! ripsyncd entry point.

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use ripsyncd::config::{DaemonConfig, DEFAULT_PASSWORD};
use ripsyncd::engine::{PolicyAction, Reconciler, DEFAULT_ROUTE_TABLE, ROUTE_TIMEOUT_SECS};
use ripsyncd::error::{DaemonError, Result};
use ripsyncd::rip::{RIP_GROUP, RIP_PORT};
use ripsyncd::{discovery, dump, frontend, kernel};
use ampr_prefix_map::Bitvec;

/// AMPR tunnel mesh maintenance daemon
#[derive(Parser, Debug)]
#[command(name = "ripsyncd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Stay in the foreground instead of daemonizing
    #[arg(short = 'd', long)]
    foreground: bool,

    /// Dump discovered state to stdout and exit
    #[arg(short = 'D', long)]
    dump: bool,

    /// Route table for created interfaces and routes
    #[arg(short = 'T', long = "rtable", default_value_t = DEFAULT_ROUTE_TABLE)]
    rtable: u32,

    /// Route table for the listener socket (defaults to the create table)
    #[arg(short = 'B', long = "bind-rtable")]
    bind_rtable: Option<u32>,

    /// Accept advertisements inside this network (repeatable)
    #[arg(short = 'A', long = "accept", value_name = "CIDR")]
    accept: Vec<String>,

    /// Ignore advertisements inside this network (repeatable)
    #[arg(short = 'I', long = "ignore", value_name = "CIDR")]
    ignore: Vec<String>,

    /// Mark an interface ordinal static: never allocated, never torn down
    #[arg(short = 's', long = "static-interface", value_name = "N")]
    static_interfaces: Vec<usize>,

    /// Read framed advertisements from a file instead of the socket
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    file: Option<PathBuf>,

    /// Advertisement password
    #[arg(short = 'p', long, default_value = DEFAULT_PASSWORD)]
    password: String,

    /// Local outer (physical) endpoint address
    local_outer_ip: String,

    /// Local inner (mesh) address
    local_inner_ip: String,
}

enum Input {
    Socket(std::net::UdpSocket),
    File(std::fs::File),
}

fn main() -> ExitCode {
    let matches = Args::command().get_matches();
    let args = match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    tracing_subscriber::fmt().with_target(false).init();

    match run(args, &matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_config(args: &Args, matches: &ArgMatches) -> Result<DaemonConfig> {
    let local_outer = args
        .local_outer_ip
        .parse()
        .map_err(|e| DaemonError::config(format!("local outer address: {}", e)))?;
    let local_inner = args
        .local_inner_ip
        .parse()
        .map_err(|e| DaemonError::config(format!("local inner address: {}", e)))?;

    // the policy map keeps the first insertion for a prefix, so for one
    // given to both -A and -I the flag appearing first on the command line
    // wins; collect the entries in their true argv order
    let mut specs: Vec<(usize, &String, PolicyAction)> = Vec::new();
    for (id, values, action) in [
        ("accept", &args.accept, PolicyAction::Accept),
        ("ignore", &args.ignore, PolicyAction::Ignore),
    ] {
        let indices = matches.indices_of(id).into_iter().flatten();
        for (index, spec) in indices.zip(values) {
            specs.push((index, spec, action));
        }
    }
    specs.sort_by_key(|(index, _, _)| *index);

    let mut policy = Vec::new();
    for (_, spec, action) in specs {
        let net = spec
            .parse()
            .map_err(|e| DaemonError::config(format!("policy network {}: {}", spec, e)))?;
        policy.push((net, action));
    }

    Ok(DaemonConfig {
        local_outer,
        local_inner,
        rtable_create: args.rtable,
        rtable_bind: args.bind_rtable.unwrap_or(DEFAULT_ROUTE_TABLE),
        policy,
        static_interfaces: args.static_interfaces.clone(),
        password: args.password.clone(),
        replay_file: args.file.clone(),
        foreground: args.foreground,
        dump: args.dump,
    })
}

fn run(args: Args, matches: &ArgMatches) -> Result<()> {
    let config = build_config(&args, matches)?;
    let policy = config.build_policy();
    let password = config.wire_password();

    let mut interfaces = Bitvec::new();
    let mut static_interfaces = Bitvec::new();
    for ordinal in &config.static_interfaces {
        interfaces.set(*ordinal);
        static_interfaces.set(*ordinal);
    }

    // learn what is already on the system before touching anything
    let discovered = kernel::discover(config.rtable_create)?;
    let now = frontend::unix_now();
    let model = discovery::build_model(
        &discovered,
        &policy,
        &mut interfaces,
        &static_interfaces,
        now + ROUTE_TIMEOUT_SECS,
    )?;

    if config.dump {
        let mut stdout = io::stdout().lock();
        dump::dump_all(&mut stdout, &policy, &model)?;
        return Ok(());
    }

    let platform = kernel::PlatformKernel::new(config.rtable_create)?;
    let mut reconciler = Reconciler::new(
        platform,
        model,
        policy,
        interfaces,
        static_interfaces,
        config.engine_config(),
    );

    let input = match &config.replay_file {
        Some(path) => Input::File(std::fs::File::open(path)?),
        None => Input::Socket(kernel::open_listener(
            RIP_GROUP,
            RIP_PORT,
            config.rtable_bind,
        )?),
    };

    // discovery may have left tunnels serving no networks; drop them now
    // that the kernel sockets are live
    reconciler.cleanup()?;

    if !config.foreground {
        nix::unistd::daemon(false, true)
            .map_err(|e| DaemonError::Io(io::Error::from_raw_os_error(e as i32)))?;
    }

    info!("listening for advertisements");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()?;
    runtime.block_on(async {
        match input {
            Input::Socket(socket) => {
                let mut source = frontend::UdpSource::new(socket)?;
                frontend::run(&mut source, &mut reconciler, &password).await
            }
            Input::File(file) => {
                let mut source = frontend::FileSource::new(tokio::fs::File::from_std(file));
                frontend::run(&mut source, &mut reconciler, &password).await
            }
        }
    })
}
