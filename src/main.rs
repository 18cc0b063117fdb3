use icmp_probe::{
    resolve, AddressFamily, EchoTransport, PingResult, PingRunner, ProbeConfig, ProbeScheduler,
    StopCondition, Ttl, DEFAULT_TTL,
};
use std::io;
use std::process::ExitCode;

#[derive(argh::FromArgs)]
/// send one ICMP ECHO_REQUEST every two seconds until interrupted
struct Args {
    #[argh(option, default = "DEFAULT_TTL")]
    /// IP time to live (hop limit for IPv6) of outgoing packets
    ttl: u8,

    #[argh(switch)]
    /// use IPv6 instead of IPv4
    ipv6: bool,

    #[argh(option)]
    /// echo identifier to use instead of a random one
    ident: Option<u16>,

    #[argh(switch, short = 'v')]
    /// log probe internals to stderr
    verbose: bool,

    #[argh(positional)]
    /// host name or IP address
    host: String,
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    let level = if args.verbose { tracing::Level::TRACE } else { tracing::Level::WARN };
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("icmp-probe: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> PingResult<()> {
    let family = if args.ipv6 { AddressFamily::V6 } else { AddressFamily::V4 };
    tracing::debug!("ttl: {}, ipv6: {}, host: {}", args.ttl, args.ipv6, args.host);

    let target = resolve(&args.host, family)?;
    let mut config = ProbeConfig::new(Ttl(args.ttl), family);
    if let Some(identifier) = args.ident {
        config = config.with_identifier(identifier);
    }
    tracing::debug!("echo identifier {:#06x}", config.identifier());

    let stop = StopCondition::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.set_should_stop())
        .map_err(|e| format!("could not install interrupt handler: {e}"))?;

    let scheduler = ProbeScheduler::new(target, config, EchoTransport::new(), io::stdout());
    let mut runner = PingRunner::start(scheduler, stop);

    let stats = runner.finish(&mut io::stdout().lock())?;
    tracing::debug!("{} probes transmitted, {} received", stats.transmitted(), stats.received());
    Ok(())
}
