use clap::Parser;
use qtun::{
    cli::Args,
    shutdown::{drive, Interrupt},
    status::ConsoleSink,
    Device, Error, HostSetup, SystemResolver, TunDevice, Tunnel,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let quiet = args.quiet;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // The tunnel never stops on its own, so every way out is a failure.
    match run(args).await {
        Err(Error::Interrupted) => {
            if !quiet {
                println!();
            }
            tracing::info!("interrupted, shutting down");
        }
        Err(e) => tracing::error!("{e}"),
        Ok(()) => {}
    }

    std::process::exit(1);
}

async fn run(args: Args) -> Result<(), Error> {
    // Listen before touching the host, so an early interrupt still reaches the teardown below.
    let mut interrupt = Interrupt::register().map_err(Error::Signal)?;

    args.validate()?;

    let rules = qtun::load_file(&args.rules, &SystemResolver).await?;
    let device = TunDevice::create(None)?;

    let setup = if args.skip_setup {
        None
    } else {
        Some(HostSetup::apply(device.name(), args.setup_config())?)
    };

    let tunnel = Tunnel::new(device, rules, args.tunnel_config());
    let result = if args.quiet {
        drive(tunnel, interrupt.recv()).await
    } else {
        drive(tunnel.with_sink(ConsoleSink), interrupt.recv()).await
    };

    if let Some(setup) = setup {
        if let Err(e) = setup.teardown() {
            tracing::warn!(iface = setup.iface(), "teardown incomplete: {e}");
        }
    }

    result
}
