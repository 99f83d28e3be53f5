//! xskd: answers pings on one link queue through an AF_XDP socket.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::{error, info};

use xskd::xsk::map::{open_pinned, pinned_map_path};
use xskd::xsk::{AttachMode, XdpProgram};
use xskd::{Poller, ProcessorKind, StatsReporter, XskBuilder, XskConfig};
use xskd_core::sys::if_xdp::{XDP_COPY, XDP_ZEROCOPY};
use xskd_core::sys::utils::raise_memlock_limit;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProcessorArg {
    /// ICMPv4 echo replies through the TX ring.
    Icmp,
    /// ICMPv6 echo replies through the TX ring.
    Icmpv6,
    /// ICMPv4 echo replies sent out of --egress-dev.
    Egress,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AttachArg {
    Auto,
    Skb,
    Native,
    Hw,
}

impl From<AttachArg> for AttachMode {
    fn from(arg: AttachArg) -> Self {
        match arg {
            AttachArg::Auto => AttachMode::Auto,
            AttachArg::Skb => AttachMode::Generic,
            AttachArg::Native => AttachMode::Native,
            AttachArg::Hw => AttachMode::Offload,
        }
    }
}

#[derive(Parser)]
#[command(name = "xskd", about = "AF_XDP echo responder", version)]
struct Cli {
    /// Link to bind to.
    #[arg(short, long)]
    dev: String,

    /// Hardware RX queue on the link.
    #[arg(short, long, default_value_t = 0)]
    queue: u32,

    /// Spin on the RX ring instead of blocking in poll(2).
    #[arg(long)]
    busy_poll: bool,

    /// Upper bound on a single readiness wait, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    poll_timeout_ms: u64,

    #[arg(long, default_value_t = 4096)]
    frame_size: u32,

    /// Number of frames in the umem.
    #[arg(long, default_value_t = 4096)]
    frames: u32,

    #[arg(long, default_value_t = 0)]
    headroom: u32,

    /// RX and TX ring size.
    #[arg(long, default_value_t = 2048)]
    ring_size: u32,

    /// Fill and completion ring size.
    #[arg(long, default_value_t = 2048)]
    umem_ring_size: u32,

    #[arg(long, default_value_t = 64)]
    batch_size: usize,

    /// Force copy mode.
    #[arg(long, conflicts_with = "zero_copy")]
    copy: bool,

    /// Force zero-copy mode.
    #[arg(long)]
    zero_copy: bool,

    /// Bind with XDP_USE_NEED_WAKEUP.
    #[arg(long)]
    need_wakeup: bool,

    /// Seconds between statistics lines.
    #[arg(long, default_value_t = 2)]
    stats_interval: u64,

    #[arg(long, value_enum, default_value = "icmp")]
    processor: ProcessorArg,

    /// Second link for the egress processor.
    #[arg(long, required_if_eq("processor", "egress"))]
    egress_dev: Option<String>,

    /// XDP object to load and attach. Without it the socket map pinned for
    /// the link is used and the redirect program must already be attached.
    #[arg(long)]
    xdp_object: Option<PathBuf>,

    /// Program section in --xdp-object.
    #[arg(long, default_value = "xdp_sock_prog")]
    xdp_program: String,

    #[arg(long, value_enum, default_value = "auto")]
    attach_mode: AttachArg,

    /// Name of the XSKMAP, in --xdp-object or under /sys/fs/bpf/<dev>/.
    #[arg(long, default_value = "xsks_map")]
    map_name: String,

    /// Explicit pin path of the XSKMAP.
    #[arg(long, conflicts_with = "xdp_object")]
    map_pin: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG.
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn config(&self) -> XskConfig {
        let mut bind_flags = 0;
        if self.copy {
            bind_flags |= XDP_COPY;
        }
        if self.zero_copy {
            bind_flags |= XDP_ZEROCOPY;
        }
        let processor = match self.processor {
            ProcessorArg::Icmp => ProcessorKind::IcmpEcho,
            ProcessorArg::Icmpv6 => ProcessorKind::Icmpv6Echo,
            ProcessorArg::Egress => ProcessorKind::Egress {
                interface: self.egress_dev.clone().unwrap_or_default(),
            },
        };
        XskConfig {
            frame_size: self.frame_size,
            frame_count: self.frames,
            headroom: self.headroom,
            rx_size: self.ring_size,
            tx_size: self.ring_size,
            fill_size: self.umem_ring_size,
            comp_size: self.umem_ring_size,
            batch_size: self.batch_size,
            poller: if self.busy_poll { Poller::Busy } else { Poller::Wait },
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            bind_flags,
            need_wakeup: self.need_wakeup,
            stats_interval: Duration::from_secs(self.stats_interval.max(1)),
            processor,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config();
    config.validate().context("invalid configuration")?;

    raise_memlock_limit().context("raising RLIMIT_MEMLOCK")?;

    let mut program = match &cli.xdp_object {
        Some(object) => Some(
            XdpProgram::load_and_attach(object, &cli.xdp_program, &cli.dev, cli.attach_mode.into())
                .with_context(|| format!("attaching XDP program to {}", cli.dev))?,
        ),
        None => None,
    };
    let mut map = match program.as_mut() {
        Some(program) => program.take_socket_map(&cli.map_name)?,
        None => {
            let path = cli
                .map_pin
                .clone()
                .unwrap_or_else(|| pinned_map_path(&cli.dev, &cli.map_name));
            open_pinned(&path).with_context(|| format!("opening socket map for {}", cli.dev))?
        }
    };

    let mut engine = XskBuilder::new(&cli.dev)
        .queue_id(cli.queue)
        .config(config.clone())
        .build_engine(&mut map)
        .with_context(|| format!("binding AF_XDP socket to {} queue {}", cli.dev, cli.queue))?;

    let stop = Arc::new(AtomicBool::new(false));
    let stats = Arc::clone(engine.stats());

    let engine_handle = {
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("xsk-engine".into())
            .spawn(move || {
                let result = engine.run(&stop);
                (engine.into_port(), result)
            })
            .context("spawning engine thread")?
    };
    let reporter_handle = {
        let stop = Arc::clone(&stop);
        let interval = config.stats_interval;
        thread::Builder::new()
            .name("xsk-stats".into())
            .spawn(move || StatsReporter::new(stats, interval).run(&stop))
            .context("spawning statistics thread")?
    };

    info!(dev = %cli.dev, queue = cli.queue, "running, press Ctrl+C to stop");

    // The engine thread may also stop on its own after a fatal error.
    let engine_stopped = async {
        while !engine_handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };
    tokio::select! {
        _ = shutdown_signal() => {}
        _ = engine_stopped => {}
    }
    stop.store(true, Ordering::Relaxed);

    let (socket, result) = engine_handle
        .join()
        .map_err(|_| anyhow!("engine thread panicked"))?;
    reporter_handle
        .join()
        .map_err(|_| anyhow!("statistics thread panicked"))?;

    match socket.kernel_statistics() {
        Ok(k) => info!(
            rx_dropped = k.rx_dropped,
            rx_invalid_descs = k.rx_invalid_descs,
            tx_invalid_descs = k.tx_invalid_descs,
            rx_ring_full = k.rx_ring_full,
            rx_fill_ring_empty_descs = k.rx_fill_ring_empty_descs,
            tx_ring_empty_descs = k.tx_ring_empty_descs,
            "kernel XDP statistics"
        ),
        Err(e) => error!(error = %e, "reading kernel XDP statistics"),
    }

    socket.teardown().teardown();
    drop(map);
    drop(program);
    info!("shutdown complete");

    result.context("engine stopped")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
