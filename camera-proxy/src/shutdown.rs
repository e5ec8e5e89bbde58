use std::io;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShutdownPhase {
    Running = 0,
    GracefulShutdown = 1,
    ForcedExit = 2,
}

impl ShutdownPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownPhase::Running,
            1 => ShutdownPhase::GracefulShutdown,
            _ => ShutdownPhase::ForcedExit,
        }
    }
}

type ForcedExitAction = Box<dyn Fn() + Send + Sync>;

/// Moves Running -> GracefulShutdown on the first SIGINT/SIGTERM and to
/// ForcedExit on the second. Workers only ever see the cancellation token.
pub struct ShutdownCoordinator {
    phase: AtomicU8,
    token: CancellationToken,
    on_forced: ForcedExitAction,
    broken_pipes: AtomicU64,
}

impl ShutdownCoordinator {
    /// Coordinator whose forced exit terminates the process with status 1
    pub fn new() -> Arc<Self> {
        Self::with_forced_exit(|| std::process::exit(1))
    }

    pub fn with_forced_exit<F>(on_forced: F) -> Arc<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Arc::new(Self {
            phase: AtomicU8::new(ShutdownPhase::Running as u8),
            token: CancellationToken::new(),
            on_forced: Box::new(on_forced),
            broken_pipes: AtomicU64::new(0),
        })
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn phase(&self) -> ShutdownPhase {
        ShutdownPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    pub fn is_shutting_down(&self) -> bool {
        self.phase() != ShutdownPhase::Running
    }

    /// Advance the state machine for one interrupt and return the new phase.
    pub fn on_interrupt(&self) -> ShutdownPhase {
        match self.phase.compare_exchange(
            ShutdownPhase::Running as u8,
            ShutdownPhase::GracefulShutdown as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                info!("🛑 Interrupt received, shutting down (press Ctrl+C again to force)");
                self.token.cancel();
                ShutdownPhase::GracefulShutdown
            }
            Err(current) if current == ShutdownPhase::GracefulShutdown as u8 => {
                self.phase
                    .store(ShutdownPhase::ForcedExit as u8, Ordering::SeqCst);
                warn!("Second interrupt received, exiting immediately");
                (self.on_forced)();
                ShutdownPhase::ForcedExit
            }
            Err(_) => ShutdownPhase::ForcedExit,
        }
    }

    /// SIGPIPE never changes the phase; the failed write is handled where it happens.
    pub fn on_broken_pipe(&self) {
        let count = self.broken_pipes.fetch_add(1, Ordering::SeqCst) + 1;
        warn!("Caught SIGPIPE signal ({} so far)", count);
    }

    pub fn broken_pipes(&self) -> u64 {
        self.broken_pipes.load(Ordering::SeqCst)
    }

    /// Install the signal handlers and spawn the listener task.
    ///
    /// Handlers are registered before this returns.
    pub fn listen(self: Arc<Self>) -> io::Result<JoinHandle<()>> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigpipe = signal(SignalKind::pipe())?;

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(()) = sigint.recv() => {
                        self.on_interrupt();
                    }
                    Some(()) = sigterm.recv() => {
                        self.on_interrupt();
                    }
                    Some(()) = sigpipe.recv() => {
                        self.on_broken_pipe();
                    }
                    else => break,
                }
            }
        }))
    }
}
